//! Domain value types for the period yield engine.
//!
//! This module provides:
//! - Lossless numeric handling via Decimal wrapper
//! - Domain primitives: Address, TimeLocation, PeriodTimeframe, TokenPair
//! - Snapshot with its single JSON parse/validate boundary
//! - Reward observations, the Observed/Synthesized pairing side, RewardDetail

pub mod decimal;
pub mod primitives;
pub mod reward;
pub mod snapshot;

pub use decimal::Decimal;
pub use primitives::{Address, PeriodTimeframe, TimeLocation, TokenPair};
pub use reward::{RewardDetail, RewardKey, RewardObservation, RewardObservations, RewardSide};
pub use snapshot::{Snapshot, SnapshotError, UnderlyingDetails, UnderlyingValue};
