pub mod config;
pub mod datasource;
pub mod domain;
pub mod engine;
pub mod error;
pub mod orchestration;

pub use config::{Config, EngineConfig};
pub use datasource::{JsonFileSource, MockSnapshotSource, SnapshotSource, SourceError};
pub use domain::{Address, Decimal, PeriodTimeframe, RewardSide, Snapshot, TimeLocation, TokenPair};
pub use engine::{analyze, AggregateResult, PeriodInput, PeriodRecord, YieldAggregator};
pub use error::{DataInconsistency, InconsistencyKind, YieldError};
pub use orchestration::{BatchReport, Runner};
