//! Snapshot sources feeding the engine.
//!
//! Sources are fully materialized per vault before any computation starts;
//! the engine itself never performs I/O.

use crate::domain::{Address, SnapshotError};
use crate::engine::PeriodInput;
use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

pub mod json_file;
pub mod mock;

pub use json_file::JsonFileSource;
pub use mock::MockSnapshotSource;

/// Provider of ordered period inputs per vault.
#[async_trait]
pub trait SnapshotSource: Send + Sync + fmt::Debug {
    /// Vaults this source has data for, in a stable order.
    async fn list_vaults(&self) -> Result<Vec<Address>, SourceError>;

    /// Period inputs of one vault, ordered by ascending ini timestamp.
    async fn fetch_periods(&self, vault: &Address) -> Result<Vec<PeriodInput>, SourceError>;
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed input: {0}")]
    Parse(String),
    #[error("unknown vault: {0}")]
    UnknownVault(Address),
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}
