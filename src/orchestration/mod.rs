//! Per-vault pipelines: fetch, build, filter, aggregate.

pub mod runner;

pub use runner::{BatchReport, RunError, Runner, VaultFailure, VaultOutcome};
