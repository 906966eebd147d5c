//! In-memory snapshot source for tests.

use super::{SnapshotSource, SourceError};
use crate::domain::Address;
use crate::engine::PeriodInput;
use async_trait::async_trait;

#[derive(Debug, Clone, Default)]
pub struct MockSnapshotSource {
    vaults: Vec<(Address, Vec<PeriodInput>)>,
    failing: Vec<Address>,
}

impl MockSnapshotSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append periods for `vault`, registering it on first use.
    pub fn with_periods(mut self, vault: Address, periods: Vec<PeriodInput>) -> Self {
        match self.vaults.iter_mut().find(|(address, _)| *address == vault) {
            Some((_, existing)) => existing.extend(periods),
            None => self.vaults.push((vault, periods)),
        }
        self
    }

    /// Make `fetch_periods` fail for `vault`.
    pub fn with_failing_vault(mut self, vault: Address) -> Self {
        self.failing.push(vault);
        self
    }
}

#[async_trait]
impl SnapshotSource for MockSnapshotSource {
    async fn list_vaults(&self) -> Result<Vec<Address>, SourceError> {
        let mut vaults: Vec<Address> = self.vaults.iter().map(|(a, _)| a.clone()).collect();
        for vault in &self.failing {
            if !vaults.contains(vault) {
                vaults.push(vault.clone());
            }
        }
        Ok(vaults)
    }

    async fn fetch_periods(&self, vault: &Address) -> Result<Vec<PeriodInput>, SourceError> {
        if self.failing.contains(vault) {
            return Err(SourceError::Parse(format!("mock failure for {}", vault)));
        }
        self.vaults
            .iter()
            .find(|(address, _)| address == vault)
            .map(|(_, periods)| periods.clone())
            .ok_or_else(|| SourceError::UnknownVault(vault.clone()))
    }
}
