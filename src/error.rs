use crate::domain::{Address, Decimal};
use serde::Serialize;
use thiserror::Error;

/// Structural data problem that requires re-acquiring the block range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InconsistencyKind {
    /// Share supply drifted within a period with no mint/burn boundary.
    SupplyDifference,
    /// Fee accrual decreased beyond the noise tolerance.
    NegativeFees,
}

impl std::fmt::Display for InconsistencyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InconsistencyKind::SupplyDifference => write!(f, "SUPPLY_DIFFERENCE"),
            InconsistencyKind::NegativeFees => write!(f, "NEGATIVE_FEES"),
        }
    }
}

/// Error signal handed back to the caller so it can rescrape `ini_block..=end_block`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("{kind} in vault {vault_address} blocks {ini_block}..{end_block} (magnitude {magnitude})")]
pub struct DataInconsistency {
    pub kind: InconsistencyKind,
    pub vault_address: Address,
    pub ini_block: u64,
    pub end_block: u64,
    pub magnitude: Decimal,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum YieldError {
    #[error(transparent)]
    DataInconsistency(#[from] DataInconsistency),
    #[error("period {ini_block}..{end_block} of vault {vault_address} ends before it starts")]
    NegativeTimeframe {
        vault_address: Address,
        ini_block: u64,
        end_block: u64,
    },
    #[error("snapshots belong to different vaults: {ini} and {end}")]
    SnapshotMismatch { ini: Address, end: Address },
    #[error(
        "reward {reward_token} from {rewarder} spans {reward_seconds}s but the period spans {period_seconds}s"
    )]
    RewardTimeMismatch {
        reward_token: Address,
        rewarder: Address,
        reward_seconds: i64,
        period_seconds: i64,
    },
    #[error("negative rewards in vault {vault_address} blocks {ini_block}..{end_block}: {usd}")]
    NegativeRewards {
        vault_address: Address,
        ini_block: u64,
        end_block: u64,
        usd: Decimal,
    },
    #[error("reward {reward_token} of vault {vault_address} blocks {ini_block}..{end_block} exceeds the decimal range")]
    RewardOverflow {
        vault_address: Address,
        reward_token: Address,
        ini_block: u64,
        end_block: u64,
    },
    #[error("no periods left to aggregate")]
    EmptyPeriods,
    #[error("periods are not sorted by ini timestamp at index {index}")]
    UnorderedPeriods { index: usize },
    #[error("periods mix vaults {expected} and {found}")]
    MixedVaults { expected: Address, found: Address },
}

impl YieldError {
    /// The rescrape instruction, when this error carries one.
    pub fn inconsistency(&self) -> Option<&DataInconsistency> {
        match self {
            YieldError::DataInconsistency(inner) => Some(inner),
            _ => None,
        }
    }
}
