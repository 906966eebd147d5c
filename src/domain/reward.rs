//! Reward-rate observations and per-period reward contributions.

use crate::domain::snapshot::{get_decimal, get_i64, get_non_negative, get_str, get_u64};
use crate::domain::{Address, Decimal, SnapshotError, TimeLocation};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Emission state of one rewarder for one reward token at one block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardObservation {
    pub location: TimeLocation,
    pub rewarder_address: Address,
    pub reward_token: Address,
    pub reward_token_symbol: String,
    pub reward_token_decimals: u32,
    /// Raw (undecimalized) emission per second.
    pub rewards_per_second: Decimal,
    /// Vault shares staked in the rewarder.
    pub total_staked: Decimal,
    pub hypervisor_share_price_usd: Decimal,
    pub reward_token_price_usd: Option<Decimal>,
}

/// Pairing key: a reward token emitted by a specific rewarder.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RewardKey {
    pub reward_token: Address,
    pub rewarder_address: Address,
}

impl RewardObservation {
    pub fn key(&self) -> RewardKey {
        RewardKey {
            reward_token: self.reward_token.clone(),
            rewarder_address: self.rewarder_address.clone(),
        }
    }

    /// Usd value of the staked shares.
    pub fn staked_usd(&self) -> Decimal {
        self.total_staked * self.hypervisor_share_price_usd
    }

    /// Parse and validate a reward observation document.
    pub fn from_json(value: &Value) -> Result<RewardObservation, SnapshotError> {
        let timestamp = get_i64(value, "timestamp")?;
        let block = get_u64(value, "block")?;
        let decimals = get_u64(value, "reward_token_decimals")?;
        let reward_token_decimals = u32::try_from(decimals)
            .ok()
            .filter(|d| *d <= 28)
            .ok_or_else(|| SnapshotError::OutOfRange {
                field: "reward_token_decimals".to_string(),
                value: decimals.to_string(),
            })?;

        let reward_token_price_usd = match value.get("reward_token_price_usd") {
            Some(v) if !v.is_null() => Some(get_non_negative(value, "reward_token_price_usd")?),
            _ => None,
        };

        Ok(RewardObservation {
            location: TimeLocation::new(timestamp, block),
            rewarder_address: Address::new(get_str(value, "rewarder_address")?.to_string()),
            reward_token: Address::new(get_str(value, "reward_token")?.to_string()),
            reward_token_symbol: get_str(value, "reward_token_symbol")?.to_string(),
            reward_token_decimals,
            // Negative rates are not rejected here; a negative period total fails the period.
            rewards_per_second: get_decimal(value, "rewards_per_second")?,
            total_staked: get_non_negative(value, "total_staked")?,
            hypervisor_share_price_usd: get_non_negative(value, "hypervisor_share_price_usd")?,
            reward_token_price_usd,
        })
    }
}

/// One side (ini or end) of a reward pairing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", content = "data", rename_all = "lowercase")]
pub enum RewardSide {
    /// Read from chain at the period boundary.
    Observed(RewardObservation),
    /// Built from the opposite side because this one was missing.
    Synthesized(RewardObservation),
}

impl RewardSide {
    pub fn data(&self) -> &RewardObservation {
        match self {
            RewardSide::Observed(data) | RewardSide::Synthesized(data) => data,
        }
    }

    pub fn is_synthesized(&self) -> bool {
        matches!(self, RewardSide::Synthesized(_))
    }
}

/// Raw reward observations at both period boundaries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RewardObservations {
    pub ini: Vec<RewardObservation>,
    pub end: Vec<RewardObservation>,
}

/// One reward token's contribution within a period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardDetail {
    pub symbol: String,
    pub address: Address,
    pub rewarder_address: Address,
    pub qty: Decimal,
    pub usd: Decimal,
    pub seconds: i64,
    pub period_yield: Decimal,
    /// True when either side of the pairing was synthesized.
    pub synthesized: bool,
}
