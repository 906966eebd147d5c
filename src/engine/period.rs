//! One accounting period between two position-changing events.
//!
//! A [`PeriodRecord`] pairs the snapshot taken right after one event with the
//! snapshot taken right before the next. Within that window the share supply
//! is constant, so every value change splits cleanly into fee accrual,
//! reward emission and impermanent divergence.

use crate::config::EngineConfig;
use crate::domain::{
    Address, Decimal, PeriodTimeframe, RewardDetail, RewardObservations, Snapshot, TokenPair,
};
use crate::engine::prices::PriceLookup;
use crate::engine::rewards::{estimate_emission, pair_observations};
use crate::error::{DataInconsistency, InconsistencyKind, YieldError};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Everything needed to build one period.
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodInput {
    pub ini: Snapshot,
    pub end: Snapshot,
    pub rewards: RewardObservations,
    pub fees_collected_within: Option<TokenPair<Decimal>>,
    pub rebalance_divergence: Option<TokenPair<Decimal>>,
}

impl PeriodInput {
    pub fn new(ini: Snapshot, end: Snapshot) -> Self {
        Self {
            ini,
            end,
            rewards: RewardObservations::default(),
            fees_collected_within: None,
            rebalance_divergence: None,
        }
    }

    pub fn with_rewards(mut self, rewards: RewardObservations) -> Self {
        self.rewards = rewards;
        self
    }

    pub fn with_fees_collected_within(mut self, qty: TokenPair<Decimal>) -> Self {
        self.fees_collected_within = Some(qty);
        self
    }

    pub fn with_rebalance_divergence(mut self, qty: TokenPair<Decimal>) -> Self {
        self.rebalance_divergence = Some(qty);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodStatus {
    pub ini: Snapshot,
    pub end: Snapshot,
}

/// Fee accrual of one beneficiary (LPs or protocol) within the period.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeesData {
    pub qty: TokenPair<Decimal>,
    pub period_yield: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RewardsData {
    pub usd: Decimal,
    pub period_yield: Decimal,
    pub details: Vec<RewardDetail>,
}

/// Financial decomposition of one period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodRecord {
    pub address: Address,
    pub id: String,
    pub timeframe: PeriodTimeframe,
    pub status: PeriodStatus,
    /// LP-attributable fee accrual.
    pub fees: FeesData,
    /// Protocol-retained share of the same accrual.
    pub fees_gamma: FeesData,
    pub rewards: RewardsData,
    /// Fees claimed on chain inside the period. Informational only.
    pub fees_collected_within: TokenPair<Decimal>,
    /// Composition change caused by an adjacent rebalance, excluded from
    /// impermanent divergence.
    pub rebalance_divergence: TokenPair<Decimal>,
}

impl PeriodRecord {
    /// Build and validate a period from its boundary snapshots.
    ///
    /// # Errors
    /// `DataInconsistency` for supply drift or negative fee accrual, plus
    /// timeframe and reward errors. Nothing is corrected; the caller must
    /// re-acquire the block range.
    pub fn build(
        input: PeriodInput,
        prices: Option<&dyn PriceLookup>,
        config: &EngineConfig,
    ) -> Result<PeriodRecord, YieldError> {
        let PeriodInput {
            ini,
            end,
            rewards,
            fees_collected_within,
            rebalance_divergence,
        } = input;

        if ini.address != end.address {
            return Err(YieldError::SnapshotMismatch {
                ini: ini.address,
                end: end.address,
            });
        }

        let address = ini.address.clone();
        let timeframe = PeriodTimeframe::new(ini.location, end.location);
        if !timeframe.is_well_formed() {
            return Err(YieldError::NegativeTimeframe {
                vault_address: address,
                ini_block: timeframe.ini.block,
                end_block: timeframe.end.block,
            });
        }

        let fees_qty = end.lp_fees_uncollected() - ini.lp_fees_uncollected();
        let fees_gamma_qty = end.protocol_fees_uncollected() - ini.protocol_fees_uncollected();

        let mut record = PeriodRecord {
            id: Self::compute_id(&address, timeframe.ini.block, timeframe.end.block),
            address,
            timeframe,
            status: PeriodStatus { ini, end },
            fees: FeesData {
                qty: fees_qty,
                period_yield: Decimal::zero(),
            },
            fees_gamma: FeesData {
                qty: fees_gamma_qty,
                period_yield: Decimal::zero(),
            },
            rewards: RewardsData::default(),
            fees_collected_within: fees_collected_within.unwrap_or_else(TokenPair::zero),
            rebalance_divergence: rebalance_divergence.unwrap_or_else(TokenPair::zero),
        };

        record.check_fees(config)?;
        record.check_inconsistencies(config)?;
        record.fees.period_yield = record.fees_per_share_percentage_yield();
        record.fees_gamma.period_yield = record.fees_gamma_per_share_percentage_yield();
        record.fill_from_rewards_data(&rewards, prices)?;

        debug!(
            vault=%record.address,
            ini_block=record.timeframe.ini.block,
            end_block=record.timeframe.end.block,
            seconds=record.timeframe.seconds(),
            fees_usd=%record.period_fees_usd(),
            impermanent_usd=%record.impermanent_usd(),
            rewards_usd=%record.rewards.usd,
            "Period built"
        );

        Ok(record)
    }

    /// Stable identifier: hash of vault address and boundary blocks.
    pub fn compute_id(address: &Address, ini_block: u64, end_block: u64) -> String {
        use sha2::{Digest, Sha256};

        let mut hasher = Sha256::new();
        hasher.update(address.as_str());
        hasher.update(ini_block.to_le_bytes());
        hasher.update(end_block.to_le_bytes());
        let hash = hasher.finalize();
        hex::encode(&hash[..16])
    }

    /// Clamp negative fee noise to zero; fail on anything larger.
    fn check_fees(&mut self, config: &EngineConfig) -> Result<(), YieldError> {
        let tolerance = config.fee_noise_tolerance;
        self.fees.qty = self.clamp_fee_noise(self.fees.qty, tolerance)?;
        self.fees_gamma.qty = self.clamp_fee_noise(self.fees_gamma.qty, tolerance)?;
        Ok(())
    }

    fn clamp_fee_noise(
        &self,
        qty: TokenPair<Decimal>,
        tolerance: Decimal,
    ) -> Result<TokenPair<Decimal>, YieldError> {
        let clamp = |value: Decimal| -> Result<Decimal, YieldError> {
            if !value.is_negative() {
                Ok(value)
            } else if value.abs() <= tolerance {
                Ok(Decimal::zero())
            } else {
                Err(self.inconsistency(InconsistencyKind::NegativeFees, value).into())
            }
        };
        Ok(TokenPair::new(clamp(qty.token0)?, clamp(qty.token1)?))
    }

    /// Supply must not move inside a period; boundaries sit on mint/burn events.
    pub fn check_inconsistencies(&self, config: &EngineConfig) -> Result<(), YieldError> {
        let drift = self.supply_drift();
        if drift <= config.supply_tolerance {
            return Ok(());
        }

        if config.is_supply_exempt(&self.address) {
            warn!(
                vault=%self.address,
                ini_block=self.timeframe.ini.block,
                end_block=self.timeframe.end.block,
                drift=%drift,
                "Supply drift on exempted vault, continuing"
            );
            return Ok(());
        }

        Err(self
            .inconsistency(InconsistencyKind::SupplyDifference, drift)
            .into())
    }

    /// Relative supply change between the boundary snapshots.
    pub fn supply_drift(&self) -> Decimal {
        let ini = self.status.ini.supply;
        let end = self.status.end.supply;
        let base = if ini.is_zero() { end } else { ini };
        (end - ini).abs().safe_div(base)
    }

    /// Pair reward observations and value each token's emission for this period.
    fn fill_from_rewards_data(
        &mut self,
        observations: &RewardObservations,
        prices: Option<&dyn PriceLookup>,
    ) -> Result<(), YieldError> {
        let period_seconds = self.timeframe.seconds();
        let mut details = Vec::new();

        for pairing in pair_observations(&self.address, observations, &self.timeframe) {
            let reward_seconds = pairing.seconds();
            if reward_seconds != period_seconds {
                return Err(YieldError::RewardTimeMismatch {
                    reward_token: pairing.key.reward_token,
                    rewarder: pairing.key.rewarder_address,
                    reward_seconds,
                    period_seconds,
                });
            }

            let ini = pairing.ini.data();
            let end = pairing.end.data();
            let scale = Decimal::pow10_neg(end.reward_token_decimals);
            let overflow = || YieldError::RewardOverflow {
                vault_address: self.address.clone(),
                reward_token: end.reward_token.clone(),
                ini_block: self.timeframe.ini.block,
                end_block: self.timeframe.end.block,
            };
            let qty = estimate_emission(
                ini.rewards_per_second * scale,
                end.rewards_per_second * scale,
                period_seconds,
            )
            .ok_or_else(overflow)?
            .qty;

            let price = end
                .reward_token_price_usd
                .or_else(|| prices.and_then(|p| p.usd_price(&end.reward_token, end.location.block)))
                .unwrap_or_else(|| {
                    warn!(
                        vault=%self.address,
                        reward_token=%end.reward_token,
                        block=end.location.block,
                        "No usd price for reward token, valuing at zero"
                    );
                    Decimal::zero()
                });
            let usd = qty.checked_mul(price).ok_or_else(overflow)?;

            details.push(RewardDetail {
                symbol: end.reward_token_symbol.clone(),
                address: end.reward_token.clone(),
                rewarder_address: end.rewarder_address.clone(),
                qty,
                usd,
                seconds: period_seconds,
                period_yield: usd.safe_div(end.staked_usd()),
                synthesized: pairing.is_synthesized(),
            });
        }

        let usd: Decimal = details.iter().map(|d| d.usd).sum();
        if usd.is_negative() {
            return Err(YieldError::NegativeRewards {
                vault_address: self.address.clone(),
                ini_block: self.timeframe.ini.block,
                end_block: self.timeframe.end.block,
                usd,
            });
        }

        self.rewards = RewardsData {
            usd,
            period_yield: details.iter().map(|d| d.period_yield).sum(),
            details,
        };
        Ok(())
    }

    /// Re-verify stored invariants. Records built through [`PeriodRecord::build`]
    /// always pass; a record altered afterwards may not.
    pub fn ensure_consistent(&self, config: &EngineConfig) -> Result<(), YieldError> {
        if !self.timeframe.is_well_formed() {
            return Err(YieldError::NegativeTimeframe {
                vault_address: self.address.clone(),
                ini_block: self.timeframe.ini.block,
                end_block: self.timeframe.end.block,
            });
        }
        self.check_inconsistencies(config)?;

        for qty in [self.fees.qty, self.fees_gamma.qty] {
            for value in [qty.token0, qty.token1] {
                if value.is_negative() {
                    return Err(self
                        .inconsistency(InconsistencyKind::NegativeFees, value)
                        .into());
                }
            }
        }

        if self.rewards.usd.is_negative() {
            return Err(YieldError::NegativeRewards {
                vault_address: self.address.clone(),
                ini_block: self.timeframe.ini.block,
                end_block: self.timeframe.end.block,
                usd: self.rewards.usd,
            });
        }
        Ok(())
    }

    fn inconsistency(&self, kind: InconsistencyKind, magnitude: Decimal) -> DataInconsistency {
        DataInconsistency {
            kind,
            vault_address: self.address.clone(),
            ini_block: self.timeframe.ini.block,
            end_block: self.timeframe.end.block,
            magnitude,
        }
    }

    pub fn ini_underlying_usd(&self) -> Decimal {
        self.status.ini.underlying_usd()
    }

    pub fn end_underlying_usd(&self) -> Decimal {
        self.status.end.underlying_usd()
    }

    /// LP fees valued at end prices.
    pub fn period_fees_usd(&self) -> Decimal {
        self.fees.qty.value_at(&self.status.end.prices)
    }

    pub fn fees_gamma_usd(&self) -> Decimal {
        self.fees_gamma.qty.value_at(&self.status.end.prices)
    }

    pub fn fees_collected_within_usd(&self) -> Decimal {
        self.fees_collected_within.value_at(&self.status.end.prices)
    }

    pub fn rebalance_divergence_usd(&self) -> Decimal {
        self.rebalance_divergence.value_at(&self.status.end.prices)
    }

    /// Underlying change not explained by fee accrual or a rebalance.
    pub fn impermanent_qty(&self) -> TokenPair<Decimal> {
        self.status.end.underlying.qty
            - self.status.ini.underlying.qty
            - self.fees.qty
            - self.rebalance_divergence
    }

    pub fn impermanent_usd(&self) -> Decimal {
        self.impermanent_qty().value_at(&self.status.end.prices)
    }

    pub fn impermanent_percentage_yield(&self) -> Decimal {
        self.impermanent_usd().safe_div(self.ini_underlying_usd())
    }

    /// Share price at the end of the period.
    pub fn price_per_share(&self) -> Decimal {
        self.status.end.price_per_share()
    }

    pub fn price_per_share_at_ini(&self) -> Decimal {
        self.status.ini.price_per_share()
    }

    pub fn fees_per_share(&self) -> Decimal {
        self.period_fees_usd().safe_div(self.status.end.supply)
    }

    pub fn fees_per_share_percentage_yield(&self) -> Decimal {
        self.fees_per_share().safe_div(self.price_per_share_at_ini())
    }

    pub fn fees_gamma_per_share(&self) -> Decimal {
        self.fees_gamma_usd().safe_div(self.status.end.supply)
    }

    pub fn fees_gamma_per_share_percentage_yield(&self) -> Decimal {
        self.fees_gamma_per_share().safe_div(self.price_per_share_at_ini())
    }

    /// Share price change net of fees and of the rebalance correction.
    pub fn impermanent_per_share(&self) -> Decimal {
        self.price_per_share()
            - self.price_per_share_at_ini()
            - self.fees_per_share()
            - self.rebalance_divergence_usd().safe_div(self.status.end.supply)
    }

    pub fn impermanent_per_share_percentage_yield(&self) -> Decimal {
        self.impermanent_per_share().safe_div(self.price_per_share_at_ini())
    }

    pub fn rewards_per_share(&self) -> Decimal {
        self.rewards.usd.safe_div(self.status.end.supply)
    }

    pub fn rewards_per_share_percentage_yield(&self) -> Decimal {
        self.rewards_per_share().safe_div(self.price_per_share_at_ini())
    }

    /// Yield of holding the vault share: fees plus impermanent divergence.
    pub fn hypervisor_period_yield(&self) -> Decimal {
        self.fees_per_share_percentage_yield() + self.impermanent_per_share_percentage_yield()
    }

    /// Hypervisor yield plus staking rewards.
    pub fn net_period_yield(&self) -> Decimal {
        self.hypervisor_period_yield() + self.rewards.period_yield
    }
}
