//! Single-pass aggregation of validated periods into an [`AggregateResult`].
//!
//! Precondition: periods belong to one vault and are sorted by ascending
//! `timeframe.ini.timestamp`. Violations are rejected, never re-sorted.

use crate::config::EngineConfig;
use crate::domain::{Address, Decimal, PeriodTimeframe, TokenPair};
use crate::engine::accumulator::{Accumulator, CategoryState, PeriodPoint, PeriodPoints};
use crate::engine::outliers::discard_outliers;
use crate::engine::period::PeriodRecord;
use crate::error::YieldError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

pub const SECONDS_PER_YEAR: i64 = 365 * 86_400;

/// Linear and compounded yearly rates for one category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct YearExtrapolation {
    pub usd: Decimal,
    pub per_share: Decimal,
    /// `cumulative_yield / seconds * year`.
    pub apr: Decimal,
    /// `(1 + cumulative_yield)^(year / seconds) - 1`, computed in f64.
    pub apy: Decimal,
}

impl YearExtrapolation {
    pub fn from_state(state: &CategoryState, seconds: i64) -> YearExtrapolation {
        if seconds <= 0 {
            return YearExtrapolation::default();
        }
        let elapsed = Decimal::from_i64(seconds);
        let year = Decimal::from_i64(SECONDS_PER_YEAR);
        let linear = |value: Decimal| (value * year).safe_div(elapsed);

        YearExtrapolation {
            usd: linear(state.usd),
            per_share: linear(state.per_share),
            apr: linear(state.cumulative_yield),
            apy: compounded_year_yield(state.cumulative_yield, seconds),
        }
    }
}

/// Extrapolate a cumulative yield to one year assuming constant compounding.
///
/// rust_decimal has no real-valued power, so this runs in f64; the result is
/// an informational ratio, not an accumulated amount. Non-finite results map
/// to zero.
fn compounded_year_yield(cumulative_yield: Decimal, seconds: i64) -> Decimal {
    let base = 1.0 + cumulative_yield.to_f64_lossy();
    if base <= 0.0 {
        return -Decimal::one();
    }
    let exponent = SECONDS_PER_YEAR as f64 / seconds as f64;
    Decimal::from_f64_lossy(base.powf(exponent) - 1.0)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CategoryResult {
    pub qty: TokenPair<Decimal>,
    pub usd: Decimal,
    pub per_share: Decimal,
    /// Compounded yield over all periods.
    pub period_yield: Decimal,
    pub year: YearExtrapolation,
}

impl CategoryResult {
    fn from_state(state: &CategoryState, seconds: i64) -> CategoryResult {
        CategoryResult {
            qty: state.qty,
            usd: state.usd,
            per_share: state.per_share,
            period_yield: state.cumulative_yield,
            year: YearExtrapolation::from_state(state, seconds),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PricePerShare {
    pub ini: Decimal,
    pub end: Decimal,
    pub period_yield: Decimal,
}

/// A hold strategy evaluated from the first deposit to final prices.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Baseline {
    pub ini_usd: Decimal,
    pub end_usd: Decimal,
    pub period_yield: Decimal,
    /// `(net_roi + 1) / (baseline + 1) - 1`.
    pub vs_net_roi: Decimal,
}

impl Baseline {
    pub fn new(ini_usd: Decimal, end_usd: Decimal, net_roi: Decimal) -> Baseline {
        let period_yield = (end_usd - ini_usd).safe_div(ini_usd);
        let growth = Decimal::one() + period_yield;
        let vs_net_roi = if growth.is_zero() {
            Decimal::zero()
        } else {
            (Decimal::one() + net_roi) / growth - Decimal::one()
        };
        Baseline {
            ini_usd,
            end_usd,
            period_yield,
            vs_net_roi,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Baselines {
    /// Hold the deposited quantities.
    pub deposited: Baseline,
    /// Hold half of the deposit value in each token.
    pub fifty: Baseline,
    pub token0: Baseline,
    pub token1: Baseline,
}

/// Rewards of one token symbol across all periods.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RewardTotal {
    pub symbol: String,
    pub qty: Decimal,
    pub usd: Decimal,
    pub seconds: i64,
    pub period_yield: Decimal,
}

/// Point and running values of one category at one graph row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GraphValue {
    pub period_usd: Decimal,
    pub period_yield: Decimal,
    pub total_usd: Decimal,
    pub cumulative_yield: Decimal,
    pub year_apr: Decimal,
}

impl GraphValue {
    fn new(point: &PeriodPoint, state: &CategoryState, seconds: i64) -> GraphValue {
        GraphValue {
            period_usd: point.usd,
            period_yield: point.period_yield,
            total_usd: state.usd,
            cumulative_yield: state.cumulative_yield,
            year_apr: YearExtrapolation::from_state(state, seconds).apr,
        }
    }
}

/// One exported row per aggregated period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphRow {
    pub id: String,
    pub timeframe: PeriodTimeframe,
    pub datetime: DateTime<Utc>,
    pub seconds: i64,
    pub cumulative_seconds: i64,
    pub price_per_share: Decimal,
    pub price_per_share_at_ini: Decimal,
    pub fees: GraphValue,
    pub fees_gamma: GraphValue,
    pub rewards: GraphValue,
    pub impermanent: GraphValue,
    pub hypervisor_roi: GraphValue,
    pub net_roi: GraphValue,
}

impl GraphRow {
    fn new(period: &PeriodRecord, points: &PeriodPoints, state: &Accumulator) -> GraphRow {
        let secs = state.seconds;
        GraphRow {
            id: period.id.clone(),
            timeframe: period.timeframe,
            datetime: DateTime::<Utc>::from_timestamp(period.timeframe.end.timestamp, 0)
                .unwrap_or_default(),
            seconds: period.timeframe.seconds(),
            cumulative_seconds: secs,
            price_per_share: period.price_per_share(),
            price_per_share_at_ini: period.price_per_share_at_ini(),
            fees: GraphValue::new(&points.fees, &state.fees, secs),
            fees_gamma: GraphValue::new(&points.fees_gamma, &state.fees_gamma, secs),
            rewards: GraphValue::new(&points.rewards, &state.rewards, secs),
            impermanent: GraphValue::new(&points.impermanent, &state.impermanent, secs),
            hypervisor_roi: GraphValue::new(&points.hypervisor_roi, &state.hypervisor_roi, secs),
            net_roi: GraphValue::new(&points.net_roi, &state.net_roi, secs),
        }
    }
}

/// Output of one aggregation. Owned by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregateResult {
    pub address: Address,
    pub timeframe: PeriodTimeframe,
    pub seconds: i64,
    pub blocks: i64,
    pub periods: usize,
    pub fees: CategoryResult,
    pub fees_gamma: CategoryResult,
    pub rewards: CategoryResult,
    pub impermanent: CategoryResult,
    pub hypervisor_roi: CategoryResult,
    pub net_roi: CategoryResult,
    pub price_per_share: PricePerShare,
    pub comparison: Baselines,
    pub rewards_detail: Vec<RewardTotal>,
    pub graph: Vec<GraphRow>,
}

/// Folded view over an ordered, filtered period list.
#[derive(Debug, Clone)]
pub struct YieldAggregator {
    address: Address,
    periods: Vec<PeriodRecord>,
    points: Vec<PeriodPoints>,
    /// Accumulator after each period; `history[i]` includes `periods[i]`.
    history: Vec<Accumulator>,
}

impl YieldAggregator {
    /// Fold `periods` left to right.
    ///
    /// # Errors
    /// `EmptyPeriods`, `MixedVaults`, `UnorderedPeriods`, or the first
    /// record that fails [`PeriodRecord::ensure_consistent`].
    pub fn build(
        periods: Vec<PeriodRecord>,
        config: &EngineConfig,
    ) -> Result<YieldAggregator, YieldError> {
        let address = periods
            .first()
            .map(|p| p.address.clone())
            .ok_or(YieldError::EmptyPeriods)?;

        let (points, history) = periods.iter().enumerate().try_fold(
            (Vec::with_capacity(periods.len()), Vec::with_capacity(periods.len())),
            |(mut points, mut history): (Vec<PeriodPoints>, Vec<Accumulator>), (index, period)| {
                if period.address != address {
                    return Err(YieldError::MixedVaults {
                        expected: address.clone(),
                        found: period.address.clone(),
                    });
                }
                let previous = index.checked_sub(1).map(|i| &periods[i]);
                if previous.is_some_and(|prev| {
                    period.timeframe.ini.timestamp < prev.timeframe.ini.timestamp
                }) {
                    return Err(YieldError::UnorderedPeriods { index });
                }
                period.ensure_consistent(config)?;

                let point = PeriodPoints::from_period(period);
                let next = history.last().cloned().unwrap_or_default().step(period, &point);
                points.push(point);
                history.push(next);
                Ok((points, history))
            },
        )?;

        Ok(YieldAggregator {
            address,
            periods,
            points,
            history,
        })
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn periods(&self) -> &[PeriodRecord] {
        &self.periods
    }

    /// Totals after the last period.
    pub fn totals(&self) -> &Accumulator {
        // build() guarantees at least one entry.
        &self.history[self.history.len() - 1]
    }

    /// Rows of period and running values, one per period. Each call starts over.
    pub fn get_graph(&self) -> impl Iterator<Item = GraphRow> + '_ {
        self.periods
            .iter()
            .zip(self.points.iter())
            .zip(self.history.iter())
            .map(|((period, points), state)| GraphRow::new(period, points, state))
    }

    /// Reward contributions grouped by token symbol.
    pub fn get_rewards_detail(&self) -> Vec<RewardTotal> {
        let mut by_symbol: BTreeMap<&str, RewardTotal> = BTreeMap::new();
        for detail in self.periods.iter().flat_map(|p| p.rewards.details.iter()) {
            let total = by_symbol
                .entry(detail.symbol.as_str())
                .or_insert_with(|| RewardTotal {
                    symbol: detail.symbol.clone(),
                    qty: Decimal::zero(),
                    usd: Decimal::zero(),
                    seconds: 0,
                    period_yield: Decimal::zero(),
                });
            total.qty = total.qty + detail.qty;
            total.usd = total.usd + detail.usd;
            total.seconds += detail.seconds;
            total.period_yield = total.period_yield + detail.period_yield;
        }
        by_symbol.into_values().collect()
    }

    /// Hold strategies seeded with the first period's initial deposit,
    /// valued at the last period's end prices.
    pub fn baselines(&self) -> Baselines {
        let first = &self.periods[0].status.ini;
        let end_prices = self.periods[self.periods.len() - 1].status.end.prices;
        let ini_prices = first.prices;
        let deposit = first.underlying.qty;
        let net_roi = self.totals().net_roi.cumulative_yield;

        let ini_usd = deposit.value_at(&ini_prices);
        let half = ini_usd / Decimal::from_i64(2);
        let fifty_qty = TokenPair::new(
            half.safe_div(ini_prices.token0),
            half.safe_div(ini_prices.token1),
        );
        let all_token0 = ini_usd.safe_div(ini_prices.token0);
        let all_token1 = ini_usd.safe_div(ini_prices.token1);

        Baselines {
            deposited: Baseline::new(ini_usd, deposit.value_at(&end_prices), net_roi),
            fifty: Baseline::new(ini_usd, fifty_qty.value_at(&end_prices), net_roi),
            token0: Baseline::new(ini_usd, all_token0 * end_prices.token0, net_roi),
            token1: Baseline::new(ini_usd, all_token1 * end_prices.token1, net_roi),
        }
    }

    pub fn result(&self) -> AggregateResult {
        let totals = self.totals();
        let seconds = totals.seconds;
        AggregateResult {
            address: self.address.clone(),
            timeframe: PeriodTimeframe::new(totals.ini, totals.end),
            seconds,
            blocks: totals.blocks,
            periods: totals.periods,
            fees: CategoryResult::from_state(&totals.fees, seconds),
            fees_gamma: CategoryResult::from_state(&totals.fees_gamma, seconds),
            rewards: CategoryResult::from_state(&totals.rewards, seconds),
            impermanent: CategoryResult::from_state(&totals.impermanent, seconds),
            hypervisor_roi: CategoryResult::from_state(&totals.hypervisor_roi, seconds),
            net_roi: CategoryResult::from_state(&totals.net_roi, seconds),
            price_per_share: PricePerShare {
                ini: totals.price_per_share_ini,
                end: totals.price_per_share_end,
                period_yield: totals.price_per_share_yield(),
            },
            comparison: self.baselines(),
            rewards_detail: self.get_rewards_detail(),
            graph: self.get_graph().collect(),
        }
    }
}

/// Filter outliers, then aggregate.
pub fn analyze(
    periods: Vec<PeriodRecord>,
    config: &EngineConfig,
) -> Result<AggregateResult, YieldError> {
    let kept = discard_outliers(periods, config.max_reward_yield, config.max_fees_yield)?;
    YieldAggregator::build(kept, config).map(|aggregator| aggregator.result())
}
