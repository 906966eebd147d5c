//! Running totals threaded through the aggregation fold.
//!
//! Each step returns a new [`Accumulator`]; nothing is updated in place, so a
//! single step can be exercised on its own.

use crate::domain::{Decimal, TimeLocation, TokenPair};
use crate::engine::period::PeriodRecord;
use serde::Serialize;

/// One category's contribution from a single period.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PeriodPoint {
    pub qty: TokenPair<Decimal>,
    pub usd: Decimal,
    pub per_share: Decimal,
    pub period_yield: Decimal,
}

/// Running state of one category.
///
/// Quantities, usd and per-share values are summed. Yields compound:
/// `cumulative_yield = Π(1 + period_yield) - 1`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CategoryState {
    pub qty: TokenPair<Decimal>,
    pub usd: Decimal,
    pub per_share: Decimal,
    /// Yield of the most recent period.
    pub period_yield: Decimal,
    pub cumulative_yield: Decimal,
}

impl CategoryState {
    pub fn step(&self, point: &PeriodPoint) -> CategoryState {
        CategoryState {
            qty: self.qty + point.qty,
            usd: self.usd + point.usd,
            per_share: self.per_share + point.per_share,
            period_yield: point.period_yield,
            cumulative_yield: self.cumulative_yield.compound(point.period_yield),
        }
    }
}

/// Per-category points of one period.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PeriodPoints {
    pub fees: PeriodPoint,
    pub fees_gamma: PeriodPoint,
    pub rewards: PeriodPoint,
    pub impermanent: PeriodPoint,
    pub hypervisor_roi: PeriodPoint,
    pub net_roi: PeriodPoint,
}

impl PeriodPoints {
    pub fn from_period(period: &PeriodRecord) -> PeriodPoints {
        let fees = PeriodPoint {
            qty: period.fees.qty,
            usd: period.period_fees_usd(),
            per_share: period.fees_per_share(),
            period_yield: period.fees_per_share_percentage_yield(),
        };
        let fees_gamma = PeriodPoint {
            qty: period.fees_gamma.qty,
            usd: period.fees_gamma_usd(),
            per_share: period.fees_gamma_per_share(),
            period_yield: period.fees_gamma_per_share_percentage_yield(),
        };
        let rewards = PeriodPoint {
            qty: TokenPair::zero(),
            usd: period.rewards.usd,
            per_share: period.rewards_per_share(),
            period_yield: period.rewards.period_yield,
        };
        let impermanent = PeriodPoint {
            qty: period.impermanent_qty(),
            usd: period.impermanent_usd(),
            per_share: period.impermanent_per_share(),
            period_yield: period.impermanent_per_share_percentage_yield(),
        };
        let hypervisor_roi = PeriodPoint {
            qty: fees.qty + impermanent.qty,
            usd: fees.usd + impermanent.usd,
            per_share: fees.per_share + impermanent.per_share,
            period_yield: period.hypervisor_period_yield(),
        };
        let net_roi = PeriodPoint {
            qty: hypervisor_roi.qty,
            usd: hypervisor_roi.usd + rewards.usd,
            per_share: hypervisor_roi.per_share + rewards.per_share,
            period_yield: period.net_period_yield(),
        };
        PeriodPoints {
            fees,
            fees_gamma,
            rewards,
            impermanent,
            hypervisor_roi,
            net_roi,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Accumulator {
    pub periods: usize,
    /// Sum of period durations, gaps between periods excluded.
    pub seconds: i64,
    pub blocks: i64,
    pub ini: TimeLocation,
    pub end: TimeLocation,
    pub price_per_share_ini: Decimal,
    pub price_per_share_end: Decimal,
    pub fees: CategoryState,
    pub fees_gamma: CategoryState,
    pub rewards: CategoryState,
    pub impermanent: CategoryState,
    pub hypervisor_roi: CategoryState,
    pub net_roi: CategoryState,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one period into the running totals.
    pub fn step(&self, period: &PeriodRecord, points: &PeriodPoints) -> Accumulator {
        let first = self.periods == 0;
        Accumulator {
            periods: self.periods + 1,
            seconds: self.seconds + period.timeframe.seconds(),
            blocks: self.blocks + period.timeframe.blocks(),
            ini: if first { period.timeframe.ini } else { self.ini },
            end: period.timeframe.end,
            price_per_share_ini: if first {
                period.price_per_share_at_ini()
            } else {
                self.price_per_share_ini
            },
            price_per_share_end: period.price_per_share(),
            fees: self.fees.step(&points.fees),
            fees_gamma: self.fees_gamma.step(&points.fees_gamma),
            rewards: self.rewards.step(&points.rewards),
            impermanent: self.impermanent.step(&points.impermanent),
            hypervisor_roi: self.hypervisor_roi.step(&points.hypervisor_roi),
            net_roi: self.net_roi.step(&points.net_roi),
        }
    }

    /// Share price change over the folded periods.
    pub fn price_per_share_yield(&self) -> Decimal {
        (self.price_per_share_end - self.price_per_share_ini).safe_div(self.price_per_share_ini)
    }
}
