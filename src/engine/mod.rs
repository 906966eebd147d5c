//! Pure computation over snapshots: period records, outlier filtering and
//! the compounding aggregation.

pub mod accumulator;
pub mod aggregator;
pub mod outliers;
pub mod period;
pub mod prices;
pub mod rewards;

pub use accumulator::{Accumulator, CategoryState, PeriodPoint, PeriodPoints};
pub use aggregator::{
    analyze, AggregateResult, Baseline, Baselines, CategoryResult, GraphRow, GraphValue,
    PricePerShare, RewardTotal, YearExtrapolation, YieldAggregator, SECONDS_PER_YEAR,
};
pub use outliers::{discard_outliers, outlier_reason, OutlierReason};
pub use period::{FeesData, PeriodInput, PeriodRecord, PeriodStatus, RewardsData};
pub use prices::{PriceLookup, StaticPriceLookup};
pub use rewards::{estimate_emission, pair_observations, EmissionEstimate, RewardPairing};
