//! Removal of statistically distorted periods before aggregation.
//!
//! Young vaults often see test transactions or liquidity injected straight
//! into the pool, producing one-off yields that would dominate any annualized
//! figure.

use crate::domain::Decimal;
use crate::engine::period::PeriodRecord;
use crate::error::YieldError;
use tracing::info;

/// Why a period was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutlierReason {
    ZeroSeconds,
    Impermanent,
    Rewards,
    Fees,
}

/// First rule (in evaluation order) that rejects `period`, if any.
pub fn outlier_reason(
    period: &PeriodRecord,
    max_reward_yield: Decimal,
    max_fees_yield: Decimal,
) -> Option<OutlierReason> {
    if period.timeframe.seconds() == 0 {
        return Some(OutlierReason::ZeroSeconds);
    }
    if period.impermanent_per_share_percentage_yield().abs() > max_reward_yield {
        return Some(OutlierReason::Impermanent);
    }
    if period.rewards.usd.safe_div(period.ini_underlying_usd()) > max_reward_yield {
        return Some(OutlierReason::Rewards);
    }
    if period.fees_per_share_percentage_yield() > max_fees_yield {
        return Some(OutlierReason::Fees);
    }
    None
}

/// Keep the periods that pass every outlier rule, preserving order.
///
/// # Errors
/// `EmptyPeriods` when nothing survives.
pub fn discard_outliers(
    periods: Vec<PeriodRecord>,
    max_reward_yield: Decimal,
    max_fees_yield: Decimal,
) -> Result<Vec<PeriodRecord>, YieldError> {
    let total = periods.len();
    let kept: Vec<PeriodRecord> = periods
        .into_iter()
        .filter(|p| outlier_reason(p, max_reward_yield, max_fees_yield).is_none())
        .collect();

    let discarded = total - kept.len();
    if discarded > 0 {
        let percentage = discarded as f64 / total as f64 * 100.0;
        info!(
            discarded,
            total,
            "Discarded {:.2}% of periods as outliers",
            percentage
        );
    }

    if kept.is_empty() {
        return Err(YieldError::EmptyPeriods);
    }
    Ok(kept)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::domain::{
        Address, RewardObservation, RewardObservations, Snapshot, TimeLocation, TokenPair,
    };
    use crate::engine::period::PeriodInput;

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    fn period(ini_ts: i64, end_ts: i64, end_price0: &str, fees0: &str) -> PeriodRecord {
        let ini = Snapshot::new(
            Address::from("0xvault"),
            TimeLocation::new(ini_ts, ini_ts as u64),
            TokenPair::new(d("1"), d("1")),
            TokenPair::new(d("10"), d("10")),
            d("100"),
        );
        let end = Snapshot::new(
            Address::from("0xvault"),
            TimeLocation::new(end_ts, end_ts as u64),
            TokenPair::new(d(end_price0), d("1")),
            TokenPair::new(d("10") + d(fees0), d("10")),
            d("100"),
        )
        .with_uncollected_fees(TokenPair::new(d(fees0), d("0")), Decimal::zero());
        PeriodRecord::build(PeriodInput::new(ini, end), None, &EngineConfig::default()).unwrap()
    }

    #[test]
    fn test_zero_second_period_dropped_first() {
        let p = period(100, 100, "1", "0");
        assert_eq!(outlier_reason(&p, d("2"), d("2")), Some(OutlierReason::ZeroSeconds));
    }

    #[test]
    fn test_impermanent_outlier_detected_both_signs() {
        // pps 0.2 -> 1.2: +500%
        let up = period(0, 100, "11", "0");
        assert_eq!(outlier_reason(&up, d("2"), d("2")), Some(OutlierReason::Impermanent));
        // pps 0.2 -> 0.1: -50%, within bounds
        let down = period(0, 100, "0", "0");
        assert_eq!(outlier_reason(&down, d("2"), d("2")), None);
    }

    #[test]
    fn test_fee_outlier_detected() {
        // 50 token0 of fees on a 20 usd vault
        let p = period(0, 100, "1", "50");
        assert_eq!(outlier_reason(&p, d("2"), d("2")), Some(OutlierReason::Fees));
    }

    fn rewarded_period(rate: &str) -> PeriodRecord {
        let observation = |ts: i64| RewardObservation {
            location: TimeLocation::new(ts, ts as u64),
            rewarder_address: Address::from("0xrewarder"),
            reward_token: Address::from("0xreward"),
            reward_token_symbol: "RWD".to_string(),
            reward_token_decimals: 0,
            rewards_per_second: d(rate),
            total_staked: d("100"),
            hypervisor_share_price_usd: d("0.2"),
            reward_token_price_usd: Some(d("1")),
        };
        let snapshot = |ts: i64| {
            Snapshot::new(
                Address::from("0xvault"),
                TimeLocation::new(ts, ts as u64),
                TokenPair::new(d("1"), d("1")),
                TokenPair::new(d("10"), d("10")),
                d("100"),
            )
        };
        let input = PeriodInput::new(snapshot(0), snapshot(100)).with_rewards(RewardObservations {
            ini: vec![observation(0)],
            end: vec![observation(100)],
        });
        PeriodRecord::build(input, None, &EngineConfig::default()).unwrap()
    }

    #[test]
    fn test_reward_outlier_detected() {
        // 50 usd of rewards on a 20 usd vault
        let p = rewarded_period("0.5");
        assert_eq!(p.rewards.usd, d("50"));
        assert_eq!(outlier_reason(&p, d("2"), d("2")), Some(OutlierReason::Rewards));
    }

    #[test]
    fn test_reward_yield_at_threshold_kept() {
        let p = rewarded_period("0.4");
        assert_eq!(p.rewards.usd.safe_div(p.ini_underlying_usd()), d("2"));
        assert_eq!(outlier_reason(&p, d("2"), d("2")), None);
    }

    #[test]
    fn test_filter_keeps_order_and_fails_when_empty() {
        let periods = vec![
            period(0, 100, "1", "0.1"),
            period(100, 100, "1", "0"),
            period(100, 200, "1", "0.2"),
        ];
        let kept = discard_outliers(periods, d("2"), d("2")).unwrap();
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].timeframe.ini.timestamp, 0);
        assert_eq!(kept[1].timeframe.ini.timestamp, 100);

        let result = discard_outliers(vec![period(5, 5, "1", "0")], d("2"), d("2"));
        assert_eq!(result, Err(YieldError::EmptyPeriods));
    }
}
