//! Pairing of ini/end reward observations and the per-period emission estimate.

use crate::domain::{
    Address, Decimal, PeriodTimeframe, RewardKey, RewardObservation, RewardObservations,
    RewardSide, TimeLocation,
};
use std::collections::BTreeMap;
use tracing::warn;

/// Matched ini/end observations for one `(reward_token, rewarder)` key.
#[derive(Debug, Clone, PartialEq)]
pub struct RewardPairing {
    pub key: RewardKey,
    pub ini: RewardSide,
    pub end: RewardSide,
}

impl RewardPairing {
    /// Seconds between the two observations.
    pub fn seconds(&self) -> i64 {
        self.end.data().location.timestamp - self.ini.data().location.timestamp
    }

    pub fn is_synthesized(&self) -> bool {
        self.ini.is_synthesized() || self.end.is_synthesized()
    }
}

/// Bounds of the emitted quantity given only the boundary emission rates.
///
/// The true per-second schedule is unknown; the rate is assumed to switch
/// from one boundary value to the other at some second in the period, which
/// brackets the emission between `min` and `max`. `qty` is their midpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmissionEstimate {
    pub max: Decimal,
    pub min: Decimal,
    pub qty: Decimal,
}

/// Estimate the emission over `seconds` in the unit of the given rates.
///
/// Returns `None` when the bounds exceed the decimal range.
pub fn estimate_emission(
    rate_ini: Decimal,
    rate_end: Decimal,
    seconds: i64,
) -> Option<EmissionEstimate> {
    let span = Decimal::from_i64(seconds - 1);
    let max = rate_end.checked_mul(span)?.checked_add(rate_ini)?;
    let min = rate_ini.checked_mul(span)?.checked_add(rate_end)?;
    Some(EmissionEstimate {
        max,
        min,
        qty: max / Decimal::from_i64(2) + min / Decimal::from_i64(2),
    })
}

/// Match ini and end observations by key, synthesizing whichever side is missing.
///
/// Output is ordered by key. A synthesized side copies the other side's rate,
/// decimals, staked quantity and share price, placed at the period boundary.
pub fn pair_observations(
    vault: &Address,
    observations: &RewardObservations,
    timeframe: &PeriodTimeframe,
) -> Vec<RewardPairing> {
    let mut sides: BTreeMap<RewardKey, (Option<&RewardObservation>, Option<&RewardObservation>)> =
        BTreeMap::new();

    for obs in &observations.ini {
        let entry = sides.entry(obs.key()).or_default();
        if entry.0.is_some() {
            warn!(vault=%vault, reward_token=%obs.reward_token, rewarder=%obs.rewarder_address, "Duplicate ini reward observation, keeping the first");
            continue;
        }
        entry.0 = Some(obs);
    }
    for obs in &observations.end {
        let entry = sides.entry(obs.key()).or_default();
        if entry.1.is_some() {
            warn!(vault=%vault, reward_token=%obs.reward_token, rewarder=%obs.rewarder_address, "Duplicate end reward observation, keeping the first");
            continue;
        }
        entry.1 = Some(obs);
    }

    sides
        .into_iter()
        .filter_map(|(key, pair)| {
            let (ini, end) = match pair {
                (Some(ini), Some(end)) => (
                    RewardSide::Observed(ini.clone()),
                    RewardSide::Observed(end.clone()),
                ),
                (Some(ini), None) => {
                    warn!(vault=%vault, reward_token=%key.reward_token, rewarder=%key.rewarder_address, end_block=timeframe.end.block, "Missing end reward observation, synthesizing from ini");
                    (
                        RewardSide::Observed(ini.clone()),
                        RewardSide::Synthesized(synthesize(ini, timeframe.end)),
                    )
                }
                (None, Some(end)) => {
                    warn!(vault=%vault, reward_token=%key.reward_token, rewarder=%key.rewarder_address, ini_block=timeframe.ini.block, "Missing ini reward observation, synthesizing from end");
                    (
                        RewardSide::Synthesized(synthesize(end, timeframe.ini)),
                        RewardSide::Observed(end.clone()),
                    )
                }
                (None, None) => return None,
            };
            Some(RewardPairing { key, ini, end })
        })
        .collect()
}

fn synthesize(from: &RewardObservation, at: TimeLocation) -> RewardObservation {
    RewardObservation {
        location: at,
        ..from.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    fn observation(token: &str, rewarder: &str, location: TimeLocation, rate: &str) -> RewardObservation {
        RewardObservation {
            location,
            rewarder_address: Address::from(rewarder),
            reward_token: Address::from(token),
            reward_token_symbol: token.to_uppercase(),
            reward_token_decimals: 0,
            rewards_per_second: d(rate),
            total_staked: d("100"),
            hypervisor_share_price_usd: d("1"),
            reward_token_price_usd: Some(d("1")),
        }
    }

    fn timeframe() -> PeriodTimeframe {
        PeriodTimeframe::new(TimeLocation::new(1000, 10), TimeLocation::new(1100, 20))
    }

    #[test]
    fn test_estimator_bounds() {
        let estimate = estimate_emission(d("10"), d("20"), 100).unwrap();
        assert_eq!(estimate.max, d("1990"));
        assert_eq!(estimate.min, d("1010"));
        assert_eq!(estimate.qty, d("1500"));
    }

    #[test]
    fn test_estimator_constant_rate_is_exact() {
        let estimate = estimate_emission(d("3"), d("3"), 50).unwrap();
        assert_eq!(estimate.qty, d("150"));
        assert_eq!(estimate.max, estimate.min);
    }

    #[test]
    fn test_estimator_zero_seconds_emits_nothing() {
        assert_eq!(estimate_emission(d("10"), d("20"), 0).unwrap().qty, Decimal::zero());
    }

    #[test]
    fn test_estimator_reports_overflow() {
        assert_eq!(estimate_emission(d("5e24"), d("5e24"), 7_776_000), None);
    }

    #[test]
    fn test_pairs_observed_sides() {
        let tf = timeframe();
        let observations = RewardObservations {
            ini: vec![observation("0xop", "0xr1", tf.ini, "1")],
            end: vec![observation("0xop", "0xr1", tf.end, "2")],
        };
        let pairings = pair_observations(&Address::from("0xv"), &observations, &tf);
        assert_eq!(pairings.len(), 1);
        assert!(!pairings[0].is_synthesized());
        assert_eq!(pairings[0].seconds(), 100);
    }

    #[test]
    fn test_missing_ini_is_synthesized_from_end() {
        let tf = timeframe();
        let observations = RewardObservations {
            ini: vec![],
            end: vec![observation("0xop", "0xr1", tf.end, "2")],
        };
        let pairings = pair_observations(&Address::from("0xv"), &observations, &tf);
        assert_eq!(pairings.len(), 1);
        match &pairings[0].ini {
            RewardSide::Synthesized(data) => {
                assert_eq!(data.location, tf.ini);
                assert_eq!(data.rewards_per_second, d("2"));
            }
            other => panic!("Expected synthesized ini, got {:?}", other),
        }
        assert_eq!(pairings[0].seconds(), tf.seconds());
    }

    #[test]
    fn test_missing_end_is_synthesized_from_ini() {
        let tf = timeframe();
        let observations = RewardObservations {
            ini: vec![observation("0xop", "0xr1", tf.ini, "4")],
            end: vec![],
        };
        let pairings = pair_observations(&Address::from("0xv"), &observations, &tf);
        assert!(pairings[0].end.is_synthesized());
        assert_eq!(pairings[0].end.data().location, tf.end);
    }

    #[test]
    fn test_same_token_from_two_rewarders_stays_separate() {
        let tf = timeframe();
        let observations = RewardObservations {
            ini: vec![
                observation("0xop", "0xr1", tf.ini, "1"),
                observation("0xop", "0xr2", tf.ini, "1"),
            ],
            end: vec![
                observation("0xop", "0xr2", tf.end, "1"),
                observation("0xop", "0xr1", tf.end, "1"),
            ],
        };
        let pairings = pair_observations(&Address::from("0xv"), &observations, &tf);
        assert_eq!(pairings.len(), 2);
        assert_eq!(pairings[0].key.rewarder_address, Address::from("0xr1"));
        assert_eq!(pairings[1].key.rewarder_address, Address::from("0xr2"));
        assert!(pairings.iter().all(|p| !p.is_synthesized()));
    }
}
