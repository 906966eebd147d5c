use crate::config::EngineConfig;
use crate::datasource::{SnapshotSource, SourceError};
use crate::domain::Address;
use crate::engine::{analyze, AggregateResult, PeriodInput, PeriodRecord, PriceLookup};
use crate::error::YieldError;
use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};

#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error("period {ini_block}..{end_block}: {source}")]
    Period {
        ini_block: u64,
        end_block: u64,
        #[source]
        source: YieldError,
    },
    #[error(transparent)]
    Yield(#[from] YieldError),
    #[error("engine task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl RunError {
    /// Block range to re-acquire before retrying, when the failure is tied to one period.
    pub fn rescrape_range(&self) -> Option<(u64, u64)> {
        match self {
            RunError::Period {
                ini_block,
                end_block,
                ..
            } => Some((*ini_block, *end_block)),
            RunError::Yield(err) => err
                .inconsistency()
                .map(|inconsistency| (inconsistency.ini_block, inconsistency.end_block)),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct VaultOutcome {
    pub address: Address,
    pub result: Result<AggregateResult, RunError>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VaultFailure {
    pub address: Address,
    pub error: String,
    pub rescrape_ini_block: Option<u64>,
    pub rescrape_end_block: Option<u64>,
}

/// Serializable summary of one batch run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub results: Vec<AggregateResult>,
    pub failures: Vec<VaultFailure>,
}

impl BatchReport {
    pub fn from_outcomes(outcomes: Vec<VaultOutcome>) -> Self {
        let mut results = Vec::new();
        let mut failures = Vec::new();
        for outcome in outcomes {
            match outcome.result {
                Ok(result) => results.push(result),
                Err(err) => {
                    let range = err.rescrape_range();
                    failures.push(VaultFailure {
                        address: outcome.address,
                        error: err.to_string(),
                        rescrape_ini_block: range.map(|(ini, _)| ini),
                        rescrape_end_block: range.map(|(_, end)| end),
                    });
                }
            }
        }
        Self { results, failures }
    }
}

/// Runs one independent engine instance per vault.
#[derive(Clone)]
pub struct Runner {
    source: Arc<dyn SnapshotSource>,
    prices: Arc<dyn PriceLookup>,
    config: EngineConfig,
}

impl Runner {
    pub fn new(
        source: Arc<dyn SnapshotSource>,
        prices: Arc<dyn PriceLookup>,
        config: EngineConfig,
    ) -> Self {
        Self {
            source,
            prices,
            config,
        }
    }

    /// Vaults to process: `requested` when non-empty, otherwise everything the source has.
    pub async fn resolve_vaults(&self, requested: &[Address]) -> Result<Vec<Address>, RunError> {
        if requested.is_empty() {
            Ok(self.source.list_vaults().await?)
        } else {
            Ok(requested.to_vec())
        }
    }

    pub async fn run_vault(&self, vault: &Address) -> Result<AggregateResult, RunError> {
        let inputs = self.source.fetch_periods(vault).await?;
        let fetched = inputs.len();

        let prices = Arc::clone(&self.prices);
        let config = self.config.clone();
        let result = tokio::task::spawn_blocking(move || compute(inputs, prices.as_ref(), &config))
            .await?;

        match &result {
            Ok(aggregate) => info!(
                address = %vault,
                fetched,
                periods = aggregate.periods,
                net_roi = %aggregate.net_roi.period_yield,
                "Vault aggregated"
            ),
            Err(err) => match err.rescrape_range() {
                Some((ini_block, end_block)) => {
                    error!(address = %vault, ini_block, end_block, error = %err, "Vault failed, rescrape required")
                }
                None => error!(address = %vault, error = %err, "Vault failed"),
            },
        }
        result
    }

    /// Run every vault concurrently; failures stay with their vault.
    pub async fn run_all(&self, vaults: &[Address]) -> Vec<VaultOutcome> {
        let runs = vaults.iter().map(|vault| async move {
            VaultOutcome {
                address: vault.clone(),
                result: self.run_vault(vault).await,
            }
        });
        join_all(runs).await
    }
}

fn compute(
    inputs: Vec<PeriodInput>,
    prices: &dyn PriceLookup,
    config: &EngineConfig,
) -> Result<AggregateResult, RunError> {
    let periods = inputs
        .into_iter()
        .map(|input| {
            let (ini_block, end_block) = (input.ini.location.block, input.end.location.block);
            PeriodRecord::build(input, Some(prices), config).map_err(|source| RunError::Period {
                ini_block,
                end_block,
                source,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(analyze(periods, config)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasource::MockSnapshotSource;
    use crate::domain::{Decimal, Snapshot, TimeLocation, TokenPair};
    use crate::engine::StaticPriceLookup;

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    fn input(vault: &str, ini_ts: i64, end_supply: &str) -> PeriodInput {
        let snap = |ts: i64, supply: &str| {
            Snapshot::new(
                Address::from(vault),
                TimeLocation::new(ts, ts as u64),
                TokenPair::new(d("1"), d("1")),
                TokenPair::new(d("10"), d("10")),
                d(supply),
            )
        };
        PeriodInput::new(snap(ini_ts, "100"), snap(ini_ts + 100, end_supply))
    }

    fn runner(source: MockSnapshotSource) -> Runner {
        Runner::new(
            Arc::new(source),
            Arc::new(StaticPriceLookup::new()),
            EngineConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_period_failure_carries_rescrape_range() {
        let source = MockSnapshotSource::new()
            .with_periods(Address::from("0xv"), vec![input("0xv", 0, "100"), input("0xv", 100, "105")]);
        let err = runner(source).run_vault(&Address::from("0xv")).await.unwrap_err();
        assert_eq!(err.rescrape_range(), Some((100, 200)));
    }

    #[tokio::test]
    async fn test_resolve_vaults_prefers_requested() {
        let source = MockSnapshotSource::new()
            .with_periods(Address::from("0xa"), vec![])
            .with_periods(Address::from("0xb"), vec![]);
        let runner = runner(source);

        assert_eq!(
            runner.resolve_vaults(&[]).await.unwrap(),
            vec![Address::from("0xa"), Address::from("0xb")]
        );
        assert_eq!(
            runner.resolve_vaults(&[Address::from("0xb")]).await.unwrap(),
            vec![Address::from("0xb")]
        );
    }

    #[tokio::test]
    async fn test_report_splits_results_and_failures() {
        let source = MockSnapshotSource::new()
            .with_periods(Address::from("0xok"), vec![input("0xok", 0, "100")])
            .with_periods(Address::from("0xempty"), vec![]);
        let runner = runner(source);
        let vaults = runner.resolve_vaults(&[]).await.unwrap();

        let report = BatchReport::from_outcomes(runner.run_all(&vaults).await);
        assert_eq!(report.results.len(), 1);
        assert_eq!(report.results[0].address, Address::from("0xok"));
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].address, Address::from("0xempty"));
        assert_eq!(report.failures[0].rescrape_ini_block, None);
    }
}
