//! Batch input file produced by the upstream scrapers.
//!
//! ```json
//! {
//!   "vaults": [{ "address": "0x..", "periods": [{ "ini": {..}, "end": {..},
//!       "rewards": { "ini": [..], "end": [..] },
//!       "fees_collected_within": {..}, "rebalance_divergence": {..} }] }],
//!   "prices": [{ "token": "0x..", "block": 1, "usd": "1.0" }]
//! }
//! ```
//!
//! Vault period lists are kept raw and parsed on fetch, so a malformed vault
//! fails alone.

use super::{SnapshotSource, SourceError};
use crate::domain::snapshot::{get_decimal_pair, get_non_negative, get_non_negative_pair, get_str, get_u64};
use crate::domain::{Address, RewardObservation, RewardObservations, Snapshot};
use crate::engine::{PeriodInput, StaticPriceLookup};
use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone)]
pub struct JsonFileSource {
    vaults: Vec<(Address, Value)>,
    prices: StaticPriceLookup,
}

impl JsonFileSource {
    /// Read and index `path`.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| SourceError::Io {
                path: path.display().to_string(),
                source,
            })?;
        let document: Value = serde_json::from_str(&raw)
            .map_err(|e| SourceError::Parse(format!("{}: {}", path.display(), e)))?;

        let source = Self::from_json(&document)?;
        info!(
            path = %path.display(),
            vaults = source.vaults.len(),
            prices = source.prices.len(),
            "Loaded snapshot batch"
        );
        Ok(source)
    }

    pub fn from_json(document: &Value) -> Result<Self, SourceError> {
        let vault_docs = document
            .get("vaults")
            .and_then(|v| v.as_array())
            .ok_or_else(|| SourceError::Parse("Missing vaults array".to_string()))?;

        let mut vaults = Vec::with_capacity(vault_docs.len());
        for vault_doc in vault_docs {
            let address = Address::new(get_str(vault_doc, "address")?.to_string());
            let periods = vault_doc
                .get("periods")
                .cloned()
                .unwrap_or_else(|| Value::Array(Vec::new()));
            vaults.push((address, periods));
        }

        let mut prices = StaticPriceLookup::new();
        if let Some(price_docs) = document.get("prices").and_then(|v| v.as_array()) {
            for price_doc in price_docs {
                prices.insert(
                    Address::new(get_str(price_doc, "token")?.to_string()),
                    get_u64(price_doc, "block")?,
                    get_non_negative(price_doc, "usd")?,
                );
            }
        }

        Ok(Self { vaults, prices })
    }

    /// Prices listed in the batch, for reward tokens without an observed price.
    pub fn price_lookup(&self) -> StaticPriceLookup {
        self.prices.clone()
    }
}

#[async_trait]
impl SnapshotSource for JsonFileSource {
    async fn list_vaults(&self) -> Result<Vec<Address>, SourceError> {
        Ok(self.vaults.iter().map(|(address, _)| address.clone()).collect())
    }

    async fn fetch_periods(&self, vault: &Address) -> Result<Vec<PeriodInput>, SourceError> {
        let periods = self
            .vaults
            .iter()
            .find(|(address, _)| address == vault)
            .map(|(_, periods)| periods)
            .ok_or_else(|| SourceError::UnknownVault(vault.clone()))?;

        periods
            .as_array()
            .ok_or_else(|| SourceError::Parse(format!("periods of {} is not an array", vault)))?
            .iter()
            .map(parse_period)
            .collect()
    }
}

fn parse_period(period_json: &Value) -> Result<PeriodInput, SourceError> {
    let ini = Snapshot::from_json(
        period_json
            .get("ini")
            .ok_or_else(|| SourceError::Parse("Missing ini snapshot".to_string()))?,
    )?;
    let end = Snapshot::from_json(
        period_json
            .get("end")
            .ok_or_else(|| SourceError::Parse("Missing end snapshot".to_string()))?,
    )?;

    let mut input = PeriodInput::new(ini, end);

    if let Some(rewards) = period_json.get("rewards").filter(|v| !v.is_null()) {
        input = input.with_rewards(RewardObservations {
            ini: parse_observations(rewards.get("ini"))?,
            end: parse_observations(rewards.get("end"))?,
        });
    }
    if period_json.get("fees_collected_within").is_some_and(|v| !v.is_null()) {
        input = input.with_fees_collected_within(get_non_negative_pair(
            period_json,
            "fees_collected_within",
        )?);
    }
    if period_json.get("rebalance_divergence").is_some_and(|v| !v.is_null()) {
        input = input.with_rebalance_divergence(get_decimal_pair(
            period_json,
            "rebalance_divergence",
        )?);
    }
    Ok(input)
}

fn parse_observations(side: Option<&Value>) -> Result<Vec<RewardObservation>, SourceError> {
    match side {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| RewardObservation::from_json(item).map_err(SourceError::from))
            .collect(),
        Some(other) => Err(SourceError::Parse(format!(
            "Expected reward observation list, got {}",
            other
        ))),
    }
}
