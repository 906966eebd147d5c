//! End-to-end batch runs from a JSON input file.

use hypervisor_yield::domain::{Address, Decimal};
use hypervisor_yield::orchestration::BatchReport;
use hypervisor_yield::{EngineConfig, JsonFileSource, Runner};
use serde_json::{json, Value};
use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;

const GOOD_VAULT: &str = "0x1111111111111111111111111111111111111111";
const DRIFTING_VAULT: &str = "0x2222222222222222222222222222222222222222";
const REWARD_TOKEN: &str = "0x4200000000000000000000000000000000000042";

fn snapshot(vault: &str, ts: i64, qty0: &str, fees0: &str, supply: &str) -> Value {
    json!({
        "address": vault,
        "block": ts / 10,
        "timestamp": ts,
        "prices": {"token0": "1", "token1": "1"},
        "underlying": {
            "qty": {"token0": qty0, "token1": "10"},
            "fees_uncollected": {"token0": fees0, "token1": "0"},
            "protocol_fee_share": "0"
        },
        "supply": supply
    })
}

fn reward(ts: i64) -> Value {
    json!({
        "timestamp": ts,
        "block": ts / 10,
        "rewarder_address": "0x3333333333333333333333333333333333333333",
        "reward_token": REWARD_TOKEN,
        "reward_token_symbol": "OP",
        "reward_token_decimals": 18,
        "rewards_per_second": "100000000000000000",
        "total_staked": "100",
        "hypervisor_share_price_usd": "0.2"
    })
}

fn batch() -> Value {
    json!({
        "vaults": [
            {
                "address": GOOD_VAULT,
                "periods": [
                    {
                        "ini": snapshot(GOOD_VAULT, 1000, "10", "0", "100"),
                        "end": snapshot(GOOD_VAULT, 1100, "10.2", "0.2", "100"),
                        "rewards": {"ini": [reward(1000)], "end": [reward(1100)]}
                    },
                    {
                        "ini": snapshot(GOOD_VAULT, 1200, "10.2", "0.2", "100"),
                        "end": snapshot(GOOD_VAULT, 1300, "10.604", "0.604", "100")
                    }
                ]
            },
            {
                "address": DRIFTING_VAULT,
                "periods": [{
                    "ini": snapshot(DRIFTING_VAULT, 1000, "10", "0", "100"),
                    "end": snapshot(DRIFTING_VAULT, 1100, "10", "0", "105")
                }]
            }
        ],
        "prices": [{"token": REWARD_TOKEN, "block": 100, "usd": "2"}]
    })
}

fn write_batch(document: &Value) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{}", document).unwrap();
    file
}

async fn runner_for(file: &NamedTempFile) -> Runner {
    let source = JsonFileSource::open(file.path()).await.unwrap();
    let prices = Arc::new(source.price_lookup());
    Runner::new(Arc::new(source), prices, EngineConfig::default())
}

#[tokio::test]
async fn test_batch_isolates_failing_vault() {
    let file = write_batch(&batch());
    let runner = runner_for(&file).await;

    let vaults = runner.resolve_vaults(&[]).await.unwrap();
    assert_eq!(vaults.len(), 2);

    let report = BatchReport::from_outcomes(runner.run_all(&vaults).await);
    assert_eq!(report.results.len(), 1);
    assert_eq!(report.failures.len(), 1);

    let result = &report.results[0];
    assert_eq!(result.address, Address::from(GOOD_VAULT));
    assert_eq!(result.periods, 2);
    assert_eq!(result.fees.period_yield, Decimal::from_str_canonical("0.0302").unwrap());
    // 10 OP emitted in the first period, priced from the batch price list
    assert_eq!(result.rewards.usd, Decimal::from_i64(20));
    assert_eq!(result.rewards_detail.len(), 1);
    assert_eq!(result.rewards_detail[0].symbol, "OP");

    let failure = &report.failures[0];
    assert_eq!(failure.address, Address::from(DRIFTING_VAULT));
    assert!(failure.error.contains("SUPPLY_DIFFERENCE"));
    assert_eq!(failure.rescrape_ini_block, Some(100));
    assert_eq!(failure.rescrape_end_block, Some(110));
}

#[tokio::test]
async fn test_requested_vault_subset() {
    let file = write_batch(&batch());
    let runner = runner_for(&file).await;

    let vaults = runner
        .resolve_vaults(&[Address::from(GOOD_VAULT)])
        .await
        .unwrap();
    let outcomes = runner.run_all(&vaults).await;

    assert_eq!(outcomes.len(), 1);
    assert!(outcomes[0].result.is_ok());
}

#[tokio::test]
async fn test_report_serializes_as_json_numbers() {
    let file = write_batch(&batch());
    let runner = runner_for(&file).await;
    let result = runner.run_vault(&Address::from(GOOD_VAULT)).await.unwrap();

    let json = serde_json::to_value(&result).unwrap();
    assert!(json["fees"]["usd"].is_number());
    assert_eq!(json["graph"].as_array().map(|rows| rows.len()), Some(2));
    assert_eq!(json["address"], json!(GOOD_VAULT));
}
