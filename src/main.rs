use anyhow::Context;
use hypervisor_yield::{BatchReport, Config, JsonFileSource, Runner};
use std::sync::Arc;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    match run(config).await {
        Ok(report) if report.results.is_empty() && !report.failures.is_empty() => {
            eprintln!("All {} vaults failed", report.failures.len());
            std::process::exit(2);
        }
        Ok(_) => {}
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

async fn run(config: Config) -> anyhow::Result<BatchReport> {
    let source = JsonFileSource::open(&config.input_path)
        .await
        .with_context(|| format!("Failed to load {}", config.input_path))?;
    let prices = Arc::new(source.price_lookup());
    let runner = Runner::new(Arc::new(source), prices, config.engine());

    let vaults = runner.resolve_vaults(&config.vaults).await?;
    tracing::info!(vaults = vaults.len(), "Aggregating vaults");

    let report = BatchReport::from_outcomes(runner.run_all(&vaults).await);
    let json = serde_json::to_string_pretty(&report).context("Failed to serialize report")?;

    match &config.output_path {
        Some(path) => tokio::fs::write(path, json)
            .await
            .with_context(|| format!("Failed to write {}", path))?,
        None => println!("{}", json),
    }

    tracing::info!(
        succeeded = report.results.len(),
        failed = report.failures.len(),
        "Batch finished"
    );
    Ok(report)
}
