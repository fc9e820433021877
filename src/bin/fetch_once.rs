// src/bin/fetch_once.rs
//! Run a single cycle against the live sources without touching the store and
//! print the result as JSON. Handy when a source starts failing.

use anyhow::{Context, Result};

use trend_aggregator::config::AppConfig;
use trend_aggregator::ingest::providers::default_fetchers;
use trend_aggregator::ingest::{http, Aggregator};
use trend_aggregator::telemetry;

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    telemetry::init();

    let cfg = AppConfig::from_env().context("loading configuration")?;
    let client = http::build_client(cfg.http_timeout).context("building http client")?;
    let aggregator = Aggregator::new(default_fetchers(&client, &cfg.providers), cfg.fetch_deadline);

    let cycle = aggregator.run_cycle().await;
    println!("{}", serde_json::to_string_pretty(&cycle)?);
    Ok(())
}
