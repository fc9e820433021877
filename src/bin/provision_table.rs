// src/bin/provision_table.rs
//! One-off: create the snapshot table (partition key `source`) and wait for ACTIVE.
//! Uses the same environment variables as the worker.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use aws_sdk_dynamodb::types::{
    AttributeDefinition, KeySchemaElement, KeyType, ProvisionedThroughput, ScalarAttributeType,
    TableStatus,
};
use tracing::info;

use trend_aggregator::config::AppConfig;
use trend_aggregator::store::dynamo::build_client;
use trend_aggregator::telemetry;

const POLL_EVERY: Duration = Duration::from_secs(2);
const MAX_POLLS: u32 = 60;

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    telemetry::init();

    let cfg = AppConfig::from_env().context("loading configuration")?;
    let client = build_client(&cfg.dynamo).await;
    let table = cfg.dynamo.table.as_str();

    info!(table, region = %cfg.dynamo.region, "creating table");
    let created = client
        .create_table()
        .table_name(table)
        .key_schema(
            KeySchemaElement::builder()
                .attribute_name("source")
                .key_type(KeyType::Hash)
                .build()?,
        )
        .attribute_definitions(
            AttributeDefinition::builder()
                .attribute_name("source")
                .attribute_type(ScalarAttributeType::S)
                .build()?,
        )
        .provisioned_throughput(
            ProvisionedThroughput::builder()
                .read_capacity_units(5)
                .write_capacity_units(5)
                .build()?,
        )
        .send()
        .await;

    match created {
        Ok(out) => {
            let status = out.table_description().and_then(|d| d.table_status().cloned());
            info!(table, ?status, "create requested");
        }
        Err(e) if e.as_service_error().is_some_and(|se| se.is_resource_in_use_exception()) => {
            info!(table, "table already exists");
        }
        Err(e) => {
            return Err(e).with_context(|| format!("creating table {table}"));
        }
    }

    for _ in 0..MAX_POLLS {
        let desc = client
            .describe_table()
            .table_name(table)
            .send()
            .await
            .with_context(|| format!("describing table {table}"))?;
        let status = desc.table().and_then(|t| t.table_status().cloned());
        if status == Some(TableStatus::Active) {
            info!(table, "table is ACTIVE");
            return Ok(());
        }
        info!(table, ?status, "waiting for table");
        tokio::time::sleep(POLL_EVERY).await;
    }
    bail!("table {table} did not become ACTIVE in time")
}
