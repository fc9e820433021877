//! Trending worker entrypoint.
//! Loads configuration, starts the liveness listener, then runs the fetch/persist
//! scheduler until SIGINT/SIGTERM.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing::{info, warn};

use trend_aggregator::api::{self, AppState};
use trend_aggregator::config::{AppConfig, StoreBackend};
use trend_aggregator::ingest::providers::default_fetchers;
use trend_aggregator::ingest::{http, Aggregator};
use trend_aggregator::store::{DynamoStore, MemoryStore, SnapshotStore};
use trend_aggregator::{metrics, telemetry, Scheduler, StartupError};

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = terminate.recv() => {},
                }
            }
            Err(e) => {
                warn!(error = %e, "SIGTERM handler unavailable, waiting for Ctrl+C only");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    telemetry::init();

    // Anything failing up to the first tick is a startup error: exit non-zero.
    let cfg = AppConfig::from_env().context("loading configuration")?;
    let prometheus = metrics::install()?;
    let client = http::build_client(cfg.http_timeout).map_err(StartupError::from)?;

    let store: Arc<dyn SnapshotStore> = match cfg.backend {
        StoreBackend::Dynamo => Arc::new(DynamoStore::connect(&cfg.dynamo).await),
        StoreBackend::Memory => {
            warn!("STORE_BACKEND=memory: snapshots are not persisted beyond this process");
            Arc::new(MemoryStore::new())
        }
    };

    let listener = api::bind(cfg.health_port).await?;

    let fetchers = default_fetchers(&client, &cfg.providers);
    let scheduler = Scheduler::new(
        Aggregator::new(fetchers, cfg.fetch_deadline),
        store,
        cfg.cycle_interval,
    )
    .with_write_deadline(cfg.dynamo.timeout * 2);

    let (stop_tx, stop_rx) = watch::channel(false);
    let state = AppState::new(scheduler.status(), Some(prometheus));
    let server = tokio::spawn(api::serve(listener, state, stop_rx.clone()));
    let worker = scheduler.spawn(stop_rx);

    info!(
        port = cfg.health_port,
        backend = ?cfg.backend,
        table = %cfg.dynamo.table,
        "trending worker started"
    );

    shutdown_signal().await;
    info!("shutdown requested; letting the current cycle finish");
    let _ = stop_tx.send(true);

    worker.await.context("scheduler task panicked")?;
    server
        .await
        .context("liveness task panicked")?
        .context("liveness listener failed")?;
    Ok(())
}
