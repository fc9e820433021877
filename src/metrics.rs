// src/metrics.rs
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::error::StartupError;

/// Install the process-wide Prometheus recorder. Call once, from the binary.
pub fn install() -> Result<PrometheusHandle, StartupError> {
    // Use default buckets to avoid API differences across crate versions.
    PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| StartupError::Metrics(e.to_string()))
}
