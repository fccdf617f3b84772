use std::sync::OnceLock;
use std::time::Duration;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::core::config::Settings;

static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub(crate) fn init(settings: &Settings) -> anyhow::Result<()> {
    if !settings.telemetry().prometheus_enabled || PROM_HANDLE.get().is_some() {
        return Ok(());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    let _ = PROM_HANDLE.set(handle);
    Ok(())
}

pub(crate) fn render() -> Option<String> {
    PROM_HANDLE.get().map(|handle| handle.render())
}

/// Records one backend call. `outcome` is a short label such as `ok`, `absent` or an error code.
pub(crate) fn record_store_operation(
    backend: &'static str,
    operation: &'static str,
    outcome: &'static str,
    latency: Duration,
) {
    metrics::counter!(
        "store_operations_total",
        "backend" => backend,
        "operation" => operation,
        "outcome" => outcome
    )
    .increment(1);
    metrics::histogram!(
        "store_operation_duration_seconds",
        "backend" => backend,
        "operation" => operation
    )
    .record(latency.as_secs_f64());
}

pub(crate) fn record_cache_lookup(hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    metrics::counter!("store_cache_lookups_total", "result" => result).increment(1);
}
