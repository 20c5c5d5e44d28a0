//! Prometheus export for the `metrics` facade plus the domain counters.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

use crate::models::DocumentStatus;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the global recorder. Later calls are no-ops.
pub fn init_metrics() -> Result<(), anyhow::Error> {
    if METRICS_HANDLE.get().is_some() {
        return Ok(());
    }

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus recorder: {}", e))?;

    // A concurrent caller may have won; its handle serves the same registry.
    let _ = METRICS_HANDLE.set(handle);
    Ok(())
}

pub fn get_metrics() -> String {
    METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_else(|| "# Metrics recorder not initialized\n".to_string())
}

pub fn record_login(outcome: &'static str) {
    metrics::counter!("vault_logins_total", "outcome" => outcome).increment(1);
}

pub fn record_transition(to: DocumentStatus) {
    metrics::counter!("vault_document_transitions_total", "to" => to.as_str()).increment(1);
}

pub fn record_scoring_fallback() {
    metrics::counter!("vault_scoring_fallbacks_total").increment(1);
}
