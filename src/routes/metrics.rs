//! Prometheus metrics endpoint
//!
//! Exposes bridge metrics in Prometheus format for monitoring.

use axum::response::IntoResponse;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::Lazy;

/// Global Prometheus handle for metrics export
static PROMETHEUS_HANDLE: Lazy<PrometheusHandle> = Lazy::new(|| {
    PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus recorder")
});

/// Initialize metrics (call once at startup)
pub fn init_metrics() {
    let _ = &*PROMETHEUS_HANDLE;
    register_metrics();
}

fn register_metrics() {
    metrics::describe_counter!(
        "emohaa_bridge_requests_total",
        "Chat completion requests by mode and status"
    );
    metrics::describe_counter!(
        "emohaa_bridge_turn_attempts_total",
        "Upstream turn attempts, including retries"
    );
    metrics::describe_counter!(
        "emohaa_bridge_turn_retries_total",
        "Turn attempts that failed and were retried"
    );
    metrics::describe_counter!(
        "emohaa_bridge_session_teardowns_total",
        "Upstream session deletions by result"
    );
    metrics::describe_histogram!(
        "emohaa_bridge_request_duration_seconds",
        "Time until the response (or first stream frame) was ready"
    );
}

/// Prometheus metrics endpoint handler
pub async fn prometheus_metrics() -> impl IntoResponse {
    PROMETHEUS_HANDLE.render()
}

/// Record a finished chat completion request
pub fn record_request(mode: &str, status: &str, duration_secs: f64) {
    metrics::counter!(
        "emohaa_bridge_requests_total",
        "mode" => mode.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("emohaa_bridge_request_duration_seconds", "mode" => mode.to_string())
        .record(duration_secs);
}

/// Record one upstream turn attempt
pub fn record_attempt(mode: &str) {
    metrics::counter!("emohaa_bridge_turn_attempts_total", "mode" => mode.to_string())
        .increment(1);
}

/// Record a retry after a failed attempt
pub fn record_retry() {
    metrics::counter!("emohaa_bridge_turn_retries_total").increment(1);
}

/// Record a session teardown (`ok`, `error` or `skipped`)
pub fn record_session_teardown(result: &str) {
    metrics::counter!(
        "emohaa_bridge_session_teardowns_total",
        "result" => result.to_string()
    )
    .increment(1);
}
