//! Metrics collection and exposition.
//!
//! # Metrics
//! - `node_http_requests_total` (counter): requests by service, method, status
//! - `node_http_request_duration_seconds` (histogram): latency by service
//! - `node_services_active` (gauge): running services by kind
//!
//! # Design Decisions
//! - One Prometheus recorder per process, installed lazily on first use
//! - Exposition is served by the control API, not a separate listener

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Instant;

static RECORDER: OnceLock<Option<PrometheusHandle>> = OnceLock::new();

/// Install the Prometheus recorder if no recorder is set yet, and return its
/// handle. `None` means some other recorder owns the process.
pub fn prometheus_handle() -> Option<PrometheusHandle> {
    RECORDER
        .get_or_init(|| match PrometheusBuilder::new().install_recorder() {
            Ok(handle) => {
                tracing::debug!("Prometheus recorder installed");
                Some(handle)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install Prometheus recorder");
                None
            }
        })
        .clone()
}

/// Record a completed HTTP request.
pub fn record_request(service: &'static str, method: &str, status: u16, start: Instant) {
    ::metrics::counter!(
        "node_http_requests_total",
        "service" => service,
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    ::metrics::histogram!("node_http_request_duration_seconds", "service" => service)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_service_started(service: &'static str) {
    ::metrics::gauge!("node_services_active", "service" => service).increment(1.0);
}

pub fn record_service_stopped(service: &'static str) {
    ::metrics::gauge!("node_services_active", "service" => service).decrement(1.0);
}

/// Middleware counting and timing every request that reaches it.
pub async fn track_metrics(
    State(service): State<&'static str>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let response = next.run(request).await;
    record_request(service, method.as_str(), response.status().as_u16(), start);
    response
}

/// Prometheus text exposition.
pub async fn render_metrics() -> Response {
    match prometheus_handle() {
        Some(handle) => handle.render().into_response(),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            "metrics recorder unavailable",
        )
            .into_response(),
    }
}
