//! Prometheus metrics endpoint and the lifecycle metric descriptions.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use domain::service::{LOCK_CONFLICTS_TOTAL, MUTATIONS_TOTAL};
use metrics_exporter_prometheus::PrometheusHandle;

/// Registers help text for the counters the lifecycle services emit.
///
/// Call once after the recorder is installed.
pub fn describe() {
    metrics::describe_counter!(
        MUTATIONS_TOTAL,
        "Successful lifecycle mutations by resource and operation"
    );
    metrics::describe_counter!(
        LOCK_CONFLICTS_TOTAL,
        "Writes rejected because the caller's version was stale"
    );
}

/// GET /metrics: Prometheus text exposition.
pub async fn get(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        handle.render(),
    )
}
