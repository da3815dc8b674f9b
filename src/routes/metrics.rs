use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use std::sync::Arc;

use crate::services::observer::PrometheusObserver;

/// Install the global Prometheus recorder and register metric descriptions.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    PrometheusObserver::describe();
    Ok(handle)
}

/// `GET /metrics`, mergeable into the main router.
pub fn router(handle: PrometheusHandle) -> Router {
    Router::new()
        .route("/metrics", get(prometheus_metrics))
        .with_state(Arc::new(handle))
}

/// Prometheus scrape endpoint (text exposition format).
pub async fn prometheus_metrics(State(handle): State<Arc<PrometheusHandle>>) -> impl IntoResponse {
    handle.render()
}
