use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::app_state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub checks: HealthChecks,
}

#[derive(Serialize)]
pub struct HealthChecks {
    pub queue: QueueHealth,
    pub cache: CacheHealth,
}

#[derive(Serialize)]
pub struct QueueHealth {
    pub status: String,
    pub depth: usize,
    pub capacity: usize,
}

#[derive(Serialize)]
pub struct CacheHealth {
    pub entries: usize,
}

/// GET /health: queue and cache status.
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let queue_open = !state.queue.is_closed();
    let status_code = if queue_open {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = HealthResponse {
        status: if queue_open { "ok" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        checks: HealthChecks {
            queue: QueueHealth {
                status: if queue_open { "ok" } else { "closed" }.to_string(),
                depth: state.queue.depth(),
                capacity: state.queue.capacity(),
            },
            cache: CacheHealth {
                entries: state.cache.len(),
            },
        },
    };

    (status_code, Json(response))
}
