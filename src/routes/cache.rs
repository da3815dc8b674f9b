//! Admin API over the availability cache.
//!
//! Lets an operator inspect cached Slack statuses and correct them by hand,
//! for example to mark someone as on holiday before Slack catches up.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use garde::Validate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::app_state::AppState;
use crate::services::cache::{CacheEntry, CacheError, UserStatus};

/// Longest expiry an operator may set by hand (one year).
const MAX_EXPIRE_HOURS: u64 = 24 * 365;

#[derive(Serialize)]
pub struct CacheListing {
    pub server_time: DateTime<Utc>,
    /// Configured status -> TTL hours.
    pub user_statuses: BTreeMap<String, u64>,
    pub entries: Vec<CacheEntry>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateEntryRequest {
    #[garde(length(max = 64))]
    #[serde(default)]
    pub chat_user_id: String,

    #[garde(length(max = 256))]
    #[serde(default)]
    pub status: String,

    /// Overrides the TTL configured for `status`.
    #[garde(range(min = 1, max = MAX_EXPIRE_HOURS))]
    #[serde(default)]
    pub expire_hours: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CacheActionResponse {
    pub result: String,
    pub username: String,
}

#[derive(Debug, thiserror::Error)]
pub enum CacheAdminError {
    #[error(transparent)]
    NotFound(#[from] CacheError),

    #[error("invalid cache update: {0}")]
    Invalid(#[from] garde::Report),
}

impl IntoResponse for CacheAdminError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheAdminError::NotFound(_) => StatusCode::NOT_FOUND,
            CacheAdminError::Invalid(_) => StatusCode::UNPROCESSABLE_ENTITY,
        };
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

fn action(result: &str, username: String) -> Json<CacheActionResponse> {
    Json(CacheActionResponse {
        result: result.to_string(),
        username,
    })
}

/// GET /api/v1/cache
pub async fn list_entries(State(state): State<AppState>) -> Json<CacheListing> {
    state.observer.cache_admin();
    Json(CacheListing {
        server_time: Utc::now(),
        user_statuses: state
            .routing
            .user_statuses()
            .iter()
            .map(|(status, ttl)| (status.clone(), *ttl))
            .collect(),
        entries: state.cache.list_all(),
    })
}

/// PUT /api/v1/cache/{username}
pub async fn update_entry(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Json(request): Json<UpdateEntryRequest>,
) -> Result<Json<CacheActionResponse>, CacheAdminError> {
    state.observer.cache_admin();
    request.validate()?;

    let status = request.status.trim().to_lowercase();
    let ttl = request
        .expire_hours
        .unwrap_or_else(|| state.routing.status_ttl(&status));

    tracing::info!(username = %username, status = %status, ttl_hours = ttl, "cache admin: updating entry");
    state.cache.update_for(
        &username,
        UserStatus {
            chat_user_id: request.chat_user_id,
            status,
        },
        ttl,
    );
    Ok(action("updated", username))
}

/// POST /api/v1/cache/{username}/clear
pub async fn clear_entry(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<CacheActionResponse>, CacheAdminError> {
    state.observer.cache_admin();
    tracing::info!(username = %username, "cache admin: clearing entry");
    state.cache.clear(&username)?;
    Ok(action("cleared", username))
}

/// DELETE /api/v1/cache/{username}
pub async fn delete_entry(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<CacheActionResponse>, CacheAdminError> {
    state.observer.cache_admin();
    tracing::info!(username = %username, "cache admin: deleting entry");
    state.cache.delete(&username)?;
    Ok(action("deleted", username))
}
