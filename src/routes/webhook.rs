//! GitLab webhook ingress.
//!
//! Validates the delivery, runs the event filter and hands admitted merge
//! requests to the job queue. Reviewer assignment itself happens later in a
//! worker, so a 202 only means the event was accepted.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use garde::Validate;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::app_state::{AppState, WebhookSettings};
use crate::models::event::MergeRequestEvent;
use crate::models::job::{group_of, MergeRequestJob};
use crate::services::filter::FilterDecision;
use crate::services::queue::QueueError;

const HEADER_TOKEN: &str = "x-gitlab-token";
const HEADER_EVENT: &str = "x-gitlab-event";

pub const QUEUED_MESSAGE: &str = "successfully added merge request to processing queue.";

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("invalid http method")]
    InvalidMethod,

    #[error("token validation failed")]
    TokenMismatch,

    #[error("missing X-Gitlab-Event Header")]
    MissingEventHeader,

    #[error("event not defined to be parsed")]
    EventNotAccepted,

    #[error("error reading request body")]
    EmptyBody,

    #[error("invalid JSON body: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("invalid merge request event: {0}")]
    InvalidEvent(#[from] garde::Report),

    #[error("could not queue merge request: {0}")]
    Queue(#[from] QueueError),
}

impl WebhookError {
    fn reason(&self) -> &'static str {
        match self {
            WebhookError::InvalidMethod => "invalid_method",
            WebhookError::TokenMismatch => "token_mismatch",
            WebhookError::MissingEventHeader => "missing_event_header",
            WebhookError::EventNotAccepted => "event_not_accepted",
            WebhookError::EmptyBody => "empty_body",
            WebhookError::InvalidJson(_) => "invalid_json",
            WebhookError::InvalidEvent(_) => "invalid_event",
            WebhookError::Queue(QueueError::Full) => "queue_full",
            WebhookError::Queue(QueueError::Closed) => "queue_closed",
        }
    }
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        match &self {
            WebhookError::Queue(_) => (StatusCode::SERVICE_UNAVAILABLE, self.to_string()).into_response(),
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("could not parse the webhook event: {}", self),
            )
                .into_response(),
        }
    }
}

/// Handler for every method on `/webhook`; anything but POST is rejected here.
///
/// - 202 Accepted: event queued, or deliberately ignored (body says which)
/// - 500: delivery failed validation
/// - 503: job queue full (shed policy) or shut down
pub async fn webhook_handler(
    State(state): State<AppState>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, &'static str), WebhookError> {
    let event = match parse_event(&state.webhook, &method, &headers, &body) {
        Ok(event) => event,
        Err(e) => {
            warn!(error = %e, "rejected webhook delivery");
            state.observer.webhook_rejected(e.reason());
            return Err(e);
        }
    };

    let group = group_of(&event.project.path_with_namespace);
    state.observer.event_received(group);
    debug!(
        project_id = event.project.id,
        merge_request_iid = event.object_attributes.iid,
        group = %group,
        action = ?event.object_attributes.action,
        "received merge request event"
    );

    if let FilterDecision::Ignore(reason) = state.filter.evaluate(&event) {
        return Ok((StatusCode::ACCEPTED, reason.message()));
    }

    let job = MergeRequestJob::from_event(&event);
    let job_id = job.id;
    if let Err(e) = state.queue.enqueue(job).await {
        warn!(job_id = %job_id, error = %e, "failed to queue merge request");
        state.observer.webhook_rejected(WebhookError::Queue(e).reason());
        return Err(e.into());
    }
    state.observer.queue_depth(state.queue.depth());

    info!(
        job_id = %job_id,
        project_id = event.project.id,
        merge_request_iid = event.object_attributes.iid,
        group = %group,
        "queued merge request"
    );
    Ok((StatusCode::ACCEPTED, QUEUED_MESSAGE))
}

/// Transport checks followed by payload parsing, in delivery order.
pub fn parse_event(
    settings: &WebhookSettings,
    method: &Method,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<MergeRequestEvent, WebhookError> {
    if *method != Method::POST {
        return Err(WebhookError::InvalidMethod);
    }

    if let Some(secret) = &settings.secret {
        if header(headers, HEADER_TOKEN) != Some(secret.as_str()) {
            return Err(WebhookError::TokenMismatch);
        }
    }

    let event_type = header(headers, HEADER_EVENT)
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .ok_or(WebhookError::MissingEventHeader)?;
    if !settings.accepted_events.contains(event_type) {
        return Err(WebhookError::EventNotAccepted);
    }

    if body.is_empty() {
        return Err(WebhookError::EmptyBody);
    }

    let event: MergeRequestEvent = serde_json::from_slice(body)?;
    event.validate()?;
    Ok(event)
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}
