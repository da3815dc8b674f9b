use std::collections::HashSet;
use std::sync::Arc;

use crate::config::RoutingConfig;
use crate::services::{
    cache::AvailabilityCache, filter::EventFilter, observer::Observer, queue::JobQueue,
};

/// Transport checks applied to every webhook delivery.
#[derive(Debug, Clone, Default)]
pub struct WebhookSettings {
    /// Expected `X-Gitlab-Token`; `None` disables the check.
    pub secret: Option<String>,
    pub accepted_events: HashSet<String>,
}

impl WebhookSettings {
    pub fn new<I, S>(secret: Option<String>, accepted_events: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            secret: secret.filter(|s| !s.is_empty()),
            accepted_events: accepted_events
                .into_iter()
                .map(|e| {
                    let e: String = e.into();
                    e.trim().to_string()
                })
                .filter(|e| !e.is_empty())
                .collect(),
        }
    }
}

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub queue: JobQueue,
    pub filter: Arc<EventFilter>,
    pub webhook: Arc<WebhookSettings>,
    pub cache: Arc<AvailabilityCache>,
    pub routing: Arc<RoutingConfig>,
    pub observer: Arc<dyn Observer>,
}

impl AppState {
    pub fn new(
        queue: JobQueue,
        filter: EventFilter,
        webhook: WebhookSettings,
        cache: Arc<AvailabilityCache>,
        routing: Arc<RoutingConfig>,
        observer: Arc<dyn Observer>,
    ) -> Self {
        Self {
            queue,
            filter: Arc::new(filter),
            webhook: Arc::new(webhook),
            cache,
            routing,
            observer,
        }
    }
}
