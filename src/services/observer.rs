//! Observability hooks.
//!
//! Components receive an `Arc<dyn Observer>` at construction instead of
//! touching process-wide counters. `PrometheusObserver` forwards to the
//! `metrics` facade; tests plug in their own recorder or `NoopObserver`.

use crate::services::cache::CacheOutcome;

/// Events worth counting. Every method defaults to a no-op.
pub trait Observer: Send + Sync {
    /// A merge request event passed admission checks and was parsed.
    fn event_received(&self, _group: &str) {}

    /// A webhook delivery failed transport validation.
    fn webhook_rejected(&self, _reason: &'static str) {}

    /// An event triggered by the bot's own write-back.
    fn self_triggered(&self, _group: &str) {}

    /// An event or job ended without action for `reason`.
    fn ignored(&self, _reason: &str, _group: &str) {}

    fn job_started(&self, _group: &str) {}

    fn reviewer_removed(&self, _group: &str) {}

    fn status_unavailable(&self, _status: &str, _group: &str) {}

    /// Slack returned fewer users than requested.
    fn chat_users_missing(&self, _group: &str) {}

    fn tracker_request(&self, _request: &'static str, _method: &'static str, _group: &str) {}

    fn chat_request(&self, _request: &'static str) {}

    fn chat_error(&self, _request: &'static str) {}

    fn notification_sent(&self, _group: &str, _channel: &str) {}

    fn notification_failed(&self, _reason: &'static str, _group: &str, _channel: &str) {}

    fn cache_read(&self, _outcome: CacheOutcome) {}

    fn cache_updated(&self) {}

    fn cache_deleted(&self) {}

    fn cache_cleared(&self) {}

    fn cache_admin(&self) {}

    /// Something that should not happen given the pipeline's invariants.
    fn anomaly(&self, _kind: &'static str) {}

    fn workers_started(&self, _count: usize) {}

    fn worker_busy(&self, _busy: bool) {}

    fn queue_depth(&self, _depth: usize) {}
}

/// Observer that records nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl Observer for NoopObserver {}

/// Observer backed by the `metrics` facade (scraped via Prometheus).
#[derive(Debug, Default, Clone, Copy)]
pub struct PrometheusObserver;

impl PrometheusObserver {
    /// Register metric descriptions with the installed recorder.
    pub fn describe() {
        metrics::describe_counter!("mr_reviewer_events_total", "Merge request events admitted");
        metrics::describe_counter!(
            "mr_reviewer_webhook_rejected_total",
            "Webhook deliveries rejected during validation"
        );
        metrics::describe_counter!(
            "mr_reviewer_recursive_calls_total",
            "Events caused by this service updating a merge request"
        );
        metrics::describe_counter!(
            "mr_reviewer_ignored_total",
            "Events or jobs that ended without assigning a reviewer"
        );
        metrics::describe_counter!(
            "mr_reviewer_processed_total",
            "Merge requests picked up by a worker"
        );
        metrics::describe_counter!(
            "mr_reviewer_reviewer_removed_total",
            "Reviewers removed because the merge request became a draft"
        );
        metrics::describe_counter!(
            "mr_reviewer_status_unavailable_total",
            "Suggested approvers skipped because of their Slack status"
        );
        metrics::describe_counter!(
            "mr_reviewer_chat_users_missing_total",
            "Slack lookups that returned fewer users than requested"
        );
        metrics::describe_counter!("mr_reviewer_gitlab_requests_total", "GitLab API requests");
        metrics::describe_counter!("mr_reviewer_slack_requests_total", "Slack API requests");
        metrics::describe_counter!("mr_reviewer_slack_errors_total", "Slack API request errors");
        metrics::describe_counter!("mr_reviewer_slack_messages_total", "Slack messages sent");
        metrics::describe_counter!(
            "mr_reviewer_slack_message_errors_total",
            "Slack messages that could not be sent"
        );
        metrics::describe_counter!(
            "mr_reviewer_cache_reads_total",
            "Availability cache reads by outcome"
        );
        metrics::describe_counter!("mr_reviewer_cache_updates_total", "Availability cache writes");
        metrics::describe_counter!("mr_reviewer_cache_deletes_total", "Availability cache deletes");
        metrics::describe_counter!("mr_reviewer_cache_clears_total", "Availability cache clears");
        metrics::describe_counter!("mr_reviewer_cache_admin_total", "Cache admin API requests");
        metrics::describe_counter!("mr_reviewer_errors_total", "Unexpected conditions");
        metrics::describe_gauge!("mr_reviewer_workers", "Workers created");
        metrics::describe_gauge!("mr_reviewer_workers_working", "Workers currently processing a job");
        metrics::describe_gauge!("mr_reviewer_queue_depth", "Jobs waiting in the queue");
    }
}

impl Observer for PrometheusObserver {
    fn event_received(&self, group: &str) {
        metrics::counter!("mr_reviewer_events_total", "type" => "merge_event", "group" => group.to_owned())
            .increment(1);
    }

    fn webhook_rejected(&self, reason: &'static str) {
        metrics::counter!("mr_reviewer_webhook_rejected_total", "reason" => reason).increment(1);
    }

    fn self_triggered(&self, group: &str) {
        metrics::counter!("mr_reviewer_recursive_calls_total", "group" => group.to_owned())
            .increment(1);
    }

    fn ignored(&self, reason: &str, group: &str) {
        metrics::counter!(
            "mr_reviewer_ignored_total",
            "reason" => reason.to_owned(),
            "group" => group.to_owned()
        )
        .increment(1);
    }

    fn job_started(&self, group: &str) {
        metrics::counter!("mr_reviewer_processed_total", "group" => group.to_owned()).increment(1);
    }

    fn reviewer_removed(&self, group: &str) {
        metrics::counter!("mr_reviewer_reviewer_removed_total", "group" => group.to_owned())
            .increment(1);
    }

    fn status_unavailable(&self, status: &str, group: &str) {
        metrics::counter!(
            "mr_reviewer_status_unavailable_total",
            "reason" => status.to_owned(),
            "group" => group.to_owned()
        )
        .increment(1);
    }

    fn chat_users_missing(&self, group: &str) {
        metrics::counter!("mr_reviewer_chat_users_missing_total", "group" => group.to_owned())
            .increment(1);
    }

    fn tracker_request(&self, request: &'static str, method: &'static str, group: &str) {
        metrics::counter!(
            "mr_reviewer_gitlab_requests_total",
            "request" => request,
            "method" => method,
            "group" => group.to_owned()
        )
        .increment(1);
    }

    fn chat_request(&self, request: &'static str) {
        metrics::counter!("mr_reviewer_slack_requests_total", "request" => request).increment(1);
    }

    fn chat_error(&self, request: &'static str) {
        metrics::counter!("mr_reviewer_slack_errors_total", "request" => request).increment(1);
    }

    fn notification_sent(&self, group: &str, channel: &str) {
        metrics::counter!(
            "mr_reviewer_slack_messages_total",
            "group" => group.to_owned(),
            "channel" => channel.to_owned()
        )
        .increment(1);
    }

    fn notification_failed(&self, reason: &'static str, group: &str, channel: &str) {
        metrics::counter!(
            "mr_reviewer_slack_message_errors_total",
            "error" => reason,
            "group" => group.to_owned(),
            "channel" => channel.to_owned()
        )
        .increment(1);
    }

    fn cache_read(&self, outcome: CacheOutcome) {
        let (response, reason) = match outcome {
            CacheOutcome::Hit => ("hit", ""),
            CacheOutcome::NotFound => ("miss", "username_not_found"),
            CacheOutcome::Expired => ("miss", "expired"),
        };
        metrics::counter!(
            "mr_reviewer_cache_reads_total",
            "response" => response,
            "reason" => reason
        )
        .increment(1);
    }

    fn cache_updated(&self) {
        metrics::counter!("mr_reviewer_cache_updates_total").increment(1);
    }

    fn cache_deleted(&self) {
        metrics::counter!("mr_reviewer_cache_deletes_total").increment(1);
    }

    fn cache_cleared(&self) {
        metrics::counter!("mr_reviewer_cache_clears_total").increment(1);
    }

    fn cache_admin(&self) {
        metrics::counter!("mr_reviewer_cache_admin_total").increment(1);
    }

    fn anomaly(&self, kind: &'static str) {
        metrics::counter!("mr_reviewer_errors_total", "error" => kind).increment(1);
    }

    fn workers_started(&self, count: usize) {
        metrics::gauge!("mr_reviewer_workers").set(count as f64);
    }

    fn worker_busy(&self, busy: bool) {
        let gauge = metrics::gauge!("mr_reviewer_workers_working");
        if busy {
            gauge.increment(1.0);
        } else {
            gauge.decrement(1.0);
        }
    }

    fn queue_depth(&self, depth: usize) {
        metrics::gauge!("mr_reviewer_queue_depth").set(depth as f64);
    }
}
