use std::sync::Arc;
use strum::Display;
use tracing::debug;

use crate::models::event::MergeRequestEvent;
use crate::models::job::group_of;
use crate::services::observer::Observer;

/// GitLab merge status of a merge request with conflicts.
const CANNOT_BE_MERGED: &str = "cannot_be_merged";

/// Why an admitted event is not queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum IgnoreReason {
    SelfTriggered,
    ApprovedOrMerged,
    CannotBeMerged,
}

impl IgnoreReason {
    pub fn message(&self) -> &'static str {
        match self {
            IgnoreReason::SelfTriggered => "ignoring request initiated through this service.",
            IgnoreReason::ApprovedOrMerged => "ignoring approved/merge action.",
            IgnoreReason::CannotBeMerged => "ignoring as merge request cannot be merged.",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterDecision {
    Queue,
    Ignore(IgnoreReason),
}

/// Decides whether a merge request event is worth a job.
pub struct EventFilter {
    bot_user_id: u64,
    observer: Arc<dyn Observer>,
}

impl EventFilter {
    pub fn new(bot_user_id: u64, observer: Arc<dyn Observer>) -> Self {
        Self {
            bot_user_id,
            observer,
        }
    }

    pub fn evaluate(&self, event: &MergeRequestEvent) -> FilterDecision {
        let group = group_of(&event.project.path_with_namespace);
        let attrs = &event.object_attributes;

        // Our own reviewer updates fire the webhook again.
        if event.user.id == self.bot_user_id {
            self.observer.self_triggered(group);
            debug!(
                group = %group,
                bot_username = %event.user.username,
                bot_id = event.user.id,
                "ignoring request initiated through this service"
            );
            return FilterDecision::Ignore(IgnoreReason::SelfTriggered);
        }

        if let Some(action) = attrs.action.as_deref() {
            let action = action.to_lowercase();
            if action.contains("approved") || action.contains("merge") {
                self.observer.ignored(&action, group);
                debug!(group = %group, action = %action, "ignoring approved/merge action");
                return FilterDecision::Ignore(IgnoreReason::ApprovedOrMerged);
            }
        }

        if attrs.merge_status.as_deref() == Some(CANNOT_BE_MERGED) {
            self.observer.ignored("mr_cannot_merge", group);
            debug!(group = %group, "ignoring as merge request cannot be merged");
            return FilterDecision::Ignore(IgnoreReason::CannotBeMerged);
        }

        // Drafts still go to a worker: the event carries no reviewer list, so
        // only the worker can tell whether a reviewer must be removed.
        if event.is_work_in_progress() {
            self.observer.ignored("mr_is_wip", group);
            debug!(group = %group, "merge request is a draft, queueing for reviewer removal");
        }

        FilterDecision::Queue
    }
}
