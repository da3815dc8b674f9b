//! Reviewer assignment for a single merge request job.
//!
//! Flow per job:
//! 1. fetch the merge request; drafts lose their reviewer, assigned ones are left alone
//! 2. fetch suggested approvers and the required approval count
//! 3. resolve the Slack channel for the project path
//! 4. make sure every approver has a Slack id in the cache (bulk refresh from the channel)
//! 5. drop approvers whose Slack status marks them unavailable
//! 6. pick reviewers at random, write them back, and notify the channel

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::config::RoutingConfig;
use crate::models::job::MergeRequestJob;
use crate::models::review::{Notification, TrackerUser};
use crate::services::cache::{AvailabilityCache, CacheLookup, UserStatus};
use crate::services::gitlab::{IssueTracker, TrackerError};
use crate::services::observer::Observer;
use crate::services::selector::ReviewerSelector;
use crate::services::slack::{ChatClient, ChatError};

const NOTIFICATION_COLOR: &str = "#1f81d1";
const NOTIFICATION_FOOTER: &str = "Selections based on CODEOWNERS file";

/// Tunables of the assignment workflow.
#[derive(Debug, Clone)]
pub struct AssignmentSettings {
    pub notifications_enabled: bool,
    /// Lower-cased statuses that exclude a suggested approver.
    pub unavailable_statuses: HashSet<String>,
}

impl AssignmentSettings {
    pub fn new<I, S>(notifications_enabled: bool, unavailable_statuses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            notifications_enabled,
            unavailable_statuses: unavailable_statuses
                .into_iter()
                .map(|s| s.as_ref().trim().to_lowercase())
                .collect(),
        }
    }

    fn is_unavailable(&self, status: &str) -> bool {
        self.unavailable_statuses.contains(status)
    }
}

/// Successful end states of a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssignmentOutcome {
    /// Draft merge request had a reviewer, which was removed.
    DraftReviewerRemoved,
    /// Draft merge request without reviewer.
    DraftNoAction,
    AlreadyAssigned,
    Assigned { reviewers: Vec<String> },
}

impl AssignmentOutcome {
    pub fn message(&self) -> &'static str {
        match self {
            AssignmentOutcome::DraftReviewerRemoved => "mr set to wip, un-assigned reviewer.",
            AssignmentOutcome::DraftNoAction => "mr set to wip, no action required.",
            AssignmentOutcome::AlreadyAssigned => "reviewer already assigned.",
            AssignmentOutcome::Assigned { .. } => "successfully processed merge request.",
        }
    }
}

impl fmt::Display for AssignmentOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AssignError {
    #[error("failed to get mr: {0}")]
    GetMergeRequest(#[source] TrackerError),

    #[error("failed to get approvers: {0}")]
    GetApprovers(#[source] TrackerError),

    #[error("failed to assign reviewer on project: {0}")]
    AssignReviewers(#[source] TrackerError),

    #[error("failed to unassign reviewer on project: {0}")]
    UnassignReviewers(#[source] TrackerError),

    #[error("no suggested approvers.")]
    NoSuggestedApprovers,

    #[error("approvals required is zero, will not assign reviewer.")]
    ApprovalsRequiredZero,

    #[error("no slack channel configured.")]
    NoChannel,

    #[error("slack: failed to get users in channel: {0}")]
    ChannelMembers(#[source] ChatError),

    #[error("slack: failed to get user details: {0}")]
    UserDetails(#[source] ChatError),

    #[error("no approvers available after slack status checks.")]
    NoApproversAvailable,

    #[error("failed to send slack message: {0}")]
    Notify(#[source] ChatError),
}

/// Runs the assignment workflow. Shared by all workers.
pub struct ReviewerAssigner {
    tracker: Arc<dyn IssueTracker>,
    chat: Arc<dyn ChatClient>,
    cache: Arc<AvailabilityCache>,
    routing: Arc<RoutingConfig>,
    selector: ReviewerSelector,
    settings: AssignmentSettings,
    observer: Arc<dyn Observer>,
}

impl ReviewerAssigner {
    pub fn new(
        tracker: Arc<dyn IssueTracker>,
        chat: Arc<dyn ChatClient>,
        cache: Arc<AvailabilityCache>,
        routing: Arc<RoutingConfig>,
        selector: ReviewerSelector,
        settings: AssignmentSettings,
        observer: Arc<dyn Observer>,
    ) -> Self {
        Self {
            tracker,
            chat,
            cache,
            routing,
            selector,
            settings,
            observer,
        }
    }

    pub async fn process(&self, job: &MergeRequestJob) -> Result<AssignmentOutcome, AssignError> {
        let group = job.group.as_str();
        self.observer.job_started(group);

        self.observer.tracker_request("merge_requests", "get", group);
        let merge_request = self
            .tracker
            .get_merge_request(job.project_id, job.merge_request_iid)
            .await
            .map_err(AssignError::GetMergeRequest)?;

        if job.work_in_progress {
            if merge_request.reviewers.is_empty() {
                return Ok(AssignmentOutcome::DraftNoAction);
            }
            self.observer.tracker_request("merge_requests", "put", group);
            self.tracker
                .set_reviewers(job.project_id, job.merge_request_iid, &[])
                .await
                .map_err(AssignError::UnassignReviewers)?;
            self.observer.reviewer_removed(group);
            return Ok(AssignmentOutcome::DraftReviewerRemoved);
        }

        if !merge_request.reviewers.is_empty() {
            self.observer.ignored("reviewer_already_assigned", group);
            return Ok(AssignmentOutcome::AlreadyAssigned);
        }

        self.observer.tracker_request("approvals", "get", group);
        let approvals = self
            .tracker
            .get_approval_config(job.project_id, job.merge_request_iid)
            .await
            .map_err(AssignError::GetApprovers)?;

        if approvals.suggested_approvers.is_empty() {
            self.observer.ignored("no_suggested_approvers", group);
            return Err(AssignError::NoSuggestedApprovers);
        }
        if approvals.approvals_required == 0 {
            self.observer.ignored("approvals_required_zero", group);
            return Err(AssignError::ApprovalsRequiredZero);
        }

        let Some(channel) = self.routing.channel_for(&job.path_with_namespace) else {
            self.observer
                .notification_failed("no_slack_channel_configured", group, "");
            return Err(AssignError::NoChannel);
        };

        // A user without a Slack id cannot have their status looked up. The
        // only way to map GitLab usernames to Slack ids is to pull every
        // member of the team channel and index them by Slack handle.
        let usernames: Vec<&str> = approvals
            .suggested_approvers
            .iter()
            .map(|u| u.username.as_str())
            .collect();
        let missing = self.cache.missing_identities(&usernames);
        if !missing.is_empty() {
            debug!(job_id = %job.id, missing = ?missing, "missing cache entries, fetching channel members");
            self.refresh_from_channel(job, &channel.slack_channel_id).await?;
        }

        let available = self.available_approvers(job, &approvals.suggested_approvers).await;
        if available.is_empty() {
            self.observer.ignored("no_available_approvers", group);
            return Err(AssignError::NoApproversAvailable);
        }

        let selected = self
            .selector
            .select(&available, approvals.approvals_required as usize);
        debug!(
            job_id = %job.id,
            selected = ?selected.iter().map(|u| &u.username).collect::<Vec<_>>(),
            approvals_required = approvals.approvals_required,
            num_approvers = available.len(),
            "selected reviewers"
        );

        let reviewer_ids: Vec<u64> = selected.iter().map(|u| u.id).collect();
        self.observer.tracker_request("merge_requests", "put", group);
        self.tracker
            .set_reviewers(job.project_id, job.merge_request_iid, &reviewer_ids)
            .await
            .map_err(AssignError::AssignReviewers)?;

        if self.settings.notifications_enabled {
            let notification = build_notification(&selected, job);
            self.observer.chat_request("post_message");
            if let Err(e) = self
                .chat
                .post_notification(&channel.slack_channel, &notification)
                .await
            {
                self.observer.chat_error("post_message");
                self.observer
                    .notification_failed("msg_failed", group, &channel.slack_channel);
                return Err(AssignError::Notify(e));
            }
            self.observer.notification_sent(group, &channel.slack_channel);
        } else {
            warn!(job_id = %job.id, group = %group, "slack notifications disabled, reviewers not notified");
            self.observer
                .notification_failed("notifications_disabled", group, &channel.slack_channel);
        }

        Ok(AssignmentOutcome::Assigned {
            reviewers: selected.into_iter().map(|u| u.username).collect(),
        })
    }

    /// Pull every member of the channel and cache their id and status.
    async fn refresh_from_channel(
        &self,
        job: &MergeRequestJob,
        channel_id: &str,
    ) -> Result<(), AssignError> {
        self.observer.chat_request("get_users_in_conversation");
        let members = self.chat.channel_members(channel_id).await.map_err(|e| {
            self.observer.chat_error("get_users_in_conversation");
            AssignError::ChannelMembers(e)
        })?;

        debug!(job_id = %job.id, num_updates = members.len(), "updating cache entries");

        self.observer.chat_request("get_users_info");
        let details = self.chat.user_details(&members).await.map_err(|e| {
            self.observer.chat_error("get_users_info");
            AssignError::UserDetails(e)
        })?;

        if !details.missing.is_empty() {
            debug!(job_id = %job.id, num_missing = details.missing.len(), "channel members without slack profile");
            self.observer.chat_users_missing(&job.group);
        }

        for user in details.found {
            self.store(&user.name, user.id, &user.status_text);
        }
        Ok(())
    }

    /// Suggested approvers whose status does not exclude them, in input order.
    async fn available_approvers(
        &self,
        job: &MergeRequestJob,
        suggested: &[TrackerUser],
    ) -> Vec<TrackerUser> {
        let mut available = Vec::with_capacity(suggested.len());

        for approver in suggested {
            let status = match self.cache.read(&approver.username) {
                CacheLookup::Hit(user) => user.status,
                CacheLookup::Expired(stale) => match self.refresh_user(job, &approver.username, stale).await {
                    Some(status) => status,
                    None => continue,
                },
                CacheLookup::NotFound => {
                    // Only happens when the approver is not in the team channel.
                    self.observer.anomaly("user_not_found_in_cache");
                    error!(job_id = %job.id, username = %approver.username, "user not found in cache");
                    continue;
                }
            };

            if self.settings.is_unavailable(&status) {
                self.observer.status_unavailable(&status, &job.group);
                debug!(job_id = %job.id, username = %approver.username, reason = %status, "user unavailable due to slack status");
            } else {
                available.push(approver.clone());
            }
        }

        available
    }

    /// Re-fetch one stale entry. Returns the status to judge the user by, or
    /// `None` when the lookup failed and the user should be skipped.
    async fn refresh_user(&self, job: &MergeRequestJob, username: &str, stale: UserStatus) -> Option<String> {
        if stale.chat_user_id.is_empty() {
            return Some(stale.status);
        }

        self.observer.chat_request("get_users_info");
        let details = match self.chat.user_details(std::slice::from_ref(&stale.chat_user_id)).await {
            Ok(details) => details,
            Err(e) => {
                self.observer.chat_error("get_users_info");
                error!(job_id = %job.id, username = %username, error = %e, "failed to get slack user data");
                return None;
            }
        };

        match details.found.into_iter().find(|u| u.id == stale.chat_user_id) {
            Some(user) => Some(self.store(username, user.id, &user.status_text)),
            None => Some(stale.status),
        }
    }

    /// Cache a Slack profile under a GitLab username; returns the stored status.
    fn store(&self, username: &str, chat_user_id: String, status_text: &str) -> String {
        let status = status_text.to_lowercase();
        let ttl = self.routing.status_ttl(status_text);
        self.cache.update_for(
            username,
            UserStatus {
                chat_user_id,
                status: status.clone(),
            },
            ttl,
        );
        status
    }
}

fn build_notification(reviewers: &[TrackerUser], job: &MergeRequestJob) -> Notification {
    let mentions = reviewers
        .iter()
        .map(|r| format!("<@{}>", r.username))
        .collect::<Vec<_>>()
        .join(", ");

    Notification {
        text: format!(
            "{} you have been selected to review <{}|{}> in <{}|{}>",
            mentions, job.url, job.title, job.project_url, job.project_name
        ),
        color: NOTIFICATION_COLOR.to_string(),
        footer: NOTIFICATION_FOOTER.to_string(),
    }
}

/// Log line for a finished job.
pub fn log_outcome(job: &MergeRequestJob, result: &Result<AssignmentOutcome, AssignError>) {
    match result {
        Ok(outcome) => info!(
            job_id = %job.id,
            group = %job.group,
            project_id = job.project_id,
            merge_request_iid = job.merge_request_iid,
            "{}", outcome
        ),
        Err(e) => error!(
            job_id = %job.id,
            group = %job.group,
            project_id = job.project_id,
            merge_request_iid = job.merge_request_iid,
            error = %e,
            "merge request processing failed"
        ),
    }
}
