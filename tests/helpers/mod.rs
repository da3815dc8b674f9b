//! In-memory GitLab and Slack doubles plus builders for wiring the service
#![allow(dead_code)]

use async_trait::async_trait;
use axum::Router;
use reqwest::StatusCode;
use std::collections::HashMap;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use mr_reviewer_bot::{
    app_state::{AppState, WebhookSettings},
    config::{QueueFullPolicy, RoutingConfig},
    models::review::{
        ApprovalConfig, ChatUser, ChatUserDetails, MergeRequestDetail, Notification, TrackerUser,
    },
    routes,
    services::{
        assignment::{AssignmentSettings, ReviewerAssigner},
        cache::{AvailabilityCache, CacheOutcome},
        dispatcher::{Dispatcher, DispatcherConfig, DispatcherHandle},
        filter::EventFilter,
        gitlab::{IssueTracker, TrackerError},
        observer::Observer,
        selector::ReviewerSelector,
        slack::{ChatClient, ChatError},
    },
};

use crate::fixtures::{self, TeamMember, BOT_ID, MR_IID};

pub const SELECTION_SEED: u64 = 7;

pub fn tracker_user(member: TeamMember) -> TrackerUser {
    TrackerUser {
        id: member.gitlab_id,
        username: member.username.to_string(),
        name: member.username.to_string(),
    }
}

/// GitLab double. Records every reviewer write-back, and a successful one
/// shows up as the reviewers of the merge request from then on.
pub struct FakeTracker {
    pub reviewers: Mutex<Vec<TrackerUser>>,
    pub suggested_approvers: Vec<TrackerUser>,
    pub approvals_required: u32,
    pub fail_merge_request: bool,
    pub fail_set_reviewers: bool,
    pub set_reviewer_calls: Mutex<Vec<Vec<u64>>>,
    pub approval_calls: AtomicUsize,
}

impl FakeTracker {
    pub fn new(suggested: &[TeamMember], approvals_required: u32) -> Self {
        Self {
            reviewers: Mutex::new(Vec::new()),
            suggested_approvers: suggested.iter().copied().map(tracker_user).collect(),
            approvals_required,
            fail_merge_request: false,
            fail_set_reviewers: false,
            set_reviewer_calls: Mutex::new(Vec::new()),
            approval_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_reviewer(self, member: TeamMember) -> Self {
        self.reviewers.lock().unwrap().push(tracker_user(member));
        self
    }

    pub fn set_calls(&self) -> Vec<Vec<u64>> {
        self.set_reviewer_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl IssueTracker for FakeTracker {
    async fn get_merge_request(
        &self,
        _project_id: u64,
        iid: u64,
    ) -> Result<MergeRequestDetail, TrackerError> {
        if self.fail_merge_request {
            return Err(TrackerError::Status {
                status: StatusCode::NOT_FOUND,
                body: r#"{"message":"404 Not found"}"#.to_string(),
            });
        }
        Ok(MergeRequestDetail {
            iid,
            reviewers: self.reviewers.lock().unwrap().clone(),
        })
    }

    async fn get_approval_config(
        &self,
        _project_id: u64,
        _iid: u64,
    ) -> Result<ApprovalConfig, TrackerError> {
        self.approval_calls.fetch_add(1, Ordering::SeqCst);
        Ok(ApprovalConfig {
            suggested_approvers: self.suggested_approvers.clone(),
            approvals_required: self.approvals_required,
        })
    }

    async fn set_reviewers(
        &self,
        _project_id: u64,
        _iid: u64,
        reviewer_ids: &[u64],
    ) -> Result<(), TrackerError> {
        self.set_reviewer_calls
            .lock()
            .unwrap()
            .push(reviewer_ids.to_vec());
        if self.fail_set_reviewers {
            return Err(TrackerError::Status {
                status: StatusCode::FORBIDDEN,
                body: "forbidden".to_string(),
            });
        }

        *self.reviewers.lock().unwrap() = self
            .suggested_approvers
            .iter()
            .filter(|u| reviewer_ids.contains(&u.id))
            .cloned()
            .collect();
        Ok(())
    }

    async fn current_user(&self) -> Result<TrackerUser, TrackerError> {
        Ok(TrackerUser {
            id: BOT_ID,
            username: "reviewer-bot".to_string(),
            name: "Reviewer Bot".to_string(),
        })
    }
}

/// Slack double backed by a fixed set of profiles and channel memberships.
pub struct FakeChat {
    pub users: Mutex<HashMap<String, ChatUser>>,
    pub channels: HashMap<String, Vec<String>>,
    pub fail_post: bool,
    pub fail_user_details: bool,
    pub posts: Mutex<Vec<(String, Notification)>>,
    pub user_detail_calls: AtomicUsize,
    pub member_calls: AtomicUsize,
}

impl FakeChat {
    /// Every member is in the team channel with the Slack status of the fixture.
    pub fn with_team(members: &[TeamMember]) -> Self {
        let users = members
            .iter()
            .map(|m| {
                (
                    m.slack_id.to_string(),
                    ChatUser {
                        id: m.slack_id.to_string(),
                        name: m.username.to_string(),
                        status_text: m.slack_status.to_string(),
                    },
                )
            })
            .collect();
        let channel = members.iter().map(|m| m.slack_id.to_string()).collect();

        Self {
            users: Mutex::new(users),
            channels: HashMap::from([(fixtures::TEAM_CHANNEL_ID.to_string(), channel)]),
            fail_post: false,
            fail_user_details: false,
            posts: Mutex::new(Vec::new()),
            user_detail_calls: AtomicUsize::new(0),
            member_calls: AtomicUsize::new(0),
        }
    }

    pub fn set_status(&self, slack_id: &str, status: &str) {
        if let Some(user) = self.users.lock().unwrap().get_mut(slack_id) {
            user.status_text = status.to_string();
        }
    }

    pub fn posts(&self) -> Vec<(String, Notification)> {
        self.posts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatClient for FakeChat {
    async fn post_notification(
        &self,
        channel: &str,
        notification: &Notification,
    ) -> Result<(), ChatError> {
        if self.fail_post {
            return Err(ChatError::Api {
                method: "chat.postMessage",
                error: "channel_not_found".to_string(),
            });
        }
        self.posts
            .lock()
            .unwrap()
            .push((channel.to_string(), notification.clone()));
        Ok(())
    }

    async fn user_details(&self, user_ids: &[String]) -> Result<ChatUserDetails, ChatError> {
        self.user_detail_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_user_details {
            return Err(ChatError::Api {
                method: "users.info",
                error: "ratelimited".to_string(),
            });
        }

        let users = self.users.lock().unwrap();
        let mut details = ChatUserDetails::default();
        for id in user_ids {
            match users.get(id) {
                Some(user) => details.found.push(user.clone()),
                None => details.missing.push(id.clone()),
            }
        }
        Ok(details)
    }

    async fn channel_members(&self, channel_id: &str) -> Result<Vec<String>, ChatError> {
        self.member_calls.fetch_add(1, Ordering::SeqCst);
        self.channels
            .get(channel_id)
            .cloned()
            .ok_or_else(|| ChatError::Api {
                method: "conversations.members",
                error: "channel_not_found".to_string(),
            })
    }
}

/// Observer that keeps a log of what it was told, as `kind:detail` strings.
#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<String>>,
}

impl RecordingObserver {
    fn record(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, event: &str) -> usize {
        self.events().iter().filter(|e| e.as_str() == event).count()
    }
}

impl Observer for RecordingObserver {
    fn webhook_rejected(&self, reason: &'static str) {
        self.record(format!("webhook_rejected:{reason}"));
    }

    fn self_triggered(&self, group: &str) {
        self.record(format!("self_triggered:{group}"));
    }

    fn ignored(&self, reason: &str, _group: &str) {
        self.record(format!("ignored:{reason}"));
    }

    fn reviewer_removed(&self, group: &str) {
        self.record(format!("reviewer_removed:{group}"));
    }

    fn status_unavailable(&self, status: &str, _group: &str) {
        self.record(format!("status_unavailable:{status}"));
    }

    fn notification_sent(&self, _group: &str, channel: &str) {
        self.record(format!("notification_sent:{channel}"));
    }

    fn notification_failed(&self, reason: &'static str, _group: &str, _channel: &str) {
        self.record(format!("notification_failed:{reason}"));
    }

    fn cache_read(&self, outcome: CacheOutcome) {
        self.record(format!("cache_read:{outcome}"));
    }

    fn anomaly(&self, kind: &'static str) {
        self.record(format!("anomaly:{kind}"));
    }

    fn workers_started(&self, count: usize) {
        self.record(format!("workers_started:{count}"));
    }
}

/// Routing config loaded from a temporary file, the same way `main` does.
pub fn routing() -> Arc<RoutingConfig> {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(fixtures::routing_json().to_string().as_bytes())
        .unwrap();
    Arc::new(RoutingConfig::load(file.path()).unwrap())
}

/// Everything a test may want to inspect after running the service.
pub struct Harness {
    pub tracker: Arc<FakeTracker>,
    pub chat: Arc<FakeChat>,
    pub cache: Arc<AvailabilityCache>,
    pub observer: Arc<RecordingObserver>,
    pub routing: Arc<RoutingConfig>,
}

impl Harness {
    pub fn new(tracker: FakeTracker, chat: FakeChat) -> Self {
        let observer = Arc::new(RecordingObserver::default());
        Self {
            tracker: Arc::new(tracker),
            chat: Arc::new(chat),
            cache: Arc::new(AvailabilityCache::new(observer.clone())),
            observer,
            routing: routing(),
        }
    }

    pub fn assigner(&self) -> ReviewerAssigner {
        self.assigner_with(true)
    }

    pub fn assigner_with(&self, notifications_enabled: bool) -> ReviewerAssigner {
        ReviewerAssigner::new(
            self.tracker.clone(),
            self.chat.clone(),
            self.cache.clone(),
            self.routing.clone(),
            ReviewerSelector::seeded(SELECTION_SEED),
            AssignmentSettings::new(notifications_enabled, ["out sick", "vacationing", "holiday"]),
            self.observer.clone(),
        )
    }

    /// Full HTTP app on top of a running worker pool.
    pub fn app(&self, workers: usize) -> (Router, DispatcherHandle) {
        let (queue, handle) = Dispatcher::start(
            DispatcherConfig {
                workers,
                queue_capacity: 16,
                policy: QueueFullPolicy::Block,
            },
            Arc::new(self.assigner()),
            self.observer.clone(),
        );

        let state = AppState::new(
            queue,
            EventFilter::new(BOT_ID, self.observer.clone()),
            WebhookSettings::new(
                Some(fixtures::WEBHOOK_SECRET.to_string()),
                ["Merge Request Hook"],
            ),
            self.cache.clone(),
            self.routing.clone(),
            self.observer.clone(),
        );

        (routes::router(state), handle)
    }
}

/// Job for the fixture merge request, as the webhook would build it.
pub fn job(work_in_progress: bool) -> mr_reviewer_bot::models::job::MergeRequestJob {
    let payload = fixtures::merge_request_event(fixtures::DEVELOPER_ID, "open", "can_be_merged", work_in_progress);
    let event = serde_json::from_value(payload).unwrap();
    let job = mr_reviewer_bot::models::job::MergeRequestJob::from_event(&event);
    assert_eq!(job.merge_request_iid, MR_IID);
    job
}
