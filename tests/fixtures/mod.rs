//! Webhook payloads and team data shared by the integration tests
#![allow(dead_code)]

use serde_json::{json, Value};

/// GitLab id of the bot account the service runs as.
pub const BOT_ID: u64 = 99_999;

/// GitLab id of a regular developer opening merge requests.
pub const DEVELOPER_ID: u64 = 42;

pub const WEBHOOK_SECRET: &str = "webhook-secret";

pub const PROJECT_ID: u64 = 12;
pub const MR_IID: u64 = 3;
pub const PROJECT_PATH: &str = "platform/api/service";

/// Slack channel the `platform/api` group posts to.
pub const TEAM_CHANNEL: &str = "#platform-api";
pub const TEAM_CHANNEL_ID: &str = "C0PLATFORM";

/// Member of the team: GitLab identity plus the matching Slack profile.
#[derive(Debug, Clone, Copy)]
pub struct TeamMember {
    pub gitlab_id: u64,
    pub username: &'static str,
    pub slack_id: &'static str,
    pub slack_status: &'static str,
}

pub const ALICE: TeamMember = TeamMember {
    gitlab_id: 1,
    username: "alice",
    slack_id: "U01ALICE",
    slack_status: "",
};

pub const BOB: TeamMember = TeamMember {
    gitlab_id: 2,
    username: "bob",
    slack_id: "U02BOB",
    slack_status: "In a meeting",
};

pub const CAROL: TeamMember = TeamMember {
    gitlab_id: 3,
    username: "carol",
    slack_id: "U03CAROL",
    slack_status: "Out Sick",
};

/// Routing file as it would appear on disk.
pub fn routing_json() -> Value {
    json!({
        "group_channels": {
            "platform/api": {
                "slack_channel": TEAM_CHANNEL,
                "slack_channel_id": TEAM_CHANNEL_ID
            }
        },
        "user_statuses": {
            "": 1,
            "out sick": 24,
            "vacationing": 72,
            "holiday": 72
        }
    })
}

/// A "Merge Request Hook" payload for [`PROJECT_PATH`].
pub fn merge_request_event(
    user_id: u64,
    action: &str,
    merge_status: &str,
    work_in_progress: bool,
) -> Value {
    json!({
        "object_kind": "merge_request",
        "event_type": "merge_request",
        "user": {
            "id": user_id,
            "name": "Some Developer",
            "username": if user_id == BOT_ID { "reviewer-bot" } else { "developer" }
        },
        "project": {
            "id": PROJECT_ID,
            "name": "service",
            "web_url": "https://gitlab.example.com/platform/api/service",
            "path_with_namespace": PROJECT_PATH
        },
        "object_attributes": {
            "id": 9001,
            "iid": MR_IID,
            "title": "Add rate limiting",
            "url": "https://gitlab.example.com/platform/api/service/-/merge_requests/3",
            "action": action,
            "merge_status": merge_status,
            "state": "opened",
            "work_in_progress": work_in_progress,
            "draft": work_in_progress
        }
    })
}

/// Deliveries that pass validation but must not produce a job.
#[derive(Debug, Clone, Copy)]
pub struct IgnoredEventFixture {
    pub description: &'static str,
    pub user_id: u64,
    pub action: &'static str,
    pub merge_status: &'static str,
    pub expected_message: &'static str,
}

pub const IGNORED_EVENTS: &[IgnoredEventFixture] = &[
    IgnoredEventFixture {
        description: "reviewer update made by the bot itself",
        user_id: BOT_ID,
        action: "update",
        merge_status: "can_be_merged",
        expected_message: "ignoring request initiated through this service.",
    },
    IgnoredEventFixture {
        description: "approval",
        user_id: DEVELOPER_ID,
        action: "approved",
        merge_status: "can_be_merged",
        expected_message: "ignoring approved/merge action.",
    },
    IgnoredEventFixture {
        description: "merge",
        user_id: DEVELOPER_ID,
        action: "merge",
        merge_status: "can_be_merged",
        expected_message: "ignoring approved/merge action.",
    },
    IgnoredEventFixture {
        description: "merge conflicts",
        user_id: DEVELOPER_ID,
        action: "update",
        merge_status: "cannot_be_merged",
        expected_message: "ignoring as merge request cannot be merged.",
    },
];
