use serde::{Deserialize, Serialize};

/// GitLab user as returned in reviewer and approver lists.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrackerUser {
    pub id: u64,
    pub username: String,
    #[serde(default)]
    pub name: String,
}

/// Current state of a merge request in GitLab.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MergeRequestDetail {
    pub iid: u64,
    #[serde(default)]
    pub reviewers: Vec<TrackerUser>,
}

/// Approval rules for a merge request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApprovalConfig {
    #[serde(default)]
    pub suggested_approvers: Vec<TrackerUser>,
    #[serde(default)]
    pub approvals_required: u32,
}

/// Slack user with the status text of their profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatUser {
    pub id: String,
    /// Slack handle; matched against GitLab usernames.
    pub name: String,
    pub status_text: String,
}

/// Result of a bulk user lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatUserDetails {
    pub found: Vec<ChatUser>,
    /// Requested ids that Slack did not return.
    pub missing: Vec<String>,
}

/// Message posted to Slack when reviewers are chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub text: String,
    pub color: String,
    pub footer: String,
}
