use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::time::Duration;

use crate::models::review::{ApprovalConfig, MergeRequestDetail, TrackerUser};

/// Merge request operations the assignment workflow needs from GitLab.
#[async_trait]
pub trait IssueTracker: Send + Sync {
    async fn get_merge_request(
        &self,
        project_id: u64,
        iid: u64,
    ) -> Result<MergeRequestDetail, TrackerError>;

    async fn get_approval_config(
        &self,
        project_id: u64,
        iid: u64,
    ) -> Result<ApprovalConfig, TrackerError>;

    /// Replace the reviewers of a merge request. An empty slice unassigns everyone.
    async fn set_reviewers(
        &self,
        project_id: u64,
        iid: u64,
        reviewer_ids: &[u64],
    ) -> Result<(), TrackerError>;

    /// The user the API token belongs to.
    async fn current_user(&self) -> Result<TrackerUser, TrackerError>;
}

/// REST client for the GitLab v4 API.
pub struct GitLabClient {
    http: Client,
    api_base: String,
    token: String,
}

#[derive(Serialize)]
struct UpdateReviewers<'a> {
    reviewer_ids: &'a [u64],
}

impl GitLabClient {
    pub fn new(base_url: &str, token: &str, timeout: Duration) -> Result<Self, TrackerError> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("mr-reviewer-bot/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            api_base: format!("{}/api/v4", base_url.trim_end_matches('/')),
            token: token.to_string(),
        })
    }

    fn merge_request_url(&self, project_id: u64, iid: u64) -> String {
        format!("{}/projects/{}/merge_requests/{}", self.api_base, project_id, iid)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, TrackerError> {
        let response = self
            .http
            .get(url)
            .header("PRIVATE-TOKEN", &self.token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TrackerError::Status { status, body });
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl IssueTracker for GitLabClient {
    async fn get_merge_request(
        &self,
        project_id: u64,
        iid: u64,
    ) -> Result<MergeRequestDetail, TrackerError> {
        self.get_json(&self.merge_request_url(project_id, iid)).await
    }

    async fn get_approval_config(
        &self,
        project_id: u64,
        iid: u64,
    ) -> Result<ApprovalConfig, TrackerError> {
        let url = format!("{}/approvals", self.merge_request_url(project_id, iid));
        self.get_json(&url).await
    }

    async fn set_reviewers(
        &self,
        project_id: u64,
        iid: u64,
        reviewer_ids: &[u64],
    ) -> Result<(), TrackerError> {
        // GitLab treats reviewer id 0 as "remove all reviewers".
        let ids: &[u64] = if reviewer_ids.is_empty() { &[0] } else { reviewer_ids };

        let response = self
            .http
            .put(self.merge_request_url(project_id, iid))
            .header("PRIVATE-TOKEN", &self.token)
            .json(&UpdateReviewers { reviewer_ids: ids })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TrackerError::Status { status, body });
        }
        Ok(())
    }

    async fn current_user(&self) -> Result<TrackerUser, TrackerError> {
        self.get_json(&format!("{}/user", self.api_base)).await
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error("HTTP request to GitLab failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("GitLab responded {status}: {body}")]
    Status { status: StatusCode, body: String },
}
