use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::models::review::{ChatUser, ChatUserDetails, Notification};

const SLACK_API: &str = "https://slack.com/api";

/// Slack operations used by the assignment workflow.
#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn post_notification(
        &self,
        channel: &str,
        notification: &Notification,
    ) -> Result<(), ChatError>;

    /// Profile details for the given Slack ids. Unknown ids are reported as missing.
    async fn user_details(&self, user_ids: &[String]) -> Result<ChatUserDetails, ChatError>;

    async fn channel_members(&self, channel_id: &str) -> Result<Vec<String>, ChatError>;
}

/// Web API client authenticated with a bot token.
pub struct SlackClient {
    http: Client,
    base_url: String,
    token: String,
}

/// Envelope shared by every Slack Web API response.
#[derive(Deserialize)]
struct SlackResponse<T> {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(flatten)]
    body: Option<T>,
}

#[derive(Deserialize)]
struct UserInfoBody {
    user: SlackUser,
}

#[derive(Deserialize)]
struct SlackUser {
    id: String,
    name: String,
    #[serde(default)]
    profile: SlackProfile,
}

#[derive(Deserialize, Default)]
struct SlackProfile {
    #[serde(default)]
    status_text: String,
}

#[derive(Deserialize)]
struct MembersBody {
    #[serde(default)]
    members: Vec<String>,
    #[serde(default)]
    response_metadata: Option<ResponseMetadata>,
}

#[derive(Deserialize)]
struct ResponseMetadata {
    #[serde(default)]
    next_cursor: String,
}

#[derive(Deserialize)]
struct Empty {}

#[derive(Serialize)]
struct PostMessage<'a> {
    channel: &'a str,
    as_user: bool,
    attachments: [Attachment<'a>; 1],
}

#[derive(Serialize)]
struct Attachment<'a> {
    color: &'a str,
    text: &'a str,
    footer: &'a str,
}

impl SlackClient {
    pub fn new(token: &str, timeout: Duration) -> Result<Self, ChatError> {
        Self::with_base_url(SLACK_API, token, timeout)
    }

    pub fn with_base_url(base_url: &str, token: &str, timeout: Duration) -> Result<Self, ChatError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        method: &'static str,
        query: &[(&str, &str)],
    ) -> Result<SlackResponse<T>, ChatError> {
        let response = self
            .http
            .get(format!("{}/{}", self.base_url, method))
            .bearer_auth(&self.token)
            .query(query)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }
}

fn into_body<T>(method: &'static str, response: SlackResponse<T>) -> Result<T, ChatError> {
    if !response.ok {
        return Err(ChatError::Api {
            method,
            error: response.error.unwrap_or_else(|| "unknown_error".to_string()),
        });
    }
    response.body.ok_or(ChatError::Api {
        method,
        error: "empty_response".to_string(),
    })
}

#[async_trait]
impl ChatClient for SlackClient {
    async fn post_notification(
        &self,
        channel: &str,
        notification: &Notification,
    ) -> Result<(), ChatError> {
        let message = PostMessage {
            channel,
            as_user: true,
            attachments: [Attachment {
                color: &notification.color,
                text: &notification.text,
                footer: &notification.footer,
            }],
        };

        let response: SlackResponse<Empty> = self
            .http
            .post(format!("{}/chat.postMessage", self.base_url))
            .bearer_auth(&self.token)
            .json(&message)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        into_body("chat.postMessage", response).map(|_| ())
    }

    async fn user_details(&self, user_ids: &[String]) -> Result<ChatUserDetails, ChatError> {
        let mut details = ChatUserDetails::default();

        for id in user_ids {
            let response: SlackResponse<UserInfoBody> =
                self.get("users.info", &[("user", id.as_str())]).await?;

            match into_body("users.info", response) {
                Ok(body) => details.found.push(ChatUser {
                    id: body.user.id,
                    name: body.user.name,
                    status_text: body.user.profile.status_text,
                }),
                Err(ChatError::Api { error, .. }) if error == "user_not_found" => {
                    details.missing.push(id.clone());
                }
                Err(e) => return Err(e),
            }
        }

        Ok(details)
    }

    async fn channel_members(&self, channel_id: &str) -> Result<Vec<String>, ChatError> {
        let mut members = Vec::new();
        let mut cursor = String::new();

        loop {
            let mut query = vec![("channel", channel_id), ("limit", "200")];
            if !cursor.is_empty() {
                query.push(("cursor", cursor.as_str()));
            }
            let response: SlackResponse<MembersBody> =
                self.get("conversations.members", &query).await?;
            let body = into_body("conversations.members", response)?;

            members.extend(body.members);
            cursor = body
                .response_metadata
                .map(|m| m.next_cursor)
                .unwrap_or_default();
            if cursor.is_empty() {
                break;
            }
        }

        Ok(members)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("HTTP request to Slack failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Slack {method} failed: {error}")]
    Api { method: &'static str, error: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_envelope() {
        let response: SlackResponse<MembersBody> =
            serde_json::from_str(r#"{"ok": false, "error": "channel_not_found"}"#).unwrap();
        let err = into_body("conversations.members", response).err().unwrap();
        assert_eq!(err.to_string(), "Slack conversations.members failed: channel_not_found");
    }

    #[test]
    fn test_user_info_envelope() {
        let response: SlackResponse<UserInfoBody> = serde_json::from_str(
            r#"{"ok": true, "user": {"id": "U1", "name": "test1", "profile": {"status_text": "Out Sick"}}}"#,
        )
        .unwrap();
        let body = into_body("users.info", response).unwrap();
        assert_eq!(body.user.id, "U1");
        assert_eq!(body.user.profile.status_text, "Out Sick");
    }

    #[test]
    fn test_members_envelope_with_cursor() {
        let response: SlackResponse<MembersBody> = serde_json::from_str(
            r#"{"ok": true, "members": ["U1", "U2"], "response_metadata": {"next_cursor": "abc"}}"#,
        )
        .unwrap();
        let body = into_body("conversations.members", response).unwrap();
        assert_eq!(body.members, vec!["U1", "U2"]);
        assert_eq!(body.response_metadata.unwrap().next_cursor, "abc");
    }
}
