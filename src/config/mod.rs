use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Process settings read from the environment.
#[derive(Debug, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:8080").
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// GitLab base URL, e.g. "https://gitlab.example.com"
    pub gitlab_url: String,

    /// GitLab API token used for all tracker calls
    pub gitlab_token: String,

    /// Shared secret expected in the `X-Gitlab-Token` header. No check when unset.
    #[serde(default)]
    pub gitlab_webhook_secret: Option<String>,

    /// `X-Gitlab-Event` values admitted by the webhook endpoint
    #[serde(default = "default_accepted_events")]
    pub accepted_events: Vec<String>,

    /// Slack bot token
    pub slack_token: String,

    /// Post a Slack message after reviewers are assigned
    #[serde(default = "default_true")]
    pub slack_notifications: bool,

    /// Path to the JSON routing file (group channels and status TTLs)
    #[serde(default = "default_routing_config_path")]
    pub routing_config_path: PathBuf,

    /// Number of assignment workers. Defaults to the available parallelism.
    #[serde(default)]
    pub worker_count: Option<usize>,

    /// Bound of the in-memory job queue
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// What the webhook does when the job queue is full
    #[serde(default)]
    pub queue_full_policy: QueueFullPolicy,

    /// Slack statuses (lower-case) that make a suggested approver unavailable
    #[serde(default = "default_unavailable_statuses")]
    pub unavailable_statuses: Vec<String>,

    /// Fixed seed for reviewer selection, for reproducible runs
    #[serde(default)]
    pub selection_seed: Option<u64>,

    /// Timeout applied to GitLab and Slack HTTP calls
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
}

/// Behaviour of the webhook when the job queue has no free slot.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum QueueFullPolicy {
    /// Hold the HTTP request until a slot frees up.
    #[default]
    Block,
    /// Reject the delivery immediately.
    Shed,
}

fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_accepted_events() -> Vec<String> {
    vec!["Merge Request Hook".to_string()]
}

fn default_true() -> bool {
    true
}

fn default_routing_config_path() -> PathBuf {
    PathBuf::from("./config/config.json")
}

fn default_queue_capacity() -> usize {
    10_000
}

fn default_unavailable_statuses() -> Vec<String> {
    vec![
        "out sick".to_string(),
        "vacationing".to_string(),
        "holiday".to_string(),
    ]
}

fn default_http_timeout_secs() -> u64 {
    30
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    /// Worker pool size, falling back to one worker per available CPU.
    pub fn workers(&self) -> usize {
        self.worker_count.filter(|n| *n > 0).unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }
}

/// Slack destination for a GitLab group or project path.
#[derive(Debug, Clone, Deserialize, serde::Serialize, PartialEq, Eq)]
pub struct GroupChannel {
    pub slack_channel: String,
    pub slack_channel_id: String,
}

/// Routing data loaded from the JSON config file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoutingConfig {
    #[serde(default)]
    group_channels: HashMap<String, GroupChannel>,

    /// Status text -> cache TTL in hours. The "" entry is the fallback.
    #[serde(default)]
    user_statuses: HashMap<String, u64>,
}

impl RoutingConfig {
    /// Build from in-memory maps. Keys are lower-cased.
    pub fn new(
        group_channels: HashMap<String, GroupChannel>,
        user_statuses: HashMap<String, u64>,
    ) -> Self {
        Self {
            group_channels: group_channels
                .into_iter()
                .map(|(k, v)| (k.to_lowercase(), v))
                .collect(),
            user_statuses: user_statuses
                .into_iter()
                .map(|(k, v)| (k.to_lowercase(), v))
                .collect(),
        }
    }

    /// Load and normalise the routing file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let meta = std::fs::metadata(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if meta.is_dir() {
            return Err(ConfigError::IsDirectory(path.to_path_buf()));
        }
        if meta.len() == 0 {
            return Err(ConfigError::Empty(path.to_path_buf()));
        }

        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let parsed: RoutingConfig =
            serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        Ok(Self::new(parsed.group_channels, parsed.user_statuses))
    }

    /// Resolve the Slack channel for a project path, climbing towards the root
    /// one segment at a time until a mapping matches.
    pub fn channel_for(&self, path_with_namespace: &str) -> Option<&GroupChannel> {
        let mut compare = path_with_namespace.to_lowercase();
        loop {
            if let Some(channel) = self.group_channels.get(&compare) {
                return Some(channel);
            }
            compare = parent_path(&compare)?.to_string();
        }
    }

    /// Cache TTL in hours for a Slack status text.
    pub fn status_ttl(&self, status: &str) -> u64 {
        if let Some(hours) = self.user_statuses.get(&status.to_lowercase()) {
            return *hours;
        }
        tracing::debug!(status = %status, "status has no config entry, using default ttl");
        self.user_statuses.get("").copied().unwrap_or(0)
    }

    pub fn user_statuses(&self) -> &HashMap<String, u64> {
        &self.user_statuses
    }

    pub fn group_channels(&self) -> &HashMap<String, GroupChannel> {
        &self.group_channels
    }
}

/// Strip the last segment of a namespace path. `None` once no '/' remains.
pub fn parent_path(path: &str) -> Option<&str> {
    path.rfind('/').map(|idx| &path[..idx])
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("'{0}' is a directory, not a normal file")]
    IsDirectory(PathBuf),

    #[error("'{0}' configuration file is empty")]
    Empty(PathBuf),

    #[error("failed to parse '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
