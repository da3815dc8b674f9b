use garde::Validate;
use serde::{Deserialize, Serialize};

/// GitLab "Merge Request Hook" payload, reduced to the fields the service reads.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct MergeRequestEvent {
    #[garde(skip)]
    #[serde(default)]
    pub object_kind: String,

    #[garde(dive)]
    pub user: EventUser,

    #[garde(dive)]
    pub project: EventProject,

    #[garde(dive)]
    pub object_attributes: MergeRequestAttributes,
}

/// User who triggered the event.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct EventUser {
    #[garde(skip)]
    pub id: u64,

    #[garde(skip)]
    #[serde(default)]
    pub username: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct EventProject {
    #[garde(range(min = 1))]
    pub id: u64,

    #[garde(skip)]
    #[serde(default)]
    pub name: String,

    #[garde(skip)]
    #[serde(default)]
    pub web_url: String,

    #[garde(length(min = 1))]
    pub path_with_namespace: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct MergeRequestAttributes {
    #[garde(range(min = 1))]
    pub iid: u64,

    #[garde(skip)]
    #[serde(default)]
    pub title: String,

    #[garde(skip)]
    #[serde(default)]
    pub url: String,

    /// open, update, approved, merge, ...
    #[garde(skip)]
    #[serde(default)]
    pub action: Option<String>,

    /// can_be_merged, cannot_be_merged, unchecked, ...
    #[garde(skip)]
    #[serde(default)]
    pub merge_status: Option<String>,

    #[garde(skip)]
    #[serde(default)]
    pub work_in_progress: bool,

    /// Newer GitLab versions send `draft` alongside `work_in_progress`.
    #[garde(skip)]
    #[serde(default)]
    pub draft: bool,
}

impl MergeRequestEvent {
    pub fn is_work_in_progress(&self) -> bool {
        self.object_attributes.work_in_progress || self.object_attributes.draft
    }
}
