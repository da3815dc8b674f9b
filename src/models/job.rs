use serde::{Deserialize, Serialize};
use strum::Display;
use uuid::Uuid;

use crate::config::parent_path;
use crate::models::event::MergeRequestEvent;

/// A merge request admitted by the webhook and waiting for reviewer assignment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MergeRequestJob {
    pub id: Uuid,
    pub project_id: u64,
    pub merge_request_iid: u64,
    pub title: String,
    pub url: String,
    pub project_name: String,
    pub project_url: String,
    pub path_with_namespace: String,
    /// Namespace path with the project stripped.
    pub group: String,
    pub work_in_progress: bool,
}

impl MergeRequestJob {
    pub fn from_event(event: &MergeRequestEvent) -> Self {
        let path = &event.project.path_with_namespace;
        Self {
            id: Uuid::new_v4(),
            project_id: event.project.id,
            merge_request_iid: event.object_attributes.iid,
            title: event.object_attributes.title.clone(),
            url: event.object_attributes.url.clone(),
            project_name: event.project.name.clone(),
            project_url: event.project.web_url.clone(),
            path_with_namespace: path.clone(),
            group: group_of(path).to_string(),
            work_in_progress: event.is_work_in_progress(),
        }
    }
}

/// Group path of a project path; a path without '/' is its own group.
pub fn group_of(path_with_namespace: &str) -> &str {
    parent_path(path_with_namespace).unwrap_or(path_with_namespace)
}

/// Worker state reported to the dispatcher around each job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum WorkerStatus {
    Working,
    Waiting,
}

/// Result of one job, sent from a worker to the dispatcher.
#[derive(Debug)]
pub struct CompletionEvent {
    pub job_id: Uuid,
    pub group: String,
    pub result: Result<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_of() {
        assert_eq!(group_of("group/sub/project"), "group/sub");
        assert_eq!(group_of("group/project"), "group");
        assert_eq!(group_of("project"), "project");
    }

    #[test]
    fn test_worker_status_display() {
        assert_eq!(WorkerStatus::Working.to_string(), "working");
        assert_eq!(WorkerStatus::Waiting.to_string(), "waiting");
    }
}
