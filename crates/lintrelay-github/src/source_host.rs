//! Host capability seam consumed by the reconciliation engine.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of changed files requested per pull-request page.
pub const CHANGED_FILES_PAGE_SIZE: usize = 50;

pub type HostResult<T> = Result<T, HostError>;

/// Errors surfaced by `SourceHost` implementations.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("github {operation} target was not found")]
    NotFound { operation: String },
    #[error("github api {operation} failed with status {status}: {body}")]
    Status {
        operation: String,
        status: u16,
        body: String,
    },
    #[error("github api {operation} request failed")]
    Transport {
        operation: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to decode github {operation}: {message}")]
    Decode { operation: String, message: String },
    #[error("github graphql {operation} returned errors: {message}")]
    Graphql { operation: String, message: String },
    #[error("github artifact archive for {operation} is unreadable: {message}")]
    Archive { operation: String, message: String },
    #[error("actions runtime unavailable for {operation}: {message}")]
    ActionsRuntime { operation: String, message: String },
}

impl HostError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// One page of a pull request's changed-file listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangedFilesPage {
    pub files: Vec<String>,
    pub has_next_page: bool,
    pub end_cursor: Option<String>,
}

/// Issue comment as seen by the summary lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostComment {
    pub id: u64,
    pub author_id: Option<u64>,
    pub body: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckRunStatus {
    Queued,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckRunConclusion {
    Success,
    Failure,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckAnnotationLevel {
    Notice,
    Warning,
    Failure,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckAnnotation {
    pub path: String,
    pub start_line: u64,
    pub end_line: u64,
    pub annotation_level: CheckAnnotationLevel,
    pub title: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckRunOutput {
    pub title: String,
    pub summary: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<CheckAnnotation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckRunCreate {
    pub name: String,
    pub head_sha: String,
    pub status: CheckRunStatus,
    pub started_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckRunUpdate {
    pub name: String,
    pub status: CheckRunStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conclusion: Option<CheckRunConclusion>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<CheckRunOutput>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HostWorkflow {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub state: String,
}

/// Source-control host operations the engine depends on.
#[async_trait]
pub trait SourceHost: Send + Sync {
    /// Fetches one page of at most `CHANGED_FILES_PAGE_SIZE` changed paths after `cursor`.
    async fn pull_request_files_page(
        &self,
        pr_number: u64,
        cursor: Option<&str>,
    ) -> HostResult<ChangedFilesPage>;

    async fn commit_files(&self, sha: &str) -> HostResult<Vec<String>>;

    async fn list_issue_comments(&self, issue_number: u64) -> HostResult<Vec<HostComment>>;
    async fn create_issue_comment(&self, issue_number: u64, body: &str)
        -> HostResult<HostComment>;
    async fn update_issue_comment(&self, comment_id: u64, body: &str) -> HostResult<HostComment>;
    /// Returns `HostError::NotFound` when the comment no longer exists.
    async fn delete_issue_comment(&self, comment_id: u64) -> HostResult<()>;

    async fn create_check_run(&self, request: &CheckRunCreate) -> HostResult<u64>;
    async fn update_check_run(&self, check_run_id: u64, update: &CheckRunUpdate)
        -> HostResult<()>;

    async fn list_workflows(&self) -> HostResult<Vec<HostWorkflow>>;
}

/// Workflow artifact as listed by the REST API.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HostArtifact {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub expired: bool,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Workflow artifact operations; the durable medium shared by disconnected runs.
#[async_trait]
pub trait ArtifactHost: Send + Sync {
    /// Every artifact of the repository, or only those named exactly `name`.
    async fn list_artifacts(&self, name: Option<&str>) -> HostResult<Vec<HostArtifact>>;

    /// Text of `entry_name` inside the artifact archive; `None` when the archive lacks it.
    async fn download_artifact_entry(
        &self,
        artifact_id: u64,
        entry_name: &str,
    ) -> HostResult<Option<String>>;

    /// Publishes `contents` as the single entry of a new artifact and returns its id.
    async fn upload_artifact(&self, name: &str, entry_name: &str, contents: &str)
        -> HostResult<u64>;

    async fn delete_artifact(&self, artifact_id: u64) -> HostResult<()>;
}
