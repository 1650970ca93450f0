//! GitHub host integration for lintrelay.
//! This crate provides the `SourceHost` and `ArtifactHost` capability seams, their
//! REST/GraphQL implementation with retrying transport, and workflow-event decoding.

pub mod actions_runtime;
pub mod artifact_archive;
pub mod github_api_client;
pub mod github_transport_helpers;
pub mod run_trigger;
pub mod source_host;

pub use actions_runtime::ActionsRuntimeConfig;
pub use github_api_client::{GithubApiClient, GithubApiClientConfig, RepoRef};
pub use run_trigger::{
    parse_run_trigger, IssueCommentTrigger, PullRequestAction, PullRequestTrigger, RunTrigger,
};
pub use source_host::{
    ArtifactHost, ChangedFilesPage, CheckAnnotation, CheckAnnotationLevel, CheckRunConclusion,
    CheckRunCreate, CheckRunOutput, CheckRunStatus, CheckRunUpdate, HostArtifact, HostComment,
    HostError, HostResult, HostWorkflow, SourceHost, CHANGED_FILES_PAGE_SIZE,
};
