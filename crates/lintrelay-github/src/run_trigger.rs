//! Decodes the workflow event into a typed trigger once, at the process boundary.

use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PullRequestAction {
    Opened,
    Synchronize,
    Reopened,
    Closed,
    Other(String),
}

impl PullRequestAction {
    fn parse(raw: &str) -> Self {
        match raw {
            "opened" => Self::Opened,
            "synchronize" => Self::Synchronize,
            "reopened" => Self::Reopened,
            "closed" => Self::Closed,
            other => Self::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestTrigger {
    pub action: PullRequestAction,
    pub number: u64,
    pub head_sha: String,
    pub base_full_name: String,
    pub head_full_name: String,
    pub html_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueCommentTrigger {
    pub issue_number: u64,
    pub sha: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunTrigger {
    Schedule,
    PullRequest(PullRequestTrigger),
    IssueComment(IssueCommentTrigger),
    /// Any other event; linted in commit mode against `sha`.
    Commit { sha: String },
}

impl RunTrigger {
    pub fn issue_number(&self) -> Option<u64> {
        match self {
            Self::PullRequest(pull_request) => Some(pull_request.number),
            Self::IssueComment(comment) => Some(comment.issue_number),
            Self::Schedule | Self::Commit { .. } => None,
        }
    }

    pub fn sha(&self) -> Option<&str> {
        match self {
            Self::PullRequest(pull_request) => Some(pull_request.head_sha.as_str()),
            Self::IssueComment(comment) => Some(comment.sha.as_str()),
            Self::Commit { sha } => Some(sha.as_str()),
            Self::Schedule => None,
        }
    }

    /// True when the pull request originates from a fork, so the run token is read-only.
    pub fn is_read_only(&self) -> bool {
        match self {
            Self::PullRequest(pull_request) => {
                pull_request.base_full_name != pull_request.head_full_name
            }
            Self::Schedule | Self::IssueComment(_) | Self::Commit { .. } => false,
        }
    }
}

#[derive(Debug, Deserialize)]
struct PayloadRepo {
    full_name: String,
}

#[derive(Debug, Deserialize)]
struct PayloadRef {
    sha: String,
    #[serde(default)]
    repo: Option<PayloadRepo>,
}

#[derive(Debug, Deserialize)]
struct PayloadPullRequest {
    number: u64,
    head: PayloadRef,
    base: PayloadRef,
    #[serde(default)]
    html_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PullRequestPayload {
    #[serde(default)]
    action: Option<String>,
    pull_request: PayloadPullRequest,
}

#[derive(Debug, Deserialize)]
struct PayloadIssue {
    number: u64,
}

#[derive(Debug, Deserialize)]
struct IssueCommentPayload {
    issue: PayloadIssue,
}

/// Builds the trigger from `GITHUB_EVENT_NAME`, the event payload and `GITHUB_SHA`.
pub fn parse_run_trigger(
    event_name: &str,
    payload: &Value,
    fallback_sha: &str,
) -> Result<RunTrigger, String> {
    match event_name.trim() {
        "schedule" => Ok(RunTrigger::Schedule),
        "pull_request" | "pull_request_target" => {
            let payload = PullRequestPayload::deserialize(payload)
                .map_err(|error| format!("invalid pull_request payload: {error}"))?;
            let pull_request = payload.pull_request;
            let head_full_name = pull_request
                .head
                .repo
                .map(|repo| repo.full_name)
                .unwrap_or_default();
            let base_full_name = pull_request
                .base
                .repo
                .map(|repo| repo.full_name)
                .unwrap_or_default();
            Ok(RunTrigger::PullRequest(PullRequestTrigger {
                action: PullRequestAction::parse(payload.action.as_deref().unwrap_or_default()),
                number: pull_request.number,
                head_sha: pull_request.head.sha,
                base_full_name,
                head_full_name,
                html_url: pull_request.html_url,
            }))
        }
        "issue_comment" => {
            let payload = IssueCommentPayload::deserialize(payload)
                .map_err(|error| format!("invalid issue_comment payload: {error}"))?;
            Ok(RunTrigger::IssueComment(IssueCommentTrigger {
                issue_number: payload.issue.number,
                sha: fallback_sha.to_string(),
            }))
        }
        _ => Ok(RunTrigger::Commit {
            sha: fallback_sha.to_string(),
        }),
    }
}
