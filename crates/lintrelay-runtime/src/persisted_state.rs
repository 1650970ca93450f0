//! Persisted workflow and issue documents plus their artifact keys.

use chrono::{DateTime, SecondsFormat, Utc};
use lintrelay_core::parse_rfc3339_utc;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SchedulerState {
    /// RFC 3339 instant of the last privileged scheduled run.
    pub last_run_at: Option<String>,
}

/// Workflow-scoped document shared by every issue the workflow touches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkflowState {
    /// Account that posts summary comments; scopes bulk comment removal.
    pub user_id: Option<u64>,
    /// Id of this workflow in the repository, captured by the scheduler.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workflow_id: Option<u64>,
    pub scheduler: SchedulerState,
}

impl WorkflowState {
    /// Malformed timestamps read as "never ran".
    pub fn last_scheduler_run(&self) -> Option<DateTime<Utc>> {
        self.scheduler
            .last_run_at
            .as_deref()
            .and_then(parse_rfc3339_utc)
    }

    /// Records a scheduler run at `now`; an older instant never replaces a newer one.
    pub fn stamp_scheduler_run(&mut self, now: DateTime<Utc>) -> bool {
        if matches!(self.last_scheduler_run(), Some(stored) if stored >= now) {
            return false;
        }
        self.scheduler.last_run_at = Some(now.to_rfc3339_opts(SecondsFormat::Millis, true));
        true
    }

    /// Fills `user_id` from a legacy issue document when no identity is known yet.
    pub fn adopt_legacy_user_id(&mut self, legacy_user_id: Option<u64>) {
        if self.user_id.is_none() {
            self.user_id = legacy_user_id;
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LintCounts {
    pub error_count: u64,
    /// Running total; ignored-file diagnostics subtract from it and may take it below zero.
    pub warning_count: i64,
    pub fixable_error_count: u64,
    pub fixable_warning_count: u64,
    pub ignored_count: u64,
}

impl LintCounts {
    /// Warning total as shown to readers; a negative running total shows as zero.
    pub fn reported_warning_count(&self) -> u64 {
        u64::try_from(self.warning_count).unwrap_or(0)
    }

    /// True when any error, warning or fixable counter is positive.
    pub fn has_findings(&self) -> bool {
        self.error_count > 0
            || self.warning_count > 0
            || self.fixable_error_count > 0
            || self.fixable_warning_count > 0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IssueSummaryState {
    pub summary_id: Option<u64>,
}

/// Issue-scoped document, one per pull request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IssueState {
    pub issue: IssueSummaryState,
    pub check_id: Option<u64>,
    pub counts: LintCounts,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyActionState {
    #[serde(default)]
    user_id: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct LegacyIssueDocument {
    action: LegacyActionState,
    #[serde(flatten)]
    state: IssueState,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StoredIssueDocument {
    Legacy(LegacyIssueDocument),
    Current(IssueState),
}

/// Decoded issue document; `legacy_user_id` is only set for the old `action.userId` shape.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IssueDocument {
    pub state: IssueState,
    pub legacy_user_id: Option<u64>,
}

pub fn decode_issue_document(raw: &str) -> Result<IssueDocument, serde_json::Error> {
    Ok(match serde_json::from_str::<StoredIssueDocument>(raw)? {
        StoredIssueDocument::Legacy(legacy) => IssueDocument {
            state: legacy.state,
            legacy_user_id: legacy.action.user_id,
        },
        StoredIssueDocument::Current(state) => IssueDocument {
            state,
            legacy_user_id: None,
        },
    })
}

/// Deterministic artifact names for one workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateKeys {
    state_namespace: String,
    results_namespace: String,
    workflow_name: String,
}

impl StateKeys {
    pub fn new(
        state_namespace: impl Into<String>,
        results_namespace: impl Into<String>,
        workflow_name: impl Into<String>,
    ) -> Self {
        Self {
            state_namespace: state_namespace.into(),
            results_namespace: results_namespace.into(),
            workflow_name: workflow_name.into(),
        }
    }

    pub fn workflow_name(&self) -> &str {
        &self.workflow_name
    }

    pub fn workflow_key(&self) -> String {
        format!("{}-{}", self.state_namespace, self.workflow_name)
    }

    pub fn issue_key(&self, issue_number: u64) -> String {
        format!("{}{issue_number}", self.issue_prefix())
    }

    pub fn pending_results_key(&self, issue_number: u64) -> String {
        format!("{}{issue_number}", self.pending_results_prefix())
    }

    pub fn issue_prefix(&self) -> String {
        format!("{}-{}-", self.state_namespace, self.workflow_name)
    }

    pub fn pending_results_prefix(&self) -> String {
        format!("{}-{}-", self.results_namespace, self.workflow_name)
    }

    /// Issue number of a pending-results key, `None` for anything else under the prefix.
    pub fn pending_issue_number(&self, key: &str) -> Option<u64> {
        issue_suffix(key, &self.pending_results_prefix())
    }

    /// True for the issue document and pending results of exactly `issue_number`.
    pub fn is_issue_scoped(&self, key: &str, issue_number: u64) -> bool {
        issue_suffix(key, &self.issue_prefix()) == Some(issue_number)
            || self.pending_issue_number(key) == Some(issue_number)
    }
}

fn issue_suffix(key: &str, prefix: &str) -> Option<u64> {
    let suffix = key.strip_prefix(prefix)?;
    if suffix.is_empty() || !suffix.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    suffix.parse().ok()
}
