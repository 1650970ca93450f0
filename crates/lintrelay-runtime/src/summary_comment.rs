//! Lifecycle of the single summary comment kept on each issue.

use futures_util::future::try_join_all;
use lintrelay_github::{HostError, SourceHost};

use crate::config::{RelayConfig, SummaryMethod};
use crate::persisted_state::{IssueState, LintCounts, WorkflowState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryOutcome {
    /// Issue summaries are switched off.
    Disabled,
    /// Nothing to post and nothing to retract.
    Skipped,
    Created { comment_id: u64 },
    Updated { comment_id: u64 },
    Removed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SummaryPolicy {
    pub enabled: bool,
    pub method: SummaryMethod,
    pub only_on_event: bool,
}

impl SummaryPolicy {
    pub fn from_config(config: &RelayConfig) -> Self {
        Self {
            enabled: config.issue_summary,
            method: config.summary_method,
            only_on_event: config.summary_only_on_event,
        }
    }

    pub fn should_post(&self, counts: &LintCounts) -> bool {
        !self.only_on_event || counts.has_findings()
    }
}

pub struct SummaryCommentLifecycle<'a> {
    host: &'a dyn SourceHost,
    policy: SummaryPolicy,
}

async fn delete_comment_if_present(
    host: &dyn SourceHost,
    comment_id: u64,
) -> Result<(), HostError> {
    match host.delete_issue_comment(comment_id).await {
        Ok(()) => Ok(()),
        Err(error) if error.is_not_found() => {
            tracing::debug!(comment_id, "summary comment already gone");
            Ok(())
        }
        Err(error) => Err(error),
    }
}

impl<'a> SummaryCommentLifecycle<'a> {
    pub fn new(host: &'a dyn SourceHost, policy: SummaryPolicy) -> Self {
        Self { host, policy }
    }

    /// Drives the comment toward `counts`, mutating `issue` and `workflow` to match.
    pub async fn reconcile(
        &self,
        issue_number: u64,
        counts: &LintCounts,
        body: &str,
        issue: &mut IssueState,
        workflow: &mut WorkflowState,
    ) -> Result<SummaryOutcome, HostError> {
        if !self.policy.enabled {
            return Ok(SummaryOutcome::Disabled);
        }

        if !self.policy.should_post(counts) {
            if self.policy.only_on_event && issue.issue.summary_id.is_some() {
                self.remove(issue_number, issue, workflow).await?;
                return Ok(SummaryOutcome::Removed);
            }
            return Ok(SummaryOutcome::Skipped);
        }

        if let Some(comment_id) = issue.issue.summary_id {
            match self.policy.method {
                SummaryMethod::Edit => match self
                    .host
                    .update_issue_comment(comment_id, body)
                    .await
                {
                    Ok(comment) => {
                        if workflow.user_id.is_none() {
                            workflow.user_id = comment.author_id;
                        }
                        tracing::info!(issue_number, comment_id, "summary comment updated");
                        return Ok(SummaryOutcome::Updated { comment_id });
                    }
                    Err(error) => {
                        tracing::warn!(
                            issue_number,
                            comment_id,
                            error = %error,
                            "summary comment could not be updated; posting a new one"
                        );
                        issue.issue.summary_id = None;
                    }
                },
                SummaryMethod::Refresh => self.remove(issue_number, issue, workflow).await?,
            }
        }

        let comment = self.host.create_issue_comment(issue_number, body).await?;
        issue.issue.summary_id = Some(comment.id);
        if comment.author_id.is_some() {
            workflow.user_id = comment.author_id;
        }
        tracing::info!(issue_number, comment_id = comment.id, "summary comment created");
        Ok(SummaryOutcome::Created {
            comment_id: comment.id,
        })
    }

    /// Removes the summary; with a known bot identity every comment it authored goes.
    pub async fn remove(
        &self,
        issue_number: u64,
        issue: &mut IssueState,
        workflow: &WorkflowState,
    ) -> Result<(), HostError> {
        if let Some(user_id) = workflow.user_id {
            let comments = self.host.list_issue_comments(issue_number).await?;
            let owned = comments
                .iter()
                .filter(|comment| comment.author_id == Some(user_id))
                .map(|comment| delete_comment_if_present(self.host, comment.id))
                .collect::<Vec<_>>();
            tracing::debug!(issue_number, user_id, count = owned.len(), "removing bot comments");
            try_join_all(owned).await?;
        } else if let Some(comment_id) = issue.issue.summary_id {
            delete_comment_if_present(self.host, comment_id).await?;
        }
        issue.issue.summary_id = None;
        Ok(())
    }
}
