//! Run dispatch: lint, stash, drain and cleanup flows over the host, store and lint seams.

use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use lintrelay_github::{PullRequestAction, RunTrigger, SourceHost};

use crate::aggregator::{AggregatorOptions, Annotation, Conclusion, ResultAggregator, RunState};
use crate::artifact_store::ArtifactStore;
use crate::change_set::{ChangeSetDiscovery, DiscoverySource, FileFilter};
use crate::check_run::CheckRunPublisher;
use crate::config::RelayConfig;
use crate::deferral::{is_read_only, should_defer_abort};
use crate::error::ReconcileError;
use crate::lint_engine::LintEngine;
use crate::pending_results::{
    enqueue_pending_results, PendingLintResults, PENDING_RESULTS_SCHEMA_VERSION,
};
use crate::persisted_state::{IssueState, StateKeys, WorkflowState};
use crate::state_commit::{load_issue_document, load_workflow_state, Tracked};
use crate::summary_comment::{SummaryCommentLifecycle, SummaryOutcome, SummaryPolicy};
use crate::summary_render::{render_summary_markdown, SummaryView};

/// Facts about the current execution decided once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext {
    pub trigger: RunTrigger,
    pub workflow_name: String,
    /// Absolute checkout path stripped from reported file paths.
    pub workspace_root: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Read-only run with no recent scheduler; nothing was done.
    Deferred,
    Stashed {
        issue_number: u64,
        key: String,
    },
    Linted {
        issue_number: Option<u64>,
        files: usize,
        conclusion: Conclusion,
        summary: Option<SummaryOutcome>,
    },
    Drained {
        applied: usize,
        failed: usize,
    },
    CleanedUp {
        issue_number: u64,
        deleted: usize,
    },
}

struct LintPass {
    files: usize,
    state: RunState,
    annotations: Vec<Annotation>,
}

pub struct ReconcileRuntime {
    config: RelayConfig,
    filter: FileFilter,
    keys: StateKeys,
    context: RunContext,
    host: Arc<dyn SourceHost>,
    store: Arc<dyn ArtifactStore>,
    engine: Arc<dyn LintEngine>,
}

impl ReconcileRuntime {
    pub fn new(
        config: RelayConfig,
        context: RunContext,
        host: Arc<dyn SourceHost>,
        store: Arc<dyn ArtifactStore>,
        engine: Arc<dyn LintEngine>,
    ) -> Result<Self, ReconcileError> {
        let filter =
            FileFilter::new(&config.extensions, &config.include_glob, &config.ignore_glob)?;
        let keys = StateKeys::new(
            config.state_namespace.clone(),
            config.results_namespace.clone(),
            context.workflow_name.clone(),
        );
        Ok(Self {
            config,
            filter,
            keys,
            context,
            host,
            store,
            engine,
        })
    }

    pub fn keys(&self) -> &StateKeys {
        &self.keys
    }

    pub async fn run(&self, now: DateTime<Utc>) -> Result<RunOutcome, ReconcileError> {
        match &self.context.trigger {
            RunTrigger::Schedule => self.run_scheduler(now).await,
            RunTrigger::PullRequest(pull_request)
                if pull_request.action == PullRequestAction::Closed =>
            {
                self.cleanup_issue(pull_request.number).await
            }
            trigger => self.run_lint(trigger, now).await,
        }
    }

    async fn run_lint(
        &self,
        trigger: &RunTrigger,
        now: DateTime<Utc>,
    ) -> Result<RunOutcome, ReconcileError> {
        let store = self.store.as_ref();
        let mut workflow = Tracked::new(
            self.keys.workflow_key(),
            load_workflow_state(store, &self.keys.workflow_key()).await,
        );
        if should_defer_abort(trigger, workflow.get(), now) {
            tracing::warn!("read-only run and no scheduler run in the last day; not linting");
            return Ok(RunOutcome::Deferred);
        }

        let issue_number = trigger.issue_number();
        let head_sha = trigger.sha().map(ToOwned::to_owned);
        if is_read_only(trigger) {
            return self.stash(issue_number, head_sha, now).await;
        }

        let mut issue = match issue_number {
            Some(number) => {
                let key = self.keys.issue_key(number);
                let document = load_issue_document(store, &key).await;
                workflow.get_mut().adopt_legacy_user_id(document.legacy_user_id);
                Some(Tracked::new(key, document.state))
            }
            None => None,
        };

        let publisher = CheckRunPublisher::new(self.host.as_ref(), &self.config.check_name);
        let check_id = match head_sha.as_deref() {
            Some(sha) => Some(publisher.start(sha, now).await?),
            None => None,
        };

        let pass = match self.lint_pass(issue_number, head_sha.as_deref()).await {
            Ok(pass) => pass,
            Err(error) => {
                if let Some(check_id) = check_id {
                    let message = error.to_string();
                    if let Err(fail_error) = publisher.fail(check_id, &message, now).await {
                        tracing::warn!(check_id, error = %fail_error, "failed to close check run");
                    }
                }
                return Err(error);
            }
        };
        let mut state = pass.state;
        state.check_id = check_id;

        let view = SummaryView::from_config(&self.config, head_sha.as_deref());
        let body = render_summary_markdown(&state, &view);
        if let Some(check_id) = check_id {
            publisher
                .complete(check_id, &state, &pass.annotations, &body, now)
                .await?;
        }

        let mut summary = None;
        if let (Some(number), Some(issue)) = (issue_number, issue.as_mut()) {
            summary = Some(
                self.publish_issue_state(number, &state, &body, issue.get_mut(), workflow.get_mut())
                    .await?,
            );
            issue.commit(store).await;
        }
        workflow.commit(store).await;

        Ok(RunOutcome::Linted {
            issue_number,
            files: pass.files,
            conclusion: state.conclusion,
            summary,
        })
    }

    async fn publish_issue_state(
        &self,
        issue_number: u64,
        state: &RunState,
        body: &str,
        issue: &mut IssueState,
        workflow: &mut WorkflowState,
    ) -> Result<SummaryOutcome, ReconcileError> {
        let policy = SummaryPolicy::from_config(&self.config);
        let lifecycle = SummaryCommentLifecycle::new(self.host.as_ref(), policy);
        let outcome = lifecycle
            .reconcile(issue_number, &state.counts, body, issue, workflow)
            .await?;
        issue.counts = state.counts;
        issue.check_id = state.check_id;
        Ok(outcome)
    }

    async fn lint_pass(
        &self,
        issue_number: Option<u64>,
        head_sha: Option<&str>,
    ) -> Result<LintPass, ReconcileError> {
        let source = match (issue_number, head_sha) {
            (Some(number), _) => DiscoverySource::PullRequest { number },
            (None, Some(sha)) => DiscoverySource::Commit {
                sha: sha.to_string(),
            },
            (None, None) => {
                tracing::warn!("run has neither an issue nor a commit; nothing to lint");
                return Ok(LintPass {
                    files: 0,
                    state: RunState::default(),
                    annotations: Vec::new(),
                });
            }
        };

        let mut discovery = ChangeSetDiscovery::new(self.host.as_ref(), &self.filter, source);
        let mut aggregator = ResultAggregator::new(
            self.engine.as_ref(),
            AggregatorOptions::from_config(&self.config),
            self.context.workspace_root.as_deref(),
        );
        let mut files = 0;
        while let Some(batch) = discovery
            .next_batch()
            .await
            .map_err(ReconcileError::Discovery)?
        {
            if batch.files.is_empty() {
                continue;
            }
            files += batch.files.len();
            let reports = self.engine.lint_files(&batch.files).await?;
            let added = aggregator.fold_reports(&reports);
            tracing::debug!(files = batch.files.len(), annotations = added, "linted batch");
        }
        let (state, annotations) = aggregator.finish();
        tracing::info!(
            files,
            errors = state.counts.error_count,
            warnings = state.counts.warning_count,
            "lint pass finished"
        );
        Ok(LintPass {
            files,
            state,
            annotations,
        })
    }

    /// Read-only run: lint, then leave the results for the scheduler.
    async fn stash(
        &self,
        issue_number: Option<u64>,
        head_sha: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<RunOutcome, ReconcileError> {
        let (Some(issue_number), Some(head_sha)) = (issue_number, head_sha) else {
            tracing::warn!("read-only run without a pull request; nothing to stash");
            return Ok(RunOutcome::Deferred);
        };
        let pass = self.lint_pass(Some(issue_number), Some(&head_sha)).await?;
        let pending = PendingLintResults {
            schema_version: PENDING_RESULTS_SCHEMA_VERSION,
            issue_number,
            head_sha,
            created_at: now.to_rfc3339_opts(SecondsFormat::Millis, true),
            run_state: pass.state,
            annotations: pass.annotations,
        };
        let key = enqueue_pending_results(self.store.as_ref(), &self.keys, &pending).await?;
        Ok(RunOutcome::Stashed { issue_number, key })
    }

    /// Scheduler run: the single consumer of pending results.
    async fn run_scheduler(&self, now: DateTime<Utc>) -> Result<RunOutcome, ReconcileError> {
        let store = self.store.as_ref();
        let mut workflow = Tracked::new(
            self.keys.workflow_key(),
            load_workflow_state(store, &self.keys.workflow_key()).await,
        );

        match self.host.list_workflows().await {
            Ok(workflows) => {
                match workflows
                    .iter()
                    .find(|workflow| workflow.name == self.context.workflow_name)
                {
                    Some(current) => {
                        tracing::info!(
                            workflow_id = current.id,
                            path = %current.path,
                            "scheduler run"
                        );
                        workflow.get_mut().workflow_id = Some(current.id);
                    }
                    None => tracing::warn!(
                        workflow = %self.context.workflow_name,
                        "current workflow not found in repository listing"
                    ),
                }
            }
            Err(error) => tracing::warn!(error = %error, "failed to list workflows"),
        }

        let pending_keys = match store.list(&self.keys.pending_results_prefix()).await {
            Ok(keys) => keys,
            Err(error) => {
                tracing::warn!(error = %error, "failed to list pending lint results");
                Vec::new()
            }
        };

        let mut applied = 0;
        let mut failed = 0;
        for key in pending_keys {
            if self.keys.pending_issue_number(&key).is_none() {
                tracing::debug!(key = %key, "skipping artifact outside the pending namespace");
                continue;
            }
            match self.drain_one(&key, workflow.get_mut(), now).await {
                Ok(true) => applied += 1,
                Ok(false) => {}
                Err(error) => {
                    failed += 1;
                    tracing::error!(
                        key = %key,
                        error = %error,
                        "failed to apply pending lint results"
                    );
                }
            }
        }

        workflow.get_mut().stamp_scheduler_run(now);
        workflow.commit(store).await;
        tracing::info!(applied, failed, "scheduler drain finished");
        Ok(RunOutcome::Drained { applied, failed })
    }

    async fn drain_one(
        &self,
        key: &str,
        workflow: &mut WorkflowState,
        now: DateTime<Utc>,
    ) -> Result<bool, ReconcileError> {
        let store = self.store.as_ref();
        let Some(raw) = store.read(key).await? else {
            return Ok(false);
        };
        let pending = PendingLintResults::decode(key, &raw)?;
        self.apply_pending(&pending, workflow, now).await?;
        match store.delete(key).await {
            Ok(_) => {}
            Err(error) => {
                tracing::warn!(key = %key, error = %error, "failed to delete drained results")
            }
        }
        Ok(true)
    }

    async fn apply_pending(
        &self,
        pending: &PendingLintResults,
        workflow: &mut WorkflowState,
        now: DateTime<Utc>,
    ) -> Result<(), ReconcileError> {
        let store = self.store.as_ref();
        let issue_number = pending.issue_number;
        let key = self.keys.issue_key(issue_number);
        let document = load_issue_document(store, &key).await;
        workflow.adopt_legacy_user_id(document.legacy_user_id);
        let mut issue = Tracked::new(key, document.state);

        let mut state = pending.run_state.clone();
        let publisher = CheckRunPublisher::new(self.host.as_ref(), &self.config.check_name);
        let check_id = publisher.start(&pending.head_sha, now).await?;
        state.check_id = Some(check_id);

        let view = SummaryView::from_config(&self.config, Some(&pending.head_sha));
        let body = render_summary_markdown(&state, &view);
        publisher
            .complete(check_id, &state, &pending.annotations, &body, now)
            .await?;
        self.publish_issue_state(issue_number, &state, &body, issue.get_mut(), workflow)
            .await?;
        issue.commit(store).await;
        tracing::info!(issue_number, "pending lint results published");
        Ok(())
    }

    /// Closed pull request: drop every artifact scoped to the issue.
    async fn cleanup_issue(&self, issue_number: u64) -> Result<RunOutcome, ReconcileError> {
        let store = self.store.as_ref();
        let mut keys = store.list(&self.keys.issue_prefix()).await?;
        keys.extend(store.list(&self.keys.pending_results_prefix()).await?);

        let mut deleted = 0;
        for key in keys
            .iter()
            .filter(|key| self.keys.is_issue_scoped(key, issue_number))
        {
            match store.delete(key).await {
                Ok(true) => deleted += 1,
                Ok(false) => {}
                Err(error) => {
                    tracing::warn!(key = %key, error = %error, "failed to delete artifact")
                }
            }
        }
        tracing::info!(issue_number, deleted, "issue artifacts cleaned up");
        Ok(RunOutcome::CleanedUp {
            issue_number,
            deleted,
        })
    }
}
