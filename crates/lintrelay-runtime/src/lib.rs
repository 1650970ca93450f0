//! Reconciliation engine for lintrelay.
//! This crate discovers changed files, folds lint results, keeps the single
//! summary comment and check run current, and hands results from read-only
//! runs to the scheduler through the artifact store.

pub mod aggregator;
pub mod artifact_store;
pub mod change_set;
pub mod check_run;
pub mod config;
pub mod deferral;
pub mod error;
pub mod eslint_engine;
pub mod lint_engine;
pub mod pending_results;
pub mod persisted_state;
pub mod reconcile;
pub mod state_commit;
pub mod summary_comment;
pub mod summary_render;

#[cfg(test)]
mod test_support;

pub use aggregator::{
    aggregate, AggregatorOptions, Annotation, AnnotationLevel, Conclusion, ResultAggregator,
    RuleSummary, RunState,
};
pub use artifact_store::{
    ArtifactStore, ArtifactStoreError, FsArtifactStore, GithubArtifactStore, MemoryArtifactStore,
};
pub use change_set::{ChangeBatch, ChangeSetDiscovery, DiscoverySource, FileFilter};
pub use check_run::{CheckRunPublisher, CHECK_ANNOTATION_BATCH_SIZE};
pub use config::{
    EnvInputSource, EslintOptions, InputSource, MapInputSource, RelayConfig, SummaryMethod,
    SummaryType,
};
pub use deferral::{is_read_only, is_scheduler_active, should_defer_abort};
pub use error::{ConfigError, ReconcileError};
pub use eslint_engine::{parse_eslint_output, EslintCommandEngine, EslintEngineConfig};
pub use lint_engine::{
    FileLintReport, LintDiagnostic, LintEngine, LintEngineError, LintSeverity, LintSuggestion,
    RuleMetadata,
};
pub use pending_results::{enqueue_pending_results, PendingLintResults};
pub use persisted_state::{IssueState, LintCounts, StateKeys, WorkflowState};
pub use reconcile::{ReconcileRuntime, RunContext, RunOutcome};
pub use state_commit::{CommitOutcome, Tracked};
pub use summary_comment::{SummaryCommentLifecycle, SummaryOutcome, SummaryPolicy};
pub use summary_render::{render_summary_markdown, SummaryView, SUMMARY_MARKER};
