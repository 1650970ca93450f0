//! Write-privilege classification and the scheduler freshness guard.

use chrono::{DateTime, Duration, Utc};
use lintrelay_core::is_within_trailing_window;
use lintrelay_github::RunTrigger;

use crate::persisted_state::WorkflowState;

pub const SCHEDULER_FRESHNESS_HOURS: i64 = 24;

pub fn is_read_only(trigger: &RunTrigger) -> bool {
    trigger.is_read_only()
}

pub fn is_scheduler_active(workflow: &WorkflowState, now: DateTime<Utc>) -> bool {
    workflow.last_scheduler_run().is_some_and(|last_run| {
        is_within_trailing_window(last_run, now, Duration::hours(SCHEDULER_FRESHNESS_HOURS))
    })
}

/// A read-only run without a recent scheduler has nobody to drain its results.
pub fn should_defer_abort(
    trigger: &RunTrigger,
    workflow: &WorkflowState,
    now: DateTime<Utc>,
) -> bool {
    is_read_only(trigger) && !is_scheduler_active(workflow, now)
}
