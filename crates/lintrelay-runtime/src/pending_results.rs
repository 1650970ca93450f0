//! Outbox artifact a read-only run leaves for the scheduler to publish.

use serde::{Deserialize, Serialize};

use crate::aggregator::{Annotation, RunState};
use crate::artifact_store::ArtifactStore;
use crate::error::ReconcileError;
use crate::persisted_state::StateKeys;

pub const PENDING_RESULTS_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingLintResults {
    pub schema_version: u32,
    pub issue_number: u64,
    pub head_sha: String,
    /// RFC 3339 instant the read-only run finished linting.
    pub created_at: String,
    pub run_state: RunState,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
}

impl PendingLintResults {
    pub fn decode(key: &str, raw: &str) -> Result<Self, ReconcileError> {
        serde_json::from_str(raw).map_err(|source| ReconcileError::PendingDecode {
            key: key.to_string(),
            source,
        })
    }
}

/// Stores the results under the issue's pending key, replacing any earlier stash.
pub async fn enqueue_pending_results(
    store: &dyn ArtifactStore,
    keys: &StateKeys,
    results: &PendingLintResults,
) -> Result<String, ReconcileError> {
    let key = keys.pending_results_key(results.issue_number);
    let encoded =
        serde_json::to_string(results).map_err(|source| ReconcileError::PendingEncode {
            issue_number: results.issue_number,
            source,
        })?;
    store.write(&key, &encoded).await?;
    tracing::info!(key = %key, issue_number = results.issue_number, "pending lint results stored");
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::{enqueue_pending_results, PendingLintResults, PENDING_RESULTS_SCHEMA_VERSION};
    use crate::aggregator::RunState;
    use crate::artifact_store::{ArtifactStore, MemoryArtifactStore};
    use crate::error::ReconcileError;
    use crate::persisted_state::StateKeys;

    #[tokio::test]
    async fn functional_enqueue_writes_issue_scoped_pending_key() {
        let store = MemoryArtifactStore::new();
        let keys = StateKeys::new("issue-state", "lint-results", "Lint");
        let results = PendingLintResults {
            schema_version: PENDING_RESULTS_SCHEMA_VERSION,
            issue_number: 12,
            head_sha: "abc".to_string(),
            created_at: "2024-05-01T00:00:00Z".to_string(),
            run_state: RunState::default(),
            annotations: Vec::new(),
        };
        let key = enqueue_pending_results(&store, &keys, &results)
            .await
            .expect("enqueue");
        assert_eq!(key, "lint-results-Lint-12");
        let raw = store.read(&key).await.expect("read").expect("stored");
        assert_eq!(PendingLintResults::decode(&key, &raw).expect("decode"), results);
    }

    #[test]
    fn regression_decode_failure_names_the_artifact() {
        let error = PendingLintResults::decode("lint-results-Lint-3", "{").expect_err("bad json");
        assert!(matches!(
            error,
            ReconcileError::PendingDecode { ref key, .. } if key == "lint-results-Lint-3"
        ));
    }
}
