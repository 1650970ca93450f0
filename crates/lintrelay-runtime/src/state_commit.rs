//! Snapshot tracking and write-on-change commit of persisted documents.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::artifact_store::ArtifactStore;
use crate::persisted_state::{decode_issue_document, IssueDocument, WorkflowState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Unchanged,
    Written,
    Failed,
}

/// A document paired with the image read at the start of the run.
#[derive(Debug, Clone)]
pub struct Tracked<T> {
    key: String,
    before: T,
    current: T,
}

impl<T: Clone + PartialEq + Serialize> Tracked<T> {
    pub fn new(key: impl Into<String>, loaded: T) -> Self {
        Self {
            key: key.into(),
            before: loaded.clone(),
            current: loaded,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn get(&self) -> &T {
        &self.current
    }

    pub fn get_mut(&mut self) -> &mut T {
        &mut self.current
    }

    pub fn is_dirty(&self) -> bool {
        self.before != self.current
    }

    /// Writes the document only when it differs from the loaded image.
    ///
    /// Write failures are logged and left for the next run; they do not fail this one.
    pub async fn commit(&mut self, store: &dyn ArtifactStore) -> CommitOutcome {
        if !self.is_dirty() {
            tracing::debug!(key = %self.key, "state unchanged; skipping write");
            return CommitOutcome::Unchanged;
        }
        let encoded = match serde_json::to_string(&self.current) {
            Ok(encoded) => encoded,
            Err(error) => {
                tracing::error!(key = %self.key, error = %error, "failed to encode state");
                return CommitOutcome::Failed;
            }
        };
        match store.write(&self.key, &encoded).await {
            Ok(()) => {
                tracing::debug!(key = %self.key, "state written");
                self.before = self.current.clone();
                CommitOutcome::Written
            }
            Err(error) => {
                tracing::error!(key = %self.key, error = %error, "failed to write state");
                CommitOutcome::Failed
            }
        }
    }
}

async fn read_or_default<T, F>(store: &dyn ArtifactStore, key: &str, decode: F) -> T
where
    T: Default,
    F: FnOnce(&str) -> Result<T, serde_json::Error>,
{
    let raw = match store.read(key).await {
        Ok(Some(raw)) => raw,
        Ok(None) => return T::default(),
        Err(error) => {
            tracing::warn!(key = %key, error = %error, "failed to read state; using defaults");
            return T::default();
        }
    };
    match decode(&raw) {
        Ok(value) => value,
        Err(error) => {
            tracing::warn!(key = %key, error = %error, "failed to decode state; using defaults");
            T::default()
        }
    }
}

async fn load_json<T: DeserializeOwned + Default>(store: &dyn ArtifactStore, key: &str) -> T {
    read_or_default(store, key, |raw| serde_json::from_str(raw)).await
}

pub async fn load_workflow_state(store: &dyn ArtifactStore, key: &str) -> WorkflowState {
    load_json(store, key).await
}

pub async fn load_issue_document(store: &dyn ArtifactStore, key: &str) -> IssueDocument {
    read_or_default(store, key, decode_issue_document).await
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::{load_issue_document, load_workflow_state, CommitOutcome, Tracked};
    use crate::artifact_store::{ArtifactStore, ArtifactStoreError, MemoryArtifactStore};
    use crate::persisted_state::{IssueState, WorkflowState};

    struct BrokenStore;

    #[async_trait]
    impl ArtifactStore for BrokenStore {
        async fn read(&self, key: &str) -> Result<Option<String>, ArtifactStoreError> {
            Err(ArtifactStoreError::Write {
                key: key.to_string(),
                message: "unavailable".to_string(),
            })
        }

        async fn write(&self, key: &str, _contents: &str) -> Result<(), ArtifactStoreError> {
            Err(ArtifactStoreError::Write {
                key: key.to_string(),
                message: "unavailable".to_string(),
            })
        }

        async fn list(&self, _prefix: &str) -> Result<Vec<String>, ArtifactStoreError> {
            Ok(Vec::new())
        }

        async fn delete(&self, _key: &str) -> Result<bool, ArtifactStoreError> {
            Ok(false)
        }
    }

    #[tokio::test]
    async fn functional_commit_skips_structurally_equal_documents() {
        let store = MemoryArtifactStore::new();
        let mut workflow = Tracked::new("issue-state-lint", WorkflowState::default());
        let mut issue = Tracked::new("issue-state-lint-1", IssueState::default());
        issue.get_mut().counts.error_count = 0;

        assert_eq!(workflow.commit(&store).await, CommitOutcome::Unchanged);
        assert_eq!(issue.commit(&store).await, CommitOutcome::Unchanged);
        assert!(store.write_log().is_empty());
    }

    #[tokio::test]
    async fn functional_single_counter_change_writes_issue_state_once() {
        let store = MemoryArtifactStore::new();
        let mut workflow = Tracked::new("issue-state-lint", WorkflowState::default());
        let mut issue = Tracked::new("issue-state-lint-1", IssueState::default());
        issue.get_mut().counts.error_count = 1;

        assert_eq!(workflow.commit(&store).await, CommitOutcome::Unchanged);
        assert_eq!(issue.commit(&store).await, CommitOutcome::Written);
        assert_eq!(issue.commit(&store).await, CommitOutcome::Unchanged);
        assert_eq!(store.writes_to("issue-state-lint-1"), 1);
        assert_eq!(store.writes_to("issue-state-lint"), 0);
    }

    #[tokio::test]
    async fn regression_commit_failure_is_reported_not_raised() {
        let mut issue = Tracked::new("issue-state-lint-1", IssueState::default());
        issue.get_mut().check_id = Some(4);
        assert_eq!(issue.commit(&BrokenStore).await, CommitOutcome::Failed);
        assert!(issue.is_dirty());
    }

    #[tokio::test]
    async fn regression_unreadable_state_falls_back_to_defaults() {
        assert_eq!(
            load_workflow_state(&BrokenStore, "issue-state-lint").await,
            WorkflowState::default()
        );

        let store = MemoryArtifactStore::new();
        store
            .write("issue-state-lint-1", "not json")
            .await
            .expect("write");
        let document = load_issue_document(&store, "issue-state-lint-1").await;
        assert_eq!(document.state, IssueState::default());
        assert_eq!(document.legacy_user_id, None);
    }

    #[tokio::test]
    async fn functional_load_workflow_state_decodes_stored_document() {
        let store = MemoryArtifactStore::new();
        store
            .write(
                "issue-state-lint",
                r#"{"userId":7,"scheduler":{"lastRunAt":"2024-05-01T00:00:00.000Z"}}"#,
            )
            .await
            .expect("write");
        let state = load_workflow_state(&store, "issue-state-lint").await;
        assert_eq!(state.user_id, Some(7));
        assert!(state.last_scheduler_run().is_some());
    }
}
