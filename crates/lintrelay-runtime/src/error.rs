use lintrelay_github::HostError;
use thiserror::Error;

use crate::artifact_store::ArtifactStoreError;
use crate::lint_engine::LintEngineError;

/// Fatal input problems, raised before any host interaction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("no result for input '{0}' and no default value was provided")]
    MissingInput(String),
    #[error("input of \"{value}\" for property \"{name}\" must be one of: \"{allowed}\"")]
    InvalidEnum {
        name: String,
        value: String,
        allowed: String,
    },
    #[error("invalid glob pattern '{pattern}': {message}")]
    InvalidGlob { pattern: String, message: String },
}

/// Failures that end a reconciliation run.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Configuration(#[from] ConfigError),
    #[error("change-set discovery failed")]
    Discovery(#[source] HostError),
    #[error(transparent)]
    Lint(#[from] LintEngineError),
    #[error(transparent)]
    Host(#[from] HostError),
    #[error(transparent)]
    StateStore(#[from] ArtifactStoreError),
    #[error("pending lint results '{key}' could not be decoded")]
    PendingDecode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode pending lint results for issue #{issue_number}")]
    PendingEncode {
        issue_number: u64,
        #[source]
        source: serde_json::Error,
    },
}
