//! Lint capability seam.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LintEngineError {
    #[error("failed to launch lint engine '{program}'")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("lint engine exited with status {status}: {stderr}")]
    Exit { status: String, stderr: String },
    #[error("lint engine timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
    #[error("failed to parse lint engine output: {0}")]
    Output(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LintSeverity {
    Off,
    Warning,
    Error,
}

impl LintSeverity {
    /// Maps ESLint's numeric levels; unknown values are treated as warnings.
    pub fn from_level(level: u8) -> Self {
        match level {
            0 => Self::Off,
            2 => Self::Error,
            _ => Self::Warning,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LintSuggestion {
    pub desc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fix_text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LintDiagnostic {
    pub line: u64,
    pub severity: LintSeverity,
    pub rule_id: Option<String>,
    pub message: String,
    pub message_id: Option<String>,
    pub suggestions: Vec<LintSuggestion>,
}

/// Lint outcome for one file, with the engine's own per-file counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileLintReport {
    pub file_path: String,
    pub error_count: u64,
    pub warning_count: u64,
    pub fixable_error_count: u64,
    pub fixable_warning_count: u64,
    pub diagnostics: Vec<LintDiagnostic>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleMetadata {
    pub description: Option<String>,
    pub url: Option<String>,
}

#[async_trait]
pub trait LintEngine: Send + Sync {
    async fn lint_files(&self, paths: &[String]) -> Result<Vec<FileLintReport>, LintEngineError>;

    /// Documentation for a rule the engine has reported on, when known.
    fn rule_metadata(&self, rule_id: &str) -> Option<RuleMetadata>;
}
