//! `LintEngine` backed by the ESLint command line.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;

use crate::config::EslintOptions;
use crate::lint_engine::{
    FileLintReport, LintDiagnostic, LintEngine, LintEngineError, LintSeverity, LintSuggestion,
    RuleMetadata,
};

const MAX_STDERR_CHARS: usize = 2_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EslintEngineConfig {
    pub executable: String,
    pub extra_args: Vec<String>,
    pub working_dir: Option<PathBuf>,
    pub timeout_ms: u64,
    pub options: EslintOptions,
}

#[derive(Debug)]
pub struct EslintCommandEngine {
    config: EslintEngineConfig,
    rules_meta: Mutex<HashMap<String, RuleMetadata>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EslintSuggestionFix {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EslintSuggestion {
    #[serde(default)]
    desc: String,
    #[serde(default)]
    fix: Option<EslintSuggestionFix>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EslintMessage {
    #[serde(default)]
    rule_id: Option<String>,
    #[serde(default)]
    severity: u8,
    #[serde(default)]
    message: String,
    #[serde(default)]
    line: Option<u64>,
    #[serde(default)]
    message_id: Option<String>,
    #[serde(default)]
    suggestions: Vec<EslintSuggestion>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EslintFileResult {
    file_path: String,
    #[serde(default)]
    messages: Vec<EslintMessage>,
    #[serde(default)]
    error_count: u64,
    #[serde(default)]
    warning_count: u64,
    #[serde(default)]
    fixable_error_count: u64,
    #[serde(default)]
    fixable_warning_count: u64,
}

#[derive(Debug, Default, Deserialize)]
struct EslintRuleDocs {
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct EslintRuleMeta {
    #[serde(default)]
    docs: Option<EslintRuleDocs>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EslintMetadata {
    #[serde(default)]
    rules_meta: HashMap<String, EslintRuleMeta>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EslintOutput {
    WithMetadata {
        results: Vec<EslintFileResult>,
        #[serde(default)]
        metadata: EslintMetadata,
    },
    Plain(Vec<EslintFileResult>),
}

/// Parsed ESLint output: per-file reports and any rule documentation it carried.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ParsedEslintOutput {
    pub reports: Vec<FileLintReport>,
    pub rules: HashMap<String, RuleMetadata>,
}

/// Accepts both `json-with-metadata` and plain `json` formatter output.
pub fn parse_eslint_output(stdout: &str) -> Result<ParsedEslintOutput, LintEngineError> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Ok(ParsedEslintOutput::default());
    }
    let output = serde_json::from_str::<EslintOutput>(trimmed)
        .map_err(|error| LintEngineError::Output(error.to_string()))?;
    let (results, metadata) = match output {
        EslintOutput::WithMetadata { results, metadata } => (results, metadata),
        EslintOutput::Plain(results) => (results, EslintMetadata::default()),
    };

    let reports = results
        .into_iter()
        .map(|result| FileLintReport {
            file_path: result.file_path,
            error_count: result.error_count,
            warning_count: result.warning_count,
            fixable_error_count: result.fixable_error_count,
            fixable_warning_count: result.fixable_warning_count,
            diagnostics: result
                .messages
                .into_iter()
                .map(|message| LintDiagnostic {
                    line: message.line.unwrap_or(1),
                    severity: LintSeverity::from_level(message.severity),
                    rule_id: message.rule_id,
                    message: message.message,
                    message_id: message.message_id,
                    suggestions: message
                        .suggestions
                        .into_iter()
                        .map(|suggestion| LintSuggestion {
                            desc: suggestion.desc,
                            fix_text: suggestion.fix.and_then(|fix| fix.text),
                        })
                        .collect(),
                })
                .collect(),
        })
        .collect();

    let rules = metadata
        .rules_meta
        .into_iter()
        .filter_map(|(rule_id, meta)| {
            meta.docs.map(|docs| {
                (
                    rule_id,
                    RuleMetadata {
                        description: docs.description,
                        url: docs.url,
                    },
                )
            })
        })
        .collect();
    Ok(ParsedEslintOutput { reports, rules })
}

impl EslintCommandEngine {
    pub fn new(config: EslintEngineConfig) -> Self {
        Self {
            config,
            rules_meta: Mutex::new(HashMap::new()),
        }
    }

    pub fn command_args(&self, paths: &[String]) -> Vec<String> {
        let options = &self.config.options;
        let mut args = self.config.extra_args.clone();
        args.push("--format".to_string());
        args.push("json-with-metadata".to_string());
        if let Some(config_file) = options.config_file.as_deref() {
            args.push("--config".to_string());
            args.push(config_file.to_string());
        }
        if let Some(ignore_path) = options.ignore_path.as_deref() {
            args.push("--ignore-path".to_string());
            args.push(ignore_path.to_string());
        }
        for rule_path in options.rule_paths.iter().filter(|path| !path.is_empty()) {
            args.push("--rulesdir".to_string());
            args.push(rule_path.clone());
        }
        if !options.use_eslintrc {
            args.push("--no-eslintrc".to_string());
        }
        if !options.use_eslint_ignore {
            args.push("--no-ignore".to_string());
        }
        if !options.error_on_unmatched_pattern {
            args.push("--no-error-on-unmatched-pattern".to_string());
        }
        args.push("--".to_string());
        args.extend(paths.iter().cloned());
        args
    }

    fn remember_rules(&self, rules: HashMap<String, RuleMetadata>) {
        if let Ok(mut cache) = self.rules_meta.lock() {
            cache.extend(rules);
        }
    }
}

#[async_trait]
impl LintEngine for EslintCommandEngine {
    async fn lint_files(&self, paths: &[String]) -> Result<Vec<FileLintReport>, LintEngineError> {
        if paths.is_empty() {
            return Ok(Vec::new());
        }
        let mut command = Command::new(self.config.executable.trim());
        command.kill_on_drop(true);
        command.args(self.command_args(paths));
        if let Some(dir) = self.config.working_dir.as_ref() {
            command.current_dir(dir);
        }
        command.stdin(Stdio::null());
        command.stdout(Stdio::piped());
        command.stderr(Stdio::piped());
        let child = command.spawn().map_err(|source| LintEngineError::Launch {
            program: self.config.executable.clone(),
            source,
        })?;

        let output = tokio::time::timeout(
            Duration::from_millis(self.config.timeout_ms.max(1)),
            child.wait_with_output(),
        )
        .await
        .map_err(|_| LintEngineError::Timeout {
            timeout_ms: self.config.timeout_ms,
        })?
        .map_err(|source| LintEngineError::Launch {
            program: self.config.executable.clone(),
            source,
        })?;

        // ESLint exits 1 when it found problems and 2 on fatal errors.
        match output.status.code() {
            Some(0) | Some(1) => {}
            code => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                return Err(LintEngineError::Exit {
                    status: code
                        .map(|value| value.to_string())
                        .unwrap_or_else(|| "signal".to_string()),
                    stderr: stderr.trim().chars().take(MAX_STDERR_CHARS).collect(),
                });
            }
        }

        let parsed = parse_eslint_output(&String::from_utf8_lossy(&output.stdout))?;
        tracing::debug!(files = parsed.reports.len(), "eslint batch finished");
        self.remember_rules(parsed.rules);
        Ok(parsed.reports)
    }

    fn rule_metadata(&self, rule_id: &str) -> Option<RuleMetadata> {
        self.rules_meta
            .lock()
            .ok()
            .and_then(|cache| cache.get(rule_id).cloned())
    }
}
