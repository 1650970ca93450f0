//! Action input resolution with required-or-default semantics.

use std::collections::HashMap;

use crate::error::ConfigError;

pub const DEFAULT_STATE_NAMESPACE: &str = "issue-state";
pub const DEFAULT_RESULTS_NAMESPACE: &str = "lint-results";
pub const DEFAULT_CHECK_NAME: &str = "lintrelay";
const DEFAULT_EXTENSIONS: [&str; 4] = [".js", ".jsx", ".ts", ".tsx"];

/// Source of raw, named action inputs.
pub trait InputSource {
    fn raw_input(&self, name: &str) -> Option<String>;
}

/// Reads inputs the way the Actions runner exposes them: `INPUT_<NAME>`.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvInputSource;

impl EnvInputSource {
    pub fn variable_name(name: &str) -> String {
        format!("INPUT_{}", name.replace(' ', "_").to_ascii_uppercase())
    }
}

impl InputSource for EnvInputSource {
    fn raw_input(&self, name: &str) -> Option<String> {
        std::env::var(Self::variable_name(name)).ok()
    }
}

#[derive(Debug, Default, Clone)]
pub struct MapInputSource {
    values: HashMap<String, String>,
}

impl MapInputSource {
    pub fn new<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self {
            values: pairs
                .into_iter()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect(),
        }
    }
}

impl InputSource for MapInputSource {
    fn raw_input(&self, name: &str) -> Option<String> {
        self.values.get(name).cloned()
    }
}

fn non_empty_input(source: &dyn InputSource, name: &str) -> Option<String> {
    source
        .raw_input(name)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Returns the input, the default when unset, or `MissingInput` when neither exists.
pub fn input_string(
    source: &dyn InputSource,
    name: &str,
    default: Option<&str>,
) -> Result<String, ConfigError> {
    match (non_empty_input(source, name), default) {
        (Some(value), _) => Ok(value),
        (None, Some(default)) => Ok(default.to_string()),
        (None, None) => Err(ConfigError::MissingInput(name.to_string())),
    }
}

pub fn input_optional(source: &dyn InputSource, name: &str) -> Option<String> {
    non_empty_input(source, name)
}

/// Comma separated list, each entry trimmed.
pub fn input_list(
    source: &dyn InputSource,
    name: &str,
    default: Option<&[&str]>,
) -> Result<Vec<String>, ConfigError> {
    match (non_empty_input(source, name), default) {
        (Some(value), _) => Ok(value
            .split(',')
            .map(|entry| entry.trim().to_string())
            .collect()),
        (None, Some(default)) => Ok(default.iter().map(|entry| entry.to_string()).collect()),
        (None, None) => Err(ConfigError::MissingInput(name.to_string())),
    }
}

/// Only the literals `true`/`false` are honoured; anything else falls back to the default.
pub fn input_bool(
    source: &dyn InputSource,
    name: &str,
    default: Option<bool>,
) -> Result<bool, ConfigError> {
    match non_empty_input(source, name).as_deref() {
        Some("true") => Ok(true),
        Some("false") => Ok(false),
        _ => default.ok_or_else(|| ConfigError::MissingInput(name.to_string())),
    }
}

pub fn input_enum(
    source: &dyn InputSource,
    name: &str,
    allowed: &[&str],
    default: Option<&str>,
) -> Result<String, ConfigError> {
    let Some(value) = non_empty_input(source, name) else {
        return default
            .map(ToOwned::to_owned)
            .ok_or_else(|| ConfigError::MissingInput(name.to_string()));
    };
    if !allowed.contains(&value.as_str()) {
        return Err(ConfigError::InvalidEnum {
            name: name.to_string(),
            value,
            allowed: allowed.join(", "),
        });
    }
    Ok(value)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryMethod {
    Edit,
    Refresh,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryType {
    Full,
    Compact,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EslintOptions {
    pub config_file: Option<String>,
    pub ignore_path: Option<String>,
    pub rule_paths: Vec<String>,
    pub use_eslintrc: bool,
    pub use_eslint_ignore: bool,
    pub error_on_unmatched_pattern: bool,
}

/// Typed run configuration resolved from action inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    pub issue_summary: bool,
    pub summary_method: SummaryMethod,
    pub summary_type: SummaryType,
    pub summary_only_on_event: bool,
    pub include_glob: Vec<String>,
    pub ignore_glob: Vec<String>,
    pub extensions: Vec<String>,
    pub report_warnings_as_errors: bool,
    pub report_ignored_files: bool,
    pub report_suggestions: bool,
    pub report_warnings: bool,
    pub eslint: EslintOptions,
    pub state_namespace: String,
    pub results_namespace: String,
    pub check_name: String,
}

impl RelayConfig {
    pub fn from_inputs(source: &dyn InputSource) -> Result<Self, ConfigError> {
        let summary_method =
            match input_enum(source, "issueSummaryMethod", &["edit", "refresh"], Some("edit"))?
                .as_str()
            {
                "refresh" => SummaryMethod::Refresh,
                _ => SummaryMethod::Edit,
            };
        let summary_type =
            match input_enum(source, "issueSummaryType", &["full", "compact"], Some("compact"))?
                .as_str()
            {
                "full" => SummaryType::Full,
                _ => SummaryType::Compact,
            };

        Ok(Self {
            issue_summary: input_bool(source, "issueSummary", Some(true))?,
            summary_method,
            summary_type,
            summary_only_on_event: input_bool(source, "issueSummaryOnlyOnEvent", Some(false))?,
            include_glob: input_list(source, "includeGlob", Some(&[]))?,
            ignore_glob: input_list(source, "ignoreGlob", Some(&[]))?,
            extensions: input_list(source, "extensions", Some(&DEFAULT_EXTENSIONS))?,
            report_warnings_as_errors: input_bool(source, "reportWarningsAsErrors", Some(false))?,
            report_ignored_files: input_bool(source, "reportIgnoredFiles", Some(false))?,
            report_suggestions: input_bool(source, "reportSuggestions", Some(true))?,
            report_warnings: input_bool(source, "reportWarnings", Some(true))?,
            eslint: EslintOptions {
                config_file: input_optional(source, "configFile"),
                ignore_path: input_optional(source, "ignorePath"),
                rule_paths: input_list(source, "rulePaths", Some(&[]))?,
                use_eslintrc: input_bool(source, "useEslintrc", Some(true))?,
                use_eslint_ignore: input_bool(source, "useEslintIgnore", Some(true))?,
                error_on_unmatched_pattern: input_bool(
                    source,
                    "errorOnUnmatchedPattern",
                    Some(false),
                )?,
            },
            state_namespace: input_string(source, "stateNamespace", Some(DEFAULT_STATE_NAMESPACE))?,
            results_namespace: input_string(
                source,
                "resultsNamespace",
                Some(DEFAULT_RESULTS_NAMESPACE),
            )?,
            check_name: input_string(source, "checkName", Some(DEFAULT_CHECK_NAME))?,
        })
    }
}
