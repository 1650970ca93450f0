//! Markdown body and check title for a run's lint summary.

use crate::aggregator::{AnnotationLevel, Conclusion, RunState};
use crate::config::{RelayConfig, SummaryType};

pub const SUMMARY_MARKER: &str = "<!-- lintrelay-summary -->";

pub struct SummaryView<'a> {
    pub summary_type: SummaryType,
    pub report_ignored_files: bool,
    pub report_suggestions: bool,
    pub check_name: &'a str,
    pub head_sha: Option<&'a str>,
}

impl<'a> SummaryView<'a> {
    pub fn from_config(config: &'a RelayConfig, head_sha: Option<&'a str>) -> Self {
        Self {
            summary_type: config.summary_type,
            report_ignored_files: config.report_ignored_files,
            report_suggestions: config.report_suggestions,
            check_name: &config.check_name,
            head_sha,
        }
    }
}

fn status_line(state: &RunState) -> String {
    let counts = &state.counts;
    match state.conclusion {
        Conclusion::Failure => format!(
            ":x: **{} error(s)**, {} warning(s) found",
            counts.error_count,
            counts.reported_warning_count()
        ),
        _ if counts.warning_count > 0 => format!(
            ":warning: {} warning(s) found",
            counts.reported_warning_count()
        ),
        _ => ":white_check_mark: No lint problems found".to_string(),
    }
}

fn level_label(level: AnnotationLevel) -> &'static str {
    match level {
        AnnotationLevel::Failure => "error",
        AnnotationLevel::Warning => "warning",
    }
}

/// Comment body for the issue summary. The marker line lets readers spot bot comments.
pub fn render_summary_markdown(state: &RunState, view: &SummaryView<'_>) -> String {
    let counts = &state.counts;
    let mut lines = vec![SUMMARY_MARKER.to_string(), format!("## {} summary", view.check_name)];
    if let Some(sha) = view.head_sha {
        lines.push(format!("Commit: `{sha}`"));
    }
    lines.push(String::new());
    lines.push(status_line(state));
    lines.push(String::new());
    lines.push("| Type | Count | Fixable |".to_string());
    lines.push("| --- | --- | --- |".to_string());
    lines.push(format!(
        "| Errors | {} | {} |",
        counts.error_count, counts.fixable_error_count
    ));
    lines.push(format!(
        "| Warnings | {} | {} |",
        counts.reported_warning_count(),
        counts.fixable_warning_count
    ));
    if view.report_ignored_files {
        lines.push(format!("| Ignored | {} | - |", counts.ignored_count));
    }

    if view.summary_type == SummaryType::Full && !state.rule_summaries.is_empty() {
        lines.push(String::new());
        lines.push("### Rules".to_string());
        for summary in &state.rule_summaries {
            lines.push(String::new());
            let title = match summary.url.as_deref() {
                Some(url) => format!("[{}]({url})", summary.rule_id),
                None => format!("`{}`", summary.rule_id),
            };
            let description = if summary.description.is_empty() {
                String::new()
            } else {
                format!(" {}", summary.description)
            };
            lines.push(format!(
                "#### {title} ({}, {}){description}",
                level_label(summary.level),
                summary.annotations.len()
            ));
            for annotation in &summary.annotations {
                lines.push(format!(
                    "- `{}:{}` {}",
                    annotation.path, annotation.line, annotation.message
                ));
                if view.report_suggestions {
                    for suggestion in &annotation.suggestions {
                        lines.push(format!("  - suggestion: {}", suggestion.desc));
                    }
                }
            }
        }
    }

    if view.report_ignored_files && !state.ignored_files.is_empty() {
        lines.push(String::new());
        lines.push("### Ignored files".to_string());
        for path in &state.ignored_files {
            lines.push(format!("- `{path}`"));
        }
    }
    lines.join("\n")
}

/// Check-run title, e.g. `2 errors, 1 warning`.
pub fn render_check_title(state: &RunState) -> String {
    let counts = &state.counts;
    let warnings = counts.reported_warning_count();
    format!(
        "{} error{}, {} warning{}",
        counts.error_count,
        if counts.error_count == 1 { "" } else { "s" },
        warnings,
        if warnings == 1 { "" } else { "s" }
    )
}
