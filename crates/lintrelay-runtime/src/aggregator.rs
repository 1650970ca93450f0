//! Folds per-file lint reports into run counters and per-rule annotation groups.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::config::RelayConfig;
use crate::lint_engine::{FileLintReport, LintEngine, LintSeverity, LintSuggestion};
use crate::persisted_state::LintCounts;

const IGNORED_FILE_MESSAGE_PREFIX: &str = "File ignored";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationLevel {
    Warning,
    Failure,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    pub path: String,
    pub line: u64,
    pub level: AnnotationLevel,
    pub rule_id: String,
    pub message: String,
    #[serde(default)]
    pub suggestions: Vec<LintSuggestion>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleSummary {
    pub rule_id: String,
    pub description: String,
    #[serde(default)]
    pub url: Option<String>,
    /// Level of the first annotation reported for the rule.
    pub level: AnnotationLevel,
    pub annotations: Vec<Annotation>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Conclusion {
    #[default]
    Pending,
    Success,
    Failure,
}

/// Per-run aggregate, rebuilt from scratch every run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RunState {
    pub counts: LintCounts,
    pub ignored_files: Vec<String>,
    /// Ordered by first occurrence of each rule.
    pub rule_summaries: Vec<RuleSummary>,
    pub annotation_count: u64,
    pub conclusion: Conclusion,
    pub check_id: Option<u64>,
}

impl RunState {
    pub fn failure_count(&self) -> usize {
        self.rule_summaries
            .iter()
            .flat_map(|summary| summary.annotations.iter())
            .filter(|annotation| annotation.level == AnnotationLevel::Failure)
            .count()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregatorOptions {
    pub report_warnings_as_errors: bool,
    pub report_warnings: bool,
}

impl AggregatorOptions {
    pub fn from_config(config: &RelayConfig) -> Self {
        Self {
            report_warnings_as_errors: config.report_warnings_as_errors,
            report_warnings: config.report_warnings,
        }
    }
}

pub struct ResultAggregator<'a> {
    engine: &'a dyn LintEngine,
    options: AggregatorOptions,
    workspace_prefix: Option<String>,
    state: RunState,
    annotations: Vec<Annotation>,
    rule_index: HashMap<String, usize>,
}

impl<'a> ResultAggregator<'a> {
    pub fn new(
        engine: &'a dyn LintEngine,
        options: AggregatorOptions,
        workspace_root: Option<&str>,
    ) -> Self {
        let workspace_prefix = workspace_root
            .map(|root| root.trim_end_matches('/'))
            .filter(|root| !root.is_empty())
            .map(|root| format!("{root}/"));
        Self {
            engine,
            options,
            workspace_prefix,
            state: RunState::default(),
            annotations: Vec::new(),
            rule_index: HashMap::new(),
        }
    }

    fn relative_path(&self, file_path: &str) -> String {
        self.workspace_prefix
            .as_deref()
            .and_then(|prefix| file_path.strip_prefix(prefix))
            .unwrap_or(file_path)
            .to_string()
    }

    /// Folds one batch of reports; returns the number of annotations it produced.
    pub fn fold_reports(&mut self, reports: &[FileLintReport]) -> usize {
        let before = self.annotations.len();
        for report in reports {
            self.fold_report(report);
        }
        let added = self.annotations.len() - before;
        self.state.annotation_count += added as u64;
        added
    }

    fn fold_report(&mut self, report: &FileLintReport) {
        let counts = &mut self.state.counts;
        counts.error_count += report.error_count;
        counts.warning_count = counts
            .warning_count
            .saturating_add(i64::try_from(report.warning_count).unwrap_or(i64::MAX));
        counts.fixable_error_count += report.fixable_error_count;
        counts.fixable_warning_count += report.fixable_warning_count;

        let path = self.relative_path(&report.file_path);
        tracing::debug!(
            path = %path,
            diagnostics = report.diagnostics.len(),
            "folding lint report"
        );

        for diagnostic in &report.diagnostics {
            let Some(rule_id) = diagnostic.rule_id.as_deref() else {
                if diagnostic.message.starts_with(IGNORED_FILE_MESSAGE_PREFIX) {
                    let counts = &mut self.state.counts;
                    counts.warning_count -= 1;
                    counts.ignored_count += 1;
                    self.state.ignored_files.push(path.clone());
                }
                continue;
            };

            let level = if diagnostic.severity == LintSeverity::Error
                || self.options.report_warnings_as_errors
            {
                AnnotationLevel::Failure
            } else {
                AnnotationLevel::Warning
            };
            if !self.options.report_warnings && level != AnnotationLevel::Failure {
                continue;
            }

            let annotation = Annotation {
                path: path.clone(),
                line: diagnostic.line,
                level,
                rule_id: rule_id.to_string(),
                message: diagnostic.message.clone(),
                suggestions: diagnostic.suggestions.clone(),
            };
            self.record(annotation);
        }
    }

    fn record(&mut self, annotation: Annotation) {
        match self.rule_index.get(&annotation.rule_id) {
            Some(&index) => self.state.rule_summaries[index]
                .annotations
                .push(annotation.clone()),
            None => {
                let metadata = self
                    .engine
                    .rule_metadata(&annotation.rule_id)
                    .unwrap_or_default();
                self.rule_index
                    .insert(annotation.rule_id.clone(), self.state.rule_summaries.len());
                self.state.rule_summaries.push(RuleSummary {
                    rule_id: annotation.rule_id.clone(),
                    description: metadata.description.unwrap_or_default(),
                    url: metadata.url,
                    level: annotation.level,
                    annotations: vec![annotation.clone()],
                });
            }
        }
        self.annotations.push(annotation);
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    /// Settles the conclusion and hands back the aggregate plus the flat annotation list.
    pub fn finish(mut self) -> (RunState, Vec<Annotation>) {
        let failed = self.state.counts.error_count > 0 || self.state.failure_count() > 0;
        self.state.conclusion = if failed {
            Conclusion::Failure
        } else {
            Conclusion::Success
        };
        (self.state, self.annotations)
    }
}

/// One-shot fold of every report.
pub fn aggregate(
    reports: &[FileLintReport],
    options: AggregatorOptions,
    engine: &dyn LintEngine,
    workspace_root: Option<&str>,
) -> (RunState, Vec<Annotation>) {
    let mut aggregator = ResultAggregator::new(engine, options, workspace_root);
    aggregator.fold_reports(reports);
    aggregator.finish()
}

#[cfg(test)]
mod tests {
    use super::{aggregate, AggregatorOptions, AnnotationLevel, Conclusion, ResultAggregator};
    use crate::lint_engine::{FileLintReport, LintDiagnostic, LintSeverity};
    use crate::test_support::ScriptedLintEngine;

    fn diagnostic(rule_id: Option<&str>, severity: LintSeverity, message: &str) -> LintDiagnostic {
        LintDiagnostic {
            line: 4,
            severity,
            rule_id: rule_id.map(ToOwned::to_owned),
            message: message.to_string(),
            message_id: None,
            suggestions: Vec::new(),
        }
    }

    fn report(
        path: &str,
        errors: u64,
        warnings: u64,
        diagnostics: Vec<LintDiagnostic>,
    ) -> FileLintReport {
        FileLintReport {
            file_path: path.to_string(),
            error_count: errors,
            warning_count: warnings,
            fixable_error_count: 0,
            fixable_warning_count: 0,
            diagnostics,
        }
    }

    fn options(report_warnings: bool, warnings_as_errors: bool) -> AggregatorOptions {
        AggregatorOptions {
            report_warnings_as_errors: warnings_as_errors,
            report_warnings,
        }
    }

    #[test]
    fn functional_ignored_file_diagnostic_moves_warning_to_ignored() {
        let engine = ScriptedLintEngine::default();
        let reports = vec![report(
            "/work/repo/src/gen.ts",
            0,
            1,
            vec![diagnostic(
                None,
                LintSeverity::Warning,
                "File ignored because of a matching ignore pattern",
            )],
        )];
        let (state, annotations) =
            aggregate(&reports, options(true, false), &engine, Some("/work/repo"));
        assert_eq!(state.counts.warning_count, 0);
        assert_eq!(state.counts.ignored_count, 1);
        assert_eq!(state.ignored_files, vec!["src/gen.ts"]);
        assert!(annotations.is_empty());
        assert_eq!(state.annotation_count, 0);
    }

    #[test]
    fn regression_ignored_file_decrement_is_a_running_total_across_files() {
        let engine = ScriptedLintEngine::default();
        let ignored = || {
            diagnostic(
                None,
                LintSeverity::Warning,
                "File ignored because of a matching ignore pattern",
            )
        };
        let reports = vec![
            report("a.ts", 0, 1, vec![ignored(), ignored()]),
            report("b.ts", 0, 1, Vec::new()),
        ];
        let mut aggregator = ResultAggregator::new(&engine, options(true, false), None);
        aggregator.fold_reports(&reports[..1]);
        assert_eq!(aggregator.state().counts.warning_count, -1);
        aggregator.fold_reports(&reports[1..]);
        let (state, _) = aggregator.finish();
        assert_eq!(state.counts.warning_count, 0);
        assert_eq!(state.counts.ignored_count, 2);
        assert_eq!(state.ignored_files, vec!["a.ts", "a.ts"]);
    }

    #[test]
    fn unit_rule_less_diagnostic_without_ignore_message_is_skipped() {
        let engine = ScriptedLintEngine::default();
        let reports = vec![report(
            "a.ts",
            1,
            0,
            vec![diagnostic(None, LintSeverity::Error, "Parsing error: unexpected token")],
        )];
        let (state, annotations) = aggregate(&reports, options(true, false), &engine, None);
        assert_eq!(state.counts.error_count, 1);
        assert_eq!(state.counts.ignored_count, 0);
        assert!(annotations.is_empty());
    }

    #[test]
    fn functional_warnings_are_dropped_unless_reported() {
        let engine = ScriptedLintEngine::default();
        let reports = vec![report(
            "a.ts",
            1,
            1,
            vec![
                diagnostic(Some("no-unused-vars"), LintSeverity::Warning, "unused"),
                diagnostic(Some("eqeqeq"), LintSeverity::Error, "use ==="),
            ],
        )];
        let (quiet, quiet_annotations) = aggregate(&reports, options(false, false), &engine, None);
        assert_eq!(quiet_annotations.len(), 1);
        assert_eq!(quiet_annotations[0].rule_id, "eqeqeq");
        assert_eq!(quiet.counts.warning_count, 1);

        let (escalated, annotations) = aggregate(&reports, options(false, true), &engine, None);
        assert_eq!(annotations.len(), 2);
        assert!(annotations
            .iter()
            .all(|annotation| annotation.level == AnnotationLevel::Failure));
        assert_eq!(escalated.annotation_count, 2);
    }

    #[test]
    fn functional_rule_summaries_group_by_first_occurrence_with_metadata() {
        let engine = ScriptedLintEngine::default().with_rule(
            "eqeqeq",
            "Require the use of === and !==",
            "https://eslint.org/docs/rules/eqeqeq",
        );
        let reports = vec![
            report(
                "a.ts",
                1,
                1,
                vec![
                    diagnostic(Some("eqeqeq"), LintSeverity::Error, "first"),
                    diagnostic(Some("semi"), LintSeverity::Warning, "semi"),
                ],
            ),
            report("b.ts", 1, 0, vec![diagnostic(Some("eqeqeq"), LintSeverity::Error, "second")]),
        ];
        let (state, annotations) = aggregate(&reports, options(true, false), &engine, None);
        assert_eq!(annotations.len(), 3);
        let rule_ids = state
            .rule_summaries
            .iter()
            .map(|summary| summary.rule_id.as_str())
            .collect::<Vec<_>>();
        assert_eq!(rule_ids, vec!["eqeqeq", "semi"]);
        let eqeqeq = &state.rule_summaries[0];
        assert_eq!(eqeqeq.description, "Require the use of === and !==");
        assert_eq!(eqeqeq.annotations.len(), 2);
        assert_eq!(eqeqeq.annotations[1].path, "b.ts");
        assert_eq!(state.rule_summaries[1].description, "");
        assert_eq!(engine.metadata_lookups(), vec!["eqeqeq", "semi"]);
        assert_eq!(state.conclusion, Conclusion::Failure);
    }

    #[test]
    fn unit_clean_run_concludes_success() {
        let engine = ScriptedLintEngine::default();
        let reports = [report("a.ts", 0, 0, Vec::new())];
        let (state, _) = aggregate(&reports, options(true, false), &engine, None);
        assert_eq!(state.conclusion, Conclusion::Success);
    }

    #[test]
    fn regression_annotation_count_accumulates_across_batches() {
        let engine = ScriptedLintEngine::default();
        let mut aggregator = ResultAggregator::new(&engine, options(true, false), None);
        let batch = vec![report(
            "a.ts",
            1,
            0,
            vec![diagnostic(Some("eqeqeq"), LintSeverity::Error, "x")],
        )];
        assert_eq!(aggregator.fold_reports(&batch), 1);
        assert_eq!(aggregator.fold_reports(&batch), 1);
        assert_eq!(aggregator.state().annotation_count, 2);
        assert_eq!(aggregator.state().counts.error_count, 2);
    }
}
