//! Check-run publishing for write-capable runs and scheduler replays.

use chrono::{DateTime, SecondsFormat, Utc};
use lintrelay_github::{
    CheckAnnotation, CheckAnnotationLevel, CheckRunConclusion, CheckRunCreate, CheckRunOutput,
    CheckRunStatus, CheckRunUpdate, HostResult, SourceHost,
};

use crate::aggregator::{Annotation, AnnotationLevel, Conclusion, RunState};
use crate::summary_render::render_check_title;

/// GitHub rejects check-run updates carrying more annotations than this.
pub const CHECK_ANNOTATION_BATCH_SIZE: usize = 50;

fn timestamp(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn to_check_annotation(annotation: &Annotation) -> CheckAnnotation {
    CheckAnnotation {
        path: annotation.path.clone(),
        start_line: annotation.line,
        end_line: annotation.line,
        annotation_level: match annotation.level {
            AnnotationLevel::Warning => CheckAnnotationLevel::Warning,
            AnnotationLevel::Failure => CheckAnnotationLevel::Failure,
        },
        title: annotation.rule_id.clone(),
        message: annotation.message.clone(),
    }
}

fn to_check_conclusion(conclusion: Conclusion) -> CheckRunConclusion {
    match conclusion {
        Conclusion::Success => CheckRunConclusion::Success,
        Conclusion::Failure => CheckRunConclusion::Failure,
        Conclusion::Pending => CheckRunConclusion::Neutral,
    }
}

pub struct CheckRunPublisher<'a> {
    host: &'a dyn SourceHost,
    check_name: &'a str,
}

impl<'a> CheckRunPublisher<'a> {
    pub fn new(host: &'a dyn SourceHost, check_name: &'a str) -> Self {
        Self { host, check_name }
    }

    pub async fn start(&self, head_sha: &str, now: DateTime<Utc>) -> HostResult<u64> {
        let check_id = self
            .host
            .create_check_run(&CheckRunCreate {
                name: self.check_name.to_string(),
                head_sha: head_sha.to_string(),
                status: CheckRunStatus::InProgress,
                started_at: timestamp(now),
            })
            .await?;
        tracing::info!(check_id, head_sha, "check run started");
        Ok(check_id)
    }

    /// Uploads annotations in batches; only the final update completes the run.
    pub async fn complete(
        &self,
        check_id: u64,
        state: &RunState,
        annotations: &[Annotation],
        summary: &str,
        now: DateTime<Utc>,
    ) -> HostResult<()> {
        let title = render_check_title(state);
        let batches = annotations
            .chunks(CHECK_ANNOTATION_BATCH_SIZE)
            .map(|batch| batch.iter().map(to_check_annotation).collect::<Vec<_>>())
            .collect::<Vec<_>>();
        let last_index = batches.len().saturating_sub(1);

        for (index, batch) in batches.into_iter().enumerate() {
            if index == last_index {
                return self
                    .finish(check_id, state, title, summary.to_string(), batch, now)
                    .await;
            }
            self.host
                .update_check_run(
                    check_id,
                    &CheckRunUpdate {
                        name: self.check_name.to_string(),
                        status: CheckRunStatus::InProgress,
                        conclusion: None,
                        completed_at: None,
                        output: Some(CheckRunOutput {
                            title: title.clone(),
                            summary: summary.to_string(),
                            annotations: batch,
                        }),
                    },
                )
                .await?;
        }
        self.finish(check_id, state, title, summary.to_string(), Vec::new(), now)
            .await
    }

    async fn finish(
        &self,
        check_id: u64,
        state: &RunState,
        title: String,
        summary: String,
        annotations: Vec<CheckAnnotation>,
        now: DateTime<Utc>,
    ) -> HostResult<()> {
        self.host
            .update_check_run(
                check_id,
                &CheckRunUpdate {
                    name: self.check_name.to_string(),
                    status: CheckRunStatus::Completed,
                    conclusion: Some(to_check_conclusion(state.conclusion)),
                    completed_at: Some(timestamp(now)),
                    output: Some(CheckRunOutput {
                        title,
                        summary,
                        annotations,
                    }),
                },
            )
            .await?;
        tracing::info!(check_id, conclusion = ?state.conclusion, "check run completed");
        Ok(())
    }

    /// Closes the check as failed after an error aborted the run.
    pub async fn fail(&self, check_id: u64, message: &str, now: DateTime<Utc>) -> HostResult<()> {
        self.host
            .update_check_run(
                check_id,
                &CheckRunUpdate {
                    name: self.check_name.to_string(),
                    status: CheckRunStatus::Completed,
                    conclusion: Some(CheckRunConclusion::Failure),
                    completed_at: Some(timestamp(now)),
                    output: Some(CheckRunOutput {
                        title: "Lint run failed".to_string(),
                        summary: message.to_string(),
                        annotations: Vec::new(),
                    }),
                },
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use lintrelay_github::{CheckRunConclusion, CheckRunStatus};

    use super::{CheckRunPublisher, CHECK_ANNOTATION_BATCH_SIZE};
    use crate::aggregator::{Annotation, AnnotationLevel, Conclusion, RunState};
    use crate::test_support::ScriptedHost;

    fn annotations(count: usize) -> Vec<Annotation> {
        (0..count)
            .map(|index| Annotation {
                path: format!("src/f{index}.ts"),
                line: 1,
                level: AnnotationLevel::Failure,
                rule_id: "eqeqeq".to_string(),
                message: "use ===".to_string(),
                suggestions: Vec::new(),
            })
            .collect()
    }

    #[tokio::test]
    async fn functional_complete_sends_annotations_in_batches_of_fifty() {
        let host = ScriptedHost::new();
        let publisher = CheckRunPublisher::new(&host, "lintrelay");
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).single().expect("now");
        let check_id = publisher.start("abc", now).await.expect("start");
        let state = RunState {
            conclusion: Conclusion::Failure,
            ..RunState::default()
        };
        publisher
            .complete(check_id, &state, &annotations(120), "summary", now)
            .await
            .expect("complete");

        let updates = host.check_updates();
        assert_eq!(updates.len(), 3);
        let sizes = updates
            .iter()
            .map(|(_, update)| update.output.as_ref().map_or(0, |output| output.annotations.len()))
            .collect::<Vec<_>>();
        assert_eq!(sizes, vec![CHECK_ANNOTATION_BATCH_SIZE, CHECK_ANNOTATION_BATCH_SIZE, 20]);
        assert_eq!(updates[0].1.status, CheckRunStatus::InProgress);
        assert_eq!(updates[2].1.status, CheckRunStatus::Completed);
        assert_eq!(updates[2].1.conclusion, Some(CheckRunConclusion::Failure));
    }

    #[tokio::test]
    async fn unit_complete_without_annotations_sends_single_completion() {
        let host = ScriptedHost::new();
        let publisher = CheckRunPublisher::new(&host, "lintrelay");
        let now = Utc::now();
        let state = RunState {
            conclusion: Conclusion::Success,
            ..RunState::default()
        };
        publisher
            .complete(9, &state, &[], "clean", now)
            .await
            .expect("complete");
        let updates = host.check_updates();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].0, 9);
        assert_eq!(updates[0].1.conclusion, Some(CheckRunConclusion::Success));
    }

    #[tokio::test]
    async fn unit_fail_marks_check_failed() {
        let host = ScriptedHost::new();
        let publisher = CheckRunPublisher::new(&host, "lintrelay");
        publisher
            .fail(3, "discovery failed", Utc::now())
            .await
            .expect("fail");
        let updates = host.check_updates();
        assert_eq!(updates[0].1.conclusion, Some(CheckRunConclusion::Failure));
    }
}
