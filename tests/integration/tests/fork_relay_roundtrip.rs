use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, SecondsFormat, TimeZone, Utc};
use httpmock::prelude::*;
use lintrelay_github::{parse_run_trigger, GithubApiClient, GithubApiClientConfig, RepoRef};
use lintrelay_runtime::{
    ArtifactStore, FileLintReport, FsArtifactStore, LintDiagnostic, LintEngine, LintEngineError,
    LintSeverity, MapInputSource, ReconcileRuntime, RelayConfig, RuleMetadata, RunContext,
    RunOutcome,
};
use serde_json::{json, Value};
use tempfile::tempdir;

const BOT_USER_ID: u64 = 41_898_282;

/// Reports one `eqeqeq` error for every file it is asked to lint.
struct EqeqeqEngine;

#[async_trait]
impl LintEngine for EqeqeqEngine {
    async fn lint_files(&self, paths: &[String]) -> Result<Vec<FileLintReport>, LintEngineError> {
        Ok(paths
            .iter()
            .map(|path| FileLintReport {
                file_path: format!("/home/runner/work/repo/{path}"),
                error_count: 1,
                diagnostics: vec![LintDiagnostic {
                    line: 3,
                    severity: LintSeverity::Error,
                    rule_id: Some("eqeqeq".to_string()),
                    message: "Expected '===' and instead saw '=='.".to_string(),
                    message_id: Some("unexpected".to_string()),
                    suggestions: Vec::new(),
                }],
                ..FileLintReport::default()
            })
            .collect())
    }

    fn rule_metadata(&self, _rule_id: &str) -> Option<RuleMetadata> {
        Some(RuleMetadata {
            description: Some("Require the use of === and !==".to_string()),
            url: Some("https://eslint.org/docs/rules/eqeqeq".to_string()),
        })
    }
}

fn client(server: &MockServer) -> GithubApiClient {
    GithubApiClient::new(GithubApiClientConfig {
        api_base: server.base_url(),
        token: "test-token".to_string(),
        repo: RepoRef::parse("org/repo").expect("repo"),
        request_timeout_ms: 3_000,
        retry_max_attempts: 2,
        retry_base_delay_ms: 1,
    })
    .expect("client")
}

fn fork_payload(action: &str) -> Value {
    json!({
        "action": action,
        "pull_request": {
            "number": 7,
            "html_url": "https://github.com/org/repo/pull/7",
            "head": {"sha": "forksha", "repo": {"full_name": "contributor/repo"}},
            "base": {"sha": "basesha", "repo": {"full_name": "org/repo"}}
        }
    })
}

fn runtime(
    server: &MockServer,
    store: Arc<FsArtifactStore>,
    event_name: &str,
    payload: &Value,
) -> ReconcileRuntime {
    let trigger = parse_run_trigger(event_name, payload, "pushsha").expect("trigger");
    let config = RelayConfig::from_inputs(&MapInputSource::new([("issueSummaryType", "full")]))
        .expect("config");
    ReconcileRuntime::new(
        config,
        RunContext {
            trigger,
            workflow_name: "Lint".to_string(),
            workspace_root: Some("/home/runner/work/repo".to_string()),
        },
        Arc::new(client(server)),
        store,
        Arc::new(EqeqeqEngine),
    )
    .expect("runtime")
}

#[tokio::test]
async fn integration_fork_results_are_stashed_then_published_by_scheduler() {
    let server = MockServer::start();
    let temp = tempdir().expect("tempdir");
    let store = Arc::new(FsArtifactStore::new(temp.path().join("artifacts")));
    let now = Utc.with_ymd_and_hms(2024, 5, 2, 12, 0, 0).single().expect("now");
    let last_run = (now - Duration::hours(2)).to_rfc3339_opts(SecondsFormat::Millis, true);
    store
        .write(
            "issue-state-Lint",
            &json!({"scheduler": {"lastRunAt": last_run}}).to_string(),
        )
        .await
        .expect("seed workflow");

    let files = server.mock(|when, then| {
        when.method(POST).path("/graphql").body_includes("\"prNumber\":7");
        then.status(200).json_body(json!({
            "data": {"repository": {"pullRequest": {"files": {
                "pageInfo": {"hasNextPage": false, "endCursor": "c1"},
                "edges": [{"node": {"path": "src/a.ts"}}, {"node": {"path": "docs/readme.md"}}]
            }}}}
        }));
    });
    let check_create = server.mock(|when, then| {
        when.method(POST)
            .path("/repos/org/repo/check-runs")
            .body_includes("\"head_sha\":\"forksha\"");
        then.status(201).json_body(json!({"id": 55}));
    });
    let check_update = server.mock(|when, then| {
        when.method(PATCH).path("/repos/org/repo/check-runs/55");
        then.status(200).json_body(json!({"id": 55}));
    });
    let comment_create = server.mock(|when, then| {
        when.method(POST)
            .path("/repos/org/repo/issues/7/comments")
            .body_includes("lintrelay-summary")
            .body_includes("eqeqeq");
        then.status(201).json_body(json!({
            "id": 901,
            "body": "summary",
            "user": {"id": BOT_USER_ID, "login": "github-actions[bot]"}
        }));
    });
    let workflows = server.mock(|when, then| {
        when.method(GET).path("/repos/org/repo/actions/workflows");
        then.status(200).json_body(json!({
            "total_count": 1,
            "workflows": [{
                "id": 3,
                "name": "Lint",
                "path": ".github/workflows/lint.yml",
                "state": "active"
            }]
        }));
    });

    let payload = fork_payload("synchronize");
    let stashed = runtime(&server, store.clone(), "pull_request_target", &payload)
        .run(now)
        .await
        .expect("fork run");
    assert_eq!(
        stashed,
        RunOutcome::Stashed {
            issue_number: 7,
            key: "lint-results-Lint-7".to_string()
        }
    );
    files.assert_calls(1);
    check_create.assert_calls(0);
    comment_create.assert_calls(0);
    assert!(store
        .read("issue-state-Lint-7")
        .await
        .expect("read")
        .is_none());

    let drained = runtime(&server, store.clone(), "schedule", &Value::Null)
        .run(now + Duration::hours(1))
        .await
        .expect("scheduler run");
    assert_eq!(drained, RunOutcome::Drained { applied: 1, failed: 0 });
    workflows.assert_calls(1);
    check_create.assert_calls(1);
    check_update.assert_calls(1);
    comment_create.assert_calls(1);

    assert!(store
        .read("lint-results-Lint-7")
        .await
        .expect("read")
        .is_none());
    let issue: Value = serde_json::from_str(
        &store
            .read("issue-state-Lint-7")
            .await
            .expect("read")
            .expect("issue state"),
    )
    .expect("issue json");
    assert_eq!(issue["issue"]["summaryId"], 901);
    assert_eq!(issue["checkId"], 55);
    assert_eq!(issue["counts"]["errorCount"], 1);
    let workflow: Value = serde_json::from_str(
        &store
            .read("issue-state-Lint")
            .await
            .expect("read")
            .expect("workflow state"),
    )
    .expect("workflow json");
    assert_eq!(workflow["userId"], BOT_USER_ID);
    assert_eq!(workflow["workflowId"], 3);
    assert!(workflow["scheduler"]["lastRunAt"]
        .as_str()
        .expect("last run")
        .starts_with("2024-05-02T13:00:00"));
}

#[tokio::test]
async fn integration_closed_pull_request_removes_issue_artifacts_from_disk() {
    let server = MockServer::start();
    let temp = tempdir().expect("tempdir");
    let store = Arc::new(FsArtifactStore::new(temp.path()));
    for key in [
        "issue-state-Lint",
        "issue-state-Lint-7",
        "lint-results-Lint-7",
        "issue-state-Lint-8",
    ] {
        store.write(key, "{}").await.expect("seed");
    }
    let outcome = runtime(&server, store.clone(), "pull_request", &fork_payload("closed"))
        .run(Utc::now())
        .await
        .expect("cleanup");
    assert_eq!(
        outcome,
        RunOutcome::CleanedUp {
            issue_number: 7,
            deleted: 2
        }
    );
    assert_eq!(
        store.list("").await.expect("list"),
        vec!["issue-state-Lint", "issue-state-Lint-8"]
    );
}
