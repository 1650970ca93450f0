//! In-memory fakes for the host and lint seams.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use lintrelay_github::{
    ChangedFilesPage, CheckRunCreate, CheckRunUpdate, HostComment, HostError, HostResult,
    HostWorkflow, SourceHost,
};

use crate::lint_engine::{FileLintReport, LintEngine, LintEngineError, RuleMetadata};

pub const BOT_USER_ID: u64 = 99;

#[derive(Debug, Default)]
struct HostState {
    pages: VecDeque<ChangedFilesPage>,
    page_requests: Vec<Option<String>>,
    commit_files: Vec<String>,
    commit_requests: usize,
    fail_file_listing: bool,
    comments: Vec<(u64, HostComment)>,
    next_id: u64,
    check_creates: Vec<CheckRunCreate>,
    check_updates: Vec<(u64, CheckRunUpdate)>,
    workflows: Vec<HostWorkflow>,
}

impl HostState {
    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        1_000 + self.next_id
    }
}

#[derive(Debug, Default)]
pub struct ScriptedHost {
    state: Mutex<HostState>,
}

impl ScriptedHost {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<R>(&self, apply: impl FnOnce(&mut HostState) -> R) -> R {
        let mut state = self.state.lock().expect("host state lock");
        apply(&mut state)
    }

    pub fn with_pages(self, pages: Vec<ChangedFilesPage>) -> Self {
        self.with_state(|state| state.pages = pages.into());
        self
    }

    pub fn with_commit_files(self, files: Vec<String>) -> Self {
        self.with_state(|state| state.commit_files = files);
        self
    }

    pub fn with_workflow(self, id: u64, name: &str) -> Self {
        self.with_state(|state| {
            state.workflows.push(HostWorkflow {
                id,
                name: name.to_string(),
                path: format!(".github/workflows/{id}.yml"),
                state: "active".to_string(),
            })
        });
        self
    }

    pub fn failing_file_listing(self) -> Self {
        self.with_state(|state| state.fail_file_listing = true);
        self
    }

    pub fn page_requests(&self) -> Vec<Option<String>> {
        self.with_state(|state| state.page_requests.clone())
    }

    pub fn commit_requests(&self) -> usize {
        self.with_state(|state| state.commit_requests)
    }

    /// Pull-request page and commit listing calls combined.
    pub fn file_listing_calls(&self) -> usize {
        self.with_state(|state| state.page_requests.len() + state.commit_requests)
    }

    pub fn comments_on(&self, issue_number: u64) -> Vec<HostComment> {
        self.with_state(|state| {
            state
                .comments
                .iter()
                .filter(|(issue, _)| *issue == issue_number)
                .map(|(_, comment)| comment.clone())
                .collect()
        })
    }

    pub fn seed_comment(&self, issue_number: u64, author_id: u64, body: &str) -> u64 {
        self.with_state(|state| {
            let id = state.allocate_id();
            state.comments.push((
                issue_number,
                HostComment {
                    id,
                    author_id: Some(author_id),
                    body: Some(body.to_string()),
                },
            ));
            id
        })
    }

    /// Simulates a user deleting the comment through the web UI.
    pub fn delete_comment_out_of_band(&self, comment_id: u64) {
        self.with_state(|state| state.comments.retain(|(_, comment)| comment.id != comment_id));
    }

    pub fn check_creates(&self) -> Vec<CheckRunCreate> {
        self.with_state(|state| state.check_creates.clone())
    }

    pub fn check_updates(&self) -> Vec<(u64, CheckRunUpdate)> {
        self.with_state(|state| state.check_updates.clone())
    }
}

fn not_found(operation: &str) -> HostError {
    HostError::NotFound {
        operation: operation.to_string(),
    }
}

#[async_trait]
impl SourceHost for ScriptedHost {
    async fn pull_request_files_page(
        &self,
        _pr_number: u64,
        cursor: Option<&str>,
    ) -> HostResult<ChangedFilesPage> {
        self.with_state(|state| {
            state.page_requests.push(cursor.map(ToOwned::to_owned));
            if state.fail_file_listing {
                return Err(HostError::Status {
                    operation: "pull request files".to_string(),
                    status: 502,
                    body: "bad gateway".to_string(),
                });
            }
            Ok(state.pages.pop_front().unwrap_or_default())
        })
    }

    async fn commit_files(&self, _sha: &str) -> HostResult<Vec<String>> {
        self.with_state(|state| {
            state.commit_requests += 1;
            if state.fail_file_listing {
                return Err(not_found("commit files"));
            }
            Ok(state.commit_files.clone())
        })
    }

    async fn list_issue_comments(&self, issue_number: u64) -> HostResult<Vec<HostComment>> {
        Ok(self.comments_on(issue_number))
    }

    async fn create_issue_comment(&self, issue_number: u64, body: &str) -> HostResult<HostComment> {
        self.with_state(|state| {
            let comment = HostComment {
                id: state.allocate_id(),
                author_id: Some(BOT_USER_ID),
                body: Some(body.to_string()),
            };
            state.comments.push((issue_number, comment.clone()));
            Ok(comment)
        })
    }

    async fn update_issue_comment(&self, comment_id: u64, body: &str) -> HostResult<HostComment> {
        self.with_state(|state| {
            let (_, comment) = state
                .comments
                .iter_mut()
                .find(|(_, comment)| comment.id == comment_id)
                .ok_or_else(|| not_found("update comment"))?;
            comment.body = Some(body.to_string());
            Ok(comment.clone())
        })
    }

    async fn delete_issue_comment(&self, comment_id: u64) -> HostResult<()> {
        self.with_state(|state| {
            let before = state.comments.len();
            state.comments.retain(|(_, comment)| comment.id != comment_id);
            if state.comments.len() == before {
                return Err(not_found("delete comment"));
            }
            Ok(())
        })
    }

    async fn create_check_run(&self, request: &CheckRunCreate) -> HostResult<u64> {
        self.with_state(|state| {
            state.check_creates.push(request.clone());
            Ok(state.allocate_id())
        })
    }

    async fn update_check_run(&self, check_run_id: u64, update: &CheckRunUpdate) -> HostResult<()> {
        self.with_state(|state| state.check_updates.push((check_run_id, update.clone())));
        Ok(())
    }

    async fn list_workflows(&self) -> HostResult<Vec<HostWorkflow>> {
        Ok(self.with_state(|state| state.workflows.clone()))
    }
}

#[derive(Debug, Default)]
pub struct ScriptedLintEngine {
    reports: HashMap<String, FileLintReport>,
    rules: HashMap<String, RuleMetadata>,
    lookups: Mutex<Vec<String>>,
    linted: Mutex<Vec<String>>,
}

impl ScriptedLintEngine {
    pub fn with_rule(mut self, rule_id: &str, description: &str, url: &str) -> Self {
        self.rules.insert(
            rule_id.to_string(),
            RuleMetadata {
                description: Some(description.to_string()),
                url: Some(url.to_string()),
            },
        );
        self
    }

    /// Report returned when `path` is linted; `file_path` may be absolute like ESLint's.
    pub fn with_report(mut self, path: &str, report: FileLintReport) -> Self {
        self.reports.insert(path.to_string(), report);
        self
    }

    pub fn metadata_lookups(&self) -> Vec<String> {
        self.lookups.lock().expect("lookups lock").clone()
    }

    pub fn linted_paths(&self) -> Vec<String> {
        self.linted.lock().expect("linted lock").clone()
    }
}

#[async_trait]
impl LintEngine for ScriptedLintEngine {
    async fn lint_files(&self, paths: &[String]) -> Result<Vec<FileLintReport>, LintEngineError> {
        self.linted
            .lock()
            .expect("linted lock")
            .extend(paths.iter().cloned());
        Ok(paths
            .iter()
            .map(|path| {
                self.reports.get(path).cloned().unwrap_or_else(|| FileLintReport {
                    file_path: path.clone(),
                    ..FileLintReport::default()
                })
            })
            .collect())
    }

    fn rule_metadata(&self, rule_id: &str) -> Option<RuleMetadata> {
        self.lookups
            .lock()
            .expect("lookups lock")
            .push(rule_id.to_string());
        self.rules.get(rule_id).cloned()
    }
}
