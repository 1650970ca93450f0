//! REST/GraphQL GitHub client implementing `SourceHost` and `ArtifactHost`.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::actions_runtime::ActionsRuntimeConfig;
use crate::artifact_archive::{archive_digest, pack_single_entry, read_text_entry};
use crate::github_transport_helpers::{
    is_retryable_github_status, is_retryable_transport_error, parse_retry_after, retry_delay,
    truncate_for_error,
};
use crate::source_host::{
    ArtifactHost, ChangedFilesPage, CheckRunCreate, CheckRunUpdate, HostArtifact, HostComment,
    HostError, HostResult, HostWorkflow, SourceHost, CHANGED_FILES_PAGE_SIZE,
};

const CHANGED_FILES_QUERY: &str = r#"
query ChangedFilesBatch($owner: String!, $repo: String!, $prNumber: Int!, $startCursor: String, $pageSize: Int!) {
  repository(owner: $owner, name: $repo) {
    pullRequest(number: $prNumber) {
      files(first: $pageSize, after: $startCursor) {
        pageInfo {
          hasNextPage
          endCursor
        }
        edges {
          node {
            path
          }
        }
      }
    }
  }
}
"#;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    /// Parses an `owner/repo` slug.
    pub fn parse(raw: &str) -> Result<Self, String> {
        let trimmed = raw.trim();
        let (owner, name) = trimmed
            .split_once('/')
            .ok_or_else(|| format!("invalid repository '{raw}', expected owner/repo"))?;
        let owner = owner.trim();
        let name = name.trim();
        if owner.is_empty() || name.is_empty() || name.contains('/') {
            return Err(format!("invalid repository '{raw}', expected owner/repo"));
        }
        Ok(Self {
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }

    pub fn as_slug(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

#[derive(Debug, Clone)]
pub struct GithubApiClientConfig {
    pub api_base: String,
    pub token: String,
    pub repo: RepoRef,
    pub request_timeout_ms: u64,
    pub retry_max_attempts: usize,
    pub retry_base_delay_ms: u64,
}

#[derive(Debug, Deserialize)]
struct GithubUser {
    id: u64,
}

#[derive(Debug, Deserialize)]
struct GithubIssueComment {
    id: u64,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    user: Option<GithubUser>,
}

impl From<GithubIssueComment> for HostComment {
    fn from(comment: GithubIssueComment) -> Self {
        Self {
            id: comment.id,
            author_id: comment.user.map(|user| user.id),
            body: comment.body,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GithubCommitFile {
    #[serde(default)]
    filename: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GithubCommit {
    #[serde(default)]
    files: Option<Vec<GithubCommitFile>>,
}

#[derive(Debug, Deserialize)]
struct GithubCheckRun {
    id: u64,
}

#[derive(Debug, Deserialize)]
struct GithubWorkflowList {
    #[serde(default)]
    workflows: Vec<HostWorkflow>,
}

#[derive(Debug, Deserialize)]
struct GithubArtifactList {
    #[serde(default)]
    artifacts: Vec<HostArtifact>,
}

#[derive(Debug, Deserialize)]
struct CreateArtifactResponse {
    #[serde(default)]
    ok: bool,
    #[serde(default, rename = "signedUploadUrl", alias = "signed_upload_url")]
    signed_upload_url: String,
}

#[derive(Debug, Deserialize)]
struct FinalizeArtifactResponse {
    #[serde(default)]
    ok: bool,
    #[serde(default, rename = "artifactId", alias = "artifact_id")]
    artifact_id: Value,
}

/// Twirp encodes int64 ids as strings; older deployments send numbers.
fn artifact_id_from_value(value: &Value) -> Option<u64> {
    match value {
        Value::Number(number) => number.as_u64(),
        Value::String(text) => text.parse().ok(),
        _ => None,
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphqlPageInfo {
    has_next_page: bool,
    #[serde(default)]
    end_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GraphqlPathNode {
    path: String,
}

#[derive(Debug, Deserialize)]
struct GraphqlFileEdge {
    node: GraphqlPathNode,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphqlFiles {
    page_info: GraphqlPageInfo,
    #[serde(default)]
    edges: Vec<GraphqlFileEdge>,
}

#[derive(Debug, Deserialize)]
struct GraphqlPullRequest {
    #[serde(default)]
    files: Option<GraphqlFiles>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphqlRepository {
    #[serde(default)]
    pull_request: Option<GraphqlPullRequest>,
}

#[derive(Debug, Deserialize)]
struct GraphqlChangedFilesData {
    #[serde(default)]
    repository: Option<GraphqlRepository>,
}

#[derive(Clone)]
pub struct GithubApiClient {
    http: reqwest::Client,
    runtime_http: reqwest::Client,
    actions_runtime: Option<ActionsRuntimeConfig>,
    api_base: String,
    graphql_url: String,
    repo: RepoRef,
    retry_max_attempts: usize,
    retry_base_delay_ms: u64,
}

fn graphql_url_for(api_base: &str) -> String {
    match api_base.strip_suffix("/api/v3") {
        Some(host) => format!("{host}/api/graphql"),
        None => format!("{api_base}/graphql"),
    }
}

impl GithubApiClient {
    pub fn new(config: GithubApiClientConfig) -> HostResult<Self> {
        let operation = "client setup".to_string();
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            reqwest::header::HeaderValue::from_static("lintrelay"),
        );
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "x-github-api-version",
            reqwest::header::HeaderValue::from_static("2022-11-28"),
        );
        let auth_header = format!("Bearer {}", config.token.trim());
        let auth_value = reqwest::header::HeaderValue::from_str(&auth_header).map_err(|error| {
            HostError::Decode {
                operation: operation.clone(),
                message: format!("invalid github authorization header: {error}"),
            }
        })?;
        headers.insert(reqwest::header::AUTHORIZATION, auth_value);

        let timeout = Duration::from_millis(config.request_timeout_ms.max(1));
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|source| HostError::Transport {
                operation: operation.clone(),
                source,
            })?;
        // Results service and blob storage must not see the repository token.
        let runtime_http = reqwest::Client::builder()
            .user_agent("lintrelay")
            .timeout(timeout)
            .build()
            .map_err(|source| HostError::Transport { operation, source })?;
        let api_base = config.api_base.trim_end_matches('/').to_string();
        Ok(Self {
            http,
            runtime_http,
            actions_runtime: None,
            graphql_url: graphql_url_for(&api_base),
            api_base,
            repo: config.repo,
            retry_max_attempts: config.retry_max_attempts.max(1),
            retry_base_delay_ms: config.retry_base_delay_ms.max(1),
        })
    }

    /// Enables artifact uploads through the Actions results service.
    pub fn with_actions_runtime(mut self, runtime: ActionsRuntimeConfig) -> Self {
        self.actions_runtime = Some(runtime);
        self
    }

    pub fn repo(&self) -> &RepoRef {
        &self.repo
    }

    fn repo_url(&self, suffix: &str) -> String {
        format!(
            "{}/repos/{}/{}/{}",
            self.api_base, self.repo.owner, self.repo.name, suffix
        )
    }

    async fn send_with_retry<F>(
        &self,
        operation: &str,
        mut request_builder: F,
    ) -> HostResult<reqwest::Response>
    where
        F: FnMut() -> reqwest::RequestBuilder,
    {
        let mut attempt = 0_usize;
        loop {
            attempt = attempt.saturating_add(1);
            match request_builder().send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response);
                    }
                    if status == reqwest::StatusCode::NOT_FOUND {
                        return Err(HostError::NotFound {
                            operation: operation.to_string(),
                        });
                    }

                    let retry_after = parse_retry_after(response.headers());
                    let body = response.text().await.unwrap_or_default();
                    if attempt < self.retry_max_attempts
                        && is_retryable_github_status(status.as_u16())
                    {
                        tracing::debug!(
                            operation,
                            attempt,
                            status = status.as_u16(),
                            "retrying github request"
                        );
                        tokio::time::sleep(retry_delay(
                            self.retry_base_delay_ms,
                            attempt,
                            retry_after,
                        ))
                        .await;
                        continue;
                    }

                    return Err(HostError::Status {
                        operation: operation.to_string(),
                        status: status.as_u16(),
                        body: truncate_for_error(&body, 800),
                    });
                }
                Err(error) => {
                    if attempt < self.retry_max_attempts && is_retryable_transport_error(&error) {
                        tokio::time::sleep(retry_delay(self.retry_base_delay_ms, attempt, None))
                            .await;
                        continue;
                    }
                    return Err(HostError::Transport {
                        operation: operation.to_string(),
                        source: error,
                    });
                }
            }
        }
    }

    async fn request_json<T, F>(&self, operation: &str, request_builder: F) -> HostResult<T>
    where
        T: DeserializeOwned,
        F: FnMut() -> reqwest::RequestBuilder,
    {
        let response = self.send_with_retry(operation, request_builder).await?;
        response.json::<T>().await.map_err(|error| HostError::Decode {
            operation: operation.to_string(),
            message: error.to_string(),
        })
    }

    async fn artifact_service<T: DeserializeOwned>(
        &self,
        operation: &str,
        runtime: &ActionsRuntimeConfig,
        method: &str,
        payload: &Value,
    ) -> HostResult<T> {
        let url = runtime.artifact_service_url(method);
        self.request_json(operation, || {
            self.runtime_http
                .post(&url)
                .bearer_auth(runtime.runtime_token.trim())
                .json(payload)
        })
        .await
    }

    async fn graphql<T: DeserializeOwned>(
        &self,
        operation: &str,
        query: &str,
        variables: Value,
    ) -> HostResult<T> {
        let payload = json!({ "query": query, "variables": variables });
        let envelope: Value = self
            .request_json(operation, || self.http.post(&self.graphql_url).json(&payload))
            .await?;
        if let Some(errors) = envelope.get("errors").and_then(Value::as_array) {
            if !errors.is_empty() {
                let message = errors
                    .iter()
                    .filter_map(|error| error.get("message").and_then(Value::as_str))
                    .collect::<Vec<_>>()
                    .join("; ");
                return Err(HostError::Graphql {
                    operation: operation.to_string(),
                    message,
                });
            }
        }
        let data = envelope.get("data").cloned().unwrap_or(Value::Null);
        serde_json::from_value(data).map_err(|error| HostError::Decode {
            operation: operation.to_string(),
            message: error.to_string(),
        })
    }
}

#[async_trait]
impl SourceHost for GithubApiClient {
    async fn pull_request_files_page(
        &self,
        pr_number: u64,
        cursor: Option<&str>,
    ) -> HostResult<ChangedFilesPage> {
        let data: GraphqlChangedFilesData = self
            .graphql(
                "pull request files",
                CHANGED_FILES_QUERY,
                json!({
                    "owner": self.repo.owner,
                    "repo": self.repo.name,
                    "prNumber": pr_number,
                    "startCursor": cursor,
                    "pageSize": CHANGED_FILES_PAGE_SIZE,
                }),
            )
            .await?;
        let Some(files) = data
            .repository
            .and_then(|repository| repository.pull_request)
            .and_then(|pull_request| pull_request.files)
        else {
            tracing::info!(pr_number, "no pull request or pull request files detected");
            return Ok(ChangedFilesPage::default());
        };
        let paths = files
            .edges
            .into_iter()
            .map(|edge| edge.node.path)
            .collect::<Vec<_>>();
        tracing::debug!(pr_number, files = ?paths, "pull request files page");
        Ok(ChangedFilesPage {
            files: paths,
            has_next_page: files.page_info.has_next_page,
            end_cursor: files.page_info.end_cursor,
        })
    }

    async fn commit_files(&self, sha: &str) -> HostResult<Vec<String>> {
        let url = self.repo_url(&format!("commits/{sha}"));
        let commit: GithubCommit = self
            .request_json("commit files", || self.http.get(&url))
            .await?;
        let files = commit
            .files
            .unwrap_or_default()
            .into_iter()
            .filter_map(|file| file.filename)
            .filter(|filename| !filename.is_empty())
            .collect::<Vec<_>>();
        tracing::info!(sha, count = files.len(), "commit files changed");
        Ok(files)
    }

    async fn list_issue_comments(&self, issue_number: u64) -> HostResult<Vec<HostComment>> {
        let url = self.repo_url(&format!("issues/{issue_number}/comments"));
        let mut page = 1_u32;
        let mut rows = Vec::new();
        loop {
            let page_value = page.to_string();
            let chunk: Vec<GithubIssueComment> = self
                .request_json("list issue comments", || {
                    self.http
                        .get(&url)
                        .query(&[("per_page", "100"), ("page", page_value.as_str())])
                })
                .await?;
            let chunk_len = chunk.len();
            rows.extend(chunk.into_iter().map(HostComment::from));
            if chunk_len < 100 {
                break;
            }
            page = page.saturating_add(1);
        }
        Ok(rows)
    }

    async fn create_issue_comment(
        &self,
        issue_number: u64,
        body: &str,
    ) -> HostResult<HostComment> {
        let url = self.repo_url(&format!("issues/{issue_number}/comments"));
        let payload = json!({ "body": body });
        let comment: GithubIssueComment = self
            .request_json("create issue comment", || {
                self.http.post(&url).json(&payload)
            })
            .await?;
        Ok(comment.into())
    }

    async fn update_issue_comment(&self, comment_id: u64, body: &str) -> HostResult<HostComment> {
        let url = self.repo_url(&format!("issues/comments/{comment_id}"));
        let payload = json!({ "body": body });
        let comment: GithubIssueComment = self
            .request_json("update issue comment", || {
                self.http.patch(&url).json(&payload)
            })
            .await?;
        Ok(comment.into())
    }

    async fn delete_issue_comment(&self, comment_id: u64) -> HostResult<()> {
        let url = self.repo_url(&format!("issues/comments/{comment_id}"));
        self.send_with_retry("delete issue comment", || self.http.delete(&url))
            .await?;
        Ok(())
    }

    async fn create_check_run(&self, request: &CheckRunCreate) -> HostResult<u64> {
        let url = self.repo_url("check-runs");
        let check_run: GithubCheckRun = self
            .request_json("create check run", || self.http.post(&url).json(request))
            .await?;
        Ok(check_run.id)
    }

    async fn update_check_run(
        &self,
        check_run_id: u64,
        update: &CheckRunUpdate,
    ) -> HostResult<()> {
        let url = self.repo_url(&format!("check-runs/{check_run_id}"));
        self.send_with_retry("update check run", || self.http.patch(&url).json(update))
            .await?;
        Ok(())
    }

    async fn list_workflows(&self) -> HostResult<Vec<HostWorkflow>> {
        let url = self.repo_url("actions/workflows");
        let list: GithubWorkflowList = self
            .request_json("list workflows", || {
                self.http.get(&url).query(&[("per_page", "100")])
            })
            .await?;
        Ok(list.workflows)
    }
}

#[async_trait]
impl ArtifactHost for GithubApiClient {
    async fn list_artifacts(&self, name: Option<&str>) -> HostResult<Vec<HostArtifact>> {
        let url = self.repo_url("actions/artifacts");
        let mut page = 1_u32;
        let mut rows = Vec::new();
        loop {
            let page_value = page.to_string();
            let list: GithubArtifactList = self
                .request_json("list artifacts", || {
                    let request = self
                        .http
                        .get(&url)
                        .query(&[("per_page", "100"), ("page", page_value.as_str())]);
                    match name {
                        Some(name) => request.query(&[("name", name)]),
                        None => request,
                    }
                })
                .await?;
            let chunk_len = list.artifacts.len();
            rows.extend(list.artifacts);
            if chunk_len < 100 {
                break;
            }
            page = page.saturating_add(1);
        }
        tracing::debug!(name, count = rows.len(), "listed artifacts");
        Ok(rows)
    }

    async fn download_artifact_entry(
        &self,
        artifact_id: u64,
        entry_name: &str,
    ) -> HostResult<Option<String>> {
        let operation = "download artifact";
        let url = self.repo_url(&format!("actions/artifacts/{artifact_id}/zip"));
        let response = self.send_with_retry(operation, || self.http.get(&url)).await?;
        let archive = response
            .bytes()
            .await
            .map_err(|source| HostError::Transport {
                operation: operation.to_string(),
                source,
            })?;
        read_text_entry(&archive, entry_name).map_err(|message| HostError::Archive {
            operation: operation.to_string(),
            message,
        })
    }

    async fn upload_artifact(
        &self,
        name: &str,
        entry_name: &str,
        contents: &str,
    ) -> HostResult<u64> {
        let operation = "upload artifact";
        let runtime_error = |message: String| HostError::ActionsRuntime {
            operation: operation.to_string(),
            message,
        };
        let runtime = self
            .actions_runtime
            .as_ref()
            .ok_or_else(|| runtime_error("ACTIONS_RUNTIME_TOKEN is not configured".to_string()))?;
        let ids = runtime.backend_ids().map_err(runtime_error)?;
        let archive = pack_single_entry(entry_name, contents).map_err(|message| {
            HostError::Archive {
                operation: operation.to_string(),
                message,
            }
        })?;

        let created: CreateArtifactResponse = self
            .artifact_service(
                operation,
                runtime,
                "CreateArtifact",
                &json!({
                    "workflowRunBackendId": ids.workflow_run_backend_id,
                    "workflowJobRunBackendId": ids.workflow_job_run_backend_id,
                    "name": name,
                    "version": 4,
                }),
            )
            .await?;
        if !created.ok || created.signed_upload_url.is_empty() {
            return Err(runtime_error(format!("results service refused artifact '{name}'")));
        }

        self.send_with_retry(operation, || {
            self.runtime_http
                .put(&created.signed_upload_url)
                .header("x-ms-blob-type", "BlockBlob")
                .body(archive.clone())
        })
        .await?;

        let finalized: FinalizeArtifactResponse = self
            .artifact_service(
                operation,
                runtime,
                "FinalizeArtifact",
                &json!({
                    "workflowRunBackendId": ids.workflow_run_backend_id,
                    "workflowJobRunBackendId": ids.workflow_job_run_backend_id,
                    "name": name,
                    "size": archive.len().to_string(),
                    "hash": archive_digest(&archive),
                }),
            )
            .await?;
        let artifact_id = artifact_id_from_value(&finalized.artifact_id)
            .filter(|_| finalized.ok)
            .ok_or_else(|| runtime_error(format!("results service did not finalize '{name}'")))?;
        tracing::info!(name, artifact_id, size = archive.len(), "uploaded artifact");
        Ok(artifact_id)
    }

    async fn delete_artifact(&self, artifact_id: u64) -> HostResult<()> {
        let url = self.repo_url(&format!("actions/artifacts/{artifact_id}"));
        self.send_with_retry("delete artifact", || self.http.delete(&url))
            .await?;
        Ok(())
    }
}
