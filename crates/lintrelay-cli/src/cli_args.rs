use std::path::PathBuf;

use clap::{Parser, ValueEnum};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StateBackend {
    /// Workflow artifacts, readable by every run of the repository.
    Github,
    /// Files under `--state-dir`; only useful when runs share a disk.
    Fs,
}

#[derive(Debug, Parser)]
#[command(
    name = "lintrelay",
    about = "Publishes ESLint results to pull requests, relaying fork runs through a scheduled job",
    version
)]
pub struct Cli {
    #[arg(
        long,
        env = "GITHUB_REPOSITORY",
        help = "Repository in owner/name form"
    )]
    pub repo: String,

    #[arg(
        long = "github-token",
        env = "GITHUB_TOKEN",
        hide_env_values = true,
        help = "Token used for GitHub API calls"
    )]
    pub github_token: String,

    #[arg(
        long = "event-name",
        env = "GITHUB_EVENT_NAME",
        help = "Workflow event that triggered the run (schedule, pull_request, issue_comment, ...)"
    )]
    pub event_name: String,

    #[arg(
        long = "event-path",
        env = "GITHUB_EVENT_PATH",
        help = "Path to the JSON event payload"
    )]
    pub event_path: Option<PathBuf>,

    #[arg(
        long,
        env = "GITHUB_SHA",
        default_value = "",
        help = "Commit sha used when the payload does not carry one"
    )]
    pub sha: String,

    #[arg(
        long,
        env = "GITHUB_WORKFLOW",
        help = "Workflow name; scopes every persisted artifact key"
    )]
    pub workflow: String,

    #[arg(
        long,
        env = "GITHUB_WORKSPACE",
        help = "Checkout directory; also the lint working directory"
    )]
    pub workspace: Option<String>,

    #[arg(
        long = "api-base",
        env = "GITHUB_API_URL",
        default_value = "https://api.github.com",
        help = "GitHub REST API base URL"
    )]
    pub api_base: String,

    #[arg(
        long = "state-backend",
        env = "LINTRELAY_STATE_BACKEND",
        value_enum,
        default_value = "github",
        help = "Where workflow state, issue state and pending lint results are kept"
    )]
    pub state_backend: StateBackend,

    #[arg(
        long = "actions-results-url",
        env = "ACTIONS_RESULTS_URL",
        help = "Actions results service used to upload state artifacts"
    )]
    pub actions_results_url: Option<String>,

    #[arg(
        long = "actions-runtime-token",
        env = "ACTIONS_RUNTIME_TOKEN",
        hide_env_values = true,
        help = "Runtime token authorizing artifact uploads"
    )]
    pub actions_runtime_token: Option<String>,

    #[arg(
        long = "state-dir",
        env = "LINTRELAY_STATE_DIR",
        default_value = ".lintrelay/artifacts",
        help = "State directory for the fs backend"
    )]
    pub state_dir: PathBuf,

    #[arg(
        long = "eslint-bin",
        env = "LINTRELAY_ESLINT_BIN",
        default_value = "npx",
        help = "Executable used to run ESLint"
    )]
    pub eslint_bin: String,

    #[arg(
        long = "eslint-arg",
        env = "LINTRELAY_ESLINT_ARGS",
        value_delimiter = ',',
        default_value = "eslint",
        help = "Arguments placed before the generated ESLint flags"
    )]
    pub eslint_args: Vec<String>,

    #[arg(
        long = "eslint-timeout-ms",
        env = "LINTRELAY_ESLINT_TIMEOUT_MS",
        default_value_t = 600_000,
        help = "Timeout for one ESLint batch"
    )]
    pub eslint_timeout_ms: u64,

    #[arg(
        long = "request-timeout-ms",
        env = "LINTRELAY_REQUEST_TIMEOUT_MS",
        default_value_t = 30_000,
        help = "Timeout for one GitHub API request"
    )]
    pub request_timeout_ms: u64,

    #[arg(
        long = "retry-max-attempts",
        env = "LINTRELAY_RETRY_MAX_ATTEMPTS",
        default_value_t = 4,
        help = "Attempts per GitHub API request before giving up on retryable failures"
    )]
    pub retry_max_attempts: usize,

    #[arg(
        long = "retry-base-delay-ms",
        env = "LINTRELAY_RETRY_BASE_DELAY_MS",
        default_value_t = 500,
        help = "Base delay for exponential retry backoff"
    )]
    pub retry_base_delay_ms: u64,
}
