use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use lintrelay_github::{
    parse_run_trigger, ActionsRuntimeConfig, GithubApiClient, GithubApiClientConfig, RepoRef,
};
use lintrelay_runtime::{
    ArtifactStore, EnvInputSource, EslintCommandEngine, EslintEngineConfig, FsArtifactStore,
    GithubArtifactStore, ReconcileRuntime, RelayConfig, RunContext, RunOutcome,
};
use serde_json::Value;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::cli_args::{Cli, StateBackend};

pub(crate) fn init_tracing() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

/// Missing payload files read as an empty payload; schedule events carry nothing useful.
pub(crate) fn load_event_payload(path: Option<&Path>) -> Result<Value> {
    let Some(path) = path else {
        return Ok(Value::Null);
    };
    if !path.exists() {
        return Ok(Value::Null);
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read event payload {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse event payload {}", path.display()))
}

/// Both results-service settings, or none; a half-configured runtime is ignored.
pub(crate) fn actions_runtime_from(cli: &Cli) -> Option<ActionsRuntimeConfig> {
    let results_url = cli.actions_results_url.as_deref()?.trim();
    let runtime_token = cli.actions_runtime_token.as_deref()?.trim();
    if results_url.is_empty() || runtime_token.is_empty() {
        return None;
    }
    Some(ActionsRuntimeConfig {
        results_url: results_url.to_string(),
        runtime_token: runtime_token.to_string(),
    })
}

pub(crate) fn describe_outcome(outcome: &RunOutcome) -> String {
    match outcome {
        RunOutcome::Deferred => "deferred: read-only run without an active scheduler".to_string(),
        RunOutcome::Stashed { issue_number, key } => {
            format!("stashed results for #{issue_number} as {key}")
        }
        RunOutcome::Linted {
            issue_number,
            files,
            conclusion,
            ..
        } => match issue_number {
            Some(number) => format!("linted {files} file(s) for #{number}: {conclusion:?}"),
            None => format!("linted {files} file(s): {conclusion:?}"),
        },
        RunOutcome::Drained { applied, failed } => {
            format!("drained pending results: {applied} applied, {failed} failed")
        }
        RunOutcome::CleanedUp {
            issue_number,
            deleted,
        } => format!("removed {deleted} artifact(s) for closed #{issue_number}"),
    }
}

pub(crate) async fn run_cli(cli: Cli) -> Result<()> {
    let config =
        RelayConfig::from_inputs(&EnvInputSource).context("failed to resolve action inputs")?;
    let payload = load_event_payload(cli.event_path.as_deref())?;
    let trigger =
        parse_run_trigger(&cli.event_name, &payload, &cli.sha).map_err(|error| anyhow!(error))?;
    let repo = RepoRef::parse(&cli.repo).map_err(|error| anyhow!(error))?;

    let mut client = GithubApiClient::new(GithubApiClientConfig {
        api_base: cli.api_base.clone(),
        token: cli.github_token.clone(),
        repo,
        request_timeout_ms: cli.request_timeout_ms,
        retry_max_attempts: cli.retry_max_attempts,
        retry_base_delay_ms: cli.retry_base_delay_ms,
    })
    .context("failed to create github client")?;
    if let Some(runtime) = actions_runtime_from(&cli) {
        client = client.with_actions_runtime(runtime);
    }
    let host = Arc::new(client);
    let store: Arc<dyn ArtifactStore> = match cli.state_backend {
        StateBackend::Github => {
            if actions_runtime_from(&cli).is_none() {
                tracing::warn!("ACTIONS_RUNTIME_TOKEN unavailable; artifact uploads will fail");
            }
            Arc::new(GithubArtifactStore::new(host.clone()))
        }
        StateBackend::Fs => Arc::new(FsArtifactStore::new(cli.state_dir.clone())),
    };
    tracing::debug!(backend = ?cli.state_backend, "state backend selected");
    let engine = EslintCommandEngine::new(EslintEngineConfig {
        executable: cli.eslint_bin.clone(),
        extra_args: cli.eslint_args.clone(),
        working_dir: cli.workspace.as_ref().map(PathBuf::from),
        timeout_ms: cli.eslint_timeout_ms,
        options: config.eslint.clone(),
    });

    let runtime = ReconcileRuntime::new(
        config,
        RunContext {
            trigger,
            workflow_name: cli.workflow.clone(),
            workspace_root: cli.workspace.clone(),
        },
        host,
        store,
        Arc::new(engine),
    )?;
    let outcome = runtime.run(Utc::now()).await.map_err(|error| {
        tracing::error!(error = %error, "lintrelay run failed");
        error
    })?;
    tracing::info!("{}", describe_outcome(&outcome));
    Ok(())
}
