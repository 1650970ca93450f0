//! Credentials for the Actions results service, which accepts artifact uploads
//! even from runs whose repository token is read-only.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::Deserialize;

const RESULTS_SCOPE_PREFIX: &str = "Actions.Results:";
const ARTIFACT_SERVICE_PATH: &str = "twirp/github.actions.results.api.v1.ArtifactService";

#[derive(Clone)]
pub struct ActionsRuntimeConfig {
    /// `ACTIONS_RESULTS_URL`.
    pub results_url: String,
    /// `ACTIONS_RUNTIME_TOKEN`.
    pub runtime_token: String,
}

impl std::fmt::Debug for ActionsRuntimeConfig {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("ActionsRuntimeConfig")
            .field("results_url", &self.results_url)
            .field("runtime_token", &"<redacted>")
            .finish()
    }
}

/// Run and job ids the results service keys uploads by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultsBackendIds {
    pub workflow_run_backend_id: String,
    pub workflow_job_run_backend_id: String,
}

#[derive(Debug, Deserialize)]
struct RuntimeTokenClaims {
    #[serde(default)]
    scp: String,
}

impl ActionsRuntimeConfig {
    pub fn artifact_service_url(&self, method: &str) -> String {
        format!(
            "{}/{ARTIFACT_SERVICE_PATH}/{method}",
            self.results_url.trim_end_matches('/')
        )
    }

    /// Reads the backend ids from the `Actions.Results:<run>:<job>` scope of the runtime token.
    pub fn backend_ids(&self) -> Result<ResultsBackendIds, String> {
        let payload = self
            .runtime_token
            .split('.')
            .nth(1)
            .ok_or_else(|| "runtime token is not a jwt".to_string())?;
        let decoded = URL_SAFE_NO_PAD
            .decode(payload.trim_end_matches('='))
            .map_err(|error| format!("runtime token payload is not base64url: {error}"))?;
        let claims: RuntimeTokenClaims = serde_json::from_slice(&decoded)
            .map_err(|error| format!("runtime token payload is not json: {error}"))?;
        claims
            .scp
            .split_whitespace()
            .find_map(|scope| scope.strip_prefix(RESULTS_SCOPE_PREFIX))
            .and_then(|ids| ids.split_once(':'))
            .filter(|(run, job)| !run.is_empty() && !job.is_empty())
            .map(|(run, job)| ResultsBackendIds {
                workflow_run_backend_id: run.to_string(),
                workflow_job_run_backend_id: job.to_string(),
            })
            .ok_or_else(|| "runtime token carries no Actions.Results scope".to_string())
    }
}

#[cfg(test)]
pub(crate) fn runtime_token_with_scope(scope: &str) -> String {
    let payload = URL_SAFE_NO_PAD.encode(serde_json::json!({ "scp": scope }).to_string());
    format!("eyJhbGciOiJSUzI1NiJ9.{payload}.signature")
}
