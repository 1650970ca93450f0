//! Named text-blob storage shared by every run of a workflow.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use lintrelay_core::write_text_atomic;
use lintrelay_github::{ArtifactHost, HostArtifact, HostError};
use thiserror::Error;
use tokio::sync::RwLock;

const ARTIFACT_FILE_SUFFIX: &str = ".json";

#[derive(Debug, Error)]
pub enum ArtifactStoreError {
    #[error("invalid artifact key '{0}'")]
    InvalidKey(String),
    #[error("artifact store io failure for '{target}'")]
    Io {
        target: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write artifact '{key}': {message}")]
    Write { key: String, message: String },
    #[error("artifact host failed to {operation} '{key}'")]
    Host {
        operation: &'static str,
        key: String,
        #[source]
        source: HostError,
    },
}

/// Durable key/value storage for workflow state, issue state and pending results.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn read(&self, key: &str) -> Result<Option<String>, ArtifactStoreError>;
    async fn write(&self, key: &str, contents: &str) -> Result<(), ArtifactStoreError>;
    /// Keys starting with `prefix`, sorted.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, ArtifactStoreError>;
    /// Returns false when nothing was stored under `key`.
    async fn delete(&self, key: &str) -> Result<bool, ArtifactStoreError>;
}

fn validate_key(key: &str) -> Result<(), ArtifactStoreError> {
    if key.trim().is_empty() || key.starts_with('.') || key.contains('\0') {
        return Err(ArtifactStoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// Escapes the characters a key may carry that cannot appear in a file name.
fn encode_key(key: &str) -> String {
    let mut encoded = String::with_capacity(key.len());
    for ch in key.chars() {
        match ch {
            '%' => encoded.push_str("%25"),
            '/' => encoded.push_str("%2F"),
            '\\' => encoded.push_str("%5C"),
            other => encoded.push(other),
        }
    }
    encoded
}

fn decode_key(encoded: &str) -> String {
    encoded
        .replace("%2F", "/")
        .replace("%5C", "\\")
        .replace("%25", "%")
}

/// One `<key>.json` file per artifact under a state directory.
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, ArtifactStoreError> {
        validate_key(key)?;
        Ok(self
            .root
            .join(format!("{}{ARTIFACT_FILE_SUFFIX}", encode_key(key))))
    }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn read(&self, key: &str) -> Result<Option<String>, ArtifactStoreError> {
        let path = self.path_for(key)?;
        match std::fs::read_to_string(&path) {
            Ok(raw) => Ok(Some(raw)),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(ArtifactStoreError::Io {
                target: path.display().to_string(),
                source,
            }),
        }
    }

    async fn write(&self, key: &str, contents: &str) -> Result<(), ArtifactStoreError> {
        let path = self.path_for(key)?;
        write_text_atomic(&path, contents).map_err(|error| ArtifactStoreError::Write {
            key: key.to_string(),
            message: format!("{error:#}"),
        })
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, ArtifactStoreError> {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(ArtifactStoreError::Io {
                    target: self.root.display().to_string(),
                    source,
                })
            }
        };
        let mut keys = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| ArtifactStoreError::Io {
                target: self.root.display().to_string(),
                source,
            })?;
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            if file_name.starts_with('.') {
                continue;
            }
            let Some(encoded) = file_name.strip_suffix(ARTIFACT_FILE_SUFFIX) else {
                continue;
            };
            let key = decode_key(encoded);
            if key.starts_with(prefix) {
                keys.push(key);
            }
        }
        keys.sort();
        Ok(keys)
    }

    async fn delete(&self, key: &str) -> Result<bool, ArtifactStoreError> {
        let path = self.path_for(key)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(ArtifactStoreError::Io {
                target: path.display().to_string(),
                source,
            }),
        }
    }
}

/// Workflow artifacts as the store: each key is an artifact holding one `<key>.json` entry.
///
/// Artifacts are immutable, so a write uploads a fresh artifact and prunes the
/// older ones of the same name; readers always take the newest.
#[derive(Clone)]
pub struct GithubArtifactStore {
    host: Arc<dyn ArtifactHost>,
}

impl GithubArtifactStore {
    pub fn new(host: Arc<dyn ArtifactHost>) -> Self {
        Self { host }
    }

    async fn live_artifacts(&self, name: &str) -> Result<Vec<HostArtifact>, ArtifactStoreError> {
        let artifacts = self
            .host
            .list_artifacts(Some(name))
            .await
            .map_err(|source| host_error("list", name, source))?;
        Ok(artifacts
            .into_iter()
            .filter(|artifact| artifact.name == name && !artifact.expired)
            .collect())
    }
}

fn host_error(operation: &'static str, key: &str, source: HostError) -> ArtifactStoreError {
    ArtifactStoreError::Host {
        operation,
        key: key.to_string(),
        source,
    }
}

fn entry_name(name: &str) -> String {
    format!("{name}{ARTIFACT_FILE_SUFFIX}")
}

#[async_trait]
impl ArtifactStore for GithubArtifactStore {
    async fn read(&self, key: &str) -> Result<Option<String>, ArtifactStoreError> {
        validate_key(key)?;
        let name = encode_key(key);
        let newest = self
            .live_artifacts(&name)
            .await?
            .into_iter()
            .max_by(|left, right| {
                (left.created_at.as_deref(), left.id).cmp(&(right.created_at.as_deref(), right.id))
            });
        let Some(artifact) = newest else {
            return Ok(None);
        };
        self.host
            .download_artifact_entry(artifact.id, &entry_name(&name))
            .await
            .map_err(|source| host_error("download", key, source))
    }

    async fn write(&self, key: &str, contents: &str) -> Result<(), ArtifactStoreError> {
        validate_key(key)?;
        let name = encode_key(key);
        let uploaded = self
            .host
            .upload_artifact(&name, &entry_name(&name), contents)
            .await
            .map_err(|source| host_error("upload", key, source))?;
        let stale = match self.live_artifacts(&name).await {
            Ok(artifacts) => artifacts,
            Err(error) => {
                tracing::warn!(key, error = %error, "could not list superseded artifacts");
                return Ok(());
            }
        };
        for artifact in stale.into_iter().filter(|artifact| artifact.id != uploaded) {
            if let Err(error) = self.host.delete_artifact(artifact.id).await {
                if !error.is_not_found() {
                    tracing::warn!(
                        key,
                        artifact_id = artifact.id,
                        error = %error,
                        "failed to prune superseded artifact"
                    );
                }
            }
        }
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, ArtifactStoreError> {
        let artifacts = self
            .host
            .list_artifacts(None)
            .await
            .map_err(|source| host_error("list", prefix, source))?;
        let mut keys = artifacts
            .into_iter()
            .filter(|artifact| !artifact.expired)
            .map(|artifact| decode_key(&artifact.name))
            .filter(|key| key.starts_with(prefix))
            .collect::<Vec<_>>();
        keys.sort();
        keys.dedup();
        Ok(keys)
    }

    async fn delete(&self, key: &str) -> Result<bool, ArtifactStoreError> {
        validate_key(key)?;
        let artifacts = self.live_artifacts(&encode_key(key)).await?;
        let mut deleted = false;
        for artifact in artifacts {
            match self.host.delete_artifact(artifact.id).await {
                Ok(()) => deleted = true,
                Err(error) if error.is_not_found() => {}
                Err(source) => return Err(host_error("delete", key, source)),
            }
        }
        Ok(deleted)
    }
}

/// In-process store; records every write so callers can assert on commit behaviour.
#[derive(Debug, Default)]
pub struct MemoryArtifactStore {
    entries: RwLock<BTreeMap<String, String>>,
    write_log: Mutex<Vec<String>>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keys in the order they were written, including repeated writes.
    pub fn write_log(&self) -> Vec<String> {
        self.write_log
            .lock()
            .map(|log| log.clone())
            .unwrap_or_default()
    }

    pub fn writes_to(&self, key: &str) -> usize {
        self.write_log().iter().filter(|logged| *logged == key).count()
    }
}

#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
    async fn read(&self, key: &str) -> Result<Option<String>, ArtifactStoreError> {
        validate_key(key)?;
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn write(&self, key: &str, contents: &str) -> Result<(), ArtifactStoreError> {
        validate_key(key)?;
        self.entries
            .write()
            .await
            .insert(key.to_string(), contents.to_string());
        if let Ok(mut log) = self.write_log.lock() {
            log.push(key.to_string());
        }
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, ArtifactStoreError> {
        Ok(self
            .entries
            .read()
            .await
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn delete(&self, key: &str) -> Result<bool, ArtifactStoreError> {
        validate_key(key)?;
        Ok(self.entries.write().await.remove(key).is_some())
    }
}
