//! Changed-file discovery: paginated host queries passed through the path filter.

use std::collections::VecDeque;

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use lintrelay_github::{HostError, SourceHost, CHANGED_FILES_PAGE_SIZE};

use crate::error::ConfigError;

/// Extension allow-list, then include globs, then ignore globs.
#[derive(Debug, Clone)]
pub struct FileFilter {
    extensions: Vec<String>,
    include: Option<GlobSet>,
    ignore: Option<GlobSet>,
}

fn build_glob_set(patterns: &[String]) -> Result<Option<GlobSet>, ConfigError> {
    let patterns = patterns
        .iter()
        .map(|pattern| pattern.trim())
        .filter(|pattern| !pattern.is_empty())
        .collect::<Vec<_>>();
    if patterns.is_empty() {
        return Ok(None);
    }
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = GlobBuilder::new(pattern)
            .literal_separator(true)
            .build()
            .map_err(|error| ConfigError::InvalidGlob {
                pattern: pattern.to_string(),
                message: error.to_string(),
            })?;
        builder.add(glob);
    }
    builder
        .build()
        .map(Some)
        .map_err(|error| ConfigError::InvalidGlob {
            pattern: String::new(),
            message: error.to_string(),
        })
}

impl FileFilter {
    pub fn new(
        extensions: &[String],
        include_glob: &[String],
        ignore_glob: &[String],
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            extensions: extensions
                .iter()
                .map(|extension| extension.trim().to_string())
                .filter(|extension| !extension.is_empty())
                .collect(),
            include: build_glob_set(include_glob)?,
            ignore: build_glob_set(ignore_glob)?,
        })
    }

    fn matches_extension(&self, path: &str) -> bool {
        self.extensions
            .iter()
            .any(|extension| path.ends_with(extension.as_str()))
    }

    /// Order-preserving `(extension ∩ include) \ ignore`.
    pub fn apply(&self, files: &[String]) -> Vec<String> {
        let included = files
            .iter()
            .filter(|path| self.matches_extension(path))
            .filter(|path| {
                self.include
                    .as_ref()
                    .map_or(true, |include| include.is_match(path.as_str()))
            })
            .cloned()
            .collect::<Vec<_>>();

        let Some(ignore) = self.ignore.as_ref() else {
            return included;
        };
        if !included.iter().any(|path| ignore.is_match(path.as_str())) {
            return included;
        }
        included
            .into_iter()
            .filter(|path| !ignore.is_match(path.as_str()))
            .collect()
    }
}

/// What to enumerate: a pull request's files, or a single commit's files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoverySource {
    PullRequest { number: u64 },
    Commit { sha: String },
}

/// One filtered page of candidate paths. An empty `files` list does not mean the sequence ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeBatch {
    pub files: Vec<String>,
    pub has_more: bool,
    pub cursor: Option<String>,
}

#[derive(Debug)]
enum DiscoveryCursor {
    PullRequest { number: u64, after: Option<String> },
    Commit { sha: String },
    CommitSlices { remaining: VecDeque<String> },
    Done,
}

/// Finite, single-pass sequence of `ChangeBatch` values.
///
/// Cursor state lives here, so dropping the value mid-sequence releases everything.
pub struct ChangeSetDiscovery<'a> {
    host: &'a dyn SourceHost,
    filter: &'a FileFilter,
    cursor: DiscoveryCursor,
}

impl<'a> ChangeSetDiscovery<'a> {
    pub fn new(host: &'a dyn SourceHost, filter: &'a FileFilter, source: DiscoverySource) -> Self {
        let cursor = match source {
            DiscoverySource::PullRequest { number } => {
                DiscoveryCursor::PullRequest { number, after: None }
            }
            DiscoverySource::Commit { sha } => DiscoveryCursor::Commit { sha },
        };
        Self {
            host,
            filter,
            cursor,
        }
    }

    pub async fn next_batch(&mut self) -> Result<Option<ChangeBatch>, HostError> {
        match std::mem::replace(&mut self.cursor, DiscoveryCursor::Done) {
            DiscoveryCursor::PullRequest { number, after } => {
                self.next_pull_request_page(number, after).await
            }
            DiscoveryCursor::Commit { sha } => {
                let files = self.host.commit_files(&sha).await.map_err(|error| {
                    tracing::error!(sha = %sha, error = %error, "failed to list commit files");
                    error
                })?;
                let remaining = self.filter.apply(&files).into_iter().collect();
                Ok(self.next_commit_slice(remaining))
            }
            DiscoveryCursor::CommitSlices { remaining } => Ok(self.next_commit_slice(remaining)),
            DiscoveryCursor::Done => Ok(None),
        }
    }

    /// Drains the remaining batches into one list.
    pub async fn collect_all(mut self) -> Result<Vec<String>, HostError> {
        let mut files = Vec::new();
        while let Some(batch) = self.next_batch().await? {
            files.extend(batch.files);
        }
        Ok(files)
    }

    async fn next_pull_request_page(
        &mut self,
        number: u64,
        after: Option<String>,
    ) -> Result<Option<ChangeBatch>, HostError> {
        let page = self
            .host
            .pull_request_files_page(number, after.as_deref())
            .await
            .map_err(|error| {
                tracing::error!(
                    pr_number = number,
                    error = %error,
                    "failed to list pull request files"
                );
                error
            })?;
        if page.files.is_empty() {
            return Ok(None);
        }

        let files = self.filter.apply(&page.files);
        match (page.has_next_page, page.end_cursor.clone()) {
            (true, Some(end_cursor)) => {
                self.cursor = DiscoveryCursor::PullRequest {
                    number,
                    after: Some(end_cursor),
                };
            }
            (true, None) => {
                tracing::warn!(
                    pr_number = number,
                    "host reported more pages without a cursor; stopping discovery"
                );
            }
            (false, _) => {}
        }
        Ok(Some(ChangeBatch {
            files,
            has_more: matches!(self.cursor, DiscoveryCursor::PullRequest { .. }),
            cursor: page.end_cursor,
        }))
    }

    fn next_commit_slice(&mut self, mut remaining: VecDeque<String>) -> Option<ChangeBatch> {
        if remaining.is_empty() {
            return None;
        }
        let take = remaining.len().min(CHANGED_FILES_PAGE_SIZE);
        let files = remaining.drain(..take).collect::<Vec<_>>();
        let has_more = !remaining.is_empty();
        if has_more {
            self.cursor = DiscoveryCursor::CommitSlices { remaining };
        }
        Some(ChangeBatch {
            files,
            has_more,
            cursor: None,
        })
    }
}
