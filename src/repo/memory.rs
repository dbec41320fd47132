use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::Repository;
use crate::error::RepoError;
use crate::model::{AdvisoryFile, CommitInfo};

/// A repository whose commits live in memory.
#[derive(Debug, Default, Clone)]
pub struct MemoryRepository {
    commits: HashMap<String, (CommitInfo, Vec<AdvisoryFile>)>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a commit with the given tree contents. Non-advisory paths are
    /// accepted and filtered out on read, as in a real tree.
    pub fn with_commit(
        mut self,
        hash: impl Into<String>,
        time: DateTime<Utc>,
        files: Vec<AdvisoryFile>,
    ) -> Self {
        let info = CommitInfo::new(hash, time);
        self.commits.insert(info.hash.clone(), (info, files));
        self
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn resolve_commit(&self, commit: &str) -> Result<CommitInfo, RepoError> {
        self.commits
            .get(commit)
            .map(|(info, _)| info.clone())
            .ok_or_else(|| RepoError::CommitNotFound {
                hash: commit.to_string(),
            })
    }

    async fn advisory_files(&self, commit: &CommitInfo) -> Result<Vec<AdvisoryFile>, RepoError> {
        let (_, files) = self
            .commits
            .get(&commit.hash)
            .ok_or_else(|| RepoError::CommitNotFound {
                hash: commit.hash.clone(),
            })?;

        let mut files: Vec<AdvisoryFile> = files
            .iter()
            .filter(|f| AdvisoryFile::is_advisory_path(&f.path))
            .cloned()
            .collect();
        files.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(files)
    }
}
