//! Read access to the advisory repository.
//!
//! This module provides the [`Repository`] trait the orchestrator reads
//! commits and advisories through, and two implementations:
//!
//! | Repository | Backing |
//! |------------|---------|
//! | [`GitRepository`] | A git repository on disk, cloned on first use for URLs |
//! | [`MemoryRepository`] | Commits held in memory, for tests and fixtures |
//!
//! The repository is treated as external state: it is only ever read.

mod git;
mod memory;

pub use git::GitRepository;
pub use memory::MemoryRepository;

#[cfg(test)]
pub(crate) use git::fixture;

use async_trait::async_trait;

use crate::error::RepoError;
use crate::model::{AdvisoryFile, CommitInfo};

/// Read-only view of the commits and advisory trees of a repository.
#[async_trait]
pub trait Repository: Send + Sync {
    /// Resolves a commit identifier to its hash and committer time.
    ///
    /// # Errors
    ///
    /// Returns [`RepoError::CommitNotFound`] if the commit is not in the
    /// repository history.
    async fn resolve_commit(&self, commit: &str) -> Result<CommitInfo, RepoError>;

    /// Returns every advisory file in the tree of `commit`, ordered by path.
    async fn advisory_files(&self, commit: &CommitInfo) -> Result<Vec<AdvisoryFile>, RepoError>;
}
