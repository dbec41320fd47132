use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::Repository;
use crate::error::RepoError;
use crate::model::{AdvisoryFile, CommitInfo};
use crate::platform::repo_clone_dir;

/// A git repository read through libgit2.
///
/// libgit2 calls block, so every read runs on tokio's blocking pool. The
/// handle is not `Sync` and sits behind a mutex that each read holds for
/// its whole duration.
pub struct GitRepository {
    repo: Arc<Mutex<git2::Repository>>,
    location: String,
}

impl std::fmt::Debug for GitRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitRepository")
            .field("location", &self.location)
            .finish()
    }
}

impl GitRepository {
    /// Opens the repository at `path`. Bare repositories are accepted.
    pub fn open(path: &Path) -> Result<Self, RepoError> {
        let repo = git2::Repository::open(path).map_err(|_| RepoError::NotARepo {
            location: path.display().to_string(),
        })?;
        Ok(Self::from_git2_repo(repo, path.display().to_string()))
    }

    /// Opens `location` if it is a local path. URLs are cloned into the
    /// cache directory on first use and fetched on later use.
    pub async fn clone_or_open(location: &str) -> Result<Self, RepoError> {
        let location = location.to_string();
        tokio::task::spawn_blocking(move || Self::clone_or_open_blocking(&location))
            .await
            .map_err(join_err)?
    }

    fn clone_or_open_blocking(location: &str) -> Result<Self, RepoError> {
        if !is_url(location) {
            return Self::open(Path::new(location));
        }

        let dest = repo_clone_dir(location);
        let clone_err = |err: git2::Error| RepoError::Clone {
            url: location.to_string(),
            message: err.message().to_string(),
        };

        let repo = if dest.exists() {
            info!(url = location, path = %dest.display(), "fetching cached clone");
            let repo = git2::Repository::open(&dest).map_err(clone_err)?;
            {
                let mut remote = repo.find_remote("origin").map_err(clone_err)?;
                remote
                    .fetch(&["+refs/heads/*:refs/heads/*"], None, None)
                    .map_err(clone_err)?;
            }
            repo
        } else {
            info!(url = location, path = %dest.display(), "cloning repository");
            if let Some(parent) = dest.parent() {
                std::fs::create_dir_all(parent).map_err(|e| RepoError::Clone {
                    url: location.to_string(),
                    message: e.to_string(),
                })?;
            }
            git2::build::RepoBuilder::new()
                .bare(true)
                .clone(location, &dest)
                .map_err(clone_err)?
        };

        Ok(Self::from_git2_repo(repo, location.to_string()))
    }

    fn from_git2_repo(repo: git2::Repository, location: String) -> Self {
        Self {
            repo: Arc::new(Mutex::new(repo)),
            location,
        }
    }

    /// The path or URL the repository was opened from.
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Runs `f` against the locked handle on the blocking pool.
    async fn with_repo<T, F>(&self, f: F) -> Result<T, RepoError>
    where
        T: Send + 'static,
        F: FnOnce(&git2::Repository) -> Result<T, RepoError> + Send + 'static,
    {
        let repo = Arc::clone(&self.repo);
        tokio::task::spawn_blocking(move || {
            let guard = repo.lock().map_err(|_| RepoError::Git {
                message: "repository lock poisoned".to_string(),
            })?;
            f(&*guard)
        })
        .await
        .map_err(join_err)?
    }
}

#[async_trait]
impl Repository for GitRepository {
    async fn resolve_commit(&self, commit: &str) -> Result<CommitInfo, RepoError> {
        let commit = commit.to_string();
        self.with_repo(move |repo| {
            let object = repo
                .revparse_single(&commit)
                .map_err(|e| from_git2(e, &commit))?;
            let found = object.peel_to_commit().map_err(|e| from_git2(e, &commit))?;

            let when = found.committer().when();
            let time =
                DateTime::from_timestamp(when.seconds(), 0).unwrap_or(DateTime::<Utc>::UNIX_EPOCH);

            Ok(CommitInfo::new(found.id().to_string(), time))
        })
        .await
    }

    async fn advisory_files(&self, commit: &CommitInfo) -> Result<Vec<AdvisoryFile>, RepoError> {
        let hash = commit.hash.clone();
        let files = self.with_repo(move |repo| read_advisory_tree(repo, &hash)).await?;
        debug!(commit = %commit.hash, count = files.len(), "read advisory tree");
        Ok(files)
    }
}

fn read_advisory_tree(repo: &git2::Repository, hash: &str) -> Result<Vec<AdvisoryFile>, RepoError> {
    let oid = git2::Oid::from_str(hash).map_err(|e| from_git2(e, hash))?;
    let tree = repo
        .find_commit(oid)
        .and_then(|c| c.tree())
        .map_err(|e| from_git2(e, hash))?;

    let mut entries = Vec::new();
    tree.walk(git2::TreeWalkMode::PreOrder, |root, entry| {
        if entry.kind() == Some(git2::ObjectType::Blob) {
            if let Some(name) = entry.name() {
                let path = format!("{}{}", root, name);
                if AdvisoryFile::is_advisory_path(&path) {
                    entries.push((path, entry.id()));
                }
            }
        }
        git2::TreeWalkResult::Ok
    })
    .map_err(|e| from_git2(e, hash))?;

    let mut files = Vec::with_capacity(entries.len());
    for (path, oid) in entries {
        let blob = repo
            .find_blob(oid)
            .map_err(|e| from_git2(e, &oid.to_string()))?;
        files.push(AdvisoryFile::new(path, oid.to_string(), blob.content().to_vec()));
    }
    files.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(files)
}

fn join_err(err: tokio::task::JoinError) -> RepoError {
    RepoError::Git {
        message: format!("repository task failed: {}", err),
    }
}

fn is_url(location: &str) -> bool {
    ["http://", "https://", "ssh://", "git://", "file://", "git@"]
        .iter()
        .any(|prefix| location.starts_with(prefix))
}

fn from_git2(err: git2::Error, context: &str) -> RepoError {
    match err.code() {
        git2::ErrorCode::NotFound | git2::ErrorCode::Ambiguous => RepoError::CommitNotFound {
            hash: context.to_string(),
        },
        git2::ErrorCode::InvalidSpec => RepoError::InvalidHash {
            hash: context.to_string(),
        },
        _ => RepoError::Git {
            message: format!("{}: {}", context, err.message()),
        },
    }
}
