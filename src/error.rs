//! Error types shared by the consistency checker and the update orchestrator.
//!
//! [`UpdateError`] is the single error returned by an update attempt. The
//! component errors it wraps ([`StoreError`], [`RepoError`]) are produced by
//! the store and repository implementations.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Why the consistency checker refused an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockReason {
    /// The latest attempt has not finished (or crashed before finishing).
    InProgress,
    /// The latest attempt finished with an error.
    PriorFailure,
    /// The target commit is not newer than the latest applied commit.
    NotNewer,
}

/// A safety check refused to start an update.
///
/// Always recoverable: wait for the running attempt, or retry with `force`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct BlockedError {
    pub reason: BlockReason,
    pub message: String,
}

impl BlockedError {
    pub fn new(reason: BlockReason, message: impl Into<String>) -> Self {
        Self {
            reason,
            message: message.into(),
        }
    }
}

/// Errors from an update record store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("update record {id} not found")]
    RecordNotFound { id: String },

    /// Finished records are immutable.
    #[error("update record {id} has already finished")]
    AlreadyFinished { id: String },

    #[error("store I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Errors from a repository accessor.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("not a git repository: {location}")]
    NotARepo { location: String },

    #[error("commit {hash} not found")]
    CommitNotFound { hash: String },

    #[error("invalid commit hash: {hash}")]
    InvalidHash { hash: String },

    #[error("failed to clone {url}: {message}")]
    Clone { url: String, message: String },

    #[error("git error: {message}")]
    Git { message: String },
}

/// A failure to process one advisory. Accumulated, never fatal to the batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriageFailure {
    pub advisory_id: String,
    pub message: String,
}

impl TriageFailure {
    pub fn new(advisory_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            advisory_id: advisory_id.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for TriageFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.advisory_id, self.message)
    }
}

fn join_failures(failures: &[TriageFailure]) -> String {
    failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// The outcome of a failed update attempt.
#[derive(Debug, Error)]
pub enum UpdateError {
    /// The consistency check failed. No record was written.
    #[error("update blocked: {0}")]
    Blocked(#[from] BlockedError),

    /// The target commit is not in the repository. No record was written.
    #[error("commit {hash} not found in repository")]
    NotFound { hash: String },

    #[error(transparent)]
    Repository(RepoError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// One or more advisories failed. Every advisory was still attempted.
    #[error(
        "triage failed for {} of {total} advisories: {}",
        .failures.len(),
        join_failures(.failures)
    )]
    Triage {
        failures: Vec<TriageFailure>,
        total: usize,
    },

    #[error("update cancelled: {reason}")]
    Cancelled { reason: String },

    #[error("panic during update: {message}")]
    Panicked { message: String },
}

impl UpdateError {
    pub fn is_blocked(&self) -> bool {
        matches!(self, UpdateError::Blocked(_))
    }

    /// Returns true if retrying with `force` set would get past this error.
    pub fn is_recoverable_with_force(&self) -> bool {
        self.is_blocked()
    }
}

impl From<RepoError> for UpdateError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::CommitNotFound { hash } => UpdateError::NotFound { hash },
            other => UpdateError::Repository(other),
        }
    }
}
