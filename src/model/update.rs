use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata of a commit the store can be updated to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitInfo {
    pub hash: String,
    /// Committer timestamp, the ordering key for updates.
    pub time: DateTime<Utc>,
}

impl CommitInfo {
    pub fn new(hash: impl Into<String>, time: DateTime<Utc>) -> Self {
        Self {
            hash: hash.into(),
            time,
        }
    }
}

/// One update attempt, as stored in the update log.
///
/// A record is created when an attempt starts and finished exactly once when
/// it ends. While `ended_at` is `None` the outcome is unknown: the attempt is
/// either still running or crashed before it could finish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitUpdateRecord {
    /// Assigned by the store on creation. Empty until then.
    #[serde(default)]
    pub id: String,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    pub commit_hash: String,
    pub commit_time: DateTime<Utc>,
    /// Empty on success.
    #[serde(default)]
    pub error: String,
    /// Number of advisories found in the commit tree.
    #[serde(default)]
    pub num_total: usize,
    /// Number of advisories that were triaged and stored.
    #[serde(default)]
    pub num_processed: usize,
    /// Advisories stored for the first time.
    #[serde(default)]
    pub num_added: usize,
    /// Advisories whose content changed since they were last stored.
    #[serde(default)]
    pub num_modified: usize,
    pub updated_at: DateTime<Utc>,
}

impl CommitUpdateRecord {
    /// Creates an in-progress record for an attempt targeting `commit`.
    pub fn start(commit: &CommitInfo, now: DateTime<Utc>) -> Self {
        Self {
            id: String::new(),
            started_at: now,
            ended_at: None,
            commit_hash: commit.hash.clone(),
            commit_time: commit.time,
            error: String::new(),
            num_total: 0,
            num_processed: 0,
            num_added: 0,
            num_modified: 0,
            updated_at: now,
        }
    }

    pub fn is_in_progress(&self) -> bool {
        self.ended_at.is_none()
    }

    pub fn is_failed(&self) -> bool {
        !self.error.is_empty()
    }

    /// Marks the attempt as finished with the given error message
    /// (empty on success).
    pub fn finish(&mut self, now: DateTime<Utc>, error: impl Into<String>) {
        self.ended_at = Some(now);
        self.updated_at = now;
        self.error = error.into();
    }

    /// Short status label used by the list output.
    pub fn status(&self) -> &'static str {
        if self.is_in_progress() {
            "running"
        } else if self.is_failed() {
            "failed"
        } else {
            "ok"
        }
    }
}
