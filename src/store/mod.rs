//! Update record stores.
//!
//! This module provides the [`Store`] trait: the append-only log of update
//! attempts plus the per-advisory triage records. Two implementations are
//! included:
//!
//! | Store | Backing |
//! |-------|---------|
//! | [`MemStore`] | Process memory |
//! | [`JsonFileStore`] | A directory of JSON files on disk |
//!
//! Both reject changes to a record that has already finished, so a past
//! attempt can never be rewritten.

mod file;
mod memory;

pub use file::JsonFileStore;
pub use memory::MemStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::model::{AdvisoryRecord, CommitUpdateRecord};

/// Persistent state of an update worker.
///
/// Implementations must give read-after-write consistency: a record written
/// by one call is visible to every later call.
#[async_trait]
pub trait Store: Send + Sync {
    /// Appends a new update record and returns the id assigned to it.
    async fn create_commit_update_record(
        &self,
        record: &CommitUpdateRecord,
    ) -> Result<String, StoreError>;

    /// Replaces the stored record with the same id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::RecordNotFound`] for an unknown id and
    /// [`StoreError::AlreadyFinished`] if the stored record has ended.
    async fn set_commit_update_record(&self, record: &CommitUpdateRecord)
        -> Result<(), StoreError>;

    /// Returns up to `limit` records, most recently started first.
    /// A `limit` of zero returns every record.
    async fn list_commit_update_records(
        &self,
        limit: usize,
    ) -> Result<Vec<CommitUpdateRecord>, StoreError>;

    async fn get_advisory_record(&self, id: &str) -> Result<Option<AdvisoryRecord>, StoreError>;

    async fn set_advisory_record(&self, record: &AdvisoryRecord) -> Result<(), StoreError>;
}

/// The update log both bundled stores keep, and the rules for changing it.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct UpdateLog {
    next_id: u64,
    updates: Vec<CommitUpdateRecord>,
}

impl UpdateLog {
    fn create(&mut self, record: &CommitUpdateRecord) -> String {
        self.next_id += 1;
        let id = format!("{:08}", self.next_id);
        let mut record = record.clone();
        record.id = id.clone();
        self.updates.push(record);
        id
    }

    fn set(&mut self, record: &CommitUpdateRecord) -> Result<(), StoreError> {
        let stored = self
            .updates
            .iter_mut()
            .find(|r| r.id == record.id)
            .ok_or_else(|| StoreError::RecordNotFound {
                id: record.id.clone(),
            })?;
        if !stored.is_in_progress() {
            return Err(StoreError::AlreadyFinished {
                id: record.id.clone(),
            });
        }
        // The start of an attempt is immutable.
        let started_at = stored.started_at;
        *stored = record.clone();
        stored.started_at = started_at;
        Ok(())
    }

    fn list(&self, limit: usize) -> Vec<CommitUpdateRecord> {
        // Newest insertion first, so ties on started_at keep that order.
        let mut records: Vec<CommitUpdateRecord> = self.updates.iter().rev().cloned().collect();
        records.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        if limit > 0 {
            records.truncate(limit);
        }
        records
    }
}
