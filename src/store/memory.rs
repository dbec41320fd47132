use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use super::{Store, UpdateLog};
use crate::error::StoreError;
use crate::model::{AdvisoryRecord, CommitUpdateRecord};

/// A store held in process memory.
#[derive(Debug, Default)]
pub struct MemStore {
    updates: Mutex<UpdateLog>,
    advisories: Mutex<HashMap<String, AdvisoryRecord>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn updates(&self) -> Result<MutexGuard<'_, UpdateLog>, StoreError> {
        self.updates.lock().map_err(|_| poisoned())
    }

    fn advisories(&self) -> Result<MutexGuard<'_, HashMap<String, AdvisoryRecord>>, StoreError> {
        self.advisories.lock().map_err(|_| poisoned())
    }
}

fn poisoned() -> StoreError {
    StoreError::Unavailable("store lock poisoned".to_string())
}

#[async_trait]
impl Store for MemStore {
    async fn create_commit_update_record(
        &self,
        record: &CommitUpdateRecord,
    ) -> Result<String, StoreError> {
        Ok(self.updates()?.create(record))
    }

    async fn set_commit_update_record(
        &self,
        record: &CommitUpdateRecord,
    ) -> Result<(), StoreError> {
        self.updates()?.set(record)
    }

    async fn list_commit_update_records(
        &self,
        limit: usize,
    ) -> Result<Vec<CommitUpdateRecord>, StoreError> {
        Ok(self.updates()?.list(limit))
    }

    async fn get_advisory_record(&self, id: &str) -> Result<Option<AdvisoryRecord>, StoreError> {
        Ok(self.advisories()?.get(id).cloned())
    }

    async fn set_advisory_record(&self, record: &AdvisoryRecord) -> Result<(), StoreError> {
        self.advisories()?
            .insert(record.id.clone(), record.clone());
        Ok(())
    }
}
