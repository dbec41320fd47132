use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::Mutex;

use super::{Store, UpdateLog};
use crate::error::StoreError;
use crate::model::{AdvisoryRecord, CommitUpdateRecord};
use crate::platform::key_file_name;

const UPDATES_FILE: &str = "updates.json";
const ADVISORIES_DIR: &str = "advisories";

/// A store persisted as a directory of JSON files.
///
/// ```text
/// <root>/updates.json              the update log
/// <root>/advisories/<id>-<sha>.json  one advisory record per file
/// ```
///
/// Every operation reads from disk, so records written by another process
/// are visible on the next call. Advisory reads and writes touch a single
/// small file, independent of how many advisories are stored. Writes go
/// to a temporary file that is renamed into place.
#[derive(Debug)]
pub struct JsonFileStore {
    root: PathBuf,
    // Serializes read-modify-write cycles of the update log within this process.
    guard: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            guard: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    fn updates_path(&self) -> PathBuf {
        self.root.join(UPDATES_FILE)
    }

    fn advisory_path(&self, id: &str) -> PathBuf {
        self.root
            .join(ADVISORIES_DIR)
            .join(format!("{}.json", key_file_name(id)))
    }

    async fn load_updates(&self) -> Result<UpdateLog, StoreError> {
        Ok(read_json(&self.updates_path()).await?.unwrap_or_default())
    }
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(io_err(path, e)),
    }
}

async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_err(parent, e))?;
        }
    }
    let content = serde_json::to_vec_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, content)
        .await
        .map_err(|e| io_err(&tmp, e))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| io_err(path, e))
}

fn io_err(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[async_trait]
impl Store for JsonFileStore {
    async fn create_commit_update_record(
        &self,
        record: &CommitUpdateRecord,
    ) -> Result<String, StoreError> {
        let _guard = self.guard.lock().await;
        let mut log = self.load_updates().await?;
        let id = log.create(record);
        write_json(&self.updates_path(), &log).await?;
        Ok(id)
    }

    async fn set_commit_update_record(
        &self,
        record: &CommitUpdateRecord,
    ) -> Result<(), StoreError> {
        let _guard = self.guard.lock().await;
        let mut log = self.load_updates().await?;
        log.set(record)?;
        write_json(&self.updates_path(), &log).await
    }

    async fn list_commit_update_records(
        &self,
        limit: usize,
    ) -> Result<Vec<CommitUpdateRecord>, StoreError> {
        let _guard = self.guard.lock().await;
        Ok(self.load_updates().await?.list(limit))
    }

    async fn get_advisory_record(&self, id: &str) -> Result<Option<AdvisoryRecord>, StoreError> {
        read_json(&self.advisory_path(id)).await
    }

    async fn set_advisory_record(&self, record: &AdvisoryRecord) -> Result<(), StoreError> {
        write_json(&self.advisory_path(&record.id), record).await
    }
}
