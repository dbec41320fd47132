use std::any::Any;
use std::panic::AssertUnwindSafe;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use futures::FutureExt;
use tracing::{debug, info, warn};

use super::cancel::Cancellation;
use super::check::check_store;
use crate::cache::Cache;
use crate::error::{StoreError, TriageFailure, UpdateError};
use crate::model::{Advisory, AdvisoryFile, AdvisoryRecord, CommitInfo, CommitUpdateRecord};
use crate::repo::{GitRepository, Repository};
use crate::store::Store;
use crate::triage::{PkgsiteTriage, Triage};

/// Default number of advisories triaged at the same time.
pub const DEFAULT_TRIAGE_CONCURRENCY: usize = 8;

/// Settings for one update attempt.
#[derive(Debug, Clone)]
pub struct UpdateOptions {
    /// Skip the consistency check.
    pub force: bool,
    /// Maximum number of advisories triaged concurrently (at least 1).
    pub concurrency: usize,
    pub cancel: Cancellation,
}

impl Default for UpdateOptions {
    fn default() -> Self {
        Self {
            force: false,
            concurrency: DEFAULT_TRIAGE_CONCURRENCY,
            cancel: Cancellation::none(),
        }
    }
}

impl UpdateOptions {
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn cancel(mut self, cancel: Cancellation) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Updates the store to the repository at `repo_location` as of `commit`,
/// triaging advisories against the pkgsite instance at `pkgsite_url`.
///
/// Unless `force` is true, the update only starts if the store's history
/// says it is safe. See [`update_to_commit`].
pub async fn update_commit(
    repo_location: &str,
    commit: &str,
    store: &dyn Store,
    pkgsite_url: &str,
    force: bool,
) -> Result<CommitUpdateRecord, UpdateError> {
    let repo = GitRepository::clone_or_open(repo_location).await?;
    info!(location = repo.location(), "repository opened");
    let triage = PkgsiteTriage::new(pkgsite_url).with_cache(Cache::new());
    let options = UpdateOptions::default().force(force);
    update_to_commit(&repo, commit, store, &triage, &options).await
}

/// Runs one update attempt to `commit`.
///
/// Resolving the commit and the consistency check happen before anything
/// is written: if either fails the store is left untouched. Once the attempt
/// record has been created it is finished on every exit path, including
/// triage failures, store failures, cancellation and panics, and the
/// returned error is the one written into the record.
///
/// Every advisory is triaged even if some fail. On success the finished
/// record is returned.
pub async fn update_to_commit(
    repo: &dyn Repository,
    commit: &str,
    store: &dyn Store,
    triage: &dyn Triage,
    options: &UpdateOptions,
) -> Result<CommitUpdateRecord, UpdateError> {
    let info = repo.resolve_commit(commit).await?;

    if options.force {
        info!(commit = %info.hash, "consistency check skipped (forced)");
    } else {
        check_store(store, &info).await?;
    }

    let mut record = CommitUpdateRecord::start(&info, Utc::now());
    record.id = store.create_commit_update_record(&record).await?;
    info!(
        id = %record.id,
        commit = %info.hash,
        commit_time = %info.time,
        "update started"
    );

    let outcome = AssertUnwindSafe(run_attempt(repo, &info, store, triage, options, &mut record))
        .catch_unwind()
        .await
        .unwrap_or_else(|panic| {
            Err(UpdateError::Panicked {
                message: panic_message(panic.as_ref()),
            })
        });

    finish(store, record, outcome).await
}

async fn run_attempt(
    repo: &dyn Repository,
    commit: &CommitInfo,
    store: &dyn Store,
    triage: &dyn Triage,
    options: &UpdateOptions,
    record: &mut CommitUpdateRecord,
) -> Result<(), UpdateError> {
    let files = tokio::select! {
        biased;
        reason = options.cancel.cancelled() => {
            return Err(UpdateError::Cancelled { reason });
        }
        files = repo.advisory_files(commit) => files?,
    };
    let total = files.len();
    record.num_total = total;
    record.updated_at = Utc::now();
    store.set_commit_update_record(record).await?;

    let mut results = std::pin::pin!(stream::iter(files)
        .map(|file| triage_file(triage, file))
        .buffer_unordered(options.concurrency.max(1)));

    let mut failures = Vec::new();
    loop {
        let next = tokio::select! {
            biased;
            reason = options.cancel.cancelled() => {
                return Err(UpdateError::Cancelled { reason });
            }
            next = results.next() => next,
        };
        let Some(result) = next else {
            break;
        };

        match result {
            Ok((advisory, relevant)) => {
                save_advisory(store, commit, &advisory, relevant, record).await?;
            }
            Err(failure) => {
                warn!(
                    advisory = %failure.advisory_id,
                    error = %failure.message,
                    "advisory triage failed"
                );
                failures.push(failure);
            }
        }
    }

    if failures.is_empty() {
        Ok(())
    } else {
        failures.sort_by(|a, b| a.advisory_id.cmp(&b.advisory_id));
        Err(UpdateError::Triage { failures, total })
    }
}

async fn triage_file(
    triage: &dyn Triage,
    file: AdvisoryFile,
) -> Result<(Advisory, bool), TriageFailure> {
    let advisory = Advisory::parse(&file)
        .map_err(|e| TriageFailure::new(file.id(), format!("parsing {}: {}", file.path, e)))?;
    let relevant = triage
        .triage(&advisory)
        .await
        .map_err(|e| TriageFailure::new(advisory.id.clone(), format!("{:#}", e)))?;
    Ok((advisory, relevant))
}

async fn save_advisory(
    store: &dyn Store,
    commit: &CommitInfo,
    advisory: &Advisory,
    relevant: bool,
    record: &mut CommitUpdateRecord,
) -> Result<(), StoreError> {
    match store.get_advisory_record(&advisory.id).await? {
        None => record.num_added += 1,
        Some(existing) if existing.blob_hash != advisory.blob_hash => record.num_modified += 1,
        Some(_) => {}
    }

    store
        .set_advisory_record(&AdvisoryRecord {
            id: advisory.id.clone(),
            path: advisory.path.clone(),
            blob_hash: advisory.blob_hash.clone(),
            commit_hash: commit.hash.clone(),
            relevant,
            triaged_at: Utc::now(),
        })
        .await?;
    record.num_processed += 1;

    debug!(advisory = %advisory.id, relevant, "advisory stored");
    Ok(())
}

/// Writes the outcome into the record. A failure to write it never hides
/// the error of the attempt itself.
async fn finish(
    store: &dyn Store,
    mut record: CommitUpdateRecord,
    outcome: Result<(), UpdateError>,
) -> Result<CommitUpdateRecord, UpdateError> {
    let message = match &outcome {
        Ok(()) => String::new(),
        Err(e) => e.to_string(),
    };
    record.finish(Utc::now(), message);
    let saved = store.set_commit_update_record(&record).await;

    match (outcome, saved) {
        (Ok(()), Ok(())) => {
            info!(
                id = %record.id,
                processed = record.num_processed,
                added = record.num_added,
                modified = record.num_modified,
                "update finished"
            );
            Ok(record)
        }
        (Ok(()), Err(e)) => Err(e.into()),
        (Err(e), Ok(())) => {
            warn!(id = %record.id, error = %e, "update failed");
            Err(e)
        }
        (Err(e), Err(store_err)) => {
            warn!(
                id = %record.id,
                error = %store_err,
                "failed to record update failure; record left in progress"
            );
            Err(e)
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{BlockReason, RepoError};
    use crate::repo::fixture::commit_files;
    use crate::repo::MemoryRepository;
    use crate::store::MemStore;
    use crate::triage::FnTriage;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone};
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::TempDir;

    fn t(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    fn cve_json(id: &str) -> String {
        serde_json::json!({
            "CVE_data_meta": { "ID": id, "STATE": "PUBLIC" },
            "references": { "reference_data": [{ "url": "https://github.com/acme/widget" }] },
        })
        .to_string()
    }

    fn cve(id: &str, version: &str) -> AdvisoryFile {
        AdvisoryFile::new(
            format!("2023/0xxx/{}.json", id),
            format!("{}-{}", id, version),
            cve_json(id).into_bytes(),
        )
    }

    fn three_advisories() -> Vec<AdvisoryFile> {
        vec![
            cve("CVE-2023-0001", "v1"),
            cve("CVE-2023-0002", "v1"),
            cve("CVE-2023-0003", "v1"),
        ]
    }

    fn relevant_all() -> FnTriage<impl Fn(&Advisory) -> anyhow::Result<bool> + Send + Sync> {
        FnTriage::new(|_: &Advisory| Ok(true))
    }

    async fn assert_all_finished(store: &MemStore) {
        for record in store.list_commit_update_records(0).await.unwrap() {
            assert!(!record.is_in_progress(), "record {} left open", record.id);
        }
    }

    /// Which store call [`FailingStore`] refuses.
    #[derive(Clone, Copy, PartialEq)]
    enum FailOn {
        List,
        Create,
        /// Writes of a finished update record.
        Finish,
        AdvisoryWrite,
    }

    /// Wraps a MemStore and fails one kind of call.
    struct FailingStore {
        inner: MemStore,
        fail_on: FailOn,
    }

    impl FailingStore {
        fn new(fail_on: FailOn) -> Self {
            Self {
                inner: MemStore::new(),
                fail_on,
            }
        }

        fn check(&self, call: FailOn) -> Result<(), StoreError> {
            if self.fail_on == call {
                Err(StoreError::Unavailable("disk full".to_string()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl Store for FailingStore {
        async fn create_commit_update_record(
            &self,
            record: &CommitUpdateRecord,
        ) -> Result<String, StoreError> {
            self.check(FailOn::Create)?;
            self.inner.create_commit_update_record(record).await
        }

        async fn set_commit_update_record(
            &self,
            record: &CommitUpdateRecord,
        ) -> Result<(), StoreError> {
            if record.ended_at.is_some() {
                self.check(FailOn::Finish)?;
            }
            self.inner.set_commit_update_record(record).await
        }

        async fn list_commit_update_records(
            &self,
            limit: usize,
        ) -> Result<Vec<CommitUpdateRecord>, StoreError> {
            self.check(FailOn::List)?;
            self.inner.list_commit_update_records(limit).await
        }

        async fn get_advisory_record(
            &self,
            id: &str,
        ) -> Result<Option<AdvisoryRecord>, StoreError> {
            self.inner.get_advisory_record(id).await
        }

        async fn set_advisory_record(&self, record: &AdvisoryRecord) -> Result<(), StoreError> {
            self.check(FailOn::AdvisoryWrite)?;
            self.inner.set_advisory_record(record).await
        }
    }

    /// Resolves commits but never finishes reading a tree.
    struct HangingRepository;

    #[async_trait]
    impl Repository for HangingRepository {
        async fn resolve_commit(&self, commit: &str) -> Result<CommitInfo, RepoError> {
            Ok(CommitInfo::new(commit, t(2023, 1, 1)))
        }

        async fn advisory_files(
            &self,
            _commit: &CommitInfo,
        ) -> Result<Vec<AdvisoryFile>, RepoError> {
            std::future::pending::<()>().await;
            Ok(Vec::new())
        }
    }

    /// Never finishes triaging.
    struct HangingTriage;

    #[async_trait]
    impl Triage for HangingTriage {
        async fn triage(&self, _advisory: &Advisory) -> anyhow::Result<bool> {
            std::future::pending::<()>().await;
            Ok(false)
        }
    }

    #[tokio::test]
    async fn test_first_update_on_empty_store() {
        let repo = MemoryRepository::new().with_commit("c1", t(2023, 1, 1), three_advisories());
        let store = MemStore::new();

        let record = update_to_commit(&repo, "c1", &store, &relevant_all(), &UpdateOptions::default())
            .await
            .unwrap();

        let records = store.list_commit_update_records(0).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0], record);
        assert_eq!(record.commit_hash, "c1");
        assert_eq!(record.commit_time, t(2023, 1, 1));
        assert_eq!(record.error, "");
        assert!(record.ended_at.is_some());
        assert_eq!(record.num_total, 3);
        assert_eq!(record.num_processed, 3);
        assert_eq!(record.num_added, 3);
        assert_eq!(record.num_modified, 0);

        let stored = store.get_advisory_record("CVE-2023-0002").await.unwrap().unwrap();
        assert!(stored.relevant);
        assert_eq!(stored.commit_hash, "c1");
    }

    #[tokio::test]
    async fn test_older_commit_blocked_unless_forced() {
        let repo = MemoryRepository::new()
            .with_commit("c1", t(2023, 1, 1), three_advisories())
            .with_commit("c0", t(2022, 12, 31), three_advisories());
        let store = MemStore::new();
        update_to_commit(&repo, "c1", &store, &relevant_all(), &UpdateOptions::default())
            .await
            .unwrap();

        let err = update_to_commit(&repo, "c0", &store, &relevant_all(), &UpdateOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, UpdateError::Blocked(ref b) if b.reason == BlockReason::NotNewer));
        assert_eq!(store.list_commit_update_records(0).await.unwrap().len(), 1);

        let forced = UpdateOptions::default().force(true);
        let record = update_to_commit(&repo, "c0", &store, &relevant_all(), &forced)
            .await
            .unwrap();
        assert_eq!(record.commit_hash, "c0");

        let records = store.list_commit_update_records(0).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].commit_hash, "c0");
        assert_all_finished(&store).await;
    }

    #[tokio::test]
    async fn test_triage_failure_is_accumulated() {
        let repo = MemoryRepository::new().with_commit("c1", t(2023, 1, 1), three_advisories());
        let store = MemStore::new();
        let seen = Mutex::new(Vec::new());
        let triage = FnTriage::new(|advisory: &Advisory| {
            seen.lock().unwrap().push(advisory.id.clone());
            if advisory.id == "CVE-2023-0002" {
                Err(anyhow!("lookup timed out"))
            } else {
                Ok(true)
            }
        });

        let err = update_to_commit(&repo, "c1", &store, &triage, &UpdateOptions::default())
            .await
            .unwrap_err();

        match &err {
            UpdateError::Triage { failures, total } => {
                assert_eq!(*total, 3);
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].advisory_id, "CVE-2023-0002");
            }
            other => panic!("unexpected error: {other}"),
        }

        let mut seen = seen.into_inner().unwrap();
        seen.sort();
        assert_eq!(seen, vec!["CVE-2023-0001", "CVE-2023-0002", "CVE-2023-0003"]);

        let records = store.list_commit_update_records(0).await.unwrap();
        assert_eq!(records.len(), 1);
        assert!(!records[0].is_in_progress());
        assert!(records[0].error.contains("CVE-2023-0002"));
        assert_eq!(records[0].error, err.to_string());
        assert_eq!(records[0].num_processed, 2);

        assert!(store.get_advisory_record("CVE-2023-0001").await.unwrap().is_some());
        assert!(store.get_advisory_record("CVE-2023-0002").await.unwrap().is_none());
        assert!(store.get_advisory_record("CVE-2023-0003").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_failed_update_blocks_next_update() {
        let repo = MemoryRepository::new()
            .with_commit("c1", t(2023, 1, 1), three_advisories())
            .with_commit("c2", t(2023, 2, 1), three_advisories());
        let store = MemStore::new();
        let failing = FnTriage::new(|_: &Advisory| Err(anyhow!("pkgsite down")));
        let _ = update_to_commit(&repo, "c1", &store, &failing, &UpdateOptions::default()).await;

        let err = update_to_commit(&repo, "c2", &store, &relevant_all(), &UpdateOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, UpdateError::Blocked(ref b) if b.reason == BlockReason::PriorFailure));
        assert_eq!(store.list_commit_update_records(0).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_advisory_does_not_abort_batch() {
        let mut files = three_advisories();
        files[0] = AdvisoryFile::new("2023/0xxx/CVE-2023-0001.json", "bad", b"{oops".to_vec());
        let repo = MemoryRepository::new().with_commit("c1", t(2023, 1, 1), files);
        let store = MemStore::new();

        let err = update_to_commit(&repo, "c1", &store, &relevant_all(), &UpdateOptions::default())
            .await
            .unwrap_err();

        assert!(err.to_string().contains("CVE-2023-0001: parsing"));
        let record = store.list_commit_update_records(1).await.unwrap().remove(0);
        assert_eq!(record.num_processed, 2);
        assert!(!record.is_in_progress());
    }

    #[tokio::test]
    async fn test_unknown_commit_leaves_no_record() {
        let repo = MemoryRepository::new();
        let store = MemStore::new();

        let forced = UpdateOptions::default().force(true);
        let err = update_to_commit(&repo, "missing", &store, &relevant_all(), &forced)
            .await
            .unwrap_err();

        assert!(matches!(err, UpdateError::NotFound { ref hash } if hash == "missing"));
        assert!(store.list_commit_update_records(0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_open_record_blocks_update() {
        let repo = MemoryRepository::new().with_commit("c2", t(2023, 2, 1), three_advisories());
        let store = MemStore::new();
        let crashed = CommitUpdateRecord::start(&CommitInfo::new("c1", t(2023, 1, 1)), Utc::now());
        store.create_commit_update_record(&crashed).await.unwrap();

        let err = update_to_commit(&repo, "c2", &store, &relevant_all(), &UpdateOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, UpdateError::Blocked(ref b) if b.reason == BlockReason::InProgress));
        assert_eq!(store.list_commit_update_records(0).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_counts_added_and_modified() {
        let repo = MemoryRepository::new()
            .with_commit("c1", t(2023, 1, 1), three_advisories())
            .with_commit(
                "c2",
                t(2023, 2, 1),
                vec![
                    cve("CVE-2023-0001", "v1"),
                    cve("CVE-2023-0002", "v2"),
                    cve("CVE-2023-0003", "v1"),
                    cve("CVE-2023-0004", "v1"),
                ],
            );
        let store = MemStore::new();
        update_to_commit(&repo, "c1", &store, &relevant_all(), &UpdateOptions::default())
            .await
            .unwrap();

        let record = update_to_commit(&repo, "c2", &store, &relevant_all(), &UpdateOptions::default())
            .await
            .unwrap();

        assert_eq!(record.num_total, 4);
        assert_eq!(record.num_processed, 4);
        assert_eq!(record.num_added, 1);
        assert_eq!(record.num_modified, 1);
        let stored = store.get_advisory_record("CVE-2023-0001").await.unwrap().unwrap();
        assert_eq!(stored.commit_hash, "c2");
    }

    #[tokio::test]
    async fn test_store_failure_finishes_record() {
        let repo = MemoryRepository::new().with_commit("c1", t(2023, 1, 1), three_advisories());
        let store = FailingStore::new(FailOn::AdvisoryWrite);

        let err = update_to_commit(&repo, "c1", &store, &relevant_all(), &UpdateOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, UpdateError::Store(StoreError::Unavailable(_))));
        let record = store.list_commit_update_records(1).await.unwrap().remove(0);
        assert!(!record.is_in_progress());
        assert!(record.error.contains("disk full"));
    }

    #[tokio::test]
    async fn test_history_read_failure_leaves_no_record() {
        let repo = MemoryRepository::new().with_commit("c1", t(2023, 1, 1), three_advisories());
        let store = FailingStore::new(FailOn::List);

        let err = update_to_commit(&repo, "c1", &store, &relevant_all(), &UpdateOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, UpdateError::Store(StoreError::Unavailable(_))));
        assert!(store.inner.list_commit_update_records(0).await.unwrap().is_empty());
        assert!(store.inner.get_advisory_record("CVE-2023-0001").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_failure_leaves_no_record() {
        let repo = MemoryRepository::new().with_commit("c1", t(2023, 1, 1), three_advisories());
        let store = FailingStore::new(FailOn::Create);

        let err = update_to_commit(&repo, "c1", &store, &relevant_all(), &UpdateOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, UpdateError::Store(StoreError::Unavailable(_))));
        assert!(store.inner.list_commit_update_records(0).await.unwrap().is_empty());
        assert!(store.inner.get_advisory_record("CVE-2023-0001").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unwritable_outcome_keeps_attempt_error() {
        let repo = MemoryRepository::new().with_commit("c1", t(2023, 1, 1), three_advisories());
        let store = FailingStore::new(FailOn::Finish);
        let failing = FnTriage::new(|_: &Advisory| Err(anyhow!("pkgsite down")));

        let err = update_to_commit(&repo, "c1", &store, &failing, &UpdateOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, UpdateError::Triage { total: 3, .. }));
        let record = store.inner.list_commit_update_records(1).await.unwrap().remove(0);
        assert!(record.is_in_progress());
        assert_eq!(record.error, "");
        assert_eq!(record.num_total, 3);
    }

    #[tokio::test]
    async fn test_unwritable_success_is_store_error() {
        let repo = MemoryRepository::new().with_commit("c1", t(2023, 1, 1), three_advisories());
        let store = FailingStore::new(FailOn::Finish);

        let err = update_to_commit(&repo, "c1", &store, &relevant_all(), &UpdateOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, UpdateError::Store(StoreError::Unavailable(_))));
        let record = store.inner.list_commit_update_records(1).await.unwrap().remove(0);
        assert!(record.is_in_progress());
        assert!(store.inner.get_advisory_record("CVE-2023-0003").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_panic_finishes_record() {
        let repo = MemoryRepository::new().with_commit("c1", t(2023, 1, 1), three_advisories());
        let store = MemStore::new();
        let triage = FnTriage::new(|advisory: &Advisory| {
            if advisory.id == "CVE-2023-0003" {
                panic!("triage bug");
            }
            Ok(true)
        });

        let err = update_to_commit(&repo, "c1", &store, &triage, &UpdateOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, UpdateError::Panicked { ref message } if message == "triage bug"));
        let record = store.list_commit_update_records(1).await.unwrap().remove(0);
        assert!(!record.is_in_progress());
        assert_eq!(record.error, "panic during update: triage bug");
    }

    #[tokio::test]
    async fn test_cancellation_finishes_record() {
        let repo = MemoryRepository::new().with_commit("c1", t(2023, 1, 1), three_advisories());
        let store = MemStore::new();
        let (handle, cancel) = Cancellation::new();
        let options = UpdateOptions::default().cancel(cancel);

        let run = update_to_commit(&repo, "c1", &store, &HangingTriage, &options);
        let cancel_soon = async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            handle.cancel();
        };
        let (result, ()) = tokio::join!(run, cancel_soon);

        let err = result.unwrap_err();
        assert!(matches!(err, UpdateError::Cancelled { .. }));
        let record = store.list_commit_update_records(1).await.unwrap().remove(0);
        assert!(!record.is_in_progress());
        assert_eq!(record.error, "update cancelled: cancellation requested");
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_interrupts_tree_read() {
        let store = MemStore::new();
        let options = UpdateOptions::default()
            .cancel(Cancellation::none().with_timeout(Duration::from_secs(60)));

        let err = update_to_commit(&HangingRepository, "c1", &store, &relevant_all(), &options)
            .await
            .unwrap_err();

        assert!(matches!(err, UpdateError::Cancelled { ref reason } if reason == "deadline exceeded"));
        let record = store.list_commit_update_records(1).await.unwrap().remove(0);
        assert!(!record.is_in_progress());
        assert_eq!(record.num_total, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_finishes_record() {
        let repo = MemoryRepository::new().with_commit("c1", t(2023, 1, 1), three_advisories());
        let store = MemStore::new();
        let options = UpdateOptions::default()
            .cancel(Cancellation::none().with_timeout(Duration::from_secs(300)));

        let err = update_to_commit(&repo, "c1", &store, &HangingTriage, &options)
            .await
            .unwrap_err();

        assert!(matches!(err, UpdateError::Cancelled { ref reason } if reason == "deadline exceeded"));
        assert_all_finished(&store).await;
    }

    #[tokio::test]
    async fn test_sequential_triage() {
        let repo = MemoryRepository::new().with_commit("c1", t(2023, 1, 1), three_advisories());
        let store = MemStore::new();
        let options = UpdateOptions::default().concurrency(0);

        let record = update_to_commit(&repo, "c1", &store, &relevant_all(), &options)
            .await
            .unwrap();
        assert_eq!(record.num_processed, 3);
    }

    #[tokio::test]
    async fn test_updates_from_git_repository() {
        let dir = TempDir::new().unwrap();
        let git = git2::Repository::init(dir.path()).unwrap();
        let (one, two, three) = (
            cve_json("CVE-2023-0001"),
            cve_json("CVE-2023-0002"),
            cve_json("CVE-2023-0003"),
        );
        let first = commit_files(
            &git,
            &[
                ("README.md", "cvelist"),
                ("2023/0xxx/CVE-2023-0001.json", one.as_str()),
                ("2023/0xxx/CVE-2023-0002.json", two.as_str()),
            ],
            t(2023, 1, 1).timestamp(),
        );
        let repo = GitRepository::open(dir.path()).unwrap();
        let store = MemStore::new();

        let record = update_to_commit(
            &repo,
            &first.to_string(),
            &store,
            &relevant_all(),
            &UpdateOptions::default(),
        )
        .await
        .unwrap();

        assert_eq!(record.commit_hash, first.to_string());
        assert_eq!(record.commit_time, t(2023, 1, 1));
        assert_eq!(record.num_total, 2);
        assert_eq!(record.num_added, 2);

        let mut changed: serde_json::Value = serde_json::from_str(&two).unwrap();
        changed["CVE_data_meta"]["STATE"] = "REJECT".into();
        let changed = changed.to_string();
        let second = commit_files(
            &git,
            &[
                ("2023/0xxx/CVE-2023-0002.json", changed.as_str()),
                ("2023/0xxx/CVE-2023-0003.json", three.as_str()),
            ],
            t(2023, 2, 1).timestamp(),
        );

        let record = update_to_commit(&repo, "HEAD", &store, &relevant_all(), &UpdateOptions::default())
            .await
            .unwrap();

        assert_eq!(record.commit_hash, second.to_string());
        assert_eq!(record.num_total, 3);
        assert_eq!(record.num_processed, 3);
        assert_eq!(record.num_added, 1);
        assert_eq!(record.num_modified, 1);
        let stored = store.get_advisory_record("CVE-2023-0001").await.unwrap().unwrap();
        assert_eq!(stored.commit_hash, second.to_string());
        assert_eq!(stored.blob_hash.len(), 40);
        assert_eq!(store.list_commit_update_records(0).await.unwrap().len(), 2);
        assert_all_finished(&store).await;
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("static str");
        assert_eq!(panic_message(payload.as_ref()), "static str");
        let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(payload.as_ref()), "owned");
        let payload: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic");
    }
}
