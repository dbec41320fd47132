//! Update orchestration.
//!
//! An update brings the store up to date with one commit of the advisory
//! repository. [`update_to_commit`] runs a single attempt:
//!
//! 1. resolve the commit,
//! 2. unless forced, run [`check_update`] against the latest update record,
//! 3. append an in-progress record,
//! 4. triage every advisory in the commit tree,
//! 5. finish the record with the outcome.
//!
//! Nothing is written if step 1 or 2 fails. After step 3 the record is
//! always finished, whatever happens during triage.
//!
//! There is no lock across processes. Running a single worker at a time is
//! an operational requirement; the fail-closed check catches accidental
//! overlap once an attempt has recorded itself.
//!
//! # Example
//!
//! ```no_run
//! use vulnworker::store::JsonFileStore;
//! use vulnworker::worker::update_commit;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = JsonFileStore::new("store");
//!     let record = update_commit(
//!         "https://github.com/CVEProject/cvelist",
//!         "HEAD",
//!         &store,
//!         "https://pkg.go.dev",
//!         false,
//!     )
//!     .await?;
//!     println!("processed {} advisories", record.num_processed);
//!     Ok(())
//! }
//! ```

mod cancel;
mod check;
mod update;

pub use cancel::{CancelHandle, Cancellation};
pub use check::{check_store, check_update};
pub use update::{update_commit, update_to_commit, UpdateOptions, DEFAULT_TRIAGE_CONCURRENCY};
