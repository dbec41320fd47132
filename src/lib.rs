pub mod cache;
pub mod config;
pub mod dbdiff;
pub mod error;
pub mod model;
pub mod output;
pub mod platform;
pub mod repo;
pub mod store;
pub mod triage;
pub mod worker;

pub use cache::Cache;
pub use config::Config;
pub use error::{BlockReason, BlockedError, UpdateError};
pub use model::{AdvisoryRecord, CommitInfo, CommitUpdateRecord};
pub use repo::Repository;
pub use store::Store;
pub use triage::Triage;
pub use worker::{update_commit, update_to_commit, UpdateOptions};
