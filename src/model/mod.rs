//! Core data types for update attempts and advisories.
//!
//! This module contains the fundamental types used throughout vulnworker:
//!
//! - [`CommitUpdateRecord`] - One attempt to bring the store up to a commit
//! - [`CommitInfo`] - Metadata of a resolved commit
//! - [`AdvisoryFile`] - A raw advisory blob found in a commit tree
//! - [`Advisory`] - A parsed CVE advisory
//! - [`AdvisoryRecord`] - The stored triage outcome of one advisory
//!
//! # Example
//!
//! ```
//! use chrono::{TimeZone, Utc};
//! use vulnworker::model::{CommitInfo, CommitUpdateRecord};
//!
//! let commit = CommitInfo::new("4f1c0e", Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap());
//! let record = CommitUpdateRecord::start(&commit, Utc::now());
//!
//! assert!(record.is_in_progress());
//! ```

mod advisory;
mod update;

pub use advisory::*;
pub use update::*;
