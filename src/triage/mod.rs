//! Advisory triage.
//!
//! A [`Triage`] decides whether an advisory is relevant. The orchestrator
//! calls it once per advisory in the target commit. Two implementations
//! are provided:
//!
//! - [`PkgsiteTriage`] - relevant if a reference names a module pkgsite knows
//! - [`FnTriage`] - adapts a plain closure, mostly for tests
//!
//! # Example
//!
//! ```
//! use vulnworker::model::Advisory;
//! use vulnworker::triage::FnTriage;
//!
//! let triage = FnTriage::new(|advisory: &Advisory| Ok(advisory.id.starts_with("CVE-2021")));
//! ```

mod pkgsite;

pub use pkgsite::{candidate_module, PkgsiteTriage, DEFAULT_PKGSITE_URL};

use crate::model::Advisory;
use anyhow::Result;
use async_trait::async_trait;

/// Classifies an advisory as relevant or not.
#[async_trait]
pub trait Triage: Send + Sync {
    /// Returns whether `advisory` is relevant.
    ///
    /// # Errors
    ///
    /// Returns an error if relevance could not be decided (e.g. a lookup
    /// failed). The orchestrator records the failure and moves on to the
    /// next advisory.
    async fn triage(&self, advisory: &Advisory) -> Result<bool>;
}

/// A [`Triage`] backed by a synchronous closure.
pub struct FnTriage<F> {
    f: F,
}

impl<F> FnTriage<F>
where
    F: Fn(&Advisory) -> Result<bool> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F> Triage for FnTriage<F>
where
    F: Fn(&Advisory) -> Result<bool> + Send + Sync,
{
    async fn triage(&self, advisory: &Advisory) -> Result<bool> {
        (self.f)(advisory)
    }
}
