//! File-based caching for pkgsite lookups.
//!
//! This module provides a simple file-based cache with TTL (time-to-live)
//! support. Triage uses it to remember which module paths pkgsite knows,
//! so repeated updates do not look up the same module again.
//!
//! # Cache Location
//!
//! The cache is stored under [`crate::platform::cache_dir`] in a `lookups/`
//! subdirectory.
//!
//! # Example
//!
//! ```no_run
//! use vulnworker::Cache;
//!
//! let cache = Cache::new();
//!
//! cache.set("pkgsite_github.com/acme/widget", &true).unwrap();
//!
//! let known: Option<bool> = cache.get("pkgsite_github.com/acme/widget");
//! assert_eq!(known, Some(true));
//! ```

use anyhow::Result;
use serde::{de::DeserializeOwned, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use crate::platform::{cache_dir, key_file_name};

/// Default cache TTL in hours.
const CACHE_TTL_HOURS: u64 = 24;

/// A file-based cache with TTL support.
///
/// Values are stored as JSON files in the cache directory. Each entry
/// expires after the configured TTL period.
#[derive(Debug, Clone)]
pub struct Cache {
    dir: PathBuf,
    ttl: Duration,
}

impl Cache {
    /// Creates a new cache with the default 24-hour TTL.
    pub fn new() -> Self {
        Self::with_ttl_hours(CACHE_TTL_HOURS)
    }

    /// Creates a new cache with a custom TTL.
    pub fn with_ttl_hours(hours: u64) -> Self {
        Self {
            dir: cache_dir().join("lookups"),
            ttl: Duration::from_secs(hours * 3600),
        }
    }

    /// Creates a cache rooted at `dir` instead of the platform cache directory.
    pub fn in_dir(dir: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            dir: dir.into(),
            ttl,
        }
    }

    fn ensure_dir(&self) -> Result<()> {
        if !self.dir.exists() {
            fs::create_dir_all(&self.dir)?;
        }
        Ok(())
    }

    fn cache_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key_file_name(key)))
    }

    /// Retrieves a value from the cache.
    ///
    /// Returns `None` if the key doesn't exist or has expired.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let path = self.cache_path(key);

        if !path.exists() {
            return None;
        }

        if let Ok(metadata) = fs::metadata(&path) {
            if let Ok(modified) = metadata.modified() {
                if let Ok(elapsed) = SystemTime::now().duration_since(modified) {
                    if elapsed > self.ttl {
                        let _ = fs::remove_file(&path);
                        return None;
                    }
                }
            }
        }

        let content = fs::read_to_string(&path).ok()?;
        serde_json::from_str(&content).ok()
    }

    /// Stores a value in the cache.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache directory cannot be created or
    /// the file cannot be written.
    pub fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        self.ensure_dir()?;
        let path = self.cache_path(key);
        let content = serde_json::to_string(value)?;
        fs::write(&path, content)?;
        Ok(())
    }

    /// Removes all cached entries.
    pub fn clear(&self) -> Result<()> {
        if self.dir.exists() {
            for entry in fs::read_dir(&self.dir)?.flatten() {
                let path = entry.path();
                if path.extension().map(|e| e == "json").unwrap_or(false) {
                    let _ = fs::remove_file(path);
                }
            }
        }
        Ok(())
    }
}

impl Default for Cache {
    fn default() -> Self {
        Self::new()
    }
}
