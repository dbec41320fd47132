//! Configuration file handling.
//!
//! This module provides loading and saving of vulnworker configuration
//! from a TOML file. Command-line flags override every value.
//!
//! # Configuration Location
//!
//! The configuration file is stored at:
//! - Linux: `~/.config/vulnworker/config.toml`
//! - macOS: `~/Library/Application Support/vulnworker/config.toml`
//! - Windows: `%APPDATA%\vulnworker\config.toml`
//!
//! # Example Configuration
//!
//! ```toml
//! store_path = "/var/lib/vulnworker/store"
//! repo_location = "https://github.com/CVEProject/cvelist"
//! pkgsite_url = "https://pkg.go.dev"
//! triage_concurrency = 8
//! cache_ttl_hours = 24
//! update_timeout_secs = 3600
//! history_limit = 20
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::platform;
use crate::triage::DEFAULT_PKGSITE_URL;
use crate::worker::DEFAULT_TRIAGE_CONCURRENCY;

/// Application configuration.
///
/// # Example
///
/// ```no_run
/// use vulnworker::Config;
///
/// let config = Config::load().unwrap();
///
/// println!("Store: {}", config.store_path().display());
/// println!("Pkgsite: {}", config.pkgsite_url);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory of the JSON store.
    ///
    /// Default: `<data_dir>/vulnworker/store`
    pub store_path: Option<PathBuf>,

    /// Base URL of the pkgsite instance used for triage.
    ///
    /// Default: `https://pkg.go.dev`
    pub pkgsite_url: String,

    /// Advisory repository, either a local path or a URL to clone.
    pub repo_location: Option<String>,

    /// Number of advisories triaged at the same time.
    ///
    /// Default: 8
    pub triage_concurrency: usize,

    /// How long to cache pkgsite lookups, in hours.
    ///
    /// Default: 24 hours
    pub cache_ttl_hours: u64,

    /// Deadline for a whole update attempt, in seconds. Unset means no
    /// deadline.
    pub update_timeout_secs: Option<u64>,

    /// Number of update records shown by `list-updates`.
    ///
    /// Default: 20
    pub history_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_path: None,
            pkgsite_url: DEFAULT_PKGSITE_URL.to_string(),
            repo_location: None,
            triage_concurrency: DEFAULT_TRIAGE_CONCURRENCY,
            cache_ttl_hours: 24,
            update_timeout_secs: None,
            history_limit: 20,
        }
    }
}

impl Config {
    /// Loads configuration from the config file.
    ///
    /// If the config file doesn't exist, returns default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Loads configuration from `path`, falling back to defaults if the
    /// file doesn't exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }

    /// Saves the configuration to the config file.
    ///
    /// Creates the parent directory if it doesn't exist.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Returns the path to the configuration file.
    ///
    /// # Example
    ///
    /// ```
    /// use vulnworker::Config;
    ///
    /// let path = Config::config_path();
    /// assert!(path.ends_with("vulnworker/config.toml"));
    /// ```
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("vulnworker")
            .join("config.toml")
    }

    /// The configured store path, or the platform default.
    pub fn store_path(&self) -> PathBuf {
        self.store_path
            .clone()
            .unwrap_or_else(platform::default_store_path)
    }

    pub fn update_timeout(&self) -> Option<Duration> {
        self.update_timeout_secs.map(Duration::from_secs)
    }

    /// Generates a string containing the default configuration.
    pub fn generate_default_config() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}
