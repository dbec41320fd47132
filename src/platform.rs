//! Cross-platform path resolution.
//!
//! This module provides functions for finding the platform-specific
//! directories vulnworker keeps its state in.

use sha2::{Digest, Sha256};
use std::path::PathBuf;

/// Returns the cache directory.
///
/// Platform-specific locations:
/// - Linux: `~/.cache/vulnworker/`
/// - macOS: `~/Library/Caches/vulnworker/`
/// - Windows: `%LOCALAPPDATA%\vulnworker\`
pub fn cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("vulnworker")
}

/// Returns the directory a remote repository is cloned into.
///
/// Each URL gets its own directory under `<cache_dir>/repos/`.
pub fn repo_clone_dir(url: &str) -> PathBuf {
    cache_dir().join("repos").join(key_file_name(url))
}

/// Returns the default location of the update store directory.
///
/// Platform-specific locations:
/// - Linux: `~/.local/share/vulnworker/store/`
/// - macOS: `~/Library/Application Support/vulnworker/store/`
/// - Windows: `%APPDATA%\vulnworker\store\`
pub fn default_store_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("vulnworker")
        .join("store")
}

/// Maps an arbitrary key to a single path component.
///
/// The name is a readable prefix of the key followed by the SHA-256 of the
/// whole key, so distinct keys never share a file.
pub(crate) fn key_file_name(key: &str) -> String {
    let readable: String = key
        .chars()
        .take(48)
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let digest = hex::encode(Sha256::digest(key.as_bytes()));
    format!("{}-{}", readable.trim_start_matches('.'), digest)
}
