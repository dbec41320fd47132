//! Comparison of two exported vulnerability databases.
//!
//! An exported database is a directory tree:
//!
//! - `index.json` at the root, the database index
//! - `ID/<id>.json`, one entry per file (`ID/index.json` only lists the ids
//!   and is skipped)
//! - any other `*.json`, an array of entries for one module
//!
//! [`diff_dbs`] loads two such trees and renders a unified diff of the
//! index and of the entries.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde_json::Value;
use similar::TextDiff;
use walkdir::WalkDir;

/// Directory holding one file per entry.
const ID_DIRECTORY: &str = "ID";

const NO_CHANGE: &str = "(no change)";

/// A loaded database snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Database {
    pub index: Value,
    /// Entries keyed by path relative to the database root.
    pub entries: BTreeMap<String, Vec<Value>>,
}

/// Loads the database rooted at `root`.
pub fn load_db(root: &Path) -> Result<Database> {
    if !root.is_dir() {
        bail!("{} is not a directory", root.display());
    }

    let mut db = Database {
        index: Value::Object(Default::default()),
        entries: BTreeMap::new(),
    };

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.with_context(|| format!("walking {}", root.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative: Vec<String> = path
            .strip_prefix(root)
            .unwrap_or(path)
            .components()
            .map(|c| c.as_os_str().to_string_lossy().to_string())
            .collect();
        let key = relative.join("/");

        let content =
            fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        let parse_err = || format!("unable to parse {}", path.display());

        match relative.as_slice() {
            [name] if name == "index.json" => {
                db.index = serde_json::from_str(&content).with_context(parse_err)?;
            }
            [dir, name] if dir == ID_DIRECTORY => {
                if name == "index.json" {
                    continue;
                }
                let value: Value = serde_json::from_str(&content).with_context(parse_err)?;
                db.entries.insert(key, vec![value]);
            }
            _ => {
                let values: Vec<Value> =
                    serde_json::from_str(&content).with_context(parse_err)?;
                db.entries.insert(key, values);
            }
        }
    }

    Ok(db)
}

/// Renders a unified diff of two JSON values, or `None` if they are equal.
pub fn diff_values(a: &Value, b: &Value) -> Result<Option<String>> {
    if a == b {
        return Ok(None);
    }
    let old = serde_json::to_string_pretty(a)? + "\n";
    let new = serde_json::to_string_pretty(b)? + "\n";
    let diff = TextDiff::from_lines(&old, &new)
        .unified_diff()
        .header("a", "b")
        .context_radius(3)
        .to_string();
    Ok(Some(diff))
}

/// Loads the databases at `a` and `b` and renders their differences.
pub fn diff_dbs(a: &Path, b: &Path) -> Result<String> {
    let db_a = load_db(a).with_context(|| format!("unable to load {}", a.display()))?;
    let db_b = load_db(b).with_context(|| format!("unable to load {}", b.display()))?;
    render_diff(&db_a, &db_b)
}

/// Renders the differences between two loaded databases.
pub fn render_diff(a: &Database, b: &Database) -> Result<String> {
    let index_diff = diff_values(&a.index, &b.index)?;
    let entries_diff = diff_values(
        &serde_json::to_value(&a.entries)?,
        &serde_json::to_value(&b.entries)?,
    )?;

    Ok(format!(
        "# index\n{}\n\n# db\n{}\n",
        index_diff.as_deref().unwrap_or(NO_CHANGE).trim_end(),
        entries_diff.as_deref().unwrap_or(NO_CHANGE).trim_end(),
    ))
}
