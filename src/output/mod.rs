//! Rendering of the update history for `list-updates`.

mod cli;
mod json;

pub use cli::{format_update_table, print_cli_table};
pub use json::{format_json, print_json};

use crate::model::CommitUpdateRecord;
use anyhow::Result;

/// Output format for the update history
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable table format
    Table,
    /// JSON format for programmatic use
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown format: {}. Use 'table' or 'json'", s)),
        }
    }
}

pub fn print_updates(records: &[CommitUpdateRecord], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => print_cli_table(records),
        OutputFormat::Json => print_json(records),
    }
}
