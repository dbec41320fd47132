use crate::model::CommitUpdateRecord;
use anyhow::Result;

pub fn format_json(records: &[CommitUpdateRecord]) -> Result<String> {
    Ok(serde_json::to_string_pretty(records)?)
}

pub fn print_json(records: &[CommitUpdateRecord]) -> Result<()> {
    println!("{}", format_json(records)?);
    Ok(())
}
