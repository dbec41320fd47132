use crate::model::CommitUpdateRecord;
use anyhow::Result;
use chrono::{DateTime, Utc};
use tabled::{settings::Style, Table, Tabled};

#[derive(Tabled)]
struct UpdateRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Commit")]
    commit: String,
    #[tabled(rename = "Commit Time")]
    commit_time: String,
    #[tabled(rename = "Started")]
    started: String,
    #[tabled(rename = "Ended")]
    ended: String,
    #[tabled(rename = "Processed")]
    processed: String,
    #[tabled(rename = "Added")]
    added: usize,
    #[tabled(rename = "Modified")]
    modified: usize,
    #[tabled(rename = "Error")]
    error: String,
}

/// Renders update records, newest first, as a table.
pub fn format_update_table(records: &[CommitUpdateRecord]) -> String {
    let rows: Vec<UpdateRow> = records
        .iter()
        .map(|r| UpdateRow {
            id: r.id.clone(),
            status: r.status().to_string(),
            commit: truncate(&r.commit_hash, 12),
            commit_time: format_time(&r.commit_time),
            started: format_time(&r.started_at),
            ended: r.ended_at.as_ref().map(format_time).unwrap_or_else(|| "-".to_string()),
            processed: format!("{}/{}", r.num_processed, r.num_total),
            added: r.num_added,
            modified: r.num_modified,
            error: if r.error.is_empty() {
                "-".to_string()
            } else {
                truncate(&r.error, 50)
            },
        })
        .collect();

    Table::new(rows).with(Style::rounded()).to_string()
}

pub fn print_cli_table(records: &[CommitUpdateRecord]) -> Result<()> {
    if records.is_empty() {
        println!("No updates recorded.");
        return Ok(());
    }

    println!("{}", format_update_table(records));
    println!();
    print_summary(&records[0]);
    Ok(())
}

fn print_summary(latest: &CommitUpdateRecord) {
    let status = match latest.status() {
        "running" => "\x1b[33mRUNNING\x1b[0m (or crashed; later updates are blocked)",
        "failed" => "\x1b[31mFAILED\x1b[0m (later updates are blocked until forced)",
        _ => "\x1b[32mOK\x1b[0m",
    };
    println!("Latest update: {}", status);
}

fn format_time(time: &DateTime<Utc>) -> String {
    time.format("%Y-%m-%d %H:%M:%S").to_string()
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
