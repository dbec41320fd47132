use chrono::{DateTime, SecondsFormat, Utc};

use crate::error::{BlockReason, BlockedError, UpdateError};
use crate::model::{CommitInfo, CommitUpdateRecord};
use crate::store::Store;

/// Decides whether an update to `commit` may start, given the most recent
/// update record.
///
/// The check is fail-closed: an attempt that never finished blocks every
/// later update until an operator forces past it. Ordering is by committer
/// time only; a commit that is not strictly newer than the latest applied
/// commit is refused even if it descends from it.
pub fn check_update(
    latest: Option<&CommitUpdateRecord>,
    commit: &CommitInfo,
    now: DateTime<Utc>,
) -> Result<(), BlockedError> {
    let Some(latest) = latest else {
        return Ok(());
    };

    if latest.is_in_progress() {
        let running = now.signed_duration_since(latest.started_at);
        return Err(BlockedError::new(
            BlockReason::InProgress,
            format!(
                "latest update started {} ago and has not finished",
                format_duration(running)
            ),
        ));
    }

    if latest.is_failed() {
        return Err(BlockedError::new(
            BlockReason::PriorFailure,
            format!("latest update finished with error {:?}", latest.error),
        ));
    }

    if commit.time <= latest.commit_time {
        return Err(BlockedError::new(
            BlockReason::NotNewer,
            format!(
                "commit {} time {} is not after latest update commit {} time {}",
                commit.hash,
                commit.time.to_rfc3339_opts(SecondsFormat::Secs, true),
                latest.commit_hash,
                latest.commit_time.to_rfc3339_opts(SecondsFormat::Secs, true),
            ),
        ));
    }

    Ok(())
}

/// Reads the most recent update record from `store` and checks `commit`
/// against it.
///
/// Returns [`UpdateError::Blocked`] if the update must not start and
/// [`UpdateError::Store`] if the store could not be read.
pub async fn check_store(store: &dyn Store, commit: &CommitInfo) -> Result<(), UpdateError> {
    let latest = store.list_commit_update_records(1).await?;
    check_update(latest.first(), commit, Utc::now())?;
    Ok(())
}

/// Formats a duration as e.g. `2h5m0s`. Negative durations (clock skew)
/// are shown as zero.
fn format_duration(d: chrono::Duration) -> String {
    let secs = d.num_seconds().max(0);
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{}h{}m{}s", h, m, s)
    } else if m > 0 {
        format!("{}m{}s", m, s)
    } else {
        format!("{}s", s)
    }
}
