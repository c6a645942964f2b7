//! Timestamped, immutable snapshots of the persisted plan document.
//!
//! Snapshots are raw byte copies; they are never parsed on the way out, so a
//! snapshot stays restorable even if the document format moves on. Retention
//! is left to the operator.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::error::{TrackerError, TrackerResult};
use crate::io::plan_store::{PlanStore, parse_plan};
use crate::io::storage::{read_optional, with_timeout, write_atomic, write_new};

/// File name prefix shared by every snapshot.
pub const SNAPSHOT_PREFIX: &str = "plan-";
const SNAPSHOT_EXT: &str = "json";

/// Result of restoring a snapshot over the live document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreOutcome {
    pub restored_from: PathBuf,
    /// Snapshot of the document that the restore replaced, if one existed.
    pub previous_backup: Option<PathBuf>,
}

/// Copy the current plan document byte-for-byte into `backup_dir`.
///
/// The file name embeds the UTC time with millisecond resolution; an existing
/// snapshot is never overwritten.
pub fn snapshot(plan_path: &Path, backup_dir: &Path, timeout: Duration) -> TrackerResult<PathBuf> {
    let bytes = read_optional("read plan for snapshot", plan_path, timeout)?.ok_or_else(|| {
        TrackerError::SourceMissing {
            path: plan_path.to_path_buf(),
        }
    })?;
    let stem = format!("{SNAPSHOT_PREFIX}{}", snapshot_stamp(Utc::now()));
    let path = write_new("write snapshot", backup_dir, &stem, SNAPSHOT_EXT, bytes, timeout)?;
    info!(path = %path.display(), "snapshot written");
    Ok(path)
}

/// Snapshot files in `backup_dir`, oldest first. A missing directory has none.
pub fn list_snapshots(backup_dir: &Path, timeout: Duration) -> TrackerResult<Vec<PathBuf>> {
    let dir = backup_dir.to_path_buf();
    let mut snapshots = with_timeout("list snapshots", backup_dir, timeout, move || {
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err),
        };
        let mut found = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if snapshot_sort_key(&path).is_some() {
                found.push(path);
            }
        }
        Ok(found)
    })?;
    snapshots.sort_by_cached_key(|path| snapshot_sort_key(path));
    Ok(snapshots)
}

/// Replace the live document with the contents of `snapshot_path`.
///
/// The snapshot must parse as a valid plan. The document being replaced is
/// snapshotted first so a restore can itself be undone.
pub fn restore(store: &PlanStore, snapshot_path: &Path) -> TrackerResult<RestoreOutcome> {
    let bytes = read_optional("read snapshot", snapshot_path, store.io_timeout())?.ok_or_else(
        || {
            TrackerError::io(
                "read snapshot",
                snapshot_path,
                io::Error::from(io::ErrorKind::NotFound),
            )
        },
    )?;
    parse_plan(snapshot_path, &bytes)?;

    let previous_backup = if store.exists() {
        Some(store.snapshot()?)
    } else {
        None
    };
    write_atomic("restore plan", store.plan_path(), bytes, store.io_timeout())?;
    info!(
        from = %snapshot_path.display(),
        to = %store.plan_path().display(),
        "plan restored"
    );
    Ok(RestoreOutcome {
        restored_from: snapshot_path.to_path_buf(),
        previous_backup,
    })
}

/// `2024-05-01T10-00-00-123Z`: RFC 3339 with `:` and `.` made file-name safe.
fn snapshot_stamp(now: DateTime<Utc>) -> String {
    now.format("%Y-%m-%dT%H-%M-%S-%3fZ").to_string()
}

/// `(stamp, collision suffix)` for snapshot file names, `None` for anything else.
fn snapshot_sort_key(path: &Path) -> Option<(String, u32)> {
    let name = path.file_name()?.to_str()?;
    let body = name
        .strip_prefix(SNAPSHOT_PREFIX)?
        .strip_suffix(".json")?;
    let (stamp, rest) = body.split_once('Z')?;
    let suffix = match rest.strip_prefix('-') {
        Some(n) => n.parse().ok()?,
        None if rest.is_empty() => 0,
        None => return None,
    };
    Some((stamp.to_string(), suffix))
}
