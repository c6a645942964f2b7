//! Storage boundary: bounded-time reads and crash-safe writes.
//!
//! Every filesystem call the store and backup manager make goes through
//! [`with_timeout`], so a stuck mount surfaces as an error instead of hanging
//! the invocation.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::error::{TrackerError, TrackerResult};

/// Run `op` on a worker thread and wait at most `timeout` for it.
///
/// A timed-out worker is left to finish on its own; its result is discarded.
pub fn with_timeout<T, F>(
    op: &'static str,
    path: &Path,
    timeout: Duration,
    f: F,
) -> TrackerResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> io::Result<T> + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name("tracker-storage".to_string())
        .spawn(move || {
            let _ = tx.send(f());
        })
        .map_err(|err| TrackerError::io(op, path, err))?;

    match rx.recv_timeout(timeout) {
        Ok(result) => result.map_err(|err| TrackerError::io(op, path, err)),
        Err(RecvTimeoutError::Timeout) => {
            warn!(op, path = %path.display(), timeout_secs = timeout.as_secs(), "storage call timed out");
            Err(TrackerError::io(
                op,
                path,
                io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("timed out after {}s", timeout.as_secs()),
                ),
            ))
        }
        Err(RecvTimeoutError::Disconnected) => Err(TrackerError::io(
            op,
            path,
            io::Error::other("storage worker exited without a result"),
        )),
    }
}

/// Read a file, returning `None` if it does not exist.
pub fn read_optional(
    op: &'static str,
    path: &Path,
    timeout: Duration,
) -> TrackerResult<Option<Vec<u8>>> {
    let owned = path.to_path_buf();
    with_timeout(op, path, timeout, move || match fs::read(&owned) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err),
    })
}

/// Atomically replace `path` with `contents` (temp file + fsync + rename).
///
/// Readers observe either the previous file or the complete new one. Each
/// write gets its own uniquely named temp file, so a timed-out writer that
/// resumes later cannot clobber the temp file of a newer write.
pub fn write_atomic(
    op: &'static str,
    path: &Path,
    contents: Vec<u8>,
    timeout: Duration,
) -> TrackerResult<()> {
    let target = path.to_path_buf();
    let parent = parent_dir(path);
    let prefix = temp_prefix(path);
    debug!(path = %path.display(), bytes = contents.len(), "atomic write");
    with_timeout(op, path, timeout, move || {
        fs::create_dir_all(&parent)?;
        let tmp = synced_temp_file(&parent, &prefix, &contents)?;
        tmp.persist(&target).map_err(|err| err.error)?;
        sync_dir(&parent)
    })
}

/// Write `contents` under a fresh name in `dir`, never replacing an existing file.
///
/// Tries `<stem>.<ext>`, then `<stem>-1.<ext>`, `<stem>-2.<ext>`, ... and returns
/// the path that was used. The no-overwrite guarantee comes from the
/// filesystem (`persist_noclobber`), not from an existence check.
pub fn write_new(
    op: &'static str,
    dir: &Path,
    stem: &str,
    ext: &str,
    contents: Vec<u8>,
    timeout: Duration,
) -> TrackerResult<PathBuf> {
    let dir_owned = dir.to_path_buf();
    let stem = stem.to_string();
    let ext = ext.to_string();
    with_timeout(op, dir, timeout, move || {
        fs::create_dir_all(&dir_owned)?;
        let mut tmp = synced_temp_file(&dir_owned, &format!(".{stem}."), &contents)?;
        for suffix in 0..1000u32 {
            let name = if suffix == 0 {
                format!("{stem}.{ext}")
            } else {
                format!("{stem}-{suffix}.{ext}")
            };
            let candidate = dir_owned.join(name);
            match tmp.persist_noclobber(&candidate) {
                Ok(_) => {
                    sync_dir(&dir_owned)?;
                    return Ok(candidate);
                }
                Err(err) if err.error.kind() == io::ErrorKind::AlreadyExists => tmp = err.file,
                Err(err) => return Err(err.error),
            }
        }
        Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("no free file name for '{stem}'"),
        ))
    })
}

/// Create a temp file in `dir`, write `contents`, and fsync it.
///
/// The file is removed on drop unless it is persisted.
fn synced_temp_file(dir: &Path, prefix: &str, contents: &[u8]) -> io::Result<NamedTempFile> {
    let mut tmp = tempfile::Builder::new()
        .prefix(prefix)
        .suffix(".tmp")
        .tempfile_in(dir)?;
    tmp.write_all(contents)?;
    tmp.as_file().sync_all()?;
    Ok(tmp)
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> io::Result<()> {
    File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// `.plan.json.` for `dir/plan.json`: hidden, and tied to the target name.
fn temp_prefix(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!(".{name}.")
}
