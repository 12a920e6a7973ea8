//! Atomic file writes and cross-platform exclusive locking.
//!
//! This crate is the sole mechanism safegit uses to write the journal,
//! context, and interception-log files. It provides two
//! primitives:
//!
//! - [`atomic_write`] — write-to-temp, fsync, rename-over-target.
//! - [`with_exclusive_lock`] — acquire an OS advisory lock on a sibling
//!   `.lock` file for the duration of a closure.
//!
//! Locking is backed by the `fs2` crate, which maps to `flock` on Unix and
//! `LockFileEx` on Windows, so platform differences stay confined to this
//! one crate behind the single `with_exclusive_lock` primitive.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use fs2::FileExt;

/// Write `bytes` to `path` atomically: write to a sibling temp path with a
/// random suffix, flush and fsync the handle, then rename over `path`. On
/// any failure the partial temp file is removed and the error is returned;
/// `path` is left untouched (either absent, if it never existed, or equal
/// to its previous complete contents).
pub fn atomic_write(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create parent dir {}", parent.display()))?;
    }

    let tmp_path = sibling_tmp_path(path);

    let write_result = (|| -> Result<()> {
        let mut file = File::create(&tmp_path)
            .with_context(|| format!("failed to create tmp file {}", tmp_path.display()))?;
        file.write_all(bytes)
            .with_context(|| format!("failed to write tmp file {}", tmp_path.display()))?;
        file.sync_all()
            .with_context(|| format!("failed to fsync tmp file {}", tmp_path.display()))?;
        Ok(())
    })();

    if let Err(err) = write_result {
        let _ = fs::remove_file(&tmp_path);
        return Err(err);
    }

    fs::rename(&tmp_path, path).with_context(|| {
        format!(
            "failed to rename {} to {}",
            tmp_path.display(),
            path.display()
        )
    })?;

    fsync_parent_dir(path);
    Ok(())
}

fn sibling_tmp_path(path: &Path) -> PathBuf {
    let suffix: u64 = random_suffix();
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "tmp".to_string());
    path.with_file_name(format!(".{file_name}.{suffix:x}.tmp"))
}

/// A random-ish suffix for temp file names. Not cryptographic; only needs to
/// avoid collisions between concurrent writers of the same target path.
fn random_suffix() -> u64 {
    use std::collections::hash_map::RandomState;
    use std::hash::{BuildHasher, Hash, Hasher};

    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);

    let mut hasher = RandomState::new().build_hasher();
    std::process::id().hash(&mut hasher);
    format!("{:?}", std::thread::current().id()).hash(&mut hasher);
    nanos.hash(&mut hasher);
    hasher.finish()
}

/// Best-effort fsync of the parent directory after a rename, so the
/// directory-entry update is durable on crash. Errors are ignored: not
/// every platform supports opening a directory for sync (e.g. Windows).
fn fsync_parent_dir(path: &Path) {
    if let Some(parent) = path.parent()
        && let Ok(dir) = File::open(parent)
    {
        let _ = dir.sync_all();
    }
}

/// RAII guard holding an exclusive advisory lock on `<path>.lock`. The lock
/// is released when the guard is dropped.
pub struct LockGuard {
    file: File,
    path: PathBuf,
}

impl LockGuard {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

fn lock_file_path(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_os_string();
    os.push(".lock");
    PathBuf::from(os)
}

/// Acquire an exclusive advisory lock on `path`'s sibling `.lock` file,
/// blocking until it is available. Releases automatically when the
/// returned guard is dropped.
pub fn with_exclusive_lock(path: &Path) -> Result<LockGuard> {
    let lock_path = lock_file_path(path);
    if let Some(parent) = lock_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create parent dir {}", parent.display()))?;
    }

    let file = File::options()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&lock_path)
        .with_context(|| format!("failed to open lock file {}", lock_path.display()))?;

    file.lock_exclusive()
        .with_context(|| format!("failed to lock {}", lock_path.display()))?;

    Ok(LockGuard {
        file,
        path: lock_path,
    })
}

/// Non-blocking lock acquisition with bounded retry: 5 attempts, exponential
/// backoff starting at 50ms and doubling, capped at 1s. Returns `Ok(None)`
/// (a silent skip) rather than an error if the lock could not be obtained —
/// reserved for the low-priority interception-log append path, where a
/// missed entry is acceptable.
pub fn try_lock_with_retry(path: &Path) -> Result<Option<LockGuard>> {
    let lock_path = lock_file_path(path);
    if let Some(parent) = lock_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create parent dir {}", parent.display()))?;
    }

    let file = File::options()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&lock_path)
        .with_context(|| format!("failed to open lock file {}", lock_path.display()))?;

    let mut delay = Duration::from_millis(50);
    const MAX_ATTEMPTS: u32 = 5;
    const MAX_DELAY: Duration = Duration::from_secs(1);

    for attempt in 0..MAX_ATTEMPTS {
        match file.try_lock_exclusive() {
            Ok(()) => {
                return Ok(Some(LockGuard {
                    file,
                    path: lock_path,
                }));
            }
            Err(_) if attempt + 1 < MAX_ATTEMPTS => {
                std::thread::sleep(delay);
                delay = (delay * 2).min(MAX_DELAY);
            }
            Err(_) => return Ok(None),
        }
    }

    Ok(None)
}

/// Convenience used by callers that must fail loudly rather than skip (the
/// journal append path): a non-blocking attempt that surfaces an error
/// after exhausting retries instead of returning `None`.
pub fn lock_or_bail(path: &Path) -> Result<LockGuard> {
    match try_lock_with_retry(path)? {
        Some(guard) => Ok(guard),
        None => bail!("timed out waiting for lock on {}", path.display()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn atomic_write_creates_file_with_exact_contents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        atomic_write(&path, b"hello").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"hello");
        // no leftover temp files
        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn atomic_write_overwrites_previous_version_wholesale() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        atomic_write(&path, b"version-1").unwrap();
        atomic_write(&path, b"version-2-longer").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"version-2-longer");
    }

    #[test]
    fn atomic_write_leaves_no_partial_file_on_simulated_failure() {
        // Simulate "kill -9 between write and rename" by writing to the tmp
        // path and never renaming; readers must see the old (or no) file.
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        atomic_write(&path, b"committed").unwrap();

        let tmp = sibling_tmp_path(&path);
        fs::write(&tmp, b"partial-garbage").unwrap();
        // The target is untouched by the unrenamed tmp file.
        assert_eq!(fs::read(&path).unwrap(), b"committed");
        fs::remove_file(&tmp).unwrap();
    }

    #[test]
    fn exclusive_lock_guards_a_critical_section() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("journal.log");
        let guard = with_exclusive_lock(&target).unwrap();
        assert!(guard.path().exists());
        drop(guard);
    }

    #[test]
    fn try_lock_with_retry_returns_none_when_contended() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("intercepted.log");
        let _held = with_exclusive_lock(&target).unwrap();

        let attempt = try_lock_with_retry(&target).unwrap();
        assert!(attempt.is_none());
    }

    #[test]
    fn lock_released_on_drop_allows_next_acquirer() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("journal.log");
        {
            let _guard = with_exclusive_lock(&target).unwrap();
        }
        let second = with_exclusive_lock(&target);
        assert!(second.is_ok());
    }
}
