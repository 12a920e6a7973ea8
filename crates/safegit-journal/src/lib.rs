//! Append-only undo journal and command-interception log.
//!
//! Generalized from in-memory accumulation to a directly file-backed,
//! cross-process-safe append: the journal is shared state across wrapper
//! invocations, and a sidecar `journal.lock` enforces cross-process mutual
//! exclusion.
//!
//! Property tested here: for every completed destructive invocation exactly
//! one entry is appended, and N concurrent appenders produce exactly N
//! records with no interleaving corruption.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use safegit_types::{Category, UndoEntry, to_sorted_json_line};

pub const JOURNAL_FILE: &str = "journal.log";
pub const INTERCEPTED_FILE: &str = "intercepted.log";

pub fn journal_path(safe_dir: &Path) -> PathBuf {
    safe_dir.join(JOURNAL_FILE)
}

pub fn intercepted_path(safe_dir: &Path) -> PathBuf {
    safe_dir.join(INTERCEPTED_FILE)
}

/// Append one undo entry under an exclusive, fsynced lock. This is the only
/// write path for `journal.log`: open-append, write the serialized line
/// plus newline, fsync, release.
pub fn append(safe_dir: &Path, entry: &UndoEntry) -> Result<()> {
    fs::create_dir_all(safe_dir)
        .with_context(|| format!("failed to create {}", safe_dir.display()))?;
    let path = journal_path(safe_dir);
    let _lock = safegit_lock::with_exclusive_lock(&path)
        .with_context(|| format!("failed to lock {}", path.display()))?;

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("failed to open {}", path.display()))?;

    let line = to_sorted_json_line(entry).context("failed to serialize undo entry")?;
    writeln!(file, "{line}").context("failed to write journal line")?;
    file.sync_all().context("failed to fsync journal")?;
    Ok(())
}

/// Read every entry currently in the journal, oldest first. Missing file
/// reads as empty, the same missing-file-defaults convention the context
/// store uses.
pub fn read_all(safe_dir: &Path) -> Result<Vec<UndoEntry>> {
    let path = journal_path(safe_dir);
    if !path.exists() {
        return Ok(Vec::new());
    }
    let _lock = safegit_lock::with_exclusive_lock(&path)
        .with_context(|| format!("failed to lock {}", path.display()))?;

    let file =
        File::open(&path).with_context(|| format!("failed to open {}", path.display()))?;
    let reader = BufReader::new(file);
    let mut entries = Vec::new();
    for (lineno, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("failed to read line {lineno} of journal"))?;
        if line.trim().is_empty() {
            continue;
        }
        let entry: UndoEntry = serde_json::from_str(&line)
            .with_context(|| format!("failed to parse journal line {lineno}: {line}"))?;
        entries.push(entry);
    }
    Ok(entries)
}

/// Entries in reverse chronological order, for the `undo`/`undo-history`
/// commands.
pub fn read_reverse_chronological(safe_dir: &Path) -> Result<Vec<UndoEntry>> {
    let mut entries = read_all(safe_dir)?;
    entries.reverse();
    Ok(entries)
}

/// One line of `intercepted.log`: a low-priority record of every classified
/// invocation, written via the non-blocking lock variant; loss under lock
/// contention is tolerated since this log is diagnostic, not authoritative.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct InterceptedLine {
    pub category: Category,
    pub mode: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub argv_hash: String,
}

/// Append an interception record; on lock contention the write is silently
/// skipped (never surfaced as an error).
pub fn append_intercepted(safe_dir: &Path, line: &InterceptedLine) -> Result<()> {
    fs::create_dir_all(safe_dir)
        .with_context(|| format!("failed to create {}", safe_dir.display()))?;
    let path = intercepted_path(safe_dir);

    let Some(_lock) = safegit_lock::try_lock_with_retry(&path)? else {
        return Ok(());
    };

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let serialized = to_sorted_json_line(line).context("failed to serialize intercepted line")?;
    writeln!(file, "{serialized}").context("failed to write intercepted line")?;
    Ok(())
}

/// A short, stable hash of an argv, used as the `argv_hash` field of
/// [`InterceptedLine`] rather than echoing the raw (possibly
/// credential-bearing) argv into a lower-assurance log.
pub fn hash_argv(argv: &[String]) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    for (i, token) in argv.iter().enumerate() {
        if i > 0 {
            hasher.update(b" ");
        }
        hasher.update(token.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Whether `category` has a deterministic, mechanically-derivable recovery
/// path that `ForceYes` may execute automatically.
pub fn has_deterministic_recovery(category: Category) -> bool {
    matches!(
        category,
        Category::ResetHard | Category::Rebase | Category::StashDestroy
    )
}
