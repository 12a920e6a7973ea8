use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A verified, content-addressed snapshot created before a destructive
/// operation proceeds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackupArtifact {
    StashRef {
        reference: String,
        message: String,
        created_at: DateTime<Utc>,
    },
    ArchiveFile {
        path: PathBuf,
        algorithm: String,
        checksum: String,
        entry_count: u64,
        total_bytes: u64,
    },
    TextDump {
        path: PathBuf,
        section: String,
        bytes: u64,
    },
}

/// A backup artifact paired with the outcome of its post-creation integrity
/// check. Only artifacts with `verified == true` may be referenced from a
/// completed [`crate::undo::UndoEntry`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupRecord {
    pub artifact: BackupArtifact,
    pub verified: bool,
}

impl BackupRecord {
    pub fn verified(artifact: BackupArtifact) -> Self {
        BackupRecord {
            artifact,
            verified: true,
        }
    }
}
