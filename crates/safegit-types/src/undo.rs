use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::backup::BackupRecord;
use crate::category::Category;
use crate::probe::PreState;

/// Outcome of the VCS invocation that an [`UndoEntry`] describes. An entry is
/// appended *before* the VCS runs, so the initial outcome is always
/// [`Outcome::Pending`]; a follow-up entry records the final outcome only
/// if the VCS invocation fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Pending,
    Succeeded,
    Failed { vcs_exit_code: i32 },
}

/// Immutable, append-only journal record describing one destructive
/// invocation and how to reverse it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UndoEntry {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub category: Category,
    pub argv: Vec<String>,
    /// The argv actually handed to the VCS, when an analyzer rewrote it to
    /// a safer form (e.g. `--force` -> `--force-with-lease`). `None` when
    /// the VCS ran with `argv` unchanged.
    #[serde(default)]
    pub adjusted_argv: Option<Vec<String>>,
    pub cwd: String,
    pub mode: String,
    pub pre_state: PreState,
    pub backups: Vec<BackupRecord>,
    pub recovery: Vec<String>,
    pub hint: String,
    pub outcome: Outcome,
}

impl UndoEntry {
    /// Construct a follow-up entry that updates the outcome of `self`
    /// without mutating it, preserving journal append-only-ness.
    pub fn with_outcome(&self, outcome: Outcome) -> UndoEntry {
        UndoEntry {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            outcome,
            ..self.clone()
        }
    }
}
