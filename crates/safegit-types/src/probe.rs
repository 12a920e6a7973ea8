use serde::{Deserialize, Serialize};

/// A tracked file with uncommitted changes, as reported by `git status
/// --porcelain=v2` plus `git diff --numstat`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirtyFile {
    pub path: String,
    pub added_lines: u64,
    pub removed_lines: u64,
}

/// Coarse classification of an untracked file, used by the `clean_force`
/// analyzer to summarize blast radius and to flag protected patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UntrackedKind {
    Source,
    Config,
    BuildArtifact,
    Log,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UntrackedFile {
    pub path: String,
    pub size_bytes: u64,
    pub kind: UntrackedKind,
}

/// Ahead/behind divergence against the configured upstream, or `None` when
/// the current branch has no upstream configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpstreamDivergence {
    None,
    Tracking { ahead: u64, behind: u64 },
}

impl UpstreamDivergence {
    pub fn is_ahead_only(self) -> bool {
        matches!(self, UpstreamDivergence::Tracking { behind: 0, .. })
            || matches!(self, UpstreamDivergence::None)
    }
}

/// A single stash entry, as reported by `git stash list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StashEntry {
    pub reference: String,
    pub message: String,
}

/// Read-only capture of repository state built at handler entry and
/// discarded when the handler returns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeSnapshot {
    pub head_commit: Option<String>,
    pub current_branch: Option<String>,
    pub dirty_files: Vec<DirtyFile>,
    pub untracked_files: Vec<UntrackedFile>,
    pub stashes: Vec<StashEntry>,
    pub upstream: UpstreamDivergence,
    pub reflog_tip: Option<String>,
    pub protected_branch: bool,
}

impl ProbeSnapshot {
    pub fn dirty_line_count(&self) -> u64 {
        self.dirty_files
            .iter()
            .map(|f| f.added_lines + f.removed_lines)
            .sum()
    }

    pub fn untracked_byte_count(&self) -> u64 {
        self.untracked_files.iter().map(|f| f.size_bytes).sum()
    }

    pub fn stash_count(&self) -> usize {
        self.stashes.len()
    }
}

/// A snapshot of the fields that matter for recovery, persisted inside an
/// [`crate::undo::UndoEntry`] rather than the full [`ProbeSnapshot`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreState {
    pub head: Option<String>,
    pub branch: Option<String>,
    pub dirty_count: usize,
    pub stash_count: usize,
    pub reflog_tip: Option<String>,
}

impl From<&ProbeSnapshot> for PreState {
    fn from(snap: &ProbeSnapshot) -> Self {
        PreState {
            head: snap.head_commit.clone(),
            branch: snap.current_branch.clone(),
            dirty_count: snap.dirty_files.len(),
            stash_count: snap.stash_count(),
            reflog_tip: snap.reflog_tip.clone(),
        }
    }
}
