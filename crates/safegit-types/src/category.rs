use serde::{Deserialize, Serialize};

/// Coarse label for a dangerous VCS operation.
///
/// Every [`Category`] other than [`Category::Passthrough`] is keyed into the
/// analyzer table (`safegit-analyzers`) and the handler table
/// (`safegit::handlers`) so that classification, risk assessment, and
/// execution never drift out of sync with each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    ResetHard,
    CleanForce,
    CheckoutForce,
    PushForce,
    PushDestructive,
    BranchDelete,
    StashDestroy,
    GcPrune,
    ReflogExpire,
    UpdateRefDelete,
    FilterHistory,
    CommitAmend,
    Rebase,
    WorktreeRemove,
    SwitchDiscard,
    MergeOurs,
    TagDelete,
    NotesRemove,
    ReplaceDelete,
    RemoteRemove,
    SubmoduleDeinit,
    SparseCheckoutChange,
    /// Sentinel: the argv matched nothing in the dangerous-pattern catalog.
    Passthrough,
}

impl Category {
    /// The floor risk level for this category before any probe-driven
    /// escalation. Handlers may raise a report's risk above this floor but
    /// must never report below it — risk level is monotonic.
    pub fn default_risk(self) -> super::Risk {
        use super::Risk::*;
        match self {
            Category::ResetHard => High,
            Category::CleanForce => High,
            Category::CheckoutForce => High,
            Category::PushForce => High,
            Category::PushDestructive => Critical,
            Category::BranchDelete => Medium,
            Category::StashDestroy => High,
            Category::GcPrune => High,
            Category::ReflogExpire => Critical,
            Category::UpdateRefDelete => Critical,
            Category::FilterHistory => Critical,
            Category::CommitAmend => Low,
            Category::Rebase => Medium,
            Category::WorktreeRemove => Medium,
            Category::SwitchDiscard => Medium,
            Category::MergeOurs => Medium,
            Category::TagDelete => Medium,
            Category::NotesRemove => Medium,
            Category::ReplaceDelete => Medium,
            Category::RemoteRemove => Medium,
            Category::SubmoduleDeinit => Medium,
            Category::SparseCheckoutChange => Low,
            Category::Passthrough => Low,
        }
    }

    /// Short machine-stable tag used in journal entries and CLI output.
    pub fn tag(self) -> &'static str {
        match self {
            Category::ResetHard => "reset_hard",
            Category::CleanForce => "clean_force",
            Category::CheckoutForce => "checkout_force",
            Category::PushForce => "push_force",
            Category::PushDestructive => "push_destructive",
            Category::BranchDelete => "branch_delete",
            Category::StashDestroy => "stash_destroy",
            Category::GcPrune => "gc_prune",
            Category::ReflogExpire => "reflog_expire",
            Category::UpdateRefDelete => "update_ref_delete",
            Category::FilterHistory => "filter_history",
            Category::CommitAmend => "commit_amend",
            Category::Rebase => "rebase",
            Category::WorktreeRemove => "worktree_remove",
            Category::SwitchDiscard => "switch_discard",
            Category::MergeOurs => "merge_ours",
            Category::TagDelete => "tag_delete",
            Category::NotesRemove => "notes_remove",
            Category::ReplaceDelete => "replace_delete",
            Category::RemoteRemove => "remote_remove",
            Category::SubmoduleDeinit => "submodule_deinit",
            Category::SparseCheckoutChange => "sparse_checkout_change",
            Category::Passthrough => "passthrough",
        }
    }

    /// Whether this category is a write operation for the purposes of the
    /// code_freeze mode rule: every category but
    /// passthrough mutates repository state or history.
    pub fn is_write(self) -> bool {
        !matches!(self, Category::Passthrough)
    }
}
