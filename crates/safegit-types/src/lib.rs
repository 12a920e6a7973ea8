//! Core data model and error taxonomy shared by every `safegit` crate.
//!
//! - [`category`] — the category tag catalog and its risk floor.
//! - [`risk`] — the `Low < Medium < High < Critical` risk level.
//! - [`mode`] — `ExecutionMode`, computed once at dispatcher entry.
//! - [`probe`] — the read-only repository probe snapshot.
//! - [`report`] — `SafetyReport` / `ConfirmKind`, the analyzer output.
//! - [`backup`] — backup artifact variants and their verification flag.
//! - [`undo`] — the append-only undo journal record.
//! - [`context`] — the persisted environment/mode/restriction record.
//! - [`error`] — the stable error taxonomy and exit-code mapping.

pub mod backup;
pub mod category;
pub mod context;
pub mod error;
pub mod mode;
pub mod probe;
pub mod report;
pub mod risk;
pub mod undo;

pub use backup::{BackupArtifact, BackupRecord};
pub use category::Category;
pub use context::{ContextRecord, Environment, Mode as ContextMode, Verdict};
pub use error::SafeGitError;
pub use mode::ExecutionMode;
pub use probe::{DirtyFile, PreState, ProbeSnapshot, StashEntry, UntrackedFile, UntrackedKind, UpstreamDivergence};
pub use report::{ConfirmKind, Impact, SafetyReport};
pub use risk::Risk;
pub use undo::{Outcome, UndoEntry};

/// Serialize a value to a single JSONL line whose object keys are in
/// lexicographic order, the self-describing key/value object format
/// `journal.log` and `intercepted.log` use. `serde_json` does not guarantee
/// struct-field emission order matches a sort, so we round-trip through a
/// `BTreeMap`.
pub fn to_sorted_json_line<T: serde::Serialize>(value: &T) -> serde_json::Result<String> {
    let as_value = serde_json::to_value(value)?;
    let sorted: std::collections::BTreeMap<String, serde_json::Value> =
        match as_value {
            serde_json::Value::Object(map) => map.into_iter().collect(),
            other => {
                // Non-object payloads (shouldn't occur for our record types)
                // still serialize, just without key sorting.
                return serde_json::to_string(&other);
            }
        };
    serde_json::to_string(&sorted)
}
