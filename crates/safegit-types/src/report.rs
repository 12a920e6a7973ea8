use serde::{Deserialize, Serialize};

use crate::risk::Risk;

/// What a [`crate::confirm::ConfirmKind`] asks the operator to type or
/// acknowledge before the handler is allowed to proceed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConfirmKind {
    None,
    YesNo,
    TypedPhrase { phrase: String },
    DoubleTypedPhrase { first: String, second: String },
    BranchNameEcho { branch: String },
}

/// Estimated blast radius of a proposed operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Impact {
    pub files: u64,
    pub lines: u64,
    pub bytes: u64,
    pub commits: u64,
}

/// Output of a safety analyzer: the risk-adjusted, human-facing assessment
/// of one proposed destructive operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyReport {
    pub risk: Risk,
    pub impact: Impact,
    pub warnings: Vec<String>,
    pub alternatives: Vec<String>,
    pub requires_backup: bool,
    pub confirmation: ConfirmKind,
    /// Set when the category is blocked by default regardless of mode (e.g.
    /// a history-filter operation run without its explicit override flag).
    /// A blocked report is denied before backup or confirmation ever run.
    pub blocked: Option<String>,
}

impl SafetyReport {
    pub fn push_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    pub fn push_alternative(&mut self, alternative: impl Into<String>) {
        self.alternatives.push(alternative.into());
    }
}
