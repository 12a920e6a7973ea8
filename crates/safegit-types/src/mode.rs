use serde::{Deserialize, Serialize};

/// Execution mode, computed once at dispatcher entry; downstream code
/// reads only this value rather than re-deriving it from flags or env vars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Default. Prompts are permitted.
    Interactive,
    /// No side effects; planned actions are rendered and the handler exits.
    DryRun,
    /// Auto-accept Low and Medium risk; reject High/Critical.
    AssumeYes,
    /// Auto-accept every risk level; typed phrases are synthesized.
    ForceYes,
    /// Any prompt is treated as a denial.
    Batch,
}

impl ExecutionMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ExecutionMode::Interactive => "interactive",
            ExecutionMode::DryRun => "dry_run",
            ExecutionMode::AssumeYes => "assume_yes",
            ExecutionMode::ForceYes => "force_yes",
            ExecutionMode::Batch => "batch",
        }
    }

    pub fn is_dry_run(self) -> bool {
        matches!(self, ExecutionMode::DryRun)
    }
}

impl std::fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
