use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Deployment environment, gating which categories are permitted via the
/// environment/mode rule matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl Default for Environment {
    fn default() -> Self {
        Environment::Development
    }
}

/// Operating mode, layered on top of [`Environment`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Normal,
    CodeFreeze,
    Paranoid,
    Maintenance,
}

impl Default for Mode {
    fn default() -> Self {
        Mode::Normal
    }
}

/// Persisted singleton describing the environment, mode, and custom
/// restrictions that gate which commands `safegit` will pass through to the
/// VCS.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextRecord {
    #[serde(default)]
    pub environment: Environment,
    #[serde(default)]
    pub mode: Mode,
    #[serde(default)]
    pub restrictions: BTreeSet<String>,
    pub updated_at: DateTime<Utc>,
}

impl Default for ContextRecord {
    fn default() -> Self {
        ContextRecord {
            environment: Environment::default(),
            mode: Mode::default(),
            restrictions: BTreeSet::new(),
            updated_at: Utc::now(),
        }
    }
}

/// Result of a context-based permission check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Allow,
    Deny { reason: String },
    NeedsElevation,
}

impl Verdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Verdict::Allow)
    }
}
