//! `.safegit.toml` configuration loading: a flat, all-optional struct with
//! `#[serde(default)]` per field, so an absent or partial file behaves
//! exactly like an all-defaults one.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

pub const CONFIG_FILE: &str = ".safegit.toml";

fn default_false() -> bool {
    false
}

/// Lowest-precedence layer of the mode resolution order: CLI flags and
/// environment variables both outrank it.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WrapperConfig {
    #[serde(default = "default_false")]
    pub non_interactive: bool,
    #[serde(default = "default_false")]
    pub assume_yes: bool,
    #[serde(default = "default_false")]
    pub force_yes: bool,
    /// VCS binary to invoke; overridable so tests and alternate installs
    /// can point at a stub.
    #[serde(default = "default_vcs_program")]
    pub vcs_program: String,
}

fn default_vcs_program() -> String {
    "git".to_string()
}

impl Default for WrapperConfig {
    fn default() -> Self {
        WrapperConfig {
            non_interactive: false,
            assume_yes: false,
            force_yes: false,
            vcs_program: default_vcs_program(),
        }
    }
}

/// Load `<repo>/.safegit.toml`, defaulting every field when the file is
/// absent.
pub fn load(repo: &Path) -> Result<WrapperConfig> {
    let path = repo.join(CONFIG_FILE);
    if !path.exists() {
        return Ok(WrapperConfig::default());
    }
    let text = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("failed to parse {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_config_file_is_all_defaults() {
        let dir = tempdir().unwrap();
        let config = load(dir.path()).unwrap();
        assert!(!config.non_interactive);
        assert!(!config.assume_yes);
        assert!(!config.force_yes);
        assert_eq!(config.vcs_program, "git");
    }

    #[test]
    fn partial_config_file_fills_in_remaining_defaults() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "assume_yes = true\n").unwrap();
        let config = load(dir.path()).unwrap();
        assert!(config.assume_yes);
        assert!(!config.force_yes);
        assert_eq!(config.vcs_program, "git");
    }
}
