//! Entry point: resolve the execution mode from CLI
//! flags, environment variables, CI detection, and the config file, then
//! hand off to `handlers::dispatch`.

use safegit_types::ExecutionMode;

use crate::config::WrapperConfig;

/// Reserved global flags the dispatcher consumes before classification.
/// Never forwarded to the VCS.
#[derive(Debug, Clone, Default)]
pub struct GlobalFlags {
    pub dry_run: bool,
    pub yes: bool,
    pub force_yes: bool,
    pub non_interactive: bool,
    pub batch: bool,
}

const CI_ENV_VARS: &[&str] = &[
    "CI",
    "CONTINUOUS_INTEGRATION",
    "GITHUB_ACTIONS",
    "GITLAB_CI",
    "JENKINS_URL",
    "TRAVIS",
];

fn detect_ci(env_lookup: &dyn Fn(&str) -> Option<String>) -> bool {
    CI_ENV_VARS.iter().any(|name| env_lookup(name).is_some())
}

fn cli_explicit(flags: &GlobalFlags) -> Option<ExecutionMode> {
    if flags.force_yes {
        Some(ExecutionMode::ForceYes)
    } else if flags.batch || flags.non_interactive {
        Some(ExecutionMode::Batch)
    } else if flags.yes {
        Some(ExecutionMode::AssumeYes)
    } else {
        None
    }
}

fn env_explicit(env_lookup: &dyn Fn(&str) -> Option<String>) -> Option<ExecutionMode> {
    if env_lookup("SAFE_FORCE_YES").is_some() {
        Some(ExecutionMode::ForceYes)
    } else if env_lookup("SAFE_ASSUME_YES").is_some() {
        Some(ExecutionMode::AssumeYes)
    } else if env_lookup("SAFE_NONINTERACTIVE").is_some() {
        Some(ExecutionMode::Batch)
    } else {
        None
    }
}

fn config_explicit(config: &WrapperConfig) -> Option<ExecutionMode> {
    if config.force_yes {
        Some(ExecutionMode::ForceYes)
    } else if config.assume_yes {
        Some(ExecutionMode::AssumeYes)
    } else if config.non_interactive {
        Some(ExecutionMode::Batch)
    } else {
        None
    }
}

/// Resolve the execution mode with precedence CLI > env > CI-detected >
/// config > default. `--dry-run` always wins outright:
/// it is the one flag an operator reaches for specifically to guarantee no
/// side effect regardless of what else is configured.
pub fn resolve_mode(
    flags: &GlobalFlags,
    config: &WrapperConfig,
    env_lookup: &dyn Fn(&str) -> Option<String>,
) -> ExecutionMode {
    if flags.dry_run {
        return ExecutionMode::DryRun;
    }
    if let Some(mode) = cli_explicit(flags) {
        return mode;
    }
    if let Some(mode) = env_explicit(env_lookup) {
        return mode;
    }
    if detect_ci(env_lookup) {
        return ExecutionMode::AssumeYes;
    }
    config_explicit(config).unwrap_or(ExecutionMode::Interactive)
}
