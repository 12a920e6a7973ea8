use thiserror::Error;

/// Stable error taxonomy for everything that reaches the dispatcher.
///
/// Below the dispatcher boundary, fallible operations use `anyhow::Result`
/// with `.context(...)`; this enum exists precisely at the one seam that
/// needs a stable, matchable error identity: the process exit code.
#[derive(Debug, Error)]
pub enum SafeGitError {
    #[error("blocked: {category} — {reason} (try: {suggestion})")]
    PolicyDenied {
        category: String,
        reason: String,
        suggestion: String,
    },

    #[error("probe `{cmd}` failed with exit code {code}: {stderr_tail}")]
    ProbeFailed {
        cmd: String,
        code: i32,
        stderr_tail: String,
    },

    #[error("backup failed: {reason}")]
    BackupFailed { reason: String },

    #[error("io error: {0}")]
    IoError(String),

    #[error("vcs exited with code {code}")]
    VcsFailed { code: i32 },

    #[error("aborted: {reason}")]
    UserAbort { reason: String, interrupted: bool },
}

impl SafeGitError {
    /// Process exit code surfaced to the CLI's caller.
    pub fn exit_code(&self) -> i32 {
        match self {
            SafeGitError::PolicyDenied { .. } => 1,
            SafeGitError::ProbeFailed { .. } => 3,
            SafeGitError::BackupFailed { .. } => 3,
            SafeGitError::IoError(_) => 3,
            SafeGitError::VcsFailed { code } => *code,
            SafeGitError::UserAbort { interrupted, .. } => {
                if *interrupted {
                    130
                } else {
                    1
                }
            }
        }
    }
}

impl From<std::io::Error> for SafeGitError {
    fn from(err: std::io::Error) -> Self {
        SafeGitError::IoError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_match_documented_table() {
        assert_eq!(
            SafeGitError::PolicyDenied {
                category: "reset_hard".into(),
                reason: "x".into(),
                suggestion: "y".into(),
            }
            .exit_code(),
            1
        );
        assert_eq!(
            SafeGitError::ProbeFailed {
                cmd: "git status".into(),
                code: 1,
                stderr_tail: String::new(),
            }
            .exit_code(),
            3
        );
        assert_eq!(SafeGitError::VcsFailed { code: 7 }.exit_code(), 7);
        assert_eq!(
            SafeGitError::UserAbort {
                reason: "declined".into(),
                interrupted: false,
            }
            .exit_code(),
            1
        );
        assert_eq!(
            SafeGitError::UserAbort {
                reason: "signal".into(),
                interrupted: true,
            }
            .exit_code(),
            130
        );
    }
}
