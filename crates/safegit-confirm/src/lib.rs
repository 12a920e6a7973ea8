//! Confirmation engine: maps `(SafetyReport.confirmation,
//! ExecutionMode)` to accept/decline, prompting the operator only when the
//! mode and risk level require it.
//!
//! Prompting is abstracted behind the [`Interact`] trait so that
//! `safegit-confirm`'s decision table stays pure and unit-testable without a
//! real terminal.

use safegit_types::{ConfirmKind, ExecutionMode, Risk, SafetyReport};

/// Operator-facing prompt surface. Production code implements this over a
/// real TTY; tests implement it over scripted answers.
pub trait Interact {
    fn confirm_yes_no(&mut self, prompt: &str) -> bool;
    /// Returns the operator's raw input so the caller can compare it to the
    /// expected phrase.
    fn read_phrase(&mut self, prompt: &str) -> String;
    fn note(&mut self, msg: &str);
}

/// Outcome of a confirmation decision.
///
/// `Declined` and `PolicyDenied` are kept distinct because they map to
/// different error variants upstream: `Declined` is the operator actually
/// answering no or mistyping a phrase at a real prompt (`UserAbort`);
/// `PolicyDenied` is a mode x kind combination that can never reach a
/// prompt at all (`AssumeYes`/`Batch` rejecting a kind outright) — nothing
/// the operator did, the mode itself forbids it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Accepted,
    Declined { reason: String },
    PolicyDenied { reason: String },
}

impl Decision {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Decision::Accepted)
    }
}

/// `AssumeYes` auto-accepts Low/Medium risk only; High and
/// Critical are declined outright regardless of `ConfirmKind`, independent
/// of the mode x kind table below.
fn assume_yes_risk_gate(risk: Risk) -> Option<Decision> {
    if risk >= Risk::High {
        Some(Decision::PolicyDenied {
            reason: "assume-yes does not accept high or critical risk operations; rerun with --force-yes".to_string(),
        })
    } else {
        None
    }
}

/// Decide whether `report`'s proposed operation may proceed under `mode`,
/// prompting via `interact` only where the mode x kind decision matrix
/// calls for a prompt.
pub fn decide(report: &SafetyReport, mode: ExecutionMode, interact: &mut dyn Interact) -> Decision {
    if mode.is_dry_run() {
        return Decision::Accepted;
    }

    if mode == ExecutionMode::AssumeYes
        && let Some(declined) = assume_yes_risk_gate(report.risk)
    {
        return declined;
    }

    match (&report.confirmation, mode) {
        (ConfirmKind::None, _) => Decision::Accepted,

        (ConfirmKind::YesNo, ExecutionMode::Interactive) => {
            if interact.confirm_yes_no("Proceed? [y/N]") {
                Decision::Accepted
            } else {
                Decision::Declined { reason: "declined at y/n prompt".to_string() }
            }
        }
        (ConfirmKind::YesNo, ExecutionMode::AssumeYes | ExecutionMode::ForceYes) => Decision::Accepted,
        (ConfirmKind::YesNo, ExecutionMode::Batch) => Decision::PolicyDenied {
            reason: "batch mode declines any prompt".to_string(),
        },
        (ConfirmKind::YesNo, ExecutionMode::DryRun) => unreachable!("handled above"),

        (ConfirmKind::TypedPhrase { phrase }, ExecutionMode::Interactive) => {
            let typed = interact.read_phrase(&format!("Type \"{phrase}\" to proceed"));
            if &typed == phrase {
                Decision::Accepted
            } else {
                Decision::Declined { reason: format!("expected the exact phrase {phrase:?}") }
            }
        }
        (ConfirmKind::TypedPhrase { phrase }, ExecutionMode::ForceYes) => {
            interact.note(&format!("[auto-type] {phrase}"));
            Decision::Accepted
        }
        (ConfirmKind::TypedPhrase { phrase }, ExecutionMode::AssumeYes) => Decision::PolicyDenied {
            reason: format!("typed-phrase confirmation ({phrase:?}) requires --force-yes"),
        },
        (ConfirmKind::TypedPhrase { .. }, ExecutionMode::Batch) => Decision::PolicyDenied {
            reason: "batch mode declines any prompt".to_string(),
        },
        (ConfirmKind::TypedPhrase { .. }, ExecutionMode::DryRun) => unreachable!("handled above"),

        (ConfirmKind::DoubleTypedPhrase { first, second }, ExecutionMode::Interactive) => {
            let typed_first = interact.read_phrase(&format!("Type \"{first}\" to proceed"));
            if &typed_first != first {
                return Decision::Declined { reason: format!("expected the exact phrase {first:?}") };
            }
            let typed_second = interact.read_phrase(&format!("Now type the branch name \"{second}\""));
            if &typed_second == second {
                Decision::Accepted
            } else {
                Decision::Declined { reason: format!("expected the exact phrase {second:?}") }
            }
        }
        (ConfirmKind::DoubleTypedPhrase { first, second }, ExecutionMode::ForceYes) => {
            interact.note(&format!("[auto-type] {first}"));
            interact.note(&format!("[auto-type] {second}"));
            Decision::Accepted
        }
        (ConfirmKind::DoubleTypedPhrase { .. }, ExecutionMode::AssumeYes | ExecutionMode::Batch) => {
            Decision::PolicyDenied { reason: "double typed-phrase confirmation requires --force-yes".to_string() }
        }
        (ConfirmKind::DoubleTypedPhrase { .. }, ExecutionMode::DryRun) => unreachable!("handled above"),

        (ConfirmKind::BranchNameEcho { branch }, ExecutionMode::Interactive) => {
            let typed = interact.read_phrase(&format!("Type the branch name \"{branch}\" to proceed"));
            if &typed == branch {
                Decision::Accepted
            } else {
                Decision::Declined { reason: format!("expected the exact branch name {branch:?}") }
            }
        }
        (ConfirmKind::BranchNameEcho { branch }, ExecutionMode::ForceYes) => {
            interact.note(&format!("[auto-type] {branch}"));
            Decision::Accepted
        }
        (ConfirmKind::BranchNameEcho { .. }, ExecutionMode::AssumeYes | ExecutionMode::Batch) => {
            Decision::PolicyDenied { reason: "branch-name confirmation requires --force-yes".to_string() }
        }
        (ConfirmKind::BranchNameEcho { .. }, ExecutionMode::DryRun) => unreachable!("handled above"),
    }
}
