//! Handlers: one fixed ten-step sequence, shared by
//! every dangerous category; the passthrough handler skips straight to the
//! VCS exec (steps 2-8 never run).

use std::path::Path;

use anyhow::Result;
use chrono::Utc;
use safegit_confirm::{Decision, Interact};
use safegit_probes::Vcs;
use safegit_types::{
    BackupRecord, Category, ContextRecord, ExecutionMode, Outcome, PreState, ProbeSnapshot,
    SafeGitError, UndoEntry, Verdict,
};
use uuid::Uuid;

pub const TOOL_TAG: &str = "safegit";

/// Run `argv` through the VCS, inheriting the wrapper's stdio so
/// interactive subcommands (e.g. an editor for `rebase -i`) still work.
fn exec_vcs(program: &str, repo: &Path, argv: &[String]) -> Result<i32> {
    let status = std::process::Command::new(program)
        .args(argv)
        .current_dir(repo)
        .status()
        .map_err(SafeGitError::from)?;
    Ok(status.code().unwrap_or(1))
}

/// Step 6 (backup) for the categories with `requires_backup=true`.
fn create_backup(
    category: Category,
    vcs: &Vcs,
    backup_dir: &Path,
    snapshot: &ProbeSnapshot,
) -> Result<BackupRecord> {
    match category {
        Category::ResetHard => safegit_backup::create_stash_backup(vcs, TOOL_TAG),
        Category::CleanForce => {
            safegit_backup::create_untracked_archive(vcs, backup_dir, &snapshot.untracked_files)
        }
        Category::StashDestroy => {
            let mut dump = String::new();
            for stash in &snapshot.stashes {
                dump.push_str(&format!("{}: {}\n", stash.reference, stash.message));
            }
            safegit_backup::create_text_dump(backup_dir, "stash", &dump)
        }
        other => safegit_backup::create_text_dump(
            backup_dir,
            "generic",
            &format!("pre-{} snapshot: head={:?}", other.tag(), snapshot.head_commit),
        ),
    }
}

fn recovery_script(category: Category, snapshot: &ProbeSnapshot) -> Vec<String> {
    match category {
        Category::ResetHard => vec!["git stash pop".to_string()],
        Category::Rebase => match &snapshot.head_commit {
            Some(head) => vec![format!("git reset --hard {head}")],
            None => vec!["git reflog — find the pre-rebase HEAD and reset to it".to_string()],
        },
        Category::StashDestroy => vec!["restore from the recorded stash text dump in this entry's backups".to_string()],
        Category::CleanForce => vec!["unzip the recorded archive backup into the working tree".to_string()],
        Category::PushForce | Category::PushDestructive => {
            vec!["use the remote's reflog or a collaborator's local copy to recover force-pushed commits".to_string()]
        }
        _ => vec!["no deterministic recovery path for this category; consult the journal entry's pre_state".to_string()],
    }
}

fn recovery_hint(category: Category, snapshot: &ProbeSnapshot) -> String {
    match category {
        Category::ResetHard => match &snapshot.reflog_tip {
            Some(tip) => format!("use `git reflog` to restore via {tip}, or `git stash pop` for the auto-backup"),
            None => "use `git stash pop` to restore the auto-backup".to_string(),
        },
        Category::Rebase => "use `git reflog` to find the pre-rebase HEAD and reset to it".to_string(),
        Category::StashDestroy => "the dropped stash contents were dumped to a text backup in this entry".to_string(),
        _ => "see `safegit undo-history` for this operation's pre-state and recovery commands".to_string(),
    }
}

/// Whether `category` has a mechanically-derivable recovery action that
/// `ForceYes` is allowed to run automatically on a later `undo`.
pub fn has_deterministic_recovery(category: Category) -> bool {
    safegit_journal::has_deterministic_recovery(category)
}

/// Full ten-step handler sequence for a classified (non-passthrough)
/// category, or the two-step passthrough shortcut. Returns the process
/// exit code on success; errors carry the [`SafeGitError`] the dispatcher
/// maps to an exit code.
#[allow(clippy::too_many_arguments)]
pub fn dispatch(
    argv: &[String],
    safe_dir: &Path,
    repo: &Path,
    vcs_program: &str,
    mode: ExecutionMode,
    context: &ContextRecord,
    interact: &mut dyn Interact,
) -> Result<i32> {
    let (category, _floor) = safegit_classifier::classify(argv);

    // Dispatcher-level interception log: every classified invocation,
    // passthrough included, via the non-blocking lock variant. Loss under
    // contention is tolerated, so failures here never abort dispatch.
    let _ = safegit_journal::append_intercepted(
        safe_dir,
        &safegit_journal::InterceptedLine {
            category,
            mode: mode.as_str().to_string(),
            timestamp: Utc::now(),
            argv_hash: safegit_journal::hash_argv(argv),
        },
    );

    // Passthrough skips steps 2-8 entirely.
    if category == Category::Passthrough {
        return exec_vcs(vcs_program, repo, argv);
    }

    // Step 1: context permission check.
    match safegit_context::is_permitted(argv, context) {
        Verdict::Allow => {}
        Verdict::Deny { reason } => {
            return Err(SafeGitError::PolicyDenied {
                category: category.tag().to_string(),
                reason,
                suggestion: "adjust the context with `set-mode`/`set-env`, or use a narrower argv".to_string(),
            }
            .into());
        }
        Verdict::NeedsElevation => {
            return Err(SafeGitError::PolicyDenied {
                category: category.tag().to_string(),
                reason: "maintenance mode requires elevation for write operations".to_string(),
                suggestion: "switch out of maintenance mode if you are authorized to do so".to_string(),
            }
            .into());
        }
    }

    // Step 2: probe snapshot.
    let vcs = Vcs::new(vcs_program, repo);
    let snapshot = vcs.snapshot(&context.restrictions)?;

    // Step 3: safety report.
    let force_yes = mode == ExecutionMode::ForceYes;
    let mut outcome = safegit_analyzers::analyze(category, argv, &snapshot, force_yes);
    safegit_analyzers::escalate_for_environment(&mut outcome.report, context.environment);

    // Step 4: emit warnings and alternatives.
    for warning in &outcome.report.warnings {
        interact.note(&format!("warning: {warning}"));
    }
    for alternative in &outcome.report.alternatives {
        interact.note(&format!("alternative: {alternative}"));
    }
    if let Some(note) = &outcome.adjustment_note {
        interact.note(note);
    }

    // A category blocked by default (e.g. filter-history without its
    // override flag) is denied outright, before dry-run rendering,
    // backup, or confirmation ever run.
    if let Some(reason) = outcome.report.blocked.clone() {
        return Err(SafeGitError::PolicyDenied {
            category: category.tag().to_string(),
            reason,
            suggestion: "pass the category's explicit override flag if you intend to proceed".to_string(),
        }
        .into());
    }

    // Step 5: dry-run short-circuit.
    if mode.is_dry_run() {
        interact.note(&format!(
            "[dry-run] would run: {vcs_program} {}",
            outcome.adjusted_argv.join(" ")
        ));
        return Ok(0);
    }

    // Confirmation is decided before backup: a denied operation must not
    // leave an orphan backup artifact on disk.
    let decision = safegit_confirm::decide(&outcome.report, mode, interact);
    match decision {
        Decision::Accepted => {}
        Decision::PolicyDenied { reason } => {
            return Err(SafeGitError::PolicyDenied {
                category: category.tag().to_string(),
                reason,
                suggestion: "rerun with --force-yes if you intend to proceed".to_string(),
            }
            .into());
        }
        Decision::Declined { reason } => {
            return Err(SafeGitError::UserAbort { reason, interrupted: false }.into());
        }
    }

    // Step 6: backup.
    let mut backups = Vec::new();
    if outcome.report.requires_backup {
        let backup_dir = safegit_backup::backup_dir(safe_dir);
        let record = create_backup(category, &vcs, &backup_dir, &snapshot)?;
        backups.push(record);
    }

    // Step 8: append undo entry before invoking the VCS.
    let adjusted_argv = if outcome.adjusted_argv.as_slice() == argv {
        None
    } else {
        Some(outcome.adjusted_argv.clone())
    };
    let entry = UndoEntry {
        id: Uuid::new_v4(),
        created_at: Utc::now(),
        category,
        argv: argv.to_vec(),
        adjusted_argv,
        cwd: repo.display().to_string(),
        mode: mode.as_str().to_string(),
        pre_state: PreState::from(&snapshot),
        backups,
        recovery: recovery_script(category, &snapshot),
        hint: recovery_hint(category, &snapshot),
        outcome: Outcome::Pending,
    };
    safegit_journal::append(safe_dir, &entry)?;

    // Step 9: invoke the VCS with the (possibly rewritten) argv. The entry
    // appended in step 8 already is the record for a successful run —
    // exactly one journal entry per successful destructive invocation —
    // so only on VCS failure do we add the follow-up entry that marks the
    // undo entry's outcome as failed.
    let exit_code = exec_vcs(vcs_program, repo, &outcome.adjusted_argv)?;
    if exit_code != 0 {
        let failed = entry.with_outcome(Outcome::Failed { vcs_exit_code: exit_code });
        safegit_journal::append(safe_dir, &failed)?;
        return Err(SafeGitError::VcsFailed { code: exit_code }.into());
    }

    // Step 10: recovery hint on success.
    interact.note(&entry.hint);
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use safegit_types::{ContextMode as Mode, Environment};
    use tempfile::tempdir;

    struct NoteCollector(Vec<String>);
    impl Interact for NoteCollector {
        fn confirm_yes_no(&mut self, _prompt: &str) -> bool {
            true
        }
        fn read_phrase(&mut self, _prompt: &str) -> String {
            String::new()
        }
        fn note(&mut self, msg: &str) {
            self.0.push(msg.to_string());
        }
    }

    fn init_repo(dir: &Path) {
        let run = |args: &[&str]| {
            std::process::Command::new("git")
                .args(args)
                .current_dir(dir)
                .output()
                .unwrap()
        };
        run(&["init", "-q"]);
        run(&["config", "user.email", "test@example.com"]);
        run(&["config", "user.name", "test"]);
        std::fs::write(dir.join("file.txt"), "a\n").unwrap();
        run(&["add", "."]);
        run(&["commit", "-q", "-m", "initial"]);
    }

    fn default_context() -> ContextRecord {
        ContextRecord {
            environment: Environment::Development,
            mode: Mode::Normal,
            restrictions: Default::default(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn passthrough_skips_straight_to_exec() {
        let repo = tempdir().unwrap();
        init_repo(repo.path());
        let safe_dir = repo.path().join(".safe");
        let mut interact = NoteCollector(Vec::new());
        let code = dispatch(
            &["status".to_string()],
            &safe_dir,
            repo.path(),
            "git",
            ExecutionMode::Interactive,
            &default_context(),
            &mut interact,
        )
        .unwrap();
        assert_eq!(code, 0);
        assert!(!safe_dir.join("journal.log").exists());
    }

    #[test]
    fn dry_run_on_a_destructive_category_never_appends_a_journal_entry() {
        let repo = tempdir().unwrap();
        init_repo(repo.path());
        let safe_dir = repo.path().join(".safe");
        let mut interact = NoteCollector(Vec::new());
        let code = dispatch(
            &["reset".to_string(), "--hard".to_string()],
            &safe_dir,
            repo.path(),
            "git",
            ExecutionMode::DryRun,
            &default_context(),
            &mut interact,
        )
        .unwrap();
        assert_eq!(code, 0);
        assert!(!safe_dir.join("journal.log").exists());
        assert!(interact.0.iter().any(|m| m.starts_with("[dry-run]")));
    }

    #[test]
    fn force_yes_reset_hard_appends_exactly_one_journal_entry() {
        // For every successful destructive invocation, exactly one
        // journal entry is appended.
        let repo = tempdir().unwrap();
        init_repo(repo.path());
        let safe_dir = repo.path().join(".safe");
        let mut interact = NoteCollector(Vec::new());
        let code = dispatch(
            &["reset".to_string(), "--hard".to_string()],
            &safe_dir,
            repo.path(),
            "git",
            ExecutionMode::ForceYes,
            &default_context(),
            &mut interact,
        )
        .unwrap();
        assert_eq!(code, 0);
        let entries = safegit_journal::read_all(&safe_dir).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].outcome, Outcome::Pending);
        assert_eq!(entries[0].category, Category::ResetHard);
    }

    #[test]
    fn vcs_failure_appends_a_follow_up_entry_marking_failure() {
        let repo = tempdir().unwrap();
        init_repo(repo.path());
        let safe_dir = repo.path().join(".safe");
        let mut interact = NoteCollector(Vec::new());
        // `reset --hard` against a non-existent revision: git exits nonzero.
        let result = dispatch(
            &["reset".to_string(), "--hard".to_string(), "deadbeefdeadbeefdeadbeefdeadbeefdeadbeef".to_string()],
            &safe_dir,
            repo.path(),
            "git",
            ExecutionMode::ForceYes,
            &default_context(),
            &mut interact,
        );
        assert!(result.is_err());
        let entries = safegit_journal::read_all(&safe_dir).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].outcome, Outcome::Pending);
        assert!(matches!(entries[1].outcome, Outcome::Failed { .. }));
    }

    #[test]
    fn denied_by_context_appends_no_journal_entry() {
        let repo = tempdir().unwrap();
        init_repo(repo.path());
        let safe_dir = repo.path().join(".safe");
        let mut ctx = default_context();
        ctx.environment = Environment::Production;
        let mut interact = NoteCollector(Vec::new());
        let result = dispatch(
            &["reset".to_string(), "--hard".to_string()],
            &safe_dir,
            repo.path(),
            "git",
            ExecutionMode::ForceYes,
            &ctx,
            &mut interact,
        );
        assert!(result.is_err());
        assert!(!safe_dir.join("journal.log").exists());
    }
}
