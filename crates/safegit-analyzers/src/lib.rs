//! Per-category safety analyzers: given a category, the
//! original argv, and a [`ProbeSnapshot`], compute a [`SafetyReport`] and,
//! where the category calls for it, an adjusted argv safer than the one the
//! caller supplied.

use safegit_types::{
    Category, ConfirmKind, Environment, Impact, ProbeSnapshot, Risk, SafetyReport,
    UntrackedKind,
};

/// Glob patterns (suffix `*` only) flagging especially sensitive untracked
/// files for `clean_force`. Configurable defaults, not
/// hardcoded policy — a future config layer may extend this list.
pub const DEFAULT_PROTECTED_FILE_PATTERNS: &[&str] =
    &["*.key", "*.env", "config.local", "*.pem"];

/// Outcome of running an analyzer: the human-facing report, plus the argv
/// the handler should actually hand to the VCS (equal to the input argv
/// unless the analyzer performed a safer-flag substitution).
#[derive(Debug, Clone)]
pub struct AnalyzerOutcome {
    pub report: SafetyReport,
    pub adjusted_argv: Vec<String>,
    /// Human-readable note about any argv adjustment, recorded in the undo
    /// entry's hint.
    pub adjustment_note: Option<String>,
}

fn base_report(risk: Risk) -> SafetyReport {
    SafetyReport {
        risk,
        impact: Impact::default(),
        warnings: Vec::new(),
        alternatives: Vec::new(),
        requires_backup: false,
        confirmation: ConfirmKind::None,
        blocked: None,
    }
}

fn matches_protected_pattern(path: &str, patterns: &[&str]) -> bool {
    let name = path.rsplit('/').next().unwrap_or(path);
    patterns.iter().any(|pattern| match pattern.strip_prefix('*') {
        Some(suffix) => name.ends_with(suffix),
        None => name == *pattern,
    })
}

fn reset_hard(snapshot: &ProbeSnapshot) -> AnalyzerOutcome {
    let dirty = snapshot.dirty_files.is_empty();
    let mut report = base_report(if dirty { Risk::Medium } else { Risk::High });
    report.impact.files = snapshot.dirty_files.len() as u64;
    report.impact.lines = snapshot.dirty_line_count();
    report.requires_backup = true;
    report.confirmation = if dirty {
        ConfirmKind::YesNo
    } else {
        ConfirmKind::TypedPhrase { phrase: "PROCEED".to_string() }
    };
    if !dirty {
        report.push_warning(format!(
            "{} uncommitted file(s) with {} changed line(s) will be discarded",
            report.impact.files, report.impact.lines
        ));
        report.push_alternative("git stash push --include-untracked".to_string());
    }
    AnalyzerOutcome {
        report,
        adjusted_argv: Vec::new(),
        adjustment_note: None,
    }
}

fn clean_force(snapshot: &ProbeSnapshot, patterns: &[&str]) -> AnalyzerOutcome {
    let mut report = base_report(Risk::High);
    report.impact.files = snapshot.untracked_files.len() as u64;
    report.impact.bytes = snapshot.untracked_byte_count();
    report.requires_backup = true;

    let mut by_kind: std::collections::BTreeMap<&'static str, u64> = std::collections::BTreeMap::new();
    let mut protected_hits = Vec::new();
    for file in &snapshot.untracked_files {
        let label = match file.kind {
            UntrackedKind::Source => "source",
            UntrackedKind::Config => "config",
            UntrackedKind::BuildArtifact => "build_artifact",
            UntrackedKind::Log => "log",
            UntrackedKind::Other => "other",
        };
        *by_kind.entry(label).or_insert(0) += 1;
        if matches_protected_pattern(&file.path, patterns) {
            protected_hits.push(file.path.clone());
        }
    }
    for (label, count) in &by_kind {
        report.push_warning(format!("{count} untracked {label} file(s)"));
    }

    if protected_hits.is_empty() {
        report.confirmation = ConfirmKind::TypedPhrase { phrase: "DELETE".to_string() };
    } else {
        report.risk = Risk::Critical;
        report.push_warning(format!(
            "sensitive untracked file(s) would be deleted: {}",
            protected_hits.join(", ")
        ));
        // TypedPhrase("DELETE") plus a branch-name or explicit-file echo:
        // the branch name when one is known, else the first protected file.
        let echo = snapshot
            .current_branch
            .clone()
            .unwrap_or_else(|| protected_hits[0].clone());
        report.confirmation = ConfirmKind::DoubleTypedPhrase {
            first: "DELETE".to_string(),
            second: echo,
        };
    }

    AnalyzerOutcome {
        report,
        adjusted_argv: Vec::new(),
        adjustment_note: None,
    }
}

fn push_force(argv: &[String], snapshot: &ProbeSnapshot) -> AnalyzerOutcome {
    let mut report = base_report(Risk::High);
    if let safegit_types::UpstreamDivergence::Tracking { behind, .. } = snapshot.upstream {
        report.impact.commits = behind;
    }
    report.requires_backup = false;

    if snapshot.protected_branch {
        report.risk = Risk::Critical;
        let branch = snapshot.current_branch.clone().unwrap_or_default();
        report.push_warning(format!("{branch} is a protected branch"));
        report.confirmation = ConfirmKind::DoubleTypedPhrase {
            first: "I understand the protection risks".to_string(),
            second: branch,
        };
    } else {
        report.confirmation = ConfirmKind::YesNo;
    }

    let already_leased = argv
        .iter()
        .any(|t| t == "--force-with-lease" || t.starts_with("--force-with-lease="));
    let mut adjusted = argv.to_vec();
    let mut note = None;
    if !already_leased {
        for token in adjusted.iter_mut() {
            if token == "--force" || token == "-f" {
                *token = "--force-with-lease".to_string();
            }
        }
        note = Some("rewrote --force to --force-with-lease".to_string());
        report.push_alternative("--force-with-lease".to_string());
    }

    AnalyzerOutcome {
        report,
        adjusted_argv: adjusted,
        adjustment_note: note,
    }
}

fn push_destructive(argv: &[String]) -> AnalyzerOutcome {
    let mut report = base_report(Risk::Critical);
    let phrase = if argv.iter().any(|t| t == "--mirror") {
        "MIRROR PUSH"
    } else {
        "DELETE REMOTE"
    };
    report.confirmation = ConfirmKind::TypedPhrase { phrase: phrase.to_string() };
    report.push_warning("remote refs will be overwritten or removed with no local trace".to_string());
    AnalyzerOutcome {
        report,
        adjusted_argv: Vec::new(),
        adjustment_note: None,
    }
}

fn commit_amend(snapshot: &ProbeSnapshot) -> AnalyzerOutcome {
    let safe = match snapshot.upstream {
        safegit_types::UpstreamDivergence::None => true,
        safegit_types::UpstreamDivergence::Tracking { behind, .. } => behind == 0,
    };
    let mut report = base_report(if safe { Risk::Low } else { Risk::Medium });
    report.confirmation = if safe { ConfirmKind::None } else { ConfirmKind::YesNo };
    if !safe {
        report.push_warning("amending a commit already pushed to upstream rewrites shared history".to_string());
    }
    AnalyzerOutcome {
        report,
        adjusted_argv: Vec::new(),
        adjustment_note: None,
    }
}

fn reflog_expire() -> AnalyzerOutcome {
    let mut report = base_report(Risk::Critical);
    report.confirmation = ConfirmKind::TypedPhrase { phrase: "EXPIRE REFLOG".to_string() };
    report.push_warning("unreachable commits past the expiry window become unrecoverable".to_string());
    AnalyzerOutcome { report, adjusted_argv: Vec::new(), adjustment_note: None }
}

fn update_ref_delete() -> AnalyzerOutcome {
    let mut report = base_report(Risk::Critical);
    report.confirmation = ConfirmKind::TypedPhrase { phrase: "DELETE REFERENCE".to_string() };
    AnalyzerOutcome { report, adjusted_argv: Vec::new(), adjustment_note: None }
}

/// Flags that opt a filter-history invocation out of the default block.
const FILTER_HISTORY_OVERRIDE_FLAGS: &[&str] = &["--i-know-what-i-am-doing", "--force"];

fn filter_history(argv: &[String]) -> AnalyzerOutcome {
    let mut report = base_report(Risk::Critical);
    let overridden = argv.iter().any(|t| FILTER_HISTORY_OVERRIDE_FLAGS.contains(&t.as_str()));
    if overridden {
        report.confirmation = ConfirmKind::TypedPhrase { phrase: "REWRITE ALL HISTORY".to_string() };
    } else {
        report.push_warning("filter operations are blocked by default; pass an explicit override flag".to_string());
        report.blocked = Some(format!(
            "filter-history is blocked by default; pass one of {FILTER_HISTORY_OVERRIDE_FLAGS:?} to override"
        ));
    }
    AnalyzerOutcome { report, adjusted_argv: Vec::new(), adjustment_note: None }
}

fn stash_destroy(snapshot: &ProbeSnapshot) -> AnalyzerOutcome {
    let mut report = base_report(Risk::High);
    report.impact.files = snapshot.stash_count() as u64;
    report.requires_backup = true;
    report.confirmation = ConfirmKind::TypedPhrase { phrase: "CLEAR STASH".to_string() };
    if snapshot.stash_count() > 0 {
        report.push_warning(format!("{} stash(es) will be permanently discarded", snapshot.stash_count()));
    }
    AnalyzerOutcome { report, adjusted_argv: Vec::new(), adjustment_note: None }
}

fn gc_prune(argv: &[String], force_yes: bool) -> AnalyzerOutcome {
    let mut report = base_report(Risk::High);
    let mut adjusted = argv.to_vec();
    let mut note = None;
    if !force_yes {
        for token in adjusted.iter_mut() {
            if token == "--prune=now" {
                *token = "--prune=1.hour.ago".to_string();
                note = Some("rewrote --prune=now to --prune=1.hour.ago".to_string());
            }
        }
    }
    report.confirmation = ConfirmKind::YesNo;
    AnalyzerOutcome { report, adjusted_argv: adjusted, adjustment_note: note }
}

fn generic(category: Category) -> AnalyzerOutcome {
    let risk = category.default_risk();
    let mut report = base_report(risk);
    report.confirmation = if risk >= Risk::High {
        ConfirmKind::TypedPhrase { phrase: "CONFIRM".to_string() }
    } else {
        ConfirmKind::YesNo
    };
    AnalyzerOutcome { report, adjusted_argv: Vec::new(), adjustment_note: None }
}

/// Run the analyzer for `category`. `force_yes` affects only `gc_prune`'s
/// `--prune=now` rewrite.
pub fn analyze(
    category: Category,
    argv: &[String],
    snapshot: &ProbeSnapshot,
    force_yes: bool,
) -> AnalyzerOutcome {
    let mut outcome = match category {
        Category::ResetHard => reset_hard(snapshot),
        Category::CleanForce => clean_force(snapshot, DEFAULT_PROTECTED_FILE_PATTERNS),
        Category::PushForce => push_force(argv, snapshot),
        Category::PushDestructive => push_destructive(argv),
        Category::CommitAmend => commit_amend(snapshot),
        Category::ReflogExpire => reflog_expire(),
        Category::UpdateRefDelete => update_ref_delete(),
        Category::FilterHistory => filter_history(argv),
        Category::StashDestroy => stash_destroy(snapshot),
        Category::GcPrune => gc_prune(argv, force_yes),
        other => generic(other),
    };
    if outcome.adjusted_argv.is_empty() {
        outcome.adjusted_argv = argv.to_vec();
    }
    outcome
}

/// Apply the production/High->Critical escalation: in environment=production
/// any High-risk report escalates to Critical. Mode-driven denial
/// (`code_freeze`) is `safegit-context`'s responsibility, not the
/// analyzer's — risk is monotonic, never re-lowered here.
pub fn escalate_for_environment(report: &mut SafetyReport, environment: Environment) {
    if environment == Environment::Production && report.risk == Risk::High {
        report.risk = Risk::Critical;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use safegit_types::{DirtyFile, StashEntry, UntrackedFile, UpstreamDivergence};

    fn empty_snapshot() -> ProbeSnapshot {
        ProbeSnapshot {
            head_commit: Some("abc".into()),
            current_branch: Some("feature".into()),
            dirty_files: Vec::new(),
            untracked_files: Vec::new(),
            stashes: Vec::new(),
            upstream: UpstreamDivergence::None,
            reflog_tip: None,
            protected_branch: false,
        }
    }

    fn argv(words: &[&str]) -> Vec<String> {
        words.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn reset_hard_is_medium_when_clean_and_high_when_dirty() {
        let clean = analyze(Category::ResetHard, &argv(&["reset", "--hard"]), &empty_snapshot(), false);
        assert_eq!(clean.report.risk, Risk::Medium);

        let mut dirty_snapshot = empty_snapshot();
        dirty_snapshot.dirty_files.push(DirtyFile {
            path: "a.rs".into(),
            added_lines: 3,
            removed_lines: 1,
        });
        let dirty = analyze(Category::ResetHard, &argv(&["reset", "--hard"]), &dirty_snapshot, false);
        assert_eq!(dirty.report.risk, Risk::High);
        assert!(dirty.report.requires_backup);
        assert_eq!(
            dirty.report.confirmation,
            ConfirmKind::TypedPhrase { phrase: "PROCEED".to_string() }
        );
    }

    #[test]
    fn clean_force_escalates_to_critical_on_protected_file() {
        let mut snapshot = empty_snapshot();
        snapshot.untracked_files.push(UntrackedFile {
            path: "secrets.key".into(),
            size_bytes: 10,
            kind: UntrackedKind::Other,
        });
        let outcome = analyze(Category::CleanForce, &argv(&["clean", "-fdx"]), &snapshot, false);
        assert_eq!(outcome.report.risk, Risk::Critical);
        match outcome.report.confirmation {
            ConfirmKind::DoubleTypedPhrase { first, .. } => assert_eq!(first, "DELETE"),
            other => panic!("expected DoubleTypedPhrase, got {other:?}"),
        }
    }

    #[test]
    fn push_force_rewrites_to_force_with_lease_unless_already_specified() {
        let outcome = analyze(Category::PushForce, &argv(&["push", "--force", "origin", "main"]), &empty_snapshot(), false);
        assert!(outcome.adjusted_argv.contains(&"--force-with-lease".to_string()));
        assert!(outcome.adjustment_note.is_some());

        let already = analyze(
            Category::PushForce,
            &argv(&["push", "--force-with-lease", "origin", "main"]),
            &empty_snapshot(),
            false,
        );
        assert_eq!(already.adjusted_argv, argv(&["push", "--force-with-lease", "origin", "main"]));
        assert!(already.adjustment_note.is_none());
    }

    #[test]
    fn push_force_against_protected_branch_is_critical_with_double_phrase() {
        let mut snapshot = empty_snapshot();
        snapshot.protected_branch = true;
        snapshot.current_branch = Some("main".to_string());
        let outcome = analyze(Category::PushForce, &argv(&["push", "--force", "origin", "main"]), &snapshot, false);
        assert_eq!(outcome.report.risk, Risk::Critical);
        assert_eq!(
            outcome.report.confirmation,
            ConfirmKind::DoubleTypedPhrase {
                first: "I understand the protection risks".to_string(),
                second: "main".to_string(),
            }
        );
    }

    #[test]
    fn commit_amend_is_low_risk_without_pushed_upstream() {
        let outcome = analyze(Category::CommitAmend, &argv(&["commit", "--amend"]), &empty_snapshot(), false);
        assert_eq!(outcome.report.risk, Risk::Low);
        assert_eq!(outcome.report.confirmation, ConfirmKind::None);
    }

    #[test]
    fn commit_amend_is_medium_when_already_pushed() {
        let mut snapshot = empty_snapshot();
        snapshot.upstream = UpstreamDivergence::Tracking { ahead: 0, behind: 1 };
        let outcome = analyze(Category::CommitAmend, &argv(&["commit", "--amend"]), &snapshot, false);
        assert_eq!(outcome.report.risk, Risk::Medium);
        assert_eq!(outcome.report.confirmation, ConfirmKind::YesNo);
    }

    #[test]
    fn gc_prune_now_is_rewritten_unless_force_yes() {
        let outcome = analyze(Category::GcPrune, &argv(&["gc", "--prune=now"]), &empty_snapshot(), false);
        assert!(outcome.adjusted_argv.contains(&"--prune=1.hour.ago".to_string()));

        let forced = analyze(Category::GcPrune, &argv(&["gc", "--prune=now"]), &empty_snapshot(), true);
        assert!(forced.adjusted_argv.contains(&"--prune=now".to_string()));
    }

    #[test]
    fn stash_destroy_requires_backup_and_typed_phrase() {
        let mut snapshot = empty_snapshot();
        snapshot.stashes.push(StashEntry { reference: "stash@{0}".into(), message: "wip".into() });
        let outcome = analyze(Category::StashDestroy, &argv(&["stash", "clear"]), &snapshot, false);
        assert!(outcome.report.requires_backup);
        assert_eq!(
            outcome.report.confirmation,
            ConfirmKind::TypedPhrase { phrase: "CLEAR STASH".to_string() }
        );
    }

    #[test]
    fn filter_history_is_blocked_without_an_override_flag() {
        let outcome = analyze(
            Category::FilterHistory,
            &argv(&["filter-branch", "--tree-filter", "x"]),
            &empty_snapshot(),
            false,
        );
        assert!(outcome.report.blocked.is_some());
    }

    #[test]
    fn filter_history_proceeds_with_an_override_flag() {
        let outcome = analyze(
            Category::FilterHistory,
            &argv(&["filter-branch", "--force", "--tree-filter", "x"]),
            &empty_snapshot(),
            false,
        );
        assert!(outcome.report.blocked.is_none());
        assert_eq!(
            outcome.report.confirmation,
            ConfirmKind::TypedPhrase { phrase: "REWRITE ALL HISTORY".to_string() }
        );
    }

    #[test]
    fn escalation_raises_high_to_critical_only_in_production() {
        let mut report = base_report(Risk::High);
        escalate_for_environment(&mut report, Environment::Production);
        assert_eq!(report.risk, Risk::Critical);

        let mut dev_report = base_report(Risk::High);
        escalate_for_environment(&mut dev_report, Environment::Development);
        assert_eq!(dev_report.risk, Risk::High);

        let mut medium_report = base_report(Risk::Medium);
        escalate_for_environment(&mut medium_report, Environment::Production);
        assert_eq!(medium_report.risk, Risk::Medium);
    }

    #[test]
    fn generic_categories_floor_at_their_default_risk() {
        let outcome = analyze(Category::BranchDelete, &argv(&["branch", "-D", "x"]), &empty_snapshot(), false);
        assert_eq!(outcome.report.risk, Category::BranchDelete.default_risk());
    }
}
