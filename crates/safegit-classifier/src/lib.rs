//! Dangerous-argv pattern catalog and classifier.
//!
//! The catalog is compiled once, lazily, at process start and never mutated
//! afterward. Patterns are anchored at the subcommand and iterated in
//! published order; the first match wins; no match classifies as
//! [`Category::Passthrough`] with [`Risk::Low`].
//!
//! ## Resolving the lookaround requirement
//!
//! Rust's `regex` crate deliberately does not support lookaround (no
//! backtracking engine, for predictable linear-time matching). Dangerous-flag
//! exclusion is naturally expressed in lookaround terms
//! (`--force(?!-with-lease)`); here each [`PatternEntry`] instead carries an
//! optional `excludes` regex. A candidate is dangerous only if `matches`
//! matches *and* `excludes` does not. Because regex word boundaries (`\b`)
//! already fire inside compound tokens like `--force-with-lease` (the
//! boundary between the word character `e` and the following `-` counts),
//! the same substrings that make the *dangerous* pattern match also make
//! the *safer-sibling* exclusion pattern match, so the two-step check
//! reproduces the negative-lookahead semantics exactly without requiring
//! lookaround support. This is recorded as a resolved Open Question in
//! DESIGN.md rather than re-derived at every call site.

use std::sync::LazyLock;

use regex::Regex;
use safegit_types::{Category, Risk};

struct PatternEntry {
    name: &'static str,
    category: Category,
    matches: Regex,
    excludes: Option<Regex>,
}

fn re(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid pattern catalog regex {pattern:?}: {e}"))
}

fn entry(name: &'static str, category: Category, matches: &str) -> PatternEntry {
    PatternEntry {
        name,
        category,
        matches: re(matches),
        excludes: None,
    }
}

fn entry_excluding(
    name: &'static str,
    category: Category,
    matches: &str,
    excludes: &str,
) -> PatternEntry {
    PatternEntry {
        name,
        category,
        matches: re(matches),
        excludes: Some(re(excludes)),
    }
}

/// Published pattern order. More specific patterns (`push --mirror`) must
/// precede more general ones for the same subcommand (`push --force`), since
/// the catalog is scanned in order and the first match wins.
static CATALOG: LazyLock<Vec<PatternEntry>> = LazyLock::new(|| {
    vec![
        entry(
            "push-destructive",
            Category::PushDestructive,
            r"^push\b.*(--mirror\b|--delete\b|-d\b)",
        ),
        entry_excluding(
            "push-force",
            Category::PushForce,
            r"^push\b.*(--force\b|-f\b)",
            r"--force-with-lease\b|--force-if-includes\b",
        ),
        entry("reset-hard", Category::ResetHard, r"^reset\b.*--hard\b"),
        entry(
            "clean-force",
            Category::CleanForce,
            r"^clean\b.*(-[a-z]*f[a-z]*\b|--force\b)",
        ),
        entry(
            "checkout-force",
            Category::CheckoutForce,
            r"^checkout\b.*(-f\b|--force\b)",
        ),
        entry_excluding(
            "switch-discard",
            Category::SwitchDiscard,
            r"^switch\b.*(-f\b|-C\b|--force\b|--discard-changes\b)",
            r"--force-with-lease\b",
        ),
        entry(
            "branch-delete",
            Category::BranchDelete,
            r"^branch\b.*(-d\b|-D\b|--delete\b)",
        ),
        entry(
            "stash-destroy",
            Category::StashDestroy,
            r"^stash\s+(clear|drop)\b",
        ),
        entry_excluding(
            "gc-prune",
            Category::GcPrune,
            r"^gc\b.*--prune\b",
            r"--prune=\d",
        ),
        entry(
            "reflog-expire",
            Category::ReflogExpire,
            r"^reflog\b.*\bexpire\b",
        ),
        entry(
            "update-ref-delete",
            Category::UpdateRefDelete,
            r"^update-ref\b.*-d\b",
        ),
        entry(
            "filter-history",
            Category::FilterHistory,
            r"^filter-(branch|repo)\b",
        ),
        entry(
            "commit-amend",
            Category::CommitAmend,
            r"^commit\b.*--amend\b",
        ),
        entry_excluding(
            "rebase",
            Category::Rebase,
            r"^rebase\b",
            r"--abort\b|--continue\b|--skip\b|--quit\b",
        ),
        entry(
            "worktree-remove",
            Category::WorktreeRemove,
            r"^worktree\b.*\bremove\b",
        ),
        entry(
            "merge-ours",
            Category::MergeOurs,
            r"^merge\b.*(-s\s*ours\b|--strategy[=\s]ours\b|-X\s*ours\b)",
        ),
        entry(
            "tag-delete",
            Category::TagDelete,
            r"^tag\b.*(-d\b|--delete\b)",
        ),
        entry(
            "notes-remove",
            Category::NotesRemove,
            r"^notes\b.*(remove|prune)\b",
        ),
        entry(
            "replace-delete",
            Category::ReplaceDelete,
            r"^replace\b.*(-d\b|--delete\b)",
        ),
        entry(
            "remote-remove",
            Category::RemoteRemove,
            r"^remote\b.*(remove|rm)\b",
        ),
        entry(
            "submodule-deinit",
            Category::SubmoduleDeinit,
            r"^submodule\b.*\bdeinit\b",
        ),
        entry(
            "sparse-checkout-change",
            Category::SparseCheckoutChange,
            r"^sparse-checkout\b.*(set|disable|reapply)\b",
        ),
    ]
});

/// Join argv with single spaces. The classifier never mutates the caller's
/// argv; this produces a fresh `String` purely for matching.
fn normalize(argv: &[String]) -> String {
    argv.join(" ")
}

/// Classify an argument vector against the pattern catalog, returning the
/// first matching category's tag alongside its floor risk, or
/// [`Category::Passthrough`] at [`Risk::Low`] if nothing matches.
pub fn classify(argv: &[String]) -> (Category, Risk) {
    let joined = normalize(argv);
    for pattern in CATALOG.iter() {
        if !pattern.matches.is_match(&joined) {
            continue;
        }
        if let Some(excludes) = &pattern.excludes
            && excludes.is_match(&joined)
        {
            continue;
        }
        return (pattern.category, pattern.category.default_risk());
    }
    (Category::Passthrough, Risk::Low)
}

/// The name of the first pattern that matched, if any — used in tests and
/// diagnostics to explain *why* an argv classified the way it did.
pub fn explain(argv: &[String]) -> Option<&'static str> {
    let joined = normalize(argv);
    CATALOG.iter().find_map(|pattern| {
        if !pattern.matches.is_match(&joined) {
            return None;
        }
        if let Some(excludes) = &pattern.excludes
            && excludes.is_match(&joined)
        {
            return None;
        }
        Some(pattern.name)
    })
}

fn argv(words: &[&str]) -> Vec<String> {
    words.iter().map(|s| s.to_string()).collect()
}
