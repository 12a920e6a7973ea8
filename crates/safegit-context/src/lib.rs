//! Persisted environment/mode/restriction store and the permission check
//! gating which argument vectors the dispatcher may forward to the VCS.
//!
//! `ContextRecord` is the one piece of state that outlives a single
//! invocation by design. Every mutator here follows the same shape: load,
//! mutate in memory, write back atomically under the shared lock file —
//! never a partial update.

use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use safegit_types::{ContextRecord, Environment, Mode, Verdict};

pub const CONTEXT_FILE: &str = "context.json";

pub fn context_path(safe_dir: &Path) -> PathBuf {
    safe_dir.join(CONTEXT_FILE)
}

/// Read the context record, defaulting to `{development, normal, {}}` if the
/// file does not exist yet.
pub fn load(safe_dir: &Path) -> Result<ContextRecord> {
    let path = context_path(safe_dir);
    if !path.exists() {
        return Ok(ContextRecord::default());
    }
    let _lock = safegit_lock::with_exclusive_lock(&path)
        .with_context(|| format!("failed to lock {}", path.display()))?;
    let bytes =
        std::fs::read(&path).with_context(|| format!("failed to read {}", path.display()))?;
    let record: ContextRecord = serde_json::from_slice(&bytes)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(record)
}

fn save(safe_dir: &Path, record: &ContextRecord) -> Result<()> {
    std::fs::create_dir_all(safe_dir)
        .with_context(|| format!("failed to create {}", safe_dir.display()))?;
    let path = context_path(safe_dir);
    let _lock = safegit_lock::with_exclusive_lock(&path)
        .with_context(|| format!("failed to lock {}", path.display()))?;
    let bytes = serde_json::to_vec_pretty(record).context("failed to serialize context record")?;
    safegit_lock::atomic_write(&path, &bytes)
}

pub fn set_environment(safe_dir: &Path, environment: Environment) -> Result<ContextRecord> {
    let mut record = load(safe_dir)?;
    record.environment = environment;
    record.updated_at = chrono::Utc::now();
    save(safe_dir, &record)?;
    Ok(record)
}

pub fn set_mode(safe_dir: &Path, mode: Mode) -> Result<ContextRecord> {
    let mut record = load(safe_dir)?;
    record.mode = mode;
    record.updated_at = chrono::Utc::now();
    save(safe_dir, &record)?;
    Ok(record)
}

pub fn add_restriction(safe_dir: &Path, substring: &str) -> Result<ContextRecord> {
    let mut record = load(safe_dir)?;
    record.restrictions.insert(substring.to_string());
    record.updated_at = chrono::Utc::now();
    save(safe_dir, &record)?;
    Ok(record)
}

pub fn remove_restriction(safe_dir: &Path, substring: &str) -> Result<ContextRecord> {
    let mut record = load(safe_dir)?;
    record.restrictions.remove(substring);
    record.updated_at = chrono::Utc::now();
    save(safe_dir, &record)?;
    Ok(record)
}

/// Base subcommands reachable in `paranoid` mode.
const PARANOID_ALLOWED_SUBCOMMANDS: &[&str] = &[
    "status", "log", "diff", "fetch", "show", "ls-files", "branch", "tag", "remote",
];

/// For `branch`, `tag`, `remote` under paranoid mode, only these read-only
/// flags may accompany the subcommand.
const PARANOID_READONLY_FLAGS: &[&str] = &["--list", "-l", "--show", "-v", "--verbose"];

/// `remote` verbs that only read state; anything else (`add`, `remove`,
/// `rename`, `set-url`, ...) is a write and fails paranoid mode.
const PARANOID_REMOTE_READONLY_VERBS: &[&str] = &["show", "get-url"];

fn is_hotfix(argv: &[String]) -> bool {
    argv.iter().any(|t| t.eq_ignore_ascii_case("hotfix") || t.to_ascii_lowercase().contains("hotfix"))
}

/// `branch`/`tag` are read-only in paranoid mode only when every token past
/// the subcommand is either a known read-only flag or a pattern argument
/// immediately following `--list`/`-l` (e.g. `branch --list 'feature/*'`).
/// A bare positional token (`branch newbranch`, `tag v1`) names something to
/// create or delete and is rejected even though it carries no flag at all.
fn branch_or_tag_is_read_only(rest: &[String]) -> bool {
    let mut saw_list_flag = false;
    for token in rest {
        if token.starts_with('-') {
            if !PARANOID_READONLY_FLAGS.contains(&token.as_str()) {
                return false;
            }
            if token == "--list" || token == "-l" {
                saw_list_flag = true;
            }
        } else if !saw_list_flag {
            return false;
        }
    }
    true
}

/// `remote` is read-only in paranoid mode when it carries no verb (bare
/// `remote`, or flag-only `remote -v`) or when its first positional token is
/// one of the read-only verbs. Any other verb (`add`, `remove`, `rename`,
/// `set-url`, ...) is a write.
fn remote_is_read_only(rest: &[String]) -> bool {
    match rest.iter().find(|t| !t.starts_with('-')) {
        None => rest.iter().all(|t| PARANOID_READONLY_FLAGS.contains(&t.as_str())),
        Some(verb) => PARANOID_REMOTE_READONLY_VERBS.contains(&verb.as_str()),
    }
}

fn passes_paranoid_allowlist(argv: &[String]) -> bool {
    let Some(subcommand) = argv.first() else {
        return false;
    };
    if !PARANOID_ALLOWED_SUBCOMMANDS.contains(&subcommand.as_str()) {
        return false;
    }
    let rest = &argv[1..];
    match subcommand.as_str() {
        "branch" | "tag" => branch_or_tag_is_read_only(rest),
        "remote" => remote_is_read_only(rest),
        _ => true,
    }
}

/// Matches against `context.restrictions`: a literal substring match over
/// the space-joined argv: a set of literal substrings that block any
/// matching argv.
fn matches_restriction(argv: &[String], record: &ContextRecord) -> Option<String> {
    let joined = argv.join(" ");
    record
        .restrictions
        .iter()
        .find(|needle| joined.contains(needle.as_str()))
        .cloned()
}

/// Enforce the environment/mode rule matrix and custom restrictions.
/// Classifies `argv` internally via `safegit-classifier` so callers need
/// not pre-classify.
pub fn is_permitted(argv: &[String], record: &ContextRecord) -> Verdict {
    if let Some(hit) = matches_restriction(argv, record) {
        return Verdict::Deny {
            reason: format!("matches restricted substring {hit:?}"),
        };
    }

    let (category, _risk) = safegit_classifier::classify(argv);

    match record.mode {
        Mode::Paranoid => {
            if passes_paranoid_allowlist(argv) {
                Verdict::Allow
            } else {
                Verdict::Deny {
                    reason: "paranoid mode: argv is outside the read-only allowlist".to_string(),
                }
            }
        }
        Mode::CodeFreeze => {
            if category.is_write() && !is_hotfix(argv) {
                Verdict::Deny {
                    reason: "code_freeze: write operations require \"hotfix\" in the argv"
                        .to_string(),
                }
            } else {
                Verdict::Allow
            }
        }
        Mode::Maintenance => {
            if category.is_write() {
                Verdict::NeedsElevation
            } else {
                Verdict::Allow
            }
        }
        Mode::Normal => match record.environment {
            Environment::Production => {
                use safegit_types::Category::*;
                if matches!(
                    category,
                    PushForce | ResetHard | CleanForce | Rebase | FilterHistory
                ) {
                    Verdict::Deny {
                        reason: format!(
                            "{} is blocked in production under normal mode",
                            category.tag()
                        ),
                    }
                } else {
                    Verdict::Allow
                }
            }
            Environment::Development | Environment::Staging => Verdict::Allow,
        },
    }
}
