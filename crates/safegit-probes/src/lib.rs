//! Read-only VCS subprocess probes used to build a [`ProbeSnapshot`] at
//! handler entry.
//!
//! Every probe here invokes a read-only VCS subcommand, parses its
//! structured/porcelain output (never a regex over human-facing text), and
//! surfaces failures as [`SafeGitError::ProbeFailed`]. The timeout-bounded
//! subprocess runner is a poll loop generalized from a one-shot command
//! runner into the VCS-specific [`Vcs`] handle used throughout this crate
//! and `safegit-analyzers`/`safegit-backup`.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use anyhow::Result;
use safegit_types::{
    DirtyFile, ProbeSnapshot, SafeGitError, StashEntry, UntrackedFile, UntrackedKind,
    UpstreamDivergence,
};

/// Default ceiling on any single probe subprocess.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(30);

/// Protected-branch allowlist. Glob-style `*` suffix matches any branch
/// under that prefix (`release/*`, `hotfix/*`).
pub const PROTECTED_BRANCHES: &[&str] = &[
    "main",
    "master",
    "develop",
    "release/*",
    "hotfix/*",
    "production",
    "staging",
];

/// Hosts that inherit the generic protected-branch allowlist plus any
/// host-specific defaults.
pub const PROTECTED_HOSTS: &[&str] = &["github.com", "gitlab.com", "bitbucket.org", "dev.azure.com"];

#[derive(Debug, Clone)]
struct CommandOutput {
    exit_code: i32,
    stdout: String,
    stderr: String,
    timed_out: bool,
}

fn run_with_timeout(program: &str, args: &[&str], cwd: &Path, timeout: Duration) -> Result<CommandOutput> {
    let start = Instant::now();
    let mut command = Command::new(program);
    command.args(args).current_dir(cwd);

    let mut child = command
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(SafeGitError::from)?;

    let deadline = start + timeout;
    loop {
        match child.try_wait().map_err(SafeGitError::from)? {
            Some(status) => {
                let (stdout, stderr) = drain(&mut child);
                return Ok(CommandOutput {
                    exit_code: status.code().unwrap_or(-1),
                    stdout,
                    stderr,
                    timed_out: false,
                });
            }
            None => {
                if Instant::now() >= deadline {
                    let _ = child.kill();
                    let _ = child.wait();
                    let (stdout, mut stderr) = drain(&mut child);
                    stderr.push_str(&format!(
                        "\nprobe timed out after {}",
                        humantime::format_duration(timeout)
                    ));
                    return Ok(CommandOutput {
                        exit_code: -1,
                        stdout,
                        stderr,
                        timed_out: true,
                    });
                }
                std::thread::sleep(Duration::from_millis(50));
            }
        }
    }
}

fn drain(child: &mut std::process::Child) -> (String, String) {
    let mut stdout_bytes = Vec::new();
    let mut stderr_bytes = Vec::new();
    if let Some(mut out) = child.stdout.take() {
        let _ = out.read_to_end(&mut stdout_bytes);
    }
    if let Some(mut err) = child.stderr.take() {
        let _ = err.read_to_end(&mut stderr_bytes);
    }
    (
        String::from_utf8_lossy(&stdout_bytes).to_string(),
        String::from_utf8_lossy(&stderr_bytes).to_string(),
    )
}

/// A handle bound to one VCS program and one working directory. Tests
/// substitute a stub script via `Vcs::new` so probes never shell out to a
/// real VCS in unit tests.
#[derive(Debug, Clone)]
pub struct Vcs {
    program: String,
    repo: PathBuf,
    timeout: Duration,
}

impl Vcs {
    pub fn new(program: impl Into<String>, repo: impl Into<PathBuf>) -> Self {
        Vcs {
            program: program.into(),
            repo: repo.into(),
            timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn repo(&self) -> &Path {
        &self.repo
    }

    /// Run a subcommand and return trimmed stdout, converting any nonzero
    /// exit or timeout into [`SafeGitError::ProbeFailed`].
    fn run(&self, args: &[&str]) -> Result<String> {
        let output = run_with_timeout(&self.program, args, &self.repo, self.timeout)?;
        if output.timed_out || output.exit_code != 0 {
            let tail: String = output
                .stderr
                .lines()
                .rev()
                .take(5)
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect::<Vec<_>>()
                .join("\n");
            return Err(SafeGitError::ProbeFailed {
                cmd: format!("{} {}", self.program, args.join(" ")),
                code: output.exit_code,
                stderr_tail: tail,
            }
            .into());
        }
        Ok(output.stdout.trim().to_string())
    }

    /// Same as `run`, but a nonzero exit with empty stdout is treated as "no
    /// result" rather than an error (used for `rev-parse HEAD` in a fresh
    /// repository with no commits yet).
    fn run_allow_empty(&self, args: &[&str]) -> Result<Option<String>> {
        let output = run_with_timeout(&self.program, args, &self.repo, self.timeout)?;
        if output.timed_out {
            return Err(SafeGitError::ProbeFailed {
                cmd: format!("{} {}", self.program, args.join(" ")),
                code: output.exit_code,
                stderr_tail: output.stderr,
            }
            .into());
        }
        if output.exit_code != 0 {
            return Ok(None);
        }
        let trimmed = output.stdout.trim();
        Ok(if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        })
    }

    pub fn head_commit(&self) -> Result<Option<String>> {
        self.run_allow_empty(&["rev-parse", "HEAD"])
    }

    pub fn current_branch(&self) -> Result<Option<String>> {
        let branch = self.run(&["rev-parse", "--abbrev-ref", "HEAD"])?;
        Ok(if branch == "HEAD" { None } else { Some(branch) })
    }

    /// Dirty tracked files with per-file added/removed line counts, from
    /// `status --porcelain=v1` plus `diff --numstat` (porcelain only, never
    /// parsed from human-facing `git status` text).
    pub fn dirty_files(&self) -> Result<Vec<DirtyFile>> {
        let status = self.run(&["status", "--porcelain=v1"])?;
        let numstat = self.run(&["diff", "--numstat", "HEAD"]).unwrap_or_default();

        let mut counts = std::collections::HashMap::new();
        for line in numstat.lines() {
            let mut parts = line.split('\t');
            let added = parts.next().unwrap_or("0").parse::<u64>().unwrap_or(0);
            let removed = parts.next().unwrap_or("0").parse::<u64>().unwrap_or(0);
            if let Some(path) = parts.next() {
                counts.insert(path.to_string(), (added, removed));
            }
        }

        let mut files = Vec::new();
        for line in status.lines() {
            if line.len() < 3 {
                continue;
            }
            let code = &line[0..2];
            let path = line[3..].to_string();
            if code == "??" {
                continue;
            }
            let (added, removed) = counts.get(&path).copied().unwrap_or((0, 0));
            files.push(DirtyFile {
                path,
                added_lines: added,
                removed_lines: removed,
            });
        }
        Ok(files)
    }

    /// Untracked files with size and a coarse content-type classification
    /// categorized into `UntrackedFile.kind`.
    pub fn untracked_files(&self) -> Result<Vec<UntrackedFile>> {
        let listing = self.run(&["ls-files", "--others", "--exclude-standard"])?;
        let mut files = Vec::new();
        for rel_path in listing.lines().filter(|l| !l.is_empty()) {
            let full = self.repo.join(rel_path);
            let size_bytes = std::fs::metadata(&full).map(|m| m.len()).unwrap_or(0);
            files.push(UntrackedFile {
                path: rel_path.to_string(),
                size_bytes,
                kind: classify_untracked(rel_path),
            });
        }
        Ok(files)
    }

    pub fn stash_list(&self) -> Result<Vec<StashEntry>> {
        let listing = self.run(&["stash", "list"])?;
        let mut entries = Vec::new();
        for line in listing.lines().filter(|l| !l.is_empty()) {
            if let Some((reference, message)) = line.split_once(':') {
                entries.push(StashEntry {
                    reference: reference.trim().to_string(),
                    message: message.trim().to_string(),
                });
            }
        }
        Ok(entries)
    }

    /// Ahead/behind counts against the configured upstream, or `None` if
    /// there is no upstream.
    pub fn upstream_divergence(&self) -> Result<UpstreamDivergence> {
        let counts = match self.run_allow_empty(&[
            "rev-list",
            "--left-right",
            "--count",
            "@{upstream}...HEAD",
        ])? {
            Some(c) => c,
            None => return Ok(UpstreamDivergence::None),
        };
        let mut parts = counts.split_whitespace();
        let behind = parts.next().and_then(|s| s.parse::<u64>().ok()).unwrap_or(0);
        let ahead = parts.next().and_then(|s| s.parse::<u64>().ok()).unwrap_or(0);
        Ok(UpstreamDivergence::Tracking { ahead, behind })
    }

    pub fn reflog_tip(&self) -> Result<Option<String>> {
        self.run_allow_empty(&["reflog", "-1", "--format=%H %gs"])
    }

    pub fn remote_url(&self, remote: &str) -> Result<Option<String>> {
        self.run_allow_empty(&["remote", "get-url", remote])
    }

    /// Whether `current_branch` (if any) is protected, per the generic
    /// allowlist and host-augmented extensions.
    pub fn protected_branch(&self, restrictions: &std::collections::BTreeSet<String>) -> Result<bool> {
        let Some(branch) = self.current_branch()? else {
            return Ok(false);
        };
        Ok(is_protected_branch(&branch, restrictions))
    }

    /// Build the full read-only snapshot, captured fresh at handler entry.
    pub fn snapshot(&self, restrictions: &std::collections::BTreeSet<String>) -> Result<ProbeSnapshot> {
        Ok(ProbeSnapshot {
            head_commit: self.head_commit()?,
            current_branch: self.current_branch()?,
            dirty_files: self.dirty_files()?,
            untracked_files: self.untracked_files()?,
            stashes: self.stash_list()?,
            upstream: self.upstream_divergence()?,
            reflog_tip: self.reflog_tip()?,
            protected_branch: self.protected_branch(restrictions)?,
        })
    }
}

fn classify_untracked(path: &str) -> UntrackedKind {
    let lower = path.to_ascii_lowercase();
    if lower.ends_with(".log") {
        UntrackedKind::Log
    } else if lower.ends_with(".toml")
        || lower.ends_with(".yaml")
        || lower.ends_with(".yml")
        || lower.ends_with(".json")
        || lower.ends_with(".ini")
        || lower.ends_with(".env")
    {
        UntrackedKind::Config
    } else if lower.contains("/target/")
        || lower.contains("/dist/")
        || lower.contains("/build/")
        || lower.ends_with(".o")
        || lower.ends_with(".class")
    {
        UntrackedKind::BuildArtifact
    } else if lower.ends_with(".rs")
        || lower.ends_with(".py")
        || lower.ends_with(".go")
        || lower.ends_with(".js")
        || lower.ends_with(".ts")
        || lower.ends_with(".java")
        || lower.ends_with(".c")
        || lower.ends_with(".cpp")
    {
        UntrackedKind::Source
    } else {
        UntrackedKind::Other
    }
}

/// Pure matcher over the protected-branch allowlist plus any host-specific
/// additions recorded as context restrictions (shared between the probe and
/// `safegit-context`/`safegit-analyzers` so the rule lives in one place).
pub fn is_protected_branch(branch: &str, extra: &std::collections::BTreeSet<String>) -> bool {
    for pattern in PROTECTED_BRANCHES {
        if glob_match(pattern, branch) {
            return true;
        }
    }
    extra.iter().any(|p| glob_match(p, branch))
}

fn glob_match(pattern: &str, candidate: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => candidate.starts_with(prefix),
        None => pattern == candidate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn protected_branch_matches_generic_allowlist() {
        let none = BTreeSet::new();
        assert!(is_protected_branch("main", &none));
        assert!(is_protected_branch("release/1.2", &none));
        assert!(is_protected_branch("hotfix/urgent", &none));
        assert!(!is_protected_branch("feature/foo", &none));
    }

    #[test]
    fn protected_branch_honors_context_extensions() {
        let mut extra = BTreeSet::new();
        extra.insert("team/*".to_string());
        assert!(is_protected_branch("team/shared", &extra));
        assert!(!is_protected_branch("team/shared", &BTreeSet::new()));
    }

    #[test]
    fn classify_untracked_by_extension() {
        assert_eq!(classify_untracked("src/main.rs"), UntrackedKind::Source);
        assert_eq!(classify_untracked("app.log"), UntrackedKind::Log);
        assert_eq!(classify_untracked("Cargo.toml".to_lowercase().as_str()), UntrackedKind::Config);
        assert_eq!(classify_untracked("target/debug/foo.o"), UntrackedKind::BuildArtifact);
        assert_eq!(classify_untracked("README"), UntrackedKind::Other);
    }

    #[test]
    fn probe_against_real_git_repo_reads_consistent_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let vcs = Vcs::new("git", dir.path());
        let run = |args: &[&str]| {
            std::process::Command::new("git")
                .args(args)
                .current_dir(dir.path())
                .output()
                .unwrap()
        };
        run(&["init", "-q"]);
        run(&["config", "user.email", "test@example.com"]);
        run(&["config", "user.name", "test"]);
        std::fs::write(dir.path().join("tracked.txt"), "a\n").unwrap();
        run(&["add", "tracked.txt"]);
        run(&["commit", "-q", "-m", "initial"]);
        std::fs::write(dir.path().join("tracked.txt"), "a\nb\n").unwrap();
        std::fs::write(dir.path().join("new.rs"), "fn main() {}\n").unwrap();

        let snapshot = vcs.snapshot(&BTreeSet::new()).unwrap();
        assert!(snapshot.head_commit.is_some());
        assert_eq!(snapshot.dirty_files.len(), 1);
        assert_eq!(snapshot.untracked_files.len(), 1);
        assert_eq!(snapshot.untracked_files[0].kind, UntrackedKind::Source);
        assert!(!snapshot.protected_branch || snapshot.current_branch.as_deref() == Some("main"));
    }
}
