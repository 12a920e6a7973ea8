use std::path::Path;
use std::process::Command as StdCommand;

use assert_cmd::Command;
use predicates::str::contains;
use tempfile::tempdir;

fn git(repo: &Path, args: &[&str]) {
    let status = StdCommand::new("git")
        .args(args)
        .current_dir(repo)
        .status()
        .expect("git available on PATH");
    assert!(status.success(), "git {args:?} failed");
}

fn init_repo(repo: &Path) {
    git(repo, &["init", "-q"]);
    git(repo, &["config", "user.email", "test@example.com"]);
    git(repo, &["config", "user.name", "test"]);
}

fn commit_all(repo: &Path, message: &str) {
    git(repo, &["add", "-A"]);
    git(repo, &["commit", "-q", "-m", message]);
}

fn safegit(repo: &Path) -> Command {
    let mut cmd = Command::cargo_bin("safegit").expect("binary builds");
    cmd.arg("--repo").arg(repo);
    cmd
}

/// `reset --hard` on a dirty tree, answered interactively.
#[test]
fn reset_hard_on_dirty_tree_creates_a_stash_backup_and_a_journal_entry() {
    let dir = tempdir().unwrap();
    init_repo(dir.path());
    std::fs::write(dir.path().join("file.txt"), "original\n").unwrap();
    commit_all(dir.path(), "initial");
    std::fs::write(
        dir.path().join("file.txt"),
        "original\nand a second line\n".repeat(10),
    )
    .unwrap();

    safegit(dir.path())
        .args(["reset", "--hard", "HEAD"])
        .write_stdin("PROCEED\n")
        .assert()
        .success();

    let stash_list = StdCommand::new("git")
        .args(["stash", "list"])
        .current_dir(dir.path())
        .output()
        .unwrap();
    let stash_list = String::from_utf8_lossy(&stash_list.stdout);
    assert!(stash_list.contains("auto-backup"));

    let journal = std::fs::read_to_string(dir.path().join(".safe/journal.log")).unwrap();
    assert!(journal.contains("\"reset_hard\""));
}

/// `clean -fdx` when a protected file pattern is present; AssumeYes
/// cannot accept a Critical-risk confirmation.
#[test]
fn clean_force_with_protected_file_is_denied_under_assume_yes() {
    let dir = tempdir().unwrap();
    init_repo(dir.path());
    std::fs::write(dir.path().join("tracked.txt"), "x\n").unwrap();
    commit_all(dir.path(), "initial");
    std::fs::write(dir.path().join("temp.log"), "log\n").unwrap();
    std::fs::write(dir.path().join("config.local"), "secret\n").unwrap();

    safegit(dir.path())
        .arg("--yes")
        .args(["clean", "-fdx"])
        .assert()
        .failure()
        .code(1);

    assert!(dir.path().join("config.local").exists());
    assert!(!dir.path().join(".safe/journal.log").exists());
}

/// `push --force` to a protected branch under ForceYes rewrites the
/// argv to the safer `--force-with-lease` form.
#[test]
fn push_force_to_protected_branch_is_rewritten_to_force_with_lease() {
    let remote = tempdir().unwrap();
    git(remote.path(), &["init", "-q", "--bare"]);

    let dir = tempdir().unwrap();
    init_repo(dir.path());
    std::fs::write(dir.path().join("file.txt"), "x\n").unwrap();
    commit_all(dir.path(), "initial");
    git(dir.path(), &["branch", "-M", "main"]);
    git(
        dir.path(),
        &["remote", "add", "origin", remote.path().to_str().unwrap()],
    );
    git(dir.path(), &["push", "-q", "-u", "origin", "main"]);

    safegit(dir.path())
        .arg("--force-yes")
        .args(["push", "--force", "origin", "main"])
        .assert()
        .success()
        .stderr(contains("force-with-lease").or(contains("auto-type")));

    let journal = std::fs::read_to_string(dir.path().join(".safe/journal.log")).unwrap();
    assert!(journal.contains("force-with-lease"));
}

/// `commit --amend` on an unpushed HEAD is Low risk: no prompt, no
/// backup, runs straight through even in plain Interactive mode.
#[test]
fn commit_amend_on_unpushed_head_runs_without_any_prompt() {
    let dir = tempdir().unwrap();
    init_repo(dir.path());
    std::fs::write(dir.path().join("file.txt"), "x\n").unwrap();
    commit_all(dir.path(), "initial message");

    safegit(dir.path())
        .args(["commit", "--amend", "--no-edit"])
        .assert()
        .success();

    let journal = std::fs::read_to_string(dir.path().join(".safe/journal.log")).unwrap();
    assert!(journal.contains("\"commit_amend\""));
}

/// `--dry-run push --mirror` never touches the journal and exits 0.
#[test]
fn dry_run_push_mirror_does_not_append_a_journal_entry() {
    let dir = tempdir().unwrap();
    init_repo(dir.path());
    std::fs::write(dir.path().join("file.txt"), "x\n").unwrap();
    commit_all(dir.path(), "initial");

    safegit(dir.path())
        .arg("--dry-run")
        .args(["push", "--mirror", "origin"])
        .assert()
        .success()
        .stderr(contains("dry-run"));

    assert!(!dir.path().join(".safe/journal.log").exists());
}

/// set-env/set-mode/add-restriction round-trip through show-context.
#[test]
fn context_mutators_round_trip_through_show_context_json() {
    let dir = tempdir().unwrap();
    init_repo(dir.path());

    safegit(dir.path()).args(["set-env", "production"]).assert().success();
    safegit(dir.path()).args(["set-mode", "code_freeze"]).assert().success();
    safegit(dir.path())
        .args(["add-restriction", "rm -rf"])
        .assert()
        .success();

    safegit(dir.path())
        .args(["show-context", "--json"])
        .assert()
        .success()
        .stdout(contains("\"production\""))
        .stdout(contains("\"code_freeze\""))
        .stdout(contains("rm -rf"));
}

#[test]
fn an_unrecognized_global_flag_exits_with_the_documented_usage_code() {
    let dir = tempdir().unwrap();
    init_repo(dir.path());

    safegit(dir.path())
        .arg("--not-a-real-flag")
        .assert()
        .failure()
        .code(2);
}

#[test]
fn plain_status_passes_through_without_touching_the_journal() {
    let dir = tempdir().unwrap();
    init_repo(dir.path());

    safegit(dir.path()).arg("status").assert().success();
    assert!(!dir.path().join(".safe/journal.log").exists());
}
