use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};

use safegit::dispatcher::GlobalFlags;
use safegit_confirm::Interact;
use safegit_types::{ContextMode as Mode, Environment, SafeGitError};

const SAFE_SUBDIR: &str = ".safe";

#[derive(Parser, Debug)]
#[command(name = "safegit", version)]
#[command(about = "Protective wrapper around a VCS executable")]
struct Cli {
    /// Repository root (default: current directory)
    #[arg(long, global = true, default_value = ".")]
    repo: PathBuf,

    /// Render the planned command without executing it.
    #[arg(long, global = true)]
    dry_run: bool,

    /// Auto-accept Low/Medium risk confirmations; reject High/Critical.
    #[arg(long = "yes", short = 'y', global = true)]
    yes: bool,

    /// Auto-accept every confirmation, synthesizing typed phrases.
    #[arg(long, global = true)]
    force_yes: bool,

    /// Treat any prompt as a denial.
    #[arg(long, global = true)]
    non_interactive: bool,

    /// Accept only operations requiring no confirmation at all.
    #[arg(long, global = true)]
    batch: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show the most recent undo entries, or replay one entry's recovery steps.
    Undo {
        /// 1-based index into undo-history (most recent = 1); omit to list.
        index: Option<usize>,
    },
    /// Show the full undo journal, most recent first.
    UndoHistory,
    /// Set the persisted deployment environment.
    SetEnv { environment: String },
    /// Set the persisted operating mode.
    SetMode { mode: String },
    /// Add a literal-substring restriction blocking any matching argv.
    AddRestriction { substring: String },
    /// Remove a previously added restriction.
    RemoveRestriction { substring: String },
    /// Print the current context record.
    ShowContext {
        #[arg(long)]
        json: bool,
    },
    /// Backup artifact maintenance.
    Backup {
        #[command(subcommand)]
        action: BackupAction,
    },
    /// Print environment and tool diagnostics.
    Doctor,
    /// Anything else is forwarded to the VCS (after classification and safety checks).
    #[command(external_subcommand)]
    Vcs(Vec<String>),
}

#[derive(Subcommand, Debug)]
enum BackupAction {
    /// Remove backup artifacts older than the given duration (e.g. "30d", "2w").
    Prune {
        #[arg(long)]
        older_than: String,
    },
}

struct TerminalInteract;

impl Interact for TerminalInteract {
    fn confirm_yes_no(&mut self, prompt: &str) -> bool {
        eprint!("{prompt} [y/N] ");
        let _ = io::stderr().flush();
        let mut line = String::new();
        if io::stdin().read_line(&mut line).is_err() {
            return false;
        }
        matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes")
    }

    fn read_phrase(&mut self, prompt: &str) -> String {
        eprint!("{prompt} ");
        let _ = io::stderr().flush();
        let mut line = String::new();
        let _ = io::stdin().read_line(&mut line);
        line.trim_end_matches(['\n', '\r']).to_string()
    }

    fn note(&mut self, msg: &str) {
        eprintln!("[safegit] {msg}");
    }
}

fn parse_environment(s: &str) -> Result<Environment> {
    match s.to_ascii_lowercase().as_str() {
        "development" | "dev" => Ok(Environment::Development),
        "staging" => Ok(Environment::Staging),
        "production" | "prod" => Ok(Environment::Production),
        other => Err(anyhow!("unknown environment {other:?}; expected development/staging/production")),
    }
}

fn parse_mode(s: &str) -> Result<Mode> {
    match s.to_ascii_lowercase().as_str() {
        "normal" => Ok(Mode::Normal),
        "code_freeze" | "code-freeze" => Ok(Mode::CodeFreeze),
        "paranoid" => Ok(Mode::Paranoid),
        "maintenance" => Ok(Mode::Maintenance),
        other => Err(anyhow!("unknown mode {other:?}; expected normal/code_freeze/paranoid/maintenance")),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => ExitCode::from(code as u8),
        Err(err) => {
            let code = err
                .downcast_ref::<SafeGitError>()
                .map(SafeGitError::exit_code)
                .unwrap_or(3);
            eprintln!("[safegit] error: {err:#}");
            ExitCode::from(code as u8)
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    let repo = cli.repo.canonicalize().unwrap_or_else(|_| cli.repo.clone());
    let safe_dir = repo.join(SAFE_SUBDIR);
    let flags = cli.global_flags();

    match cli.command {
        Commands::SetEnv { environment } => {
            let environment = parse_environment(&environment)?;
            safegit_context::set_environment(&safe_dir, environment)?;
            println!("environment set to {}", environment_tag(environment));
            Ok(0)
        }
        Commands::SetMode { mode } => {
            let mode = parse_mode(&mode)?;
            safegit_context::set_mode(&safe_dir, mode)?;
            println!("mode set to {}", mode_tag(mode));
            Ok(0)
        }
        Commands::AddRestriction { substring } => {
            safegit_context::add_restriction(&safe_dir, &substring)?;
            println!("restriction added: {substring:?}");
            Ok(0)
        }
        Commands::RemoveRestriction { substring } => {
            safegit_context::remove_restriction(&safe_dir, &substring)?;
            println!("restriction removed: {substring:?}");
            Ok(0)
        }
        Commands::ShowContext { json } => {
            let record = safegit_context::load(&safe_dir)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&record)?);
            } else {
                println!("environment: {}", environment_tag(record.environment));
                println!("mode:        {}", mode_tag(record.mode));
                println!("restrictions:");
                for r in &record.restrictions {
                    println!("  - {r}");
                }
                println!("updated_at:  {}", record.updated_at);
            }
            Ok(0)
        }
        Commands::UndoHistory => {
            print_undo_history(&safe_dir)?;
            Ok(0)
        }
        Commands::Undo { index } => run_undo(&safe_dir, index, &flags),
        Commands::Backup { action } => match action {
            BackupAction::Prune { older_than } => {
                let duration = humantime::parse_duration(&older_than)
                    .with_context(|| format!("invalid duration: {older_than}"))?;
                let dir = safegit_backup::backup_dir(&safe_dir);
                let removed = safegit_backup::prune_older_than(&dir, duration)?;
                println!("pruned {removed} backup artifact(s) older than {older_than}");
                Ok(0)
            }
        },
        Commands::Doctor => run_doctor(&repo, &safe_dir),
        Commands::Vcs(argv) => run_vcs(&flags, &repo, &safe_dir, argv),
    }
}

impl Cli {
    fn global_flags(&self) -> GlobalFlags {
        GlobalFlags {
            dry_run: self.dry_run,
            yes: self.yes,
            force_yes: self.force_yes,
            non_interactive: self.non_interactive,
            batch: self.batch,
        }
    }
}

fn run_vcs(flags: &GlobalFlags, repo: &Path, safe_dir: &Path, argv: Vec<String>) -> Result<i32> {
    let config = safegit::config::load(repo)?;
    let mode = safegit::resolve_mode(flags, &config, &|name| std::env::var(name).ok());
    let context = safegit_context::load(safe_dir)?;
    let mut interact = TerminalInteract;
    safegit::dispatch(&argv, safe_dir, repo, &config.vcs_program, mode, &context, &mut interact)
}

fn run_undo(safe_dir: &Path, index: Option<usize>, flags: &GlobalFlags) -> Result<i32> {
    let entries = safegit_journal::read_reverse_chronological(safe_dir)?;
    let Some(index) = index else {
        print_undo_history_entries(&entries);
        return Ok(0);
    };
    let Some(entry) = index.checked_sub(1).and_then(|i| entries.get(i)) else {
        return Err(anyhow!("no undo entry at index {index}"));
    };

    println!("recovery steps for entry {} ({}):", entry.id, entry.category.tag());
    for step in &entry.recovery {
        println!("  {step}");
    }
    println!("hint: {}", entry.hint);

    if flags.force_yes && safegit::handlers::has_deterministic_recovery(entry.category) {
        if let Some(first) = entry.recovery.first() {
            eprintln!("[safegit] force-yes: executing recovery step: {first}");
            let mut parts = first.split_whitespace();
            let Some(program) = parts.next() else {
                return Ok(0);
            };
            let status = std::process::Command::new(program)
                .args(parts)
                .current_dir(&entry.cwd)
                .status()
                .with_context(|| format!("failed to run recovery step {first:?}"))?;
            return Ok(status.code().unwrap_or(1));
        }
    }
    Ok(0)
}

fn print_undo_history(safe_dir: &Path) -> Result<()> {
    let entries = safegit_journal::read_reverse_chronological(safe_dir)?;
    print_undo_history_entries(&entries);
    Ok(())
}

fn print_undo_history_entries(entries: &[safegit_types::UndoEntry]) {
    if entries.is_empty() {
        println!("(no undo entries)");
        return;
    }
    for (i, entry) in entries.iter().enumerate() {
        println!(
            "{:>3}. [{}] {} — {:?} ({})",
            i + 1,
            entry.created_at.format("%Y-%m-%d %H:%M:%S"),
            entry.category.tag(),
            entry.outcome,
            entry.argv.join(" ")
        );
        if let Some(adjusted) = &entry.adjusted_argv {
            println!("       rewritten to: {}", adjusted.join(" "));
        }
    }
}

fn run_doctor(repo: &Path, safe_dir: &Path) -> Result<i32> {
    println!("repo:    {}", repo.display());
    println!("safe_dir: {}", safe_dir.display());

    let config = safegit::config::load(repo)?;
    println!("vcs_program: {}", config.vcs_program);

    let context = safegit_context::load(safe_dir)?;
    println!("environment: {}", environment_tag(context.environment));
    println!("mode:        {}", mode_tag(context.mode));

    let journal_len = safegit_journal::read_all(safe_dir)?.len();
    println!("journal entries: {journal_len}");

    println!();
    print_cmd_version(&config.vcs_program);
    Ok(0)
}

fn print_cmd_version(cmd: &str) {
    match std::process::Command::new(cmd).arg("--version").output() {
        Ok(out) if out.status.success() => {
            println!("{cmd}: {}", String::from_utf8_lossy(&out.stdout).trim());
        }
        Ok(out) => {
            eprintln!(
                "[safegit] {cmd} --version failed: {}",
                String::from_utf8_lossy(&out.stderr).trim()
            );
        }
        Err(err) => {
            eprintln!("[safegit] unable to run {cmd} --version: {err}");
        }
    }
}

fn environment_tag(environment: Environment) -> &'static str {
    match environment {
        Environment::Development => "development",
        Environment::Staging => "staging",
        Environment::Production => "production",
    }
}

fn mode_tag(mode: Mode) -> &'static str {
    match mode {
        Mode::Normal => "normal",
        Mode::CodeFreeze => "code_freeze",
        Mode::Paranoid => "paranoid",
        Mode::Maintenance => "maintenance",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_environment_accepts_documented_spellings() {
        assert_eq!(parse_environment("development").unwrap(), Environment::Development);
        assert_eq!(parse_environment("PROD").unwrap(), Environment::Production);
        assert!(parse_environment("nonsense").is_err());
    }

    #[test]
    fn parse_mode_accepts_documented_spellings() {
        assert_eq!(parse_mode("code_freeze").unwrap(), Mode::CodeFreeze);
        assert_eq!(parse_mode("code-freeze").unwrap(), Mode::CodeFreeze);
        assert!(parse_mode("nonsense").is_err());
    }

    #[test]
    fn tags_round_trip_through_parse() {
        for env in [Environment::Development, Environment::Staging, Environment::Production] {
            assert_eq!(parse_environment(environment_tag(env)).unwrap(), env);
        }
        for mode in [Mode::Normal, Mode::CodeFreeze, Mode::Paranoid, Mode::Maintenance] {
            assert_eq!(parse_mode(mode_tag(mode)).unwrap(), mode);
        }
    }
}
