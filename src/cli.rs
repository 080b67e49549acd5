//! Command-line interface module for dirsort.
//!
//! This module handles all CLI-related functionality including:
//! - Argument definitions
//! - Configuration discovery
//! - Organize and undo orchestration with progress output
//! - Undo log listing

use crate::collision::DuplicatePolicy;
use crate::config::Config;
use crate::control::CancellationToken;
use crate::organizer::{MoveEngine, OrganizeReport, UndoLogStatus};
use crate::output::{BarProgress, OutputFormatter};
use crate::undo::UndoEngine;
use crate::undo_log::{list_undo_logs, log_started_at};
use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

/// Sort files into category folders, with undo.
#[derive(Parser, Debug)]
#[command(name = "dirsort", version, about)]
pub struct Cli {
    /// Configuration file to use instead of the discovered one
    #[arg(short, long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Print debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Move files from a source folder into the organized tree
    Organize {
        /// Folder to organize [default: settings.source_folder]
        source: Option<PathBuf>,

        /// Root of the organized tree [default: settings.destination_folder]
        destination: Option<PathBuf>,

        /// Only show what would be moved
        #[arg(short = 'n', long, overrides_with = "no_dry_run")]
        dry_run: bool,

        /// Move files even when the configuration enables dry runs
        #[arg(long, overrides_with = "dry_run")]
        no_dry_run: bool,

        /// How to handle a name that is already taken: rename, skip or overwrite
        #[arg(short, long, value_name = "POLICY")]
        policy: Option<DuplicatePolicy>,
    },
    /// Move files back using an undo log
    Undo {
        /// Undo log to replay [default: the most recent one]
        log: Option<PathBuf>,

        /// Organized tree to clean of empty folders afterwards [default: only
        /// the folders this undo emptied]
        #[arg(short, long, value_name = "DIR")]
        destination: Option<PathBuf>,
    },
    /// List undo logs, most recent first
    Logs,
    /// Write the default configuration file if there is none
    Init,
}

/// Runs one command.
///
/// # Arguments
///
/// * `cli` - Parsed command line
/// * `cancel` - Polled between files; the caller trips it (on Ctrl+C) to stop
///   after the current file
///
/// # Errors
///
/// Returns an error when the configuration cannot be loaded, the source
/// folder is missing, or the undo log cannot be read. Per-file problems are
/// printed and do not fail the command.
///
/// # Examples
///
/// ```no_run
/// use clap::Parser;
/// use dirsort::cli::{Cli, run_cli};
/// use dirsort::control::CancellationToken;
///
/// let cli = Cli::parse_from(["dirsort", "organize", "--dry-run"]);
/// run_cli(&cli, &CancellationToken::new()).expect("organize failed");
/// ```
pub fn run_cli(cli: &Cli, cancel: &CancellationToken) -> Result<()> {
    let config_path = Config::discover(cli.config.as_deref());

    match &cli.command {
        Command::Organize {
            source,
            destination,
            dry_run,
            no_dry_run,
            policy,
        } => {
            let config = load_config(&config_path)?;
            organize(
                &config,
                source.as_deref(),
                destination.as_deref(),
                dry_run_override(*dry_run, *no_dry_run),
                *policy,
                cancel,
            )
        }
        Command::Undo { log, destination } => {
            let config = load_config(&config_path)?;
            undo(&config, log.as_deref(), destination.as_deref(), cancel)
        }
        Command::Logs => {
            let config = load_config(&config_path)?;
            show_logs(&config.settings.undo_log_dir);
            Ok(())
        }
        Command::Init => init(&config_path),
    }
}

/// `Some` when either flag was given; the last one on the command line wins.
fn dry_run_override(dry_run: bool, no_dry_run: bool) -> Option<bool> {
    match (dry_run, no_dry_run) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    }
}

fn load_config(path: &Path) -> Result<Config> {
    let config = Config::load_or_init(path)
        .with_context(|| format!("Error loading configuration {}", path.display()))?;
    for skipped in &config.skipped_rules {
        OutputFormatter::warning(&format!(
            "Ignoring rule '{}': {}",
            skipped.key, skipped.reason
        ));
    }
    Ok(config)
}

fn organize(
    config: &Config,
    source: Option<&Path>,
    destination: Option<&Path>,
    dry_run: Option<bool>,
    policy: Option<DuplicatePolicy>,
    cancel: &CancellationToken,
) -> Result<()> {
    let mut settings = config.settings.clone();
    if let Some(policy) = policy {
        settings.handle_duplicates = policy;
    }
    let dry_run = dry_run.unwrap_or(settings.dry_run);
    let source = source.map_or_else(|| settings.source_folder.clone(), Path::to_path_buf);
    let destination =
        destination.map_or_else(|| settings.destination_folder.clone(), Path::to_path_buf);

    let filters = config
        .filters
        .compile()
        .context("Error compiling filters")?;

    if dry_run {
        OutputFormatter::dry_run_notice(&format!(
            "Analyzing {} -> {}",
            source.display(),
            destination.display()
        ));
    } else {
        OutputFormatter::info(&format!(
            "Organizing {} -> {}",
            source.display(),
            destination.display()
        ));
    }

    let mut progress = BarProgress::new();
    let report = MoveEngine::new(&config.rules, &settings, &filters)
        .organize(&source, &destination, dry_run, cancel, &mut progress)
        .with_context(|| format!("Could not organize {}", source.display()))?;
    progress.finish();

    print_organize_report(&report);
    Ok(())
}

fn print_organize_report(report: &OrganizeReport) {
    if report.outcomes.is_empty() {
        OutputFormatter::plain("No files found to organize.");
        return;
    }

    for outcome in &report.outcomes {
        OutputFormatter::file_outcome(outcome);
    }

    let placed = if report.dry_run {
        report.stats.planned
    } else {
        report.stats.moved
    };
    OutputFormatter::summary_table(&report.category_counts(), placed);

    let stats = &report.stats;
    OutputFormatter::plain(&format!(
        "\nMoved: {}  Planned: {}  Skipped: {}  Errors: {}",
        stats.moved, stats.planned, stats.skipped, stats.errors
    ));

    if report.cancelled {
        OutputFormatter::warning("Cancelled before all files were processed");
    }

    match &report.undo_log {
        UndoLogStatus::Saved(path) => OutputFormatter::success(&format!(
            "Undo log saved to {}. Use 'dirsort undo' to revert changes.",
            path.display()
        )),
        UndoLogStatus::Failed(message) => {
            OutputFormatter::error(&format!("Could not save undo log: {message}"));
        }
        UndoLogStatus::NotNeeded => {}
    }

    if stats.errors > 0 {
        OutputFormatter::warning("Some files could not be organized. Please review errors above.");
    }
}

fn undo(
    config: &Config,
    log: Option<&Path>,
    destination: Option<&Path>,
    cancel: &CancellationToken,
) -> Result<()> {
    let log_path = match log {
        Some(path) => path.to_path_buf(),
        None => match list_undo_logs(&config.settings.undo_log_dir).into_iter().next() {
            Some(path) => path,
            None => bail!(
                "No undo logs found in {}",
                config.settings.undo_log_dir.display()
            ),
        },
    };

    OutputFormatter::info(&format!("Undoing {}", log_path.display()));

    let mut progress = BarProgress::new();
    let report = UndoEngine::new(destination.map(Path::to_path_buf))
        .undo(&log_path, cancel, &mut progress)
        .context("Undo failed")?;
    progress.finish();

    for result in &report.results {
        OutputFormatter::undo_result(result);
    }
    if report.cancelled {
        OutputFormatter::warning("Cancelled before all operations were reverted");
    }
    if report.removed_dirs > 0 {
        OutputFormatter::plain(&format!(
            "Removed {} empty directories",
            report.removed_dirs
        ));
    }

    if report.is_complete_success() {
        OutputFormatter::success(&report.summary());
    } else {
        OutputFormatter::warning(&report.summary());
    }
    Ok(())
}

fn show_logs(dir: &Path) {
    let logs = list_undo_logs(dir);
    if logs.is_empty() {
        OutputFormatter::plain(&format!("No undo logs found in {}", dir.display()));
        return;
    }

    OutputFormatter::header("UNDO LOGS");
    for path in logs {
        let started = log_started_at(&path)
            .map(|time| time.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "unknown time".to_string());
        OutputFormatter::plain(&format!("{started}  {}", path.display()));
    }
}

fn init(path: &Path) -> Result<()> {
    if path.exists() {
        OutputFormatter::info(&format!(
            "Configuration already exists at {}",
            path.display()
        ));
        return Ok(());
    }

    Config::default()
        .save(path)
        .with_context(|| format!("Could not write configuration {}", path.display()))?;
    OutputFormatter::success(&format!("Wrote default configuration to {}", path.display()));
    Ok(())
}
