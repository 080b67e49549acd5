//! Reverting an organize run from its undo log.
//!
//! Operations are replayed newest first. Each one either restores a file or
//! records why it could not; nothing short of an unreadable log stops the run.
//! Afterwards empty directories left in the organized tree are removed, either
//! below an explicit root or by walking up from each restored file's organized
//! location.

use crate::collision::next_free_name;
use crate::control::{CancellationToken, ProgressSink};
use crate::error::UndoError;
use crate::organizer::move_file;
use crate::undo_log::{ACTION_MOVE, read_entries};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Outcome of reverting one logged move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UndoResult {
    pub success: bool,
    pub message: String,
}

/// The result of [`UndoEngine::undo`].
#[derive(Debug, Clone, Default)]
pub struct UndoReport {
    /// Per-operation results, in the order they were replayed.
    pub results: Vec<UndoResult>,
    pub restored: usize,
    pub failed: usize,
    /// Set when the undo stopped early on request.
    pub cancelled: bool,
    /// Empty directories removed by the cleanup pass.
    pub removed_dirs: usize,
}

impl UndoReport {
    /// `Undo completed: N restored, M failed`
    pub fn summary(&self) -> String {
        format!(
            "Undo completed: {} restored, {} failed",
            self.restored, self.failed
        )
    }

    /// Returns the total number of operations processed.
    pub fn total_processed(&self) -> usize {
        self.restored + self.failed
    }

    /// Returns true if every processed operation was restored.
    pub fn is_complete_success(&self) -> bool {
        self.failed == 0 && !self.cancelled
    }

    fn record(&mut self, result: UndoResult) {
        if result.success {
            self.restored += 1;
        } else {
            self.failed += 1;
        }
        self.results.push(result);
    }
}

/// Replays undo logs in reverse.
#[derive(Debug, Clone, Default)]
pub struct UndoEngine {
    cleanup_root: Option<PathBuf>,
}

impl UndoEngine {
    /// `cleanup_root` is the organized tree to prune of empty directories
    /// after each undo. With `None`, only directories the undo itself emptied
    /// are removed (see [`prune_emptied_dirs`]).
    pub fn new(cleanup_root: Option<PathBuf>) -> Self {
        Self { cleanup_root }
    }

    /// Moves every file recorded in `log_path` back to where it came from.
    ///
    /// # Edge Cases Handled
    ///
    /// * **Entry without `source`/`destination`**: reported as an invalid entry
    /// * **File no longer at its destination**: reported as not found
    /// * **Original location now occupied**: the occupant is backed up with a
    ///   timestamp suffix before the file is restored
    /// * **Cancellation**: stops before the next operation; cleanup still runs
    ///
    /// The log file itself is never modified.
    ///
    /// # Errors
    ///
    /// Fails only when the log cannot be read, is not a JSON list, or is empty.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use dirsort::control::{CancellationToken, NoProgress};
    /// use dirsort::undo::UndoEngine;
    /// use std::path::Path;
    ///
    /// let engine = UndoEngine::new(None);
    /// let report = engine
    ///     .undo(
    ///         Path::new("undo_log_20240301_101502.json"),
    ///         &CancellationToken::new(),
    ///         &mut NoProgress,
    ///     )
    ///     .expect("readable log");
    /// println!("{}", report.summary());
    /// ```
    pub fn undo(
        &self,
        log_path: &Path,
        cancel: &CancellationToken,
        progress: &mut dyn ProgressSink,
    ) -> Result<UndoReport, UndoError> {
        let entries = read_entries(log_path)?;
        let total = entries.len();
        log::info!(
            "Undoing {total} operations from {}",
            log_path.display()
        );

        let mut report = UndoReport::default();
        let mut restored = Vec::new();
        for (index, entry) in entries.iter().rev().enumerate() {
            if cancel.is_cancelled() {
                log::info!("Undo cancelled after {index} of {total} operations");
                report.cancelled = true;
                break;
            }

            let result = match restore_entry(entry) {
                Ok(restore) => {
                    restored.push((restore.source, restore.destination));
                    UndoResult {
                        success: true,
                        message: restore.message,
                    }
                }
                Err(message) => {
                    log::warn!("{message}");
                    UndoResult {
                        success: false,
                        message,
                    }
                }
            };

            progress.on_progress(index + 1, total, &result.message);
            report.record(result);
        }

        report.removed_dirs = match &self.cleanup_root {
            Some(root) => cleanup_empty_dirs(root),
            None => prune_emptied_dirs(&restored),
        };

        log::info!("{}", report.summary());
        Ok(report)
    }
}

/// A logged move that was reverted.
struct Restore {
    source: PathBuf,
    destination: PathBuf,
    message: String,
}

/// Restores one log entry, returning the message to report either way.
fn restore_entry(entry: &Value) -> Result<Restore, String> {
    let field = |name: &str| entry.get(name).and_then(Value::as_str);

    let (Some(source), Some(destination)) = (field("source"), field("destination")) else {
        return Err("Invalid operation entry: missing source or destination".to_string());
    };
    if let Some(action) = field("action").filter(|action| *action != ACTION_MOVE) {
        return Err(format!("Invalid operation entry: unsupported action '{action}'"));
    }

    let source = PathBuf::from(source);
    let destination = PathBuf::from(destination);
    let name = destination
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| destination.display().to_string());

    if !destination.exists() {
        return Err(format!("File not found in organized location: {name}"));
    }

    let failed = |reason: String| format!("Failed to restore {}: {reason}", destination.display());

    if let Some(parent) = source.parent() {
        fs::create_dir_all(parent).map_err(|e| failed(e.to_string()))?;
    }

    if source.exists() {
        let backup = backup_path(&source);
        fs::rename(&source, &backup)
            .map_err(|e| failed(format!("could not back up conflicting file: {e}")))?;
        log::info!(
            "Backed up {} to {}",
            source.display(),
            backup.display()
        );
    }

    move_file(&destination, &source).map_err(|e| failed(e.to_string()))?;
    let message = format!("Restored {name} -> {}", source.display());
    Ok(Restore {
        source,
        destination,
        message,
    })
}

/// Generates a backup path for a file by appending a timestamp.
///
/// Example: `file.txt` becomes `file.txt.bak.20251109-143052`
fn backup_path(original: &Path) -> PathBuf {
    let timestamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
    let filename = original
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "file".to_string());

    let backup = original.with_file_name(format!("{filename}.bak.{timestamp}"));
    if backup.exists() {
        next_free_name(&backup, |p| p.exists()).unwrap_or(backup)
    } else {
        backup
    }
}

/// Removes empty directories below `root`, deepest first.
///
/// `root` itself is kept. Directories that cannot be removed, including ones
/// that still hold files, are left alone. Returns how many were removed;
/// running it again on the same tree removes nothing more.
pub fn cleanup_empty_dirs(root: &Path) -> usize {
    if !root.is_dir() {
        return 0;
    }

    let mut removed = 0;
    for entry in WalkDir::new(root)
        .min_depth(1)
        .contents_first(true)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_dir())
    {
        // remove_dir refuses non-empty directories.
        if fs::remove_dir(entry.path()).is_ok() {
            log::debug!("Removed empty directory {}", entry.path().display());
            removed += 1;
        }
    }
    removed
}

/// Removes directories left empty by reverted moves.
///
/// For each `(source, destination)` pair the walk starts at the destination's
/// parent and climbs until it meets a directory that still has entries, or the
/// deepest directory the two paths share. Nothing outside the logged
/// destinations is touched.
pub fn prune_emptied_dirs(moves: &[(PathBuf, PathBuf)]) -> usize {
    let mut removed = 0;
    for (source, destination) in moves {
        let shared = common_ancestor(source, destination);
        let mut dir = destination.parent();
        while let Some(current) = dir {
            if current == shared || !current.starts_with(&shared) {
                break;
            }
            if fs::remove_dir(current).is_err() {
                break;
            }
            log::debug!("Removed empty directory {}", current.display());
            removed += 1;
            dir = current.parent();
        }
    }
    removed
}

fn common_ancestor(a: &Path, b: &Path) -> PathBuf {
    a.components()
        .zip(b.components())
        .take_while(|(x, y)| x == y)
        .map(|(x, _)| x)
        .collect()
}
