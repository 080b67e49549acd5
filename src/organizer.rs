//! The move engine: walks a source folder and files everything away.
//!
//! A run enumerates eligible files, classifies each one, resolves its
//! destination, applies the duplicate policy and then either moves the file or,
//! in a dry run, records where it would go. Failures are per file: they are
//! counted, reported as [`OutcomeKind::Failed`] and the run carries on.

use crate::classifier::Classifier;
use crate::collision::{self, DuplicatePolicy, Resolution};
use crate::config::Settings;
use crate::control::{CancellationToken, ProgressSink};
use crate::error::{OrganizeError, OrganizeResult};
use crate::filters::CompiledFilters;
use crate::path_resolver;
use crate::rules::RuleSet;
use crate::undo_log::{MoveOperation, UndoLog};
use chrono::Local;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Counters for one organize run. Each run starts from zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStatistics {
    pub moved: usize,
    pub skipped: usize,
    pub errors: usize,
    /// Files a dry run would have moved.
    pub planned: usize,
}

/// Why a file was left where it is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The destination was taken and the policy is `skip`.
    Duplicate { existing: PathBuf },
    /// The file already sits at its destination.
    AlreadyInPlace,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutcomeKind {
    Moved { destination: PathBuf },
    WouldMove { destination: PathBuf },
    Skipped { reason: SkipReason },
    Failed { message: String },
}

/// What happened to one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileOutcome {
    pub source: PathBuf,
    /// The category the file was classified into, when it got that far.
    pub category: Option<String>,
    pub kind: OutcomeKind,
}

impl FileOutcome {
    fn failed(source: PathBuf, category: Option<String>, message: String) -> Self {
        Self {
            source,
            category,
            kind: OutcomeKind::Failed { message },
        }
    }

    /// One-line description used for progress reporting.
    pub fn message(&self) -> String {
        let name = display_name(&self.source);
        match &self.kind {
            OutcomeKind::Moved { destination } => {
                format!("Moved {name} -> {}", destination.display())
            }
            OutcomeKind::WouldMove { destination } => format!(
                "Would move {} -> {}",
                self.source.display(),
                destination.display()
            ),
            OutcomeKind::Skipped {
                reason: SkipReason::Duplicate { .. },
            } => format!("File skipped (duplicate): {name}"),
            OutcomeKind::Skipped {
                reason: SkipReason::AlreadyInPlace,
            } => format!("File already in place: {name}"),
            OutcomeKind::Failed { message } => message.clone(),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.kind, OutcomeKind::Failed { .. })
    }
}

impl fmt::Display for FileOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

/// What became of the run's undo log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UndoLogStatus {
    Saved(PathBuf),
    /// Dry run, logging disabled, or nothing was moved.
    NotNeeded,
    /// The moves happened but the log could not be written.
    Failed(String),
}

/// The result of [`MoveEngine::organize`].
#[derive(Debug, Clone)]
pub struct OrganizeReport {
    pub stats: RunStatistics,
    /// One entry per processed file, in processing order.
    pub outcomes: Vec<FileOutcome>,
    pub dry_run: bool,
    /// Set when the run stopped early on request.
    pub cancelled: bool,
    pub undo_log: UndoLogStatus,
}

impl OrganizeReport {
    /// Moved (or, in a dry run, planned) files per category.
    pub fn category_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for outcome in &self.outcomes {
            let placed = matches!(
                outcome.kind,
                OutcomeKind::Moved { .. } | OutcomeKind::WouldMove { .. }
            );
            if placed && let Some(category) = &outcome.category {
                *counts.entry(category.clone()).or_insert(0) += 1;
            }
        }
        counts
    }
}

/// An entry found while walking the source folder.
enum Candidate {
    File(PathBuf),
    Unreadable { path: PathBuf, message: String },
}

/// Sorts files from a source folder into a destination tree.
pub struct MoveEngine<'a> {
    rules: &'a RuleSet,
    settings: &'a Settings,
    filters: &'a CompiledFilters,
}

impl<'a> MoveEngine<'a> {
    pub fn new(rules: &'a RuleSet, settings: &'a Settings, filters: &'a CompiledFilters) -> Self {
        Self {
            rules,
            settings,
            filters,
        }
    }

    /// Organizes every eligible file below `source_root` into
    /// `destination_root`.
    ///
    /// In a dry run nothing on disk changes: no directories, no moves, no undo
    /// log. Otherwise each move is recorded and the log is written to
    /// `settings.undo_log_dir` at the end, even if the run was cancelled.
    ///
    /// # Errors
    ///
    /// Only fails when `source_root` is not an existing directory. Everything
    /// else is reported per file in the returned report.
    pub fn organize(
        &self,
        source_root: &Path,
        destination_root: &Path,
        dry_run: bool,
        cancel: &CancellationToken,
        progress: &mut dyn ProgressSink,
    ) -> OrganizeResult<OrganizeReport> {
        if !source_root.is_dir() {
            return Err(OrganizeError::InvalidSourceRoot(source_root.to_path_buf()));
        }
        let source_root = std::path::absolute(source_root)
            .map_err(|_| OrganizeError::InvalidSourceRoot(source_root.to_path_buf()))?;
        let destination_root = std::path::absolute(destination_root)
            .unwrap_or_else(|_| destination_root.to_path_buf());

        log::info!(
            "Organizing {} into {}{}",
            source_root.display(),
            destination_root.display(),
            if dry_run { " (dry run)" } else { "" }
        );

        let started = Local::now();
        let classifier = Classifier::new(self.rules)
            .with_date_grouping(self.settings.organize_by_date)
            .with_content_detection(self.settings.detect_missing_extensions);

        let candidates = self.collect_candidates(&source_root, &destination_root);
        let total = candidates.len();

        let mut stats = RunStatistics::default();
        let mut outcomes = Vec::with_capacity(total);
        let mut undo_log = UndoLog::new(started);
        let mut claimed = HashSet::new();
        let mut cancelled = false;

        for (index, candidate) in candidates.into_iter().enumerate() {
            if cancel.is_cancelled() {
                log::info!("Organize cancelled after {index} of {total} files");
                cancelled = true;
                break;
            }

            let outcome = match candidate {
                Candidate::File(path) => {
                    self.process_file(&classifier, &path, &destination_root, dry_run, &mut claimed)
                }
                Candidate::Unreadable { path, message } => FileOutcome::failed(path, None, message),
            };

            match &outcome.kind {
                OutcomeKind::Moved { destination } => {
                    stats.moved += 1;
                    if self.settings.create_undo_log {
                        undo_log.push(MoveOperation::new(
                            outcome.source.clone(),
                            destination.clone(),
                        ));
                    }
                }
                OutcomeKind::WouldMove { .. } => stats.planned += 1,
                OutcomeKind::Skipped { .. } => stats.skipped += 1,
                OutcomeKind::Failed { message } => {
                    log::warn!("{message}");
                    stats.errors += 1;
                }
            }

            log::debug!("{outcome}");
            progress.on_progress(index + 1, total, &outcome.message());
            outcomes.push(outcome);
        }

        let undo_log_status = if dry_run || undo_log.is_empty() {
            UndoLogStatus::NotNeeded
        } else {
            match undo_log.save(&self.settings.undo_log_dir) {
                Ok(path) => UndoLogStatus::Saved(path),
                Err(e) => {
                    log::warn!("Could not save undo log: {e}");
                    UndoLogStatus::Failed(e.to_string())
                }
            }
        };

        log::info!(
            "Organize finished: {} moved, {} planned, {} skipped, {} errors",
            stats.moved,
            stats.planned,
            stats.skipped,
            stats.errors
        );

        Ok(OrganizeReport {
            stats,
            outcomes,
            dry_run,
            cancelled,
            undo_log: undo_log_status,
        })
    }

    /// Lists eligible files in a stable order, leaving out the destination
    /// tree when it lies inside the source.
    fn collect_candidates(&self, source_root: &Path, destination_root: &Path) -> Vec<Candidate> {
        let destination = fs::canonicalize(destination_root).ok();
        let is_destination = |path: &Path| {
            destination
                .as_deref()
                .is_some_and(|dest| fs::canonicalize(path).is_ok_and(|p| p == dest))
        };

        let walker = WalkDir::new(source_root)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !(entry.file_type().is_dir() && is_destination(entry.path())));

        let mut candidates = Vec::new();
        for entry in walker {
            match entry {
                Ok(entry) if is_movable_file(&entry) => {
                    let relative = entry
                        .path()
                        .strip_prefix(source_root)
                        .unwrap_or_else(|_| entry.path());
                    if self.filters.should_include(relative) {
                        candidates.push(Candidate::File(entry.into_path()));
                    } else {
                        log::debug!("Ignoring {}", entry.path().display());
                    }
                }
                Ok(entry) if entry.file_type().is_symlink() => {
                    log::debug!(
                        "Skipping symlink {}: target is not a file",
                        entry.path().display()
                    );
                }
                Ok(_) => {}
                Err(e) => {
                    let path = e
                        .path()
                        .map(Path::to_path_buf)
                        .unwrap_or_else(|| source_root.to_path_buf());
                    let message = format!("Error reading {}: {e}", path.display());
                    candidates.push(Candidate::Unreadable { path, message });
                }
            }
        }
        candidates
    }

    fn process_file(
        &self,
        classifier: &Classifier<'_>,
        path: &Path,
        destination_root: &Path,
        dry_run: bool,
        claimed: &mut HashSet<PathBuf>,
    ) -> FileOutcome {
        let classification = classifier.classify(path);
        let category = Some(classification.category.clone());
        let name = display_name(path);

        let Some(file_name) = path.file_name() else {
            return FileOutcome::failed(
                path.to_path_buf(),
                category,
                format!("Error moving {name}: path has no file name"),
            );
        };
        let target_dir = path_resolver::resolve(destination_root, &classification);
        let proposed = target_dir.join(file_name);

        if proposed == path {
            return FileOutcome {
                source: path.to_path_buf(),
                category,
                kind: OutcomeKind::Skipped {
                    reason: SkipReason::AlreadyInPlace,
                },
            };
        }

        let policy = self.settings.handle_duplicates;
        let resolution = if dry_run {
            collision::resolve(&proposed, policy, |p| p.exists() || claimed.contains(p))
        } else {
            collision::resolve(&proposed, policy, |p| p.exists())
        };

        let destination = match resolution {
            Ok(Resolution::Place(destination)) => destination,
            Ok(Resolution::Skip { existing }) => {
                return FileOutcome {
                    source: path.to_path_buf(),
                    category,
                    kind: OutcomeKind::Skipped {
                        reason: SkipReason::Duplicate { existing },
                    },
                };
            }
            Err(e) => {
                return FileOutcome::failed(
                    path.to_path_buf(),
                    category,
                    format!("Error moving {name}: {}", OrganizeError::from(e)),
                );
            }
        };

        // Every move must be representable in the undo log.
        if self.settings.create_undo_log
            && let Some(unrecordable) = [path, destination.as_path()]
                .into_iter()
                .find(|p| p.to_str().is_none())
        {
            return FileOutcome::failed(
                path.to_path_buf(),
                category,
                format!(
                    "Error moving {name}: {}",
                    OrganizeError::Unrecordable(unrecordable.to_path_buf())
                ),
            );
        }

        if dry_run {
            claimed.insert(destination.clone());
            return FileOutcome {
                source: path.to_path_buf(),
                category,
                kind: OutcomeKind::WouldMove { destination },
            };
        }

        match place_file(path, &target_dir, &destination, policy) {
            Ok(()) => FileOutcome {
                source: path.to_path_buf(),
                category,
                kind: OutcomeKind::Moved { destination },
            },
            Err(e) => FileOutcome::failed(
                path.to_path_buf(),
                category,
                format!("Error moving {name}: {e}"),
            ),
        }
    }
}

/// Regular files, plus symlinks that resolve to one. The link itself is what
/// gets moved.
fn is_movable_file(entry: &walkdir::DirEntry) -> bool {
    let file_type = entry.file_type();
    file_type.is_file() || (file_type.is_symlink() && entry.path().is_file())
}

fn place_file(
    source: &Path,
    target_dir: &Path,
    destination: &Path,
    policy: DuplicatePolicy,
) -> OrganizeResult<()> {
    fs::create_dir_all(target_dir).map_err(|source| OrganizeError::DirectoryCreationFailed {
        path: target_dir.to_path_buf(),
        source,
    })?;

    if policy == DuplicatePolicy::Overwrite && destination.is_file() {
        log::debug!("Overwriting {}", destination.display());
    }

    move_file(source, destination).map_err(|e| OrganizeError::MoveFailed {
        from: source.to_path_buf(),
        to: destination.to_path_buf(),
        source: e,
    })
}

/// Moves a file, falling back to copy and delete when a plain rename is not
/// possible (different filesystems).
pub fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) if matches!(e.kind(), ErrorKind::CrossesDevices) => {
            fs::copy(from, to)?;
            fs::remove_file(from)
        }
        Err(e) => Err(e),
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
