//! Undo log files: one JSON array of moves per organize run.
//!
//! ```json
//! [
//!   {
//!     "timestamp": "2024-03-01T10:15:02.123456+01:00",
//!     "source": "/home/me/Downloads/a.jpg",
//!     "destination": "/home/me/Organized Files/Images/2023/05/a.jpg",
//!     "action": "move"
//!   }
//! ]
//! ```

use crate::collision::next_free_name;
use crate::error::{UndoError, UndoLogError};
use chrono::{DateTime, Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Reverse;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

pub const UNDO_LOG_PREFIX: &str = "undo_log_";
pub const UNDO_LOG_SUFFIX: &str = ".json";
/// `chrono` format of the timestamp embedded in log file names.
pub const LOG_NAME_FORMAT: &str = "%Y%m%d_%H%M%S";
/// The only action the organizer records.
pub const ACTION_MOVE: &str = "move";

/// One file move, as recorded in the undo log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveOperation {
    /// RFC 3339 time of the move.
    pub timestamp: String,
    pub source: PathBuf,
    pub destination: PathBuf,
    pub action: String,
}

impl MoveOperation {
    /// Records a move that just happened.
    pub fn new(source: PathBuf, destination: PathBuf) -> Self {
        Self {
            timestamp: Local::now().to_rfc3339(),
            source,
            destination,
            action: ACTION_MOVE.to_string(),
        }
    }
}

/// The moves of a single run, in the order they were made.
#[derive(Debug, Clone)]
pub struct UndoLog {
    started: DateTime<Local>,
    operations: Vec<MoveOperation>,
}

impl UndoLog {
    /// Creates an empty log for a run that started at `started`.
    pub fn new(started: DateTime<Local>) -> Self {
        Self {
            started,
            operations: Vec::new(),
        }
    }

    pub fn push(&mut self, operation: MoveOperation) {
        self.operations.push(operation);
    }

    pub fn operations(&self) -> &[MoveOperation] {
        &self.operations
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// `undo_log_YYYYMMDD_HHMMSS.json` for the run start.
    pub fn file_name(&self) -> String {
        format!(
            "{UNDO_LOG_PREFIX}{}{UNDO_LOG_SUFFIX}",
            self.started.format(LOG_NAME_FORMAT)
        )
    }

    /// Writes the log into `dir` as pretty-printed JSON and returns its path.
    ///
    /// The directory is created if needed. An existing log with the same name is
    /// never overwritten; the new one gets a `_1`, `_2`, ... suffix instead.
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be serialized or written.
    pub fn save(&self, dir: &Path) -> Result<PathBuf, UndoLogError> {
        let json = serde_json::to_string_pretty(&self.operations)?;

        fs::create_dir_all(dir).map_err(|source| UndoLogError::Write {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut path = dir.join(self.file_name());
        if path.exists() {
            path = next_free_name(&path, |p| p.exists())?;
        }

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|source| UndoLogError::Write {
                path: path.clone(),
                source,
            })?;
        file.write_all(json.as_bytes())
            .map_err(|source| UndoLogError::Write {
                path: path.clone(),
                source,
            })?;

        log::info!(
            "Saved undo log with {} operations to {}",
            self.operations.len(),
            path.display()
        );
        Ok(path)
    }
}

/// Reads the raw entries of a log file.
///
/// Entries are returned unparsed so that one malformed entry can be reported
/// on its own without rejecting the whole log.
///
/// # Errors
///
/// Fails when the file cannot be read, is not a JSON array, or is empty.
pub fn read_entries(path: &Path) -> Result<Vec<Value>, UndoError> {
    let contents = fs::read_to_string(path).map_err(|source| UndoError::Unreadable {
        path: path.to_path_buf(),
        source,
    })?;

    let value: Value = serde_json::from_str(&contents).map_err(|e| UndoError::Invalid {
        path: path.to_path_buf(),
        reason: format!("JSON parse error: {e}"),
    })?;

    let Value::Array(entries) = value else {
        return Err(UndoError::Invalid {
            path: path.to_path_buf(),
            reason: "expected a list of operations".to_string(),
        });
    };

    if entries.is_empty() {
        return Err(UndoError::Empty(path.to_path_buf()));
    }
    Ok(entries)
}

/// Whether a file name looks like an undo log.
pub fn is_undo_log_name(name: &str) -> bool {
    name.starts_with(UNDO_LOG_PREFIX) && name.ends_with(UNDO_LOG_SUFFIX)
}

/// Undo logs in `dir`, most recent first.
///
/// A missing or unreadable directory yields an empty list.
pub fn list_undo_logs(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut logs: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(is_undo_log_name)
        })
        .collect();

    logs.sort_by_cached_key(|path| Reverse(log_order_key(path)));
    logs
}

/// Run stamp plus numeric collision suffix, so `_10` sorts after `_2`.
fn log_order_key(path: &Path) -> (String, u32) {
    let stem = path
        .file_name()
        .and_then(|name| name.to_str())
        .and_then(|name| name.strip_prefix(UNDO_LOG_PREFIX))
        .and_then(|name| name.strip_suffix(UNDO_LOG_SUFFIX))
        .unwrap_or_default();
    let split = if stem.is_char_boundary(15) { 15 } else { stem.len() };
    let (stamp, suffix) = stem.split_at(split);
    let counter = suffix
        .strip_prefix('_')
        .and_then(|n| n.parse().ok())
        .unwrap_or(0);
    (stamp.to_string(), counter)
}

/// The run start encoded in a log's file name, if it has one.
///
/// ```
/// use dirsort::undo_log::log_started_at;
/// use std::path::Path;
///
/// let started = log_started_at(Path::new("undo_log_20240301_101502_1.json")).unwrap();
/// assert_eq!(started.to_string(), "2024-03-01 10:15:02");
/// ```
pub fn log_started_at(path: &Path) -> Option<NaiveDateTime> {
    let name = path.file_name()?.to_str()?;
    let stamp = name
        .strip_prefix(UNDO_LOG_PREFIX)?
        .strip_suffix(UNDO_LOG_SUFFIX)?;
    // "YYYYMMDD_HHMMSS" is 15 bytes; anything after is a collision suffix.
    let stamp = stamp.get(..15)?;
    NaiveDateTime::parse_from_str(stamp, LOG_NAME_FORMAT).ok()
}
