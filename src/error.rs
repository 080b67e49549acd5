//! Error types for every stage of a sorting run.
//!
//! Only whole-run failures surface as `Err`. Per-file and per-operation failures
//! are folded into the run reports instead (see `organizer` and `undo`).

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading or saving the configuration file.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file not found at the specified path.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The file exists but could not be read or written.
    #[error("IO error on configuration {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid TOML syntax or structure.
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    /// Invalid glob pattern in the filter section.
    #[error("Invalid glob pattern '{0}': expected *.ext or dir/**")]
    InvalidGlobPattern(String),

    /// Invalid regex pattern in the filter section.
    #[error("Invalid regex pattern '{pattern}': {reason}")]
    InvalidRegexPattern { pattern: String, reason: String },
}

/// Errors that abort a whole organize run before any file is touched.
///
/// Per-file failures use the same type but are caught and recorded as
/// outcomes by the engine.
#[derive(Error, Debug)]
pub enum OrganizeError {
    /// The source root does not exist or is not a directory.
    #[error("Source folder does not exist: {}", .0.display())]
    InvalidSourceRoot(PathBuf),

    /// Failed to create a destination directory.
    #[error("Failed to create directory {}: {source}", .path.display())]
    DirectoryCreationFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to move a file into place.
    #[error("Failed to move {} to {}: {source}", .from.display(), .to.display())]
    MoveFailed {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The path cannot be written to the undo log, so the file is not moved.
    #[error("{} is not valid UTF-8 and cannot be recorded in the undo log", .0.display())]
    Unrecordable(PathBuf),

    /// The collision resolver could not produce a usable name.
    #[error(transparent)]
    Collision(#[from] CollisionError),
}

/// Errors from the duplicate-name resolver.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CollisionError {
    /// Every numbered candidate up to the cap already exists.
    #[error("No free name for {} after {attempts} attempts", .path.display())]
    Exhausted { path: PathBuf, attempts: u32 },

    /// The proposed path has no file name to number.
    #[error("Path has no file name: {}", .0.display())]
    NoFileName(PathBuf),
}

/// Errors writing an undo log artifact.
#[derive(Error, Debug)]
pub enum UndoLogError {
    #[error("Failed to write undo log {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize undo log: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error(transparent)]
    Naming(#[from] CollisionError),
}

/// Errors that abort an undo before any file is restored.
#[derive(Error, Debug)]
pub enum UndoError {
    /// The log file could not be read.
    #[error("Could not load undo log {}: {source}", .path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The log file is not a JSON list of operations.
    #[error("Invalid undo log {}: {reason}", .path.display())]
    Invalid { path: PathBuf, reason: String },

    /// The log holds no operations.
    #[error("Undo log is empty: {}", .0.display())]
    Empty(PathBuf),
}

/// Result type for organize operations.
pub type OrganizeResult<T> = Result<T, OrganizeError>;
