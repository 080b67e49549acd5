//! What happens when a destination name is already taken.

use crate::error::CollisionError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Upper bound on `name_N` probes before giving up on a file.
pub const MAX_RENAME_ATTEMPTS: u32 = 10_000;

/// How a name collision at the destination is handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    /// Keep both files; the incoming one gets a `_1`, `_2`, ... suffix.
    #[default]
    Rename,
    /// Leave the source file where it is.
    Skip,
    /// Replace the existing file.
    Overwrite,
}

impl DuplicatePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rename => "rename",
            Self::Skip => "skip",
            Self::Overwrite => "overwrite",
        }
    }
}

impl fmt::Display for DuplicatePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DuplicatePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "rename" => Ok(Self::Rename),
            "skip" => Ok(Self::Skip),
            "overwrite" => Ok(Self::Overwrite),
            other => Err(format!(
                "unknown duplicate policy '{other}' (expected rename, skip or overwrite)"
            )),
        }
    }
}

/// Final decision for one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Move the file to this path.
    Place(PathBuf),
    /// Do not move the file; `existing` already occupies its destination.
    Skip { existing: PathBuf },
}

/// Decides where a file goes given a proposed destination and the policy.
///
/// `exists` answers whether a path is taken. A real run passes a filesystem
/// check; a dry run also counts targets it has already planned.
///
/// # Errors
///
/// With [`DuplicatePolicy::Rename`], fails when the proposed path has no file
/// name or when [`MAX_RENAME_ATTEMPTS`] numbered names are all taken.
pub fn resolve<F>(
    proposed: &Path,
    policy: DuplicatePolicy,
    exists: F,
) -> Result<Resolution, CollisionError>
where
    F: Fn(&Path) -> bool,
{
    if !exists(proposed) {
        return Ok(Resolution::Place(proposed.to_path_buf()));
    }

    match policy {
        DuplicatePolicy::Skip => Ok(Resolution::Skip {
            existing: proposed.to_path_buf(),
        }),
        DuplicatePolicy::Overwrite => Ok(Resolution::Place(proposed.to_path_buf())),
        DuplicatePolicy::Rename => next_free_name(proposed, exists).map(Resolution::Place),
    }
}

/// Probes `stem_1.ext`, `stem_2.ext`, ... next to `path` until one is free.
///
/// ```
/// use dirsort::collision::next_free_name;
/// use std::path::Path;
///
/// let taken = [Path::new("/d/photo.jpg"), Path::new("/d/photo_1.jpg")];
/// let free = next_free_name(Path::new("/d/photo.jpg"), |p| taken.iter().any(|t| *t == p)).unwrap();
/// assert_eq!(free, Path::new("/d/photo_2.jpg"));
/// ```
///
/// # Errors
///
/// Fails when `path` has no file name or every candidate up to
/// [`MAX_RENAME_ATTEMPTS`] is taken.
pub fn next_free_name<F>(path: &Path, exists: F) -> Result<PathBuf, CollisionError>
where
    F: Fn(&Path) -> bool,
{
    let stem = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .ok_or_else(|| CollisionError::NoFileName(path.to_path_buf()))?;
    let extension = path
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default();
    let parent = path.parent().unwrap_or_else(|| Path::new(""));

    for counter in 1..=MAX_RENAME_ATTEMPTS {
        let candidate = parent.join(format!("{stem}_{counter}{extension}"));
        if !exists(&candidate) {
            return Ok(candidate);
        }
    }

    Err(CollisionError::Exhausted {
        path: path.to_path_buf(),
        attempts: MAX_RENAME_ATTEMPTS,
    })
}
