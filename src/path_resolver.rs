//! Turns a classification into a destination directory.

use crate::classifier::ClassificationResult;
use std::path::{Path, PathBuf};

/// Builds `destination_root/category[/sub_bucket][/date...]`.
///
/// A date segment such as `2023/05` becomes one folder per `/`-separated
/// piece. The directory is not created here.
///
/// ```
/// use dirsort::classifier::ClassificationResult;
/// use dirsort::path_resolver::resolve;
/// use std::path::Path;
///
/// let result = ClassificationResult {
///     category: "Images".to_string(),
///     sub_bucket: None,
///     date_segment: Some("2023/05".to_string()),
/// };
/// assert_eq!(
///     resolve(Path::new("/sorted"), &result),
///     Path::new("/sorted/Images/2023/05")
/// );
/// ```
pub fn resolve(destination_root: &Path, classification: &ClassificationResult) -> PathBuf {
    let mut dir = destination_root.join(&classification.category);

    if let Some(sub_bucket) = &classification.sub_bucket {
        dir.push(sub_bucket);
    }

    if let Some(segment) = &classification.date_segment {
        for part in segment.split('/').filter(|part| !part.is_empty()) {
            dir.push(part);
        }
    }

    dir
}
