//! Resolves a file to its category, sub-bucket and date segment.

use crate::rules::{OTHER_CATEGORY, RuleSet};
use chrono::{DateTime, Local, NaiveDate, TimeZone};
use std::fs::{self, File};
use std::io::BufReader;
use std::path::Path;

/// Extensions whose containers may carry EXIF capture dates.
const EXIF_EXTENSIONS: &[&str] = &[
    ".jpg", ".jpeg", ".tif", ".tiff", ".png", ".webp", ".heic", ".heif",
];

/// Where a file belongs, before it is turned into a concrete path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationResult {
    /// Category folder name, or [`OTHER_CATEGORY`].
    pub category: String,
    pub sub_bucket: Option<String>,
    /// Formatted date, possibly spanning several folders (`2023/05`).
    pub date_segment: Option<String>,
}

impl ClassificationResult {
    /// The result for files that match no rule.
    pub fn other() -> Self {
        Self {
            category: OTHER_CATEGORY.to_string(),
            sub_bucket: None,
            date_segment: None,
        }
    }
}

/// Returns the lookup key for a path: its lower-cased extension with a
/// leading dot, or an empty string when there is none.
///
/// ```
/// use dirsort::classifier::extension_key;
/// use std::path::Path;
///
/// assert_eq!(extension_key(Path::new("photo.JPG")), ".jpg");
/// assert_eq!(extension_key(Path::new("backup.tar.gz")), ".gz");
/// assert_eq!(extension_key(Path::new("README")), "");
/// ```
pub fn extension_key(path: &Path) -> String {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .filter(|ext| !ext.is_empty())
        .map(|ext| format!(".{ext}"))
        .unwrap_or_default()
}

/// Applies a [`RuleSet`] to files.
#[derive(Debug, Clone, Copy)]
pub struct Classifier<'a> {
    rules: &'a RuleSet,
    date_grouping: bool,
    content_detection: bool,
}

impl<'a> Classifier<'a> {
    /// Creates a classifier with date grouping on and content detection off.
    pub fn new(rules: &'a RuleSet) -> Self {
        Self {
            rules,
            date_grouping: true,
            content_detection: false,
        }
    }

    /// Globally allows or suppresses date segments, whatever the rules say.
    pub fn with_date_grouping(mut self, enabled: bool) -> Self {
        self.date_grouping = enabled;
        self
    }

    /// When enabled, files without an extension are sniffed with `infer` and
    /// classified by the detected type.
    pub fn with_content_detection(mut self, enabled: bool) -> Self {
        self.content_detection = enabled;
        self
    }

    /// Classifies a file on disk.
    ///
    /// Never fails: metadata problems fall back to the current time for the
    /// date segment and to [`OTHER_CATEGORY`] for unknown types.
    pub fn classify(&self, path: &Path) -> ClassificationResult {
        let key = self.key_for(path);
        self.classify_key(&key, || reference_time(path))
    }

    /// The extension key used for `path`, after optional content detection.
    pub fn key_for(&self, path: &Path) -> String {
        let key = extension_key(path);
        if key.is_empty()
            && self.content_detection
            && let Some(detected) = detect_extension(path)
        {
            log::debug!("Detected {} as {detected}", path.display());
            return detected;
        }
        key
    }

    /// Classifies an extension key. `timestamp` is only called when the
    /// matching rule groups by date.
    pub fn classify_key<F>(&self, key: &str, timestamp: F) -> ClassificationResult
    where
        F: FnOnce() -> DateTime<Local>,
    {
        let Some(rule) = self.rules.find(key) else {
            return ClassificationResult::other();
        };

        let date_segment = match &rule.date_grouping {
            Some(grouping) if self.date_grouping => Some(grouping.format(&timestamp())),
            _ => None,
        };

        ClassificationResult {
            category: rule.name.clone(),
            sub_bucket: rule.sub_bucket_for(key).map(str::to_string),
            date_segment,
        }
    }
}

/// The timestamp a file is filed under.
///
/// Prefers the EXIF capture time, then the modification time, then now.
/// Creation time is never consulted.
pub fn reference_time(path: &Path) -> DateTime<Local> {
    capture_time(path)
        .or_else(|| modified_time(path))
        .unwrap_or_else(Local::now)
}

/// Last modification time, if the filesystem reports one.
pub fn modified_time(path: &Path) -> Option<DateTime<Local>> {
    fs::metadata(path)
        .and_then(|metadata| metadata.modified())
        .ok()
        .map(DateTime::<Local>::from)
}

/// Reads `DateTimeOriginal` (or `DateTime`) from an image's EXIF block.
pub fn capture_time(path: &Path) -> Option<DateTime<Local>> {
    if !EXIF_EXTENSIONS.contains(&extension_key(path).as_str()) {
        return None;
    }

    let file = File::open(path).ok()?;
    let mut reader = BufReader::new(file);
    let exif = exif::Reader::new().read_from_container(&mut reader).ok()?;

    let raw = [exif::Tag::DateTimeOriginal, exif::Tag::DateTime]
        .into_iter()
        .find_map(|tag| {
            let field = exif.get_field(tag, exif::In::PRIMARY)?;
            match &field.value {
                exif::Value::Ascii(values) => values
                    .first()
                    .and_then(|value| exif::DateTime::from_ascii(value).ok()),
                _ => None,
            }
        })?;

    // Cameras write zeros when the clock was never set; from_ymd_opt rejects those.
    let naive = NaiveDate::from_ymd_opt(raw.year.into(), raw.month.into(), raw.day.into())?
        .and_hms_opt(raw.hour.into(), raw.minute.into(), raw.second.into())?;
    Local.from_local_datetime(&naive).earliest()
}

fn detect_extension(path: &Path) -> Option<String> {
    infer::get_from_path(path)
        .ok()
        .flatten()
        .map(|kind| format!(".{}", kind.extension()))
}
