//! Category rules: which extensions land in which folder.
//!
//! A [`RuleSet`] is an ordered list of [`Rule`]s. Lookups scan the list in
//! order and the first rule containing an extension wins, so the order of the
//! rules is part of their meaning and is kept exactly as loaded.
//!
//! # Examples
//!
//! ```
//! use dirsort::rules::RuleSet;
//!
//! let rules = RuleSet::default();
//! assert_eq!(rules.classify(".jpg"), "Images");
//! assert_eq!(rules.classify(".PDF"), "Documents");
//! assert_eq!(rules.classify(".xyz"), "Other");
//! ```

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, TimeZone};
use serde::Deserialize;
use std::fmt;

/// Category name used for files that match no rule.
pub const OTHER_CATEGORY: &str = "Other";

/// Date pattern used when a rule enables date grouping without naming one.
pub const DEFAULT_DATE_FORMAT: &str = "%Y/%m";

/// A validated `strftime` pattern made only of numeric fields and literals.
///
/// Month or weekday names, AM/PM markers and zone names are rejected, which
/// keeps the produced folder names independent of locale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateGrouping {
    pattern: String,
}

impl DateGrouping {
    /// Validates `pattern` and wraps it.
    ///
    /// # Errors
    ///
    /// Returns a human-readable reason if the pattern is empty, malformed or
    /// uses a non-numeric field.
    pub fn new(pattern: &str) -> Result<Self, String> {
        if pattern.trim().is_empty() {
            return Err("date format is empty".to_string());
        }

        for item in StrftimeItems::new(pattern) {
            match item {
                Item::Error => return Err(format!("invalid date format '{pattern}'")),
                Item::Fixed(_) => {
                    return Err(format!(
                        "date format '{pattern}' uses a non-numeric field"
                    ));
                }
                _ => {}
            }
        }

        if pattern.split('/').any(|part| part == "..") {
            return Err(format!("date format '{pattern}' escapes its folder"));
        }

        Ok(Self {
            pattern: pattern.to_string(),
        })
    }

    /// The raw pattern, as written in the configuration.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Formats a timestamp into a folder segment such as `2023/05`.
    pub fn format<Tz>(&self, timestamp: &DateTime<Tz>) -> String
    where
        Tz: TimeZone,
        Tz::Offset: fmt::Display,
    {
        timestamp.format(&self.pattern).to_string()
    }
}

impl Default for DateGrouping {
    fn default() -> Self {
        Self {
            pattern: DEFAULT_DATE_FORMAT.to_string(),
        }
    }
}

/// A named group of extensions inside a category.
///
/// A bucket with no extensions is a catch-all for the rest of its category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubBucket {
    pub name: String,
    pub extensions: Vec<String>,
}

impl SubBucket {
    pub fn new(name: &str, extensions: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            extensions: normalize_extensions(extensions.iter().copied()),
        }
    }

    pub fn is_catch_all(&self) -> bool {
        self.extensions.is_empty()
    }

    fn contains(&self, key: &str) -> bool {
        self.extensions.iter().any(|ext| ext == key)
    }
}

/// One category and how files in it are placed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    /// Folder name of the category, case-normalized.
    pub name: String,
    /// Lower-case extensions with their leading dot.
    pub extensions: Vec<String>,
    /// Ordered sub-buckets, if the category is split further.
    pub sub_buckets: Option<Vec<SubBucket>>,
    /// Date nesting, if enabled for this category.
    pub date_grouping: Option<DateGrouping>,
}

impl Rule {
    /// Creates a rule with normalized name and extensions.
    pub fn new(name: &str, extensions: &[&str]) -> Self {
        Self {
            name: normalize_category_name(name),
            extensions: normalize_extensions(extensions.iter().copied()),
            sub_buckets: None,
            date_grouping: None,
        }
    }

    /// Appends a sub-bucket after the existing ones.
    pub fn with_sub_bucket(mut self, name: &str, extensions: &[&str]) -> Self {
        self.sub_buckets
            .get_or_insert_with(Vec::new)
            .push(SubBucket::new(name, extensions));
        self
    }

    pub fn with_date_grouping(mut self, grouping: DateGrouping) -> Self {
        self.date_grouping = Some(grouping);
        self
    }

    /// Returns true if the extension key (e.g. `.jpg`) belongs to this rule.
    pub fn matches(&self, key: &str) -> bool {
        let key = key.to_lowercase();
        self.extensions.iter().any(|ext| *ext == key)
    }

    /// Picks the sub-bucket for an extension key.
    ///
    /// The first bucket listing the extension wins; otherwise the first
    /// catch-all bucket; otherwise none.
    pub fn sub_bucket_for(&self, key: &str) -> Option<&str> {
        let buckets = self.sub_buckets.as_ref()?;
        let key = key.to_lowercase();

        buckets
            .iter()
            .find(|bucket| bucket.contains(&key))
            .or_else(|| buckets.iter().find(|bucket| bucket.is_catch_all()))
            .map(|bucket| bucket.name.as_str())
    }
}

/// A rule entry that could not be loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRule {
    /// The key of the entry in the configuration.
    pub key: String,
    pub reason: String,
}

/// Result of loading rules from configuration: the usable rules plus what was
/// dropped.
#[derive(Debug, Clone)]
pub struct LoadedRules {
    pub rules: RuleSet,
    pub skipped: Vec<SkippedRule>,
}

/// Persisted shape of a single rule entry.
#[derive(Debug, Deserialize)]
struct RuleEntry {
    extensions: Vec<String>,
    #[serde(default)]
    subfolder_by_date: bool,
    #[serde(default)]
    date_format: Option<String>,
    #[serde(default)]
    subfolders: Option<toml::Table>,
}

/// Ordered collection of category rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    /// Creates a rule set from rules in priority order.
    ///
    /// A rule whose normalized name repeats an earlier one is dropped.
    pub fn new(rules: Vec<Rule>) -> Self {
        let mut set = Self::empty();
        for rule in rules {
            if set.get(&rule.name).is_none() {
                set.rules.push(rule);
            }
        }
        set
    }

    /// A rule set with no rules; every file becomes [`OTHER_CATEGORY`].
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Looks a rule up by category name, ignoring case.
    pub fn get(&self, name: &str) -> Option<&Rule> {
        self.rules
            .iter()
            .find(|rule| rule.name.eq_ignore_ascii_case(name))
    }

    /// Returns the first rule whose extensions contain `key`.
    pub fn find(&self, key: &str) -> Option<&Rule> {
        let key = key.to_lowercase();
        self.rules
            .iter()
            .find(|rule| rule.extensions.iter().any(|ext| *ext == key))
    }

    /// Maps an extension key such as `.jpg` to a category name.
    ///
    /// Comparison is case-insensitive and includes the leading dot. Unknown
    /// extensions, and the empty key, map to [`OTHER_CATEGORY`].
    pub fn classify(&self, key: &str) -> &str {
        self.find(key)
            .map(|rule| rule.name.as_str())
            .unwrap_or(OTHER_CATEGORY)
    }

    /// Builds a rule set from the `[rules]` table of a configuration file.
    ///
    /// Each entry is converted on its own. Entries that fail are logged,
    /// reported in [`LoadedRules::skipped`] and left out; they never fail the
    /// whole set.
    pub fn from_table(table: &toml::Table) -> LoadedRules {
        let mut rules = Self::empty();
        let mut skipped = Vec::new();

        for (key, value) in table {
            let outcome = rule_from_value(key, value).and_then(|rule| {
                if rules.get(&rule.name).is_some() {
                    Err(format!("duplicate category '{}'", rule.name))
                } else {
                    Ok(rule)
                }
            });

            match outcome {
                Ok(rule) => rules.rules.push(rule),
                Err(reason) => {
                    log::warn!("Skipping rule '{key}': {reason}");
                    skipped.push(SkippedRule {
                        key: key.clone(),
                        reason,
                    });
                }
            }
        }

        LoadedRules { rules, skipped }
    }

    /// Converts the rules back into a `[rules]` table, keeping their order.
    pub fn to_table(&self) -> toml::Table {
        let mut table = toml::Table::new();

        for rule in &self.rules {
            let mut entry = toml::Table::new();
            entry.insert(
                "extensions".to_string(),
                string_array(&rule.extensions),
            );
            entry.insert(
                "subfolder_by_date".to_string(),
                toml::Value::Boolean(rule.date_grouping.is_some()),
            );
            if let Some(grouping) = &rule.date_grouping {
                entry.insert(
                    "date_format".to_string(),
                    toml::Value::String(grouping.pattern().to_string()),
                );
            }
            if let Some(buckets) = &rule.sub_buckets {
                let mut subfolders = toml::Table::new();
                for bucket in buckets {
                    subfolders.insert(bucket.name.clone(), string_array(&bucket.extensions));
                }
                entry.insert("subfolders".to_string(), toml::Value::Table(subfolders));
            }

            table.insert(rule.name.to_lowercase(), toml::Value::Table(entry));
        }

        table
    }
}

impl Default for RuleSet {
    /// The built-in rules written to a fresh configuration file.
    fn default() -> Self {
        Self::new(vec![
            Rule::new(
                "Images",
                &[
                    ".jpg", ".jpeg", ".png", ".gif", ".bmp", ".tiff", ".svg", ".webp", ".ico",
                    ".heic",
                ],
            )
            .with_date_grouping(DateGrouping::default()),
            Rule::new(
                "Documents",
                &[".pdf", ".doc", ".docx", ".txt", ".rtf", ".odt", ".pages"],
            )
            .with_sub_bucket("PDFs", &[".pdf"])
            .with_sub_bucket("Word Documents", &[".doc", ".docx", ".odt"])
            .with_sub_bucket("Text Files", &[".txt", ".rtf"])
            .with_sub_bucket("Other Documents", &[]),
            Rule::new(
                "Office",
                &[
                    ".xls", ".xlsx", ".ppt", ".pptx", ".odp", ".ods", ".csv", ".numbers",
                    ".keynote",
                ],
            )
            .with_sub_bucket(
                "Spreadsheets",
                &[".xls", ".xlsx", ".ods", ".csv", ".numbers"],
            )
            .with_sub_bucket("Presentations", &[".ppt", ".pptx", ".odp", ".keynote"]),
            Rule::new(
                "Audio",
                &[".mp3", ".wav", ".flac", ".aac", ".ogg", ".wma", ".m4a"],
            ),
            Rule::new(
                "Video",
                &[".mp4", ".avi", ".mkv", ".mov", ".wmv", ".flv", ".webm", ".m4v"],
            )
            .with_date_grouping(DateGrouping {
                pattern: "%Y".to_string(),
            }),
            Rule::new(
                "Archives",
                &[".zip", ".rar", ".7z", ".tar", ".gz", ".bz2", ".xz"],
            ),
            Rule::new(
                "Development",
                &[
                    ".py", ".js", ".html", ".css", ".java", ".cpp", ".c", ".php", ".rb", ".go",
                    ".rs", ".swift",
                ],
            )
            .with_sub_bucket("Python", &[".py"])
            .with_sub_bucket("Web", &[".html", ".css", ".js"])
            .with_sub_bucket("Other Code", &[]),
            Rule::new(
                "Software",
                &[".exe", ".msi", ".dmg", ".pkg", ".deb", ".rpm", ".appimage"],
            ),
        ])
    }
}

/// Normalizes a category key: first character upper-case, the rest lower-case.
///
/// ```
/// use dirsort::rules::normalize_category_name;
///
/// assert_eq!(normalize_category_name("images"), "Images");
/// assert_eq!(normalize_category_name("OFFICE"), "Office");
/// ```
pub fn normalize_category_name(key: &str) -> String {
    let key = key.trim();
    let mut chars = key.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Lower-cases an extension and makes sure it starts with a dot.
///
/// ```
/// use dirsort::rules::normalize_extension;
///
/// assert_eq!(normalize_extension("JPG"), ".jpg");
/// assert_eq!(normalize_extension(".Tar"), ".tar");
/// ```
pub fn normalize_extension(ext: &str) -> String {
    let ext = ext.trim().to_lowercase();
    if ext.is_empty() || ext.starts_with('.') {
        ext
    } else {
        format!(".{ext}")
    }
}

fn normalize_extensions<'a>(extensions: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut normalized: Vec<String> = Vec::new();
    for ext in extensions.map(normalize_extension) {
        if !ext.is_empty() && !normalized.contains(&ext) {
            normalized.push(ext);
        }
    }
    normalized
}

fn string_array(values: &[String]) -> toml::Value {
    toml::Value::Array(values.iter().cloned().map(toml::Value::String).collect())
}

/// Rejects names that cannot be used as a single folder name.
fn validate_folder_name(name: &str) -> Result<(), String> {
    if name.trim().is_empty() || name == "." || name == ".." {
        return Err(format!("'{name}' is not a usable folder name"));
    }
    if name.contains(['/', '\\', '\0']) {
        return Err(format!("folder name '{name}' contains a path separator"));
    }
    Ok(())
}

fn rule_from_value(key: &str, value: &toml::Value) -> Result<Rule, String> {
    if !value.is_table() {
        return Err("expected a table".to_string());
    }

    let entry: RuleEntry = value.clone().try_into().map_err(|e| e.to_string())?;

    let name = normalize_category_name(key);
    validate_folder_name(&name)?;

    let mut rule = Rule {
        name,
        extensions: normalize_extensions(entry.extensions.iter().map(String::as_str)),
        sub_buckets: None,
        date_grouping: None,
    };

    if let Some(subfolders) = entry.subfolders {
        let mut buckets = Vec::with_capacity(subfolders.len());
        for (bucket_name, extensions) in subfolders {
            validate_folder_name(&bucket_name)?;
            let extensions: Vec<String> = extensions
                .try_into()
                .map_err(|_| format!("subfolder '{bucket_name}' must list extensions"))?;
            buckets.push(SubBucket {
                name: bucket_name,
                extensions: normalize_extensions(extensions.iter().map(String::as_str)),
            });
        }
        rule.sub_buckets = Some(buckets);
    }

    if entry.subfolder_by_date {
        let pattern = entry.date_format.as_deref().unwrap_or(DEFAULT_DATE_FORMAT);
        rule.date_grouping = Some(DateGrouping::new(pattern)?);
    }

    Ok(rule)
}
