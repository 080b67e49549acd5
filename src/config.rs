//! Configuration file loading and saving.
//!
//! Settings, filters and category rules live together in one TOML file:
//!
//! ```toml
//! [settings]
//! source_folder = "/home/me/Downloads"
//! destination_folder = "/home/me/Organized Files"
//! handle_duplicates = "rename"
//! create_undo_log = true
//! organize_by_date = true
//! undo_log_dir = "."
//!
//! [filters]
//! enable_hidden_files = false
//!
//! [rules.images]
//! extensions = [".jpg", ".png"]
//! subfolder_by_date = true
//! date_format = "%Y/%m"
//!
//! [rules.documents]
//! extensions = [".pdf", ".txt"]
//!
//! [rules.documents.subfolders]
//! PDFs = [".pdf"]
//! "Other Documents" = []
//! ```
//!
//! Configuration is read and written only through [`Config::load`],
//! [`Config::load_or_init`] and [`Config::save`]; nothing is cached globally.

use crate::collision::DuplicatePolicy;
use crate::error::ConfigError;
use crate::filters::FilterRules;
use crate::rules::{RuleSet, SkippedRule};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// File name looked up in the current directory.
pub const LOCAL_CONFIG_NAME: &str = ".dirsortrc.toml";

/// Run settings from the `[settings]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Folder scanned by `organize` when none is given on the command line.
    pub source_folder: PathBuf,
    /// Root of the organized tree.
    pub destination_folder: PathBuf,
    pub handle_duplicates: DuplicatePolicy,
    /// Stored for compatibility; the organizer never watches folders.
    pub auto_organize: bool,
    /// Seconds between scans when watching. Stored, never acted on.
    pub watch_interval: u64,
    /// Whether moves are recorded to an undo log.
    pub create_undo_log: bool,
    /// Master switch for date folders; when false no rule groups by date.
    pub organize_by_date: bool,
    /// Default for `organize` when `--dry-run` is not given.
    pub dry_run: bool,
    /// Where undo logs are written and looked up.
    pub undo_log_dir: PathBuf,
    /// Sniff the type of files that have no extension.
    pub detect_missing_extensions: bool,
}

impl Default for Settings {
    fn default() -> Self {
        let home = home_dir().unwrap_or_else(|| PathBuf::from("."));
        Self {
            source_folder: home.join("Downloads"),
            destination_folder: home.join("Organized Files"),
            handle_duplicates: DuplicatePolicy::Rename,
            auto_organize: false,
            watch_interval: 30,
            create_undo_log: true,
            organize_by_date: true,
            dry_run: false,
            undo_log_dir: PathBuf::from("."),
            detect_missing_extensions: true,
        }
    }
}

/// On-disk shape of the configuration file.
#[derive(Debug, Default, Serialize, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    settings: Settings,
    #[serde(default)]
    filters: FilterRules,
    /// Absent means the built-in rules; an empty table means no rules.
    #[serde(default)]
    rules: Option<toml::Table>,
}

/// A loaded configuration.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub settings: Settings,
    pub filters: FilterRules,
    pub rules: RuleSet,
    /// Rule entries that were present but could not be used.
    pub skipped_rules: Vec<SkippedRule>,
}

impl Config {
    /// Picks the configuration file to use.
    ///
    /// Tried in order:
    /// 1. `explicit`, if provided
    /// 2. `.dirsortrc.toml` in the current directory, if it exists
    /// 3. `~/.config/dirsort/config.toml`
    ///
    /// The home path is returned even when it does not exist yet, so that
    /// [`Config::load_or_init`] can create it.
    pub fn discover(explicit: Option<&Path>) -> PathBuf {
        if let Some(path) = explicit {
            return path.to_path_buf();
        }

        let local_config = PathBuf::from(LOCAL_CONFIG_NAME);
        if local_config.exists() {
            return local_config;
        }

        match home_dir() {
            Some(home) => home.join(".config").join("dirsort").join("config.toml"),
            None => local_config,
        }
    }

    /// Loads a configuration file.
    ///
    /// Missing sections and keys take their defaults. Malformed rule entries
    /// are skipped and listed in [`Config::skipped_rules`].
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NotFound` if the file does not exist,
    /// `ConfigError::Io` if it cannot be read and `ConfigError::Invalid` if it
    /// is not valid TOML or a section has the wrong shape.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let config = Self::from_toml_str(&content)?;
        log::debug!(
            "Loaded {} rules from {}",
            config.rules.len(),
            path.display()
        );
        Ok(config)
    }

    /// Loads `path`, writing the built-in defaults there first if it is missing.
    ///
    /// Failing to write the defaults is only a warning; the defaults are still
    /// returned.
    ///
    /// # Errors
    ///
    /// Same as [`Config::load`] for an existing file.
    pub fn load_or_init(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            return Self::load(path);
        }

        let config = Self::default();
        match config.save(path) {
            Ok(()) => log::info!("Wrote default configuration to {}", path.display()),
            Err(e) => log::warn!("Could not write default configuration: {e}"),
        }
        Ok(config)
    }

    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` on syntax errors or mistyped sections.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile =
            toml::from_str(content).map_err(|e| ConfigError::Invalid(e.to_string()))?;

        let (rules, skipped_rules) = match &file.rules {
            Some(table) => {
                let loaded = RuleSet::from_table(table);
                (loaded.rules, loaded.skipped)
            }
            None => (RuleSet::default(), Vec::new()),
        };

        Ok(Self {
            settings: file.settings,
            filters: file.filters,
            rules,
            skipped_rules,
        })
    }

    /// Renders the configuration as TOML, rules in their current order.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if a value cannot be represented in TOML.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        let file = ConfigFile {
            settings: self.settings.clone(),
            filters: self.filters.clone(),
            rules: Some(self.rules.to_table()),
        };
        toml::to_string_pretty(&file).map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// Writes the whole configuration to `path`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Io` if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = self.to_toml_string()?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .filter(|home| !home.is_empty())
        .map(PathBuf::from)
}
