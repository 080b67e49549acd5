//! dirsort - sort files into category folders, and put them back
//!
//! This library classifies files by extension into configurable categories,
//! optionally nests them by date, moves them into a destination tree and
//! records every move in an undo log so a run can be reverted.

pub mod classifier;
pub mod cli;
pub mod collision;
pub mod config;
pub mod control;
pub mod error;
pub mod filters;
pub mod organizer;
pub mod output;
pub mod path_resolver;
pub mod rules;
pub mod undo;
pub mod undo_log;

pub use classifier::{ClassificationResult, Classifier};
pub use collision::DuplicatePolicy;
pub use config::{Config, Settings};
pub use control::{CancellationToken, NoProgress, ProgressSink};
pub use error::{CollisionError, ConfigError, OrganizeError, UndoError, UndoLogError};
pub use filters::{CompiledFilters, FilterRules};
pub use organizer::{FileOutcome, MoveEngine, OrganizeReport, OutcomeKind, RunStatistics};
pub use rules::{Rule, RuleSet};
pub use undo::{UndoEngine, UndoReport, cleanup_empty_dirs};
pub use undo_log::{MoveOperation, list_undo_logs};

pub use cli::{Cli, run_cli};
