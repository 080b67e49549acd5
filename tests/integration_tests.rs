/// Integration tests for dirsort
///
/// These tests drive the library the way the command line does: a source
/// folder, a destination tree and an undo log directory inside one temporary
/// directory, then organize, inspect, undo and inspect again.
///
/// Test categories:
/// 1. Basic organization workflows
/// 2. Duplicate handling policies
/// 3. Dry-run mode verification
/// 4. Undo, round trips and cleanup
/// 5. Configuration and filtering
/// 6. Cancellation and command-line workflows
use chrono::{Local, TimeZone};
use clap::Parser;
use dirsort::cli::{Cli, run_cli};
use dirsort::undo_log::read_entries;
use dirsort::{
    CancellationToken, CompiledFilters, Config, DuplicatePolicy, MoveEngine, NoProgress,
    OrganizeReport, OutcomeKind, RuleSet, Settings, UndoEngine, UndoReport, cleanup_empty_dirs,
    list_undo_logs,
};
use dirsort::organizer::{SkipReason, UndoLogStatus};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tempfile::TempDir;

// ============================================================================
// Test Utilities
// ============================================================================

/// A temporary workspace with `inbox/` (source), `sorted/` (destination) and
/// `logs/` (undo logs).
struct TestFixture {
    temp_dir: TempDir,
    settings: Settings,
}

impl TestFixture {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        fs::create_dir_all(temp_dir.path().join("inbox")).expect("Failed to create inbox");
        let settings = Settings {
            source_folder: temp_dir.path().join("inbox"),
            destination_folder: temp_dir.path().join("sorted"),
            undo_log_dir: temp_dir.path().join("logs"),
            ..Settings::default()
        };
        TestFixture { temp_dir, settings }
    }

    fn with_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.settings.handle_duplicates = policy;
        self
    }

    fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    fn source(&self) -> PathBuf {
        self.settings.source_folder.clone()
    }

    fn destination(&self) -> PathBuf {
        self.settings.destination_folder.clone()
    }

    /// Create a file below the source folder, creating parent directories.
    fn create_file(&self, rel_path: &str, content: &[u8]) -> PathBuf {
        let file_path = self.source().join(rel_path);
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        let mut file = File::create(&file_path).expect("Failed to create file");
        file.write_all(content).expect("Failed to write file content");
        file_path
    }

    /// Create a file whose modification time is 2023-05-10.
    fn create_dated_file(&self, rel_path: &str, content: &[u8]) -> PathBuf {
        let path = self.create_file(rel_path, content);
        let may_2023 = Local
            .with_ymd_and_hms(2023, 5, 10, 12, 0, 0)
            .single()
            .expect("valid local time");
        File::options()
            .write(true)
            .open(&path)
            .and_then(|file| file.set_modified(SystemTime::from(may_2023)))
            .expect("Failed to set modification time");
        path
    }

    /// Create a file directly in the destination tree.
    fn create_destination_file(&self, rel_path: &str, content: &[u8]) -> PathBuf {
        let path = self.destination().join(rel_path);
        fs::create_dir_all(path.parent().expect("has parent")).expect("Failed to create dir");
        fs::write(&path, content).expect("Failed to write file");
        path
    }

    fn organize_with(&self, rules: &RuleSet, filters: &CompiledFilters, dry_run: bool) -> OrganizeReport {
        MoveEngine::new(rules, &self.settings, filters)
            .organize(
                &self.source(),
                &self.destination(),
                dry_run,
                &CancellationToken::new(),
                &mut NoProgress,
            )
            .expect("organize failed")
    }

    fn organize(&self) -> OrganizeReport {
        self.organize_with(&RuleSet::default(), &CompiledFilters::default(), false)
    }

    fn dry_run(&self) -> OrganizeReport {
        self.organize_with(&RuleSet::default(), &CompiledFilters::default(), true)
    }

    fn undo(&self, log_path: &Path) -> UndoReport {
        UndoEngine::new(Some(self.destination()))
            .undo(log_path, &CancellationToken::new(), &mut NoProgress)
            .expect("undo failed")
    }

    fn assert_file_exists(&self, path: &Path) {
        assert!(path.is_file(), "File should exist: {}", path.display());
    }

    fn assert_file_not_exists(&self, path: &Path) {
        assert!(!path.exists(), "File should not exist: {}", path.display());
    }

    /// Every file below the workspace root with its content, keyed by
    /// relative path.
    fn snapshot(&self) -> BTreeMap<PathBuf, Vec<u8>> {
        let mut files = BTreeMap::new();
        Self::walk_dir(self.root(), self.root(), &mut files);
        files
    }

    fn walk_dir(root: &Path, dir: &Path, files: &mut BTreeMap<PathBuf, Vec<u8>>) {
        let Ok(entries) = fs::read_dir(dir) else {
            return;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                Self::walk_dir(root, &path, files);
            } else {
                let rel = path.strip_prefix(root).expect("below root").to_path_buf();
                files.insert(rel, fs::read(&path).expect("Failed to read file"));
            }
        }
    }

    /// Every directory below the workspace root, relative.
    fn directories(&self) -> Vec<PathBuf> {
        let mut dirs: Vec<PathBuf> = walkdir_dirs(self.root())
            .into_iter()
            .map(|d| d.strip_prefix(self.root()).expect("below root").to_path_buf())
            .collect();
        dirs.sort();
        dirs
    }
}

fn walkdir_dirs(dir: &Path) -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    if let Ok(entries) = fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                dirs.push(path.clone());
                dirs.extend(walkdir_dirs(&path));
            }
        }
    }
    dirs
}

fn saved_log(report: &OrganizeReport) -> PathBuf {
    match &report.undo_log {
        UndoLogStatus::Saved(path) => path.clone(),
        other => panic!("expected a saved undo log, got {other:?}"),
    }
}

// ============================================================================
// Basic Organization Tests
// ============================================================================

#[test]
fn test_organize_empty_directory() {
    let fixture = TestFixture::new();

    let report = fixture.organize();

    assert!(report.outcomes.is_empty());
    assert_eq!(report.stats.moved, 0);
    assert_eq!(report.undo_log, UndoLogStatus::NotNeeded);
    assert!(list_undo_logs(&fixture.settings.undo_log_dir).is_empty());
}

#[test]
fn test_organize_image_by_date_and_pdf_into_sub_bucket() {
    let fixture = TestFixture::new();
    let image = fixture.create_dated_file("a.jpg", b"not really a jpeg");
    let pdf = fixture.create_file("b.pdf", b"%PDF-1.4");

    let report = fixture.organize();

    let image_dest = fixture.destination().join("Images/2023/05/a.jpg");
    let pdf_dest = fixture.destination().join("Documents/PDFs/b.pdf");
    fixture.assert_file_exists(&image_dest);
    fixture.assert_file_exists(&pdf_dest);
    fixture.assert_file_not_exists(&image);
    fixture.assert_file_not_exists(&pdf);
    assert_eq!(report.stats.moved, 2);

    let entries = read_entries(&saved_log(&report)).expect("readable log");
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["source"].as_str(), image.to_str());
    assert_eq!(entries[0]["destination"].as_str(), image_dest.to_str());
    assert_eq!(entries[1]["source"].as_str(), pdf.to_str());
    assert_eq!(entries[1]["action"], "move");
}

#[test]
fn test_organize_mixed_file_types() {
    let fixture = TestFixture::new();
    fixture.create_file("letter.docx", b"docx");
    fixture.create_file("budget.xlsx", b"xlsx");
    fixture.create_file("song.mp3", b"mp3");
    fixture.create_file("backup.tar.gz", b"gz");
    fixture.create_file("script.py", b"print()");
    fixture.create_file("main.rs", b"fn main() {}");
    fixture.create_file("setup.exe", b"MZ");
    fixture.create_file("mystery.xyz", b"?");
    fixture.create_file("notes.pages", b"pages");

    let report = fixture.organize();

    let dest = fixture.destination();
    for rel in [
        "Documents/Word Documents/letter.docx",
        "Office/Spreadsheets/budget.xlsx",
        "Audio/song.mp3",
        "Archives/backup.tar.gz",
        "Development/Python/script.py",
        "Development/Other Code/main.rs",
        "Software/setup.exe",
        "Other/mystery.xyz",
        "Documents/Other Documents/notes.pages",
    ] {
        fixture.assert_file_exists(&dest.join(rel));
    }
    assert_eq!(report.stats.moved, 9);
    assert_eq!(report.stats.errors, 0);
}

#[test]
fn test_organize_mixed_case_extensions() {
    let fixture = TestFixture::new();
    fixture.create_file("REPORT.PDF", b"pdf");
    fixture.create_file("Track.Mp3", b"mp3");

    fixture.organize();

    fixture.assert_file_exists(&fixture.destination().join("Documents/PDFs/REPORT.PDF"));
    fixture.assert_file_exists(&fixture.destination().join("Audio/Track.Mp3"));
}

#[test]
fn test_organize_walks_subdirectories() {
    let fixture = TestFixture::new();
    fixture.create_file("projects/2024/plan.pdf", b"pdf");
    fixture.create_file("music/album/01.flac", b"flac");

    let report = fixture.organize();

    assert_eq!(report.stats.moved, 2);
    fixture.assert_file_exists(&fixture.destination().join("Documents/PDFs/plan.pdf"));
    fixture.assert_file_exists(&fixture.destination().join("Audio/01.flac"));
}

#[test]
fn test_organize_preserves_file_content() {
    let fixture = TestFixture::new();
    let content = b"Important document content that must not change";
    fixture.create_file("important.txt", content);

    fixture.organize();

    let moved = fixture.destination().join("Documents/Text Files/important.txt");
    assert_eq!(fs::read(moved).expect("Failed to read file"), content);
}

#[test]
fn test_files_without_extension_detected_by_content() {
    let fixture = TestFixture::new();
    let png = [
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
        0x52,
    ];
    fixture.create_dated_file("screenshot", &png);
    fixture.create_file("README", b"plain words");

    fixture.organize();

    fixture.assert_file_exists(&fixture.destination().join("Images/2023/05/screenshot"));
    fixture.assert_file_exists(&fixture.destination().join("Other/README"));
}

#[test]
fn test_hidden_and_temp_files_are_never_moved() {
    let fixture = TestFixture::new();
    let hidden = fixture.create_file(".secret.pdf", b"pdf");
    let temp = fixture.create_file("~$report.docx", b"lock");
    fixture.create_file("visible.pdf", b"pdf");

    let report = fixture.organize();

    assert_eq!(report.stats.moved, 1);
    fixture.assert_file_exists(&hidden);
    fixture.assert_file_exists(&temp);
}

#[test]
fn test_organize_by_date_disabled_globally() {
    let mut fixture = TestFixture::new();
    fixture.settings.organize_by_date = false;
    fixture.create_dated_file("a.jpg", b"jpg");

    fixture.organize();

    fixture.assert_file_exists(&fixture.destination().join("Images/a.jpg"));
}

#[test]
fn test_organize_then_add_files_then_organize_again() {
    let fixture = TestFixture::new();
    fixture.create_file("first.pdf", b"1");
    let first = fixture.organize();

    fixture.create_file("second.pdf", b"2");
    let second = fixture.organize();

    assert_eq!(first.stats.moved, 1);
    assert_eq!(second.stats.moved, 1);
    fixture.assert_file_exists(&fixture.destination().join("Documents/PDFs/first.pdf"));
    fixture.assert_file_exists(&fixture.destination().join("Documents/PDFs/second.pdf"));
    assert_ne!(saved_log(&first), saved_log(&second));
    assert_eq!(list_undo_logs(&fixture.settings.undo_log_dir).len(), 2);
}

// ============================================================================
// Duplicate Handling Tests
// ============================================================================

#[test]
fn test_rename_policy_numbers_second_file() {
    let fixture = TestFixture::new();
    fixture.create_dated_file("camera/photo.jpg", b"one");
    fixture.create_dated_file("phone/photo.jpg", b"two");

    let report = fixture.organize();

    let dir = fixture.destination().join("Images/2023/05");
    assert_eq!(fs::read(dir.join("photo.jpg")).unwrap(), b"one");
    assert_eq!(fs::read(dir.join("photo_1.jpg")).unwrap(), b"two");
    assert_eq!(report.stats.moved, 2);
}

#[test]
fn test_rename_policy_skips_existing_numbers() {
    let fixture = TestFixture::new();
    fixture.create_destination_file("Audio/track.mp3", b"a");
    fixture.create_destination_file("Audio/track_1.mp3", b"b");
    fixture.create_file("track.mp3", b"c");

    fixture.organize();

    assert_eq!(
        fs::read(fixture.destination().join("Audio/track_2.mp3")).unwrap(),
        b"c"
    );
}

#[test]
fn test_skip_policy_leaves_source_and_log_untouched() {
    let fixture = TestFixture::new().with_policy(DuplicatePolicy::Skip);
    let existing = fixture.create_destination_file("Audio/track.mp3", b"old");
    let source = fixture.create_file("track.mp3", b"new");

    let report = fixture.organize();

    assert_eq!(report.stats.skipped, 1);
    assert_eq!(report.stats.moved, 0);
    assert_eq!(
        report.outcomes[0].kind,
        OutcomeKind::Skipped {
            reason: SkipReason::Duplicate {
                existing: existing.clone()
            }
        }
    );
    assert_eq!(report.outcomes[0].message(), "File skipped (duplicate): track.mp3");
    assert_eq!(fs::read(&source).unwrap(), b"new");
    assert_eq!(fs::read(&existing).unwrap(), b"old");
    assert_eq!(report.undo_log, UndoLogStatus::NotNeeded);
}

#[test]
fn test_overwrite_policy_replaces_existing() {
    let fixture = TestFixture::new().with_policy(DuplicatePolicy::Overwrite);
    let existing = fixture.create_destination_file("Audio/track.mp3", b"old");
    let source = fixture.create_file("track.mp3", b"new");

    let report = fixture.organize();

    assert_eq!(report.stats.moved, 1);
    fixture.assert_file_not_exists(&source);
    assert_eq!(fs::read(&existing).unwrap(), b"new");
}

// ============================================================================
// Dry-Run Mode Tests
// ============================================================================

#[test]
fn test_dry_run_changes_nothing() {
    let fixture = TestFixture::new();
    fixture.create_dated_file("a.jpg", b"jpg");
    fixture.create_file("b.pdf", b"pdf");
    fixture.create_file("nested/c.mp3", b"mp3");
    let before = fixture.snapshot();
    let dirs_before = fixture.directories();

    let report = fixture.dry_run();

    assert_eq!(fixture.snapshot(), before);
    assert_eq!(fixture.directories(), dirs_before);
    assert_eq!(report.stats.planned, 3);
    assert_eq!(report.stats.moved, 0);
    assert_eq!(report.undo_log, UndoLogStatus::NotNeeded);
    assert!(report.outcomes.iter().all(|o| matches!(o.kind, OutcomeKind::WouldMove { .. })));
}

#[test]
fn test_dry_run_matches_real_run() {
    let fixture = TestFixture::new();
    fixture.create_dated_file("one/photo.jpg", b"1");
    fixture.create_dated_file("two/photo.jpg", b"2");
    fixture.create_file("b.pdf", b"pdf");

    let planned: Vec<PathBuf> = fixture
        .dry_run()
        .outcomes
        .into_iter()
        .filter_map(|o| match o.kind {
            OutcomeKind::WouldMove { destination } => Some(destination),
            _ => None,
        })
        .collect();
    let moved: Vec<PathBuf> = fixture
        .organize()
        .outcomes
        .into_iter()
        .filter_map(|o| match o.kind {
            OutcomeKind::Moved { destination } => Some(destination),
            _ => None,
        })
        .collect();

    assert_eq!(planned, moved);
}

// ============================================================================
// Undo Tests
// ============================================================================

#[test]
fn test_round_trip_restores_original_tree_for_every_policy() {
    for policy in [
        DuplicatePolicy::Rename,
        DuplicatePolicy::Skip,
        DuplicatePolicy::Overwrite,
    ] {
        let fixture = TestFixture::new().with_policy(policy);
        fixture.create_dated_file("a.jpg", b"a");
        fixture.create_file("docs/b.pdf", b"b");
        fixture.create_file("music/c.mp3", b"c");
        fixture.create_file("d.xyz", b"d");
        let before = fixture.snapshot();

        let report = fixture.organize();
        assert_eq!(report.stats.moved, 4, "policy {policy}");
        let log_path = saved_log(&report);

        let undo = fixture.undo(&log_path);
        assert_eq!(undo.summary(), "Undo completed: 4 restored, 0 failed");

        // The log file itself is the only addition.
        let mut after = fixture.snapshot();
        let log_rel = log_path.strip_prefix(fixture.root()).unwrap().to_path_buf();
        assert!(after.remove(&log_rel).is_some());
        assert_eq!(after, before, "policy {policy}");
        assert!(fixture.destination().exists());
        assert_eq!(fs::read_dir(fixture.destination()).unwrap().count(), 0);
    }
}

#[test]
fn test_round_trip_with_collision_under_rename() {
    let fixture = TestFixture::new().with_policy(DuplicatePolicy::Rename);
    let existing = fixture.create_destination_file("Images/2023/05/photo.jpg", b"already sorted");
    let photo = fixture.create_dated_file("photo.jpg", b"new photo");
    let before = fixture.snapshot();

    let report = fixture.organize();
    let renamed = fixture.destination().join("Images/2023/05/photo_1.jpg");
    assert_eq!(
        report.outcomes[0].kind,
        OutcomeKind::Moved {
            destination: renamed.clone()
        }
    );
    let log_path = saved_log(&report);

    let undo = fixture.undo(&log_path);

    assert_eq!(undo.summary(), "Undo completed: 1 restored, 0 failed");
    assert_eq!(fs::read(&photo).unwrap(), b"new photo");
    assert_eq!(fs::read(&existing).unwrap(), b"already sorted");
    fixture.assert_file_not_exists(&renamed);

    let mut after = fixture.snapshot();
    let log_rel = log_path.strip_prefix(fixture.root()).unwrap().to_path_buf();
    assert!(after.remove(&log_rel).is_some());
    assert_eq!(after, before);
}

#[test]
fn test_round_trip_with_collision_under_overwrite() {
    let fixture = TestFixture::new().with_policy(DuplicatePolicy::Overwrite);
    let existing = fixture.create_destination_file("Images/2023/05/photo.jpg", b"replaced");
    let photo = fixture.create_dated_file("photo.jpg", b"new photo");

    let report = fixture.organize();
    assert_eq!(report.stats.moved, 1);
    assert_eq!(fs::read(&existing).unwrap(), b"new photo");

    let undo = fixture.undo(&saved_log(&report));

    assert_eq!(undo.summary(), "Undo completed: 1 restored, 0 failed");
    assert_eq!(fs::read(&photo).unwrap(), b"new photo");
    // The replaced file is not kept anywhere.
    fixture.assert_file_not_exists(&existing);
}

#[test]
fn test_undo_with_deleted_destination_reports_failure() {
    let fixture = TestFixture::new();
    fixture.create_file("b.pdf", b"pdf");
    let report = fixture.organize();
    let log_path = saved_log(&report);
    fs::remove_file(fixture.destination().join("Documents/PDFs/b.pdf")).unwrap();

    let undo = fixture.undo(&log_path);

    assert_eq!(undo.summary(), "Undo completed: 0 restored, 1 failed");
    assert_eq!(
        undo.results[0].message,
        "File not found in organized location: b.pdf"
    );
}

#[test]
fn test_undo_with_modified_tree_backs_up_conflict() {
    let fixture = TestFixture::new();
    let source = fixture.create_file("notes.txt", b"organized");
    let report = fixture.organize();
    fs::write(&source, b"written later").unwrap();

    let undo = fixture.undo(&saved_log(&report));

    assert_eq!(undo.restored, 1);
    assert_eq!(fs::read(&source).unwrap(), b"organized");
    let backups = fs::read_dir(fixture.source())
        .unwrap()
        .filter_map(Result::ok)
        .filter(|e| e.file_name().to_string_lossy().starts_with("notes.txt.bak."))
        .count();
    assert_eq!(backups, 1);
}

#[test]
fn test_undo_does_not_modify_log() {
    let fixture = TestFixture::new();
    fixture.create_file("b.pdf", b"pdf");
    let log_path = saved_log(&fixture.organize());
    let log_before = fs::read(&log_path).unwrap();

    fixture.undo(&log_path);
    let again = fixture.undo(&log_path);

    assert_eq!(fs::read(&log_path).unwrap(), log_before);
    assert_eq!(again.failed, 1);
}

#[test]
fn test_cleanup_is_idempotent() {
    let fixture = TestFixture::new();
    fs::create_dir_all(fixture.destination().join("Images/2023/05")).unwrap();
    fs::create_dir_all(fixture.destination().join("Documents/PDFs")).unwrap();
    fixture.create_destination_file("Audio/keep.mp3", b"x");

    let first = cleanup_empty_dirs(&fixture.destination());
    let tree = fixture.directories();
    let second = cleanup_empty_dirs(&fixture.destination());

    assert_eq!(first, 5);
    assert_eq!(second, 0);
    assert_eq!(fixture.directories(), tree);
    assert!(fixture.destination().join("Audio/keep.mp3").exists());
}

// ============================================================================
// Configuration and Filtering Tests
// ============================================================================

#[test]
fn test_custom_rules_first_match_wins() {
    let fixture = TestFixture::new();
    let config = Config::from_toml_str(
        r#"
[rules.screens]
extensions = [".png"]

[rules.images]
extensions = ["png", "jpg"]
subfolder_by_date = true
date_format = "%Y"

[rules.bad]
extensions = [".gif"]
subfolder_by_date = true
date_format = "%B"
"#,
    )
    .expect("valid config");
    fixture.create_file("shot.png", b"png");
    fixture.create_dated_file("pic.jpg", b"jpg");
    fixture.create_file("anim.gif", b"gif");

    fixture.organize_with(&config.rules, &CompiledFilters::default(), false);

    assert_eq!(config.skipped_rules.len(), 1);
    assert_eq!(config.skipped_rules[0].key, "bad");
    fixture.assert_file_exists(&fixture.destination().join("Screens/shot.png"));
    fixture.assert_file_exists(&fixture.destination().join("Images/2023/pic.jpg"));
    fixture.assert_file_exists(&fixture.destination().join("Other/anim.gif"));
}

#[test]
fn test_empty_rule_set_sends_everything_to_other() {
    let fixture = TestFixture::new();
    fixture.create_file("a.jpg", b"a");
    fixture.create_file("b.pdf", b"b");

    fixture.organize_with(&RuleSet::empty(), &CompiledFilters::default(), false);

    fixture.assert_file_exists(&fixture.destination().join("Other/a.jpg"));
    fixture.assert_file_exists(&fixture.destination().join("Other/b.pdf"));
}

#[test]
fn test_organize_with_exclude_filters() {
    let fixture = TestFixture::new();
    let config = Config::from_toml_str(
        r#"
[filters.exclude]
filenames = ["Thumbs.db"]
patterns = ["node_modules/**"]
extensions = ["part"]

[filters.include]
patterns = ["keep/*.part"]
"#,
    )
    .expect("valid config");
    let filters = config.filters.compile().expect("valid filters");

    let thumbs = fixture.create_file("Thumbs.db", b"");
    let module = fixture.create_file("node_modules/pkg/index.js", b"");
    let partial = fixture.create_file("movie.mp4.part", b"");
    fixture.create_file("keep/wanted.part", b"");
    fixture.create_file("index.js", b"");

    let report = fixture.organize_with(&config.rules, &filters, false);

    assert_eq!(report.stats.moved, 2);
    fixture.assert_file_exists(&thumbs);
    fixture.assert_file_exists(&module);
    fixture.assert_file_exists(&partial);
    fixture.assert_file_exists(&fixture.destination().join("Other/wanted.part"));
    fixture.assert_file_exists(&fixture.destination().join("Development/Web/index.js"));
}

#[test]
fn test_undo_logging_can_be_disabled() {
    let mut fixture = TestFixture::new();
    fixture.settings.create_undo_log = false;
    fixture.create_file("b.pdf", b"pdf");

    let report = fixture.organize();

    assert_eq!(report.stats.moved, 1);
    assert_eq!(report.undo_log, UndoLogStatus::NotNeeded);
    assert!(list_undo_logs(&fixture.settings.undo_log_dir).is_empty());
}

// ============================================================================
// Cancellation and Command-Line Tests
// ============================================================================

#[test]
fn test_cancellation_stops_after_current_file() {
    let fixture = TestFixture::new();
    for name in ["a.pdf", "b.pdf", "c.pdf"] {
        fixture.create_file(name, b"pdf");
    }

    let cancel = CancellationToken::new();
    let handle = cancel.clone();
    let mut sink = move |_: usize, _: usize, _: &str| handle.cancel();
    let rules = RuleSet::default();
    let filters = CompiledFilters::default();
    let report = MoveEngine::new(&rules, &fixture.settings, &filters)
        .organize(
            &fixture.source(),
            &fixture.destination(),
            false,
            &cancel,
            &mut sink,
        )
        .expect("organize failed");

    assert!(report.cancelled);
    assert_eq!(report.stats.moved, 1);
    fixture.assert_file_exists(&fixture.source().join("b.pdf"));
    fixture.assert_file_exists(&fixture.source().join("c.pdf"));

    // The one completed move is still undoable.
    let undo = fixture.undo(&saved_log(&report));
    assert_eq!(undo.restored, 1);
    fixture.assert_file_exists(&fixture.source().join("a.pdf"));
}

#[test]
fn test_cli_organize_then_undo_latest_log() {
    let fixture = TestFixture::new();
    let config_path = fixture.root().join("config").join("dirsort.toml");
    let config = Config {
        settings: fixture.settings.clone(),
        ..Config::default()
    };
    config.save(&config_path).expect("Failed to save config");

    fixture.create_file("b.pdf", b"pdf");
    fixture.create_file("c.mp3", b"mp3");
    let before = fixture.snapshot();
    let config_arg = config_path.to_string_lossy().to_string();

    let organize = Cli::try_parse_from(["dirsort", "--config", &config_arg, "organize"]).unwrap();
    run_cli(&organize, &CancellationToken::new()).expect("organize command failed");

    fixture.assert_file_exists(&fixture.destination().join("Documents/PDFs/b.pdf"));
    let logs = list_undo_logs(&fixture.settings.undo_log_dir);
    assert_eq!(logs.len(), 1);

    let undo = Cli::try_parse_from(["dirsort", "--config", &config_arg, "undo"]).unwrap();
    run_cli(&undo, &CancellationToken::new()).expect("undo command failed");

    let mut after = fixture.snapshot();
    after.retain(|path, _| {
        !path.starts_with("logs") && !path.starts_with("config")
    });
    let mut expected = before;
    expected.retain(|path, _| !path.starts_with("config"));
    assert_eq!(after, expected);
    // Without --destination only the folders the undo emptied are removed,
    // which here includes the destination root created by the organize run.
    assert!(!fixture.destination().exists());
    assert!(fixture.source().is_dir());
}

#[test]
fn test_cli_no_dry_run_overrides_configured_dry_run() {
    let fixture = TestFixture::new();
    let config_path = fixture.root().join("dirsort.toml");
    Config {
        settings: Settings {
            dry_run: true,
            ..fixture.settings.clone()
        },
        ..Config::default()
    }
    .save(&config_path)
    .expect("Failed to save config");
    let source = fixture.create_file("b.pdf", b"pdf");
    let config_arg = config_path.to_string_lossy().to_string();

    let configured = Cli::try_parse_from(["dirsort", "--config", &config_arg, "organize"]).unwrap();
    run_cli(&configured, &CancellationToken::new()).expect("organize command failed");
    fixture.assert_file_exists(&source);
    assert!(list_undo_logs(&fixture.settings.undo_log_dir).is_empty());

    let forced = Cli::try_parse_from([
        "dirsort",
        "--config",
        &config_arg,
        "organize",
        "--no-dry-run",
    ])
    .unwrap();
    run_cli(&forced, &CancellationToken::new()).expect("organize command failed");
    fixture.assert_file_not_exists(&source);
    fixture.assert_file_exists(&fixture.destination().join("Documents/PDFs/b.pdf"));
    assert_eq!(list_undo_logs(&fixture.settings.undo_log_dir).len(), 1);
}

#[test]
fn test_cli_undo_without_logs_fails() {
    let fixture = TestFixture::new();
    let config_path = fixture.root().join("dirsort.toml");
    Config {
        settings: fixture.settings.clone(),
        ..Config::default()
    }
    .save(&config_path)
    .expect("Failed to save config");

    let config_arg = config_path.to_string_lossy().to_string();
    let undo = Cli::try_parse_from(["dirsort", "--config", &config_arg, "undo"]).unwrap();
    assert!(run_cli(&undo, &CancellationToken::new()).is_err());
}

#[test]
fn test_cli_init_writes_loadable_config() {
    let fixture = TestFixture::new();
    let config_path = fixture.root().join("fresh").join("config.toml");
    let config_arg = config_path.to_string_lossy().to_string();

    let init = Cli::try_parse_from(["dirsort", "--config", &config_arg, "init"]).unwrap();
    run_cli(&init, &CancellationToken::new()).expect("init failed");

    let loaded = Config::load(&config_path).expect("Failed to load written config");
    assert_eq!(loaded.rules, RuleSet::default());
    assert!(loaded.skipped_rules.is_empty());
}
