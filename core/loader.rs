use crate::classify::{self, FileRole};
use crate::error::{AppError, Result};
use crate::progress::{self, CancellationToken, ProgressEvent, Stage};
#[cfg(feature = "serde_support")]
use serde::Serialize;
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::mpsc::Sender;

pub const LOAD_PROGRESS_START: u8 = 25;
pub const LOAD_PROGRESS_END: u8 = 55;
const PROGRESS_EVERY: usize = 10;

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde_support", derive(Serialize))]
#[cfg_attr(feature = "serde_support", serde(rename_all = "camelCase"))]
pub struct FileRecord {
    pub relative_path: String,
    #[cfg_attr(feature = "serde_support", serde(skip_serializing))]
    pub content: String,
    pub size_bytes: u64,
    pub language: &'static str,
    pub is_entry_file: bool,
    pub role: FileRole,
}

impl FileRecord {
    /// Classifies `relative_path`; size is taken from the content.
    pub fn new(relative_path: impl Into<String>, content: impl Into<String>) -> Self {
        let content = content.into();
        let size = content.len() as u64;
        Self::with_size(relative_path, content, size)
    }

    pub fn with_size(relative_path: impl Into<String>, content: String, size_bytes: u64) -> Self {
        let relative_path = relative_path.into();
        Self {
            language: classify::language_of(&relative_path),
            is_entry_file: classify::is_entry_file(&relative_path),
            role: classify::role_of(&relative_path),
            relative_path,
            content,
            size_bytes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    TooLarge { size: u64, limit: u64 },
    Unreadable(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::TooLarge { size, limit } => {
                write!(f, "file is {} bytes, limit is {} bytes", size, limit)
            }
            SkipReason::Unreadable(msg) => write!(f, "unreadable: {}", msg),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    Loaded(FileRecord),
    Skipped { path: String, reason: SkipReason },
}

#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    /// Loaded records in discovery order.
    pub records: Vec<FileRecord>,
    pub skipped: Vec<(String, SkipReason)>,
}

pub fn load_file(root: &Path, relative_path: &str, max_file_size: u64) -> LoadOutcome {
    let absolute = root.join(relative_path);
    let skipped = |reason: SkipReason| LoadOutcome::Skipped {
        path: relative_path.to_string(),
        reason,
    };

    let size = match fs::metadata(&absolute) {
        Ok(meta) => meta.len(),
        Err(e) => return skipped(SkipReason::Unreadable(e.to_string())),
    };
    if size > max_file_size {
        return skipped(SkipReason::TooLarge {
            size,
            limit: max_file_size,
        });
    }

    match fs::read(&absolute) {
        Ok(bytes) => {
            let content = String::from_utf8_lossy(&bytes).into_owned();
            LoadOutcome::Loaded(FileRecord::with_size(relative_path, content, size))
        }
        Err(e) => skipped(SkipReason::Unreadable(e.to_string())),
    }
}

/// Reads every discovered path, skipping oversized or unreadable files.
/// Progress is reported after every tenth file and after the last one.
pub fn load_files(
    root: &Path,
    paths: &[String],
    max_file_size: u64,
    progress: Option<&Sender<ProgressEvent>>,
    cancel: Option<&CancellationToken>,
) -> Result<LoadReport> {
    log::info!("Reading content for {} files...", paths.len());
    let total = paths.len();
    let mut report = LoadReport::default();

    for (i, relative_path) in paths.iter().enumerate() {
        if cancel.is_some_and(CancellationToken::is_cancelled) {
            log::info!("Loading cancelled after {} of {} files.", i, total);
            return Err(AppError::Cancelled);
        }

        match load_file(root, relative_path, max_file_size) {
            LoadOutcome::Loaded(record) => {
                log::trace!("Loaded {} ({} bytes)", record.relative_path, record.size_bytes);
                report.records.push(record);
            }
            LoadOutcome::Skipped { path, reason } => {
                log::warn!("Skipping {}: {}", path, reason);
                report.skipped.push((path, reason));
            }
        }

        let processed = i + 1;
        if processed % PROGRESS_EVERY == 0 || processed == total {
            let file_name = relative_path
                .rsplit('/')
                .next()
                .unwrap_or(relative_path)
                .to_string();
            progress::report(
                progress,
                ProgressEvent::new(
                    Stage::Analyzing,
                    progress::scale(processed, total, LOAD_PROGRESS_START, LOAD_PROGRESS_END),
                    format!("Reading files ({}/{})", processed, total),
                )
                .with_files(Some(file_name), processed, total),
            );
        }
    }

    log::info!(
        "File reading complete: {} loaded, {} skipped.",
        report.records.len(),
        report.skipped.len()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use tempfile::TempDir;

    fn setup(files: &[(&str, usize)]) -> (TempDir, Vec<String>) {
        let dir = TempDir::new().unwrap();
        let mut paths = Vec::new();
        for (name, size) in files {
            let path = dir.path().join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, "x".repeat(*size)).unwrap();
            paths.push(name.to_string());
        }
        (dir, paths)
    }

    #[test]
    fn oversized_and_missing_files_are_skipped_with_reasons() {
        let (dir, mut paths) = setup(&[("small.rs", 10), ("big.rs", 200)]);
        paths.push("gone.rs".to_string());

        let report = load_files(dir.path(), &paths, 100, None, None).unwrap();
        assert_eq!(report.records.len(), 1);
        assert_eq!(report.records[0].relative_path, "small.rs");
        assert_eq!(report.records[0].size_bytes, 10);
        assert_eq!(report.records[0].language, "Rust");

        assert_eq!(report.skipped.len(), 2);
        assert_eq!(
            report.skipped[0],
            (
                "big.rs".to_string(),
                SkipReason::TooLarge {
                    size: 200,
                    limit: 100
                }
            )
        );
        assert!(matches!(report.skipped[1].1, SkipReason::Unreadable(_)));
    }

    #[test]
    fn file_at_exact_limit_is_kept() {
        let (dir, paths) = setup(&[("edge.txt", 100)]);
        let report = load_files(dir.path(), &paths, 100, None, None).unwrap();
        assert_eq!(report.records.len(), 1);
    }

    #[test]
    fn invalid_utf8_is_decoded_lossily() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("weird.txt"), [b'o', b'k', 0xff, b'!']).unwrap();
        match load_file(dir.path(), "weird.txt", 1024) {
            LoadOutcome::Loaded(record) => {
                assert!(record.content.starts_with("ok"));
                assert!(record.content.ends_with('!'));
                assert_eq!(record.size_bytes, 4);
            }
            other => panic!("expected loaded record, got {:?}", other),
        }
    }

    #[test]
    fn progress_every_tenth_file_and_at_end() {
        let names: Vec<String> = (0..23).map(|i| format!("f{:02}.txt", i)).collect();
        let specs: Vec<(&str, usize)> = names.iter().map(|n| (n.as_str(), 1)).collect();
        let (dir, paths) = setup(&specs);

        let (tx, rx) = mpsc::channel();
        load_files(dir.path(), &paths, 1024, Some(&tx), None).unwrap();
        drop(tx);
        let events: Vec<ProgressEvent> = rx.into_iter().collect();

        let processed: Vec<usize> = events.iter().filter_map(|e| e.processed_files).collect();
        assert_eq!(processed, vec![10, 20, 23]);
        assert!(events.iter().all(|e| e.stage == Stage::Analyzing));
        assert!(events.windows(2).all(|w| w[0].percentage <= w[1].percentage));
        assert_eq!(events.last().unwrap().percentage, LOAD_PROGRESS_END);
        assert_eq!(events.last().unwrap().current_file.as_deref(), Some("f22.txt"));
    }

    #[test]
    fn cancellation_stops_loading() {
        let (dir, paths) = setup(&[("a.txt", 1), ("b.txt", 1)]);
        let token = CancellationToken::new();
        token.cancel();
        let err = load_files(dir.path(), &paths, 1024, None, Some(&token)).unwrap_err();
        assert!(matches!(err, AppError::Cancelled));
    }
}
