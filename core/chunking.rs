use crate::config::TokenEstimatorKind;
use crate::error::{AppError, Result};
use crate::loader::FileRecord;
use crate::progress::{self, ProgressEvent, Stage};
use indexmap::IndexSet;
use log;
#[cfg(feature = "serde_support")]
use serde::Serialize;
use std::cmp::Ordering;
use std::sync::mpsc::Sender;
use tiktoken_rs::{CoreBPE, cl100k_base};

pub const CHUNK_PROGRESS_START: u8 = 75;
pub const CHUNK_PROGRESS_END: u8 = 85;

pub trait TokenEstimator {
    fn estimate(&self, text: &str) -> usize;
}

/// `ceil(chars / 4)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CharRatioEstimator;

impl TokenEstimator for CharRatioEstimator {
    fn estimate(&self, text: &str) -> usize {
        text.chars().count().div_ceil(4)
    }
}

pub struct TiktokenEstimator {
    bpe: CoreBPE,
}

impl TiktokenEstimator {
    pub fn cl100k() -> Result<Self> {
        let bpe = cl100k_base().map_err(|e| AppError::TikToken(e.to_string()))?;
        Ok(Self { bpe })
    }
}

impl TokenEstimator for TiktokenEstimator {
    fn estimate(&self, text: &str) -> usize {
        self.bpe.encode_ordinary(text).len()
    }
}

impl<F> TokenEstimator for F
where
    F: Fn(&str) -> usize,
{
    fn estimate(&self, text: &str) -> usize {
        self(text)
    }
}

pub fn estimator_for(kind: TokenEstimatorKind) -> Result<Box<dyn TokenEstimator>> {
    Ok(match kind {
        TokenEstimatorKind::Chars => Box::new(CharRatioEstimator),
        TokenEstimatorKind::Cl100k => Box::new(TiktokenEstimator::cl100k()?),
    })
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde_support", derive(Serialize))]
#[cfg_attr(feature = "serde_support", serde(rename_all = "camelCase"))]
pub struct Batch {
    pub files: Vec<FileRecord>,
    pub estimated_tokens: usize,
    pub index: usize,
    pub label: String,
}

impl Batch {
    fn new(files: Vec<FileRecord>, estimated_tokens: usize, index: usize) -> Self {
        let label = batch_label(&files);
        Self {
            files,
            estimated_tokens,
            index,
            label,
        }
    }

    pub fn has_entry_file(&self) -> bool {
        self.files.iter().any(|f| f.is_entry_file)
    }
}

fn batch_label(files: &[FileRecord]) -> String {
    let kind = if files.iter().any(|f| f.is_entry_file) {
        "Core files"
    } else {
        "Additional files"
    };
    let languages: IndexSet<&str> = files.iter().map(|f| f.language).collect();
    let languages: Vec<&str> = languages.into_iter().collect();
    format!("{} ({})", kind, languages.join(", "))
}

/// Entry files first, then descending size. The sort is stable, so equal
/// keys keep their incoming order.
pub fn sort_for_batching(records: &mut [FileRecord]) {
    records.sort_by(|a, b| match (a.is_entry_file, b.is_entry_file) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        _ => b.size_bytes.cmp(&a.size_bytes),
    });
}

/// Packs records into token-bounded batches.
///
/// A record that would push a non-empty batch over budget closes that batch
/// first. A record whose own estimate exceeds the budget is appended and then
/// immediately closed into a batch of its own.
pub fn build_batches(
    mut records: Vec<FileRecord>,
    estimator: &dyn TokenEstimator,
    max_tokens_per_batch: usize,
    progress: Option<&Sender<ProgressEvent>>,
) -> Result<Vec<Batch>> {
    if max_tokens_per_batch == 0 {
        return Err(AppError::InvalidArgument(
            "Token budget per batch must be greater than 0".to_string(),
        ));
    }

    progress::report(
        progress,
        ProgressEvent::new(Stage::Chunking, CHUNK_PROGRESS_START, "Sorting files for batching"),
    );
    sort_for_batching(&mut records);

    let total = records.len();
    let mut batches: Vec<Batch> = Vec::new();
    let mut current: Vec<FileRecord> = Vec::new();
    let mut current_tokens: usize = 0;

    for record in records {
        let tokens = estimator.estimate(&record.content);

        if !current.is_empty() && current_tokens.saturating_add(tokens) > max_tokens_per_batch {
            log::trace!(
                "Batch {} full at {} tokens, closing before {}",
                batches.len(),
                current_tokens,
                record.relative_path
            );
            batches.push(Batch::new(
                std::mem::take(&mut current),
                current_tokens,
                batches.len(),
            ));
            current_tokens = 0;
        }

        let oversized = tokens > max_tokens_per_batch;
        let path = record.relative_path.clone();
        current.push(record);
        current_tokens = current_tokens.saturating_add(tokens);

        if oversized {
            log::debug!(
                "File {} ({} tokens) exceeds batch budget ({}), isolating it.",
                path,
                tokens,
                max_tokens_per_batch
            );
            batches.push(Batch::new(
                std::mem::take(&mut current),
                current_tokens,
                batches.len(),
            ));
            current_tokens = 0;
        }
    }

    if !current.is_empty() {
        batches.push(Batch::new(current, current_tokens, batches.len()));
    }

    log::info!("Split {} files into {} batches.", total, batches.len());
    progress::report(
        progress,
        ProgressEvent::new(
            Stage::Chunking,
            CHUNK_PROGRESS_END,
            format!("Prepared {} batches", batches.len()),
        )
        .with_files(None, total, total),
    );
    Ok(batches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sized(path: &str, chars: usize) -> FileRecord {
        FileRecord::new(path, "x".repeat(chars))
    }

    fn paths(batch: &Batch) -> Vec<&str> {
        batch.files.iter().map(|f| f.relative_path.as_str()).collect()
    }

    #[test]
    fn char_estimator_rounds_up() {
        assert_eq!(CharRatioEstimator.estimate(""), 0);
        assert_eq!(CharRatioEstimator.estimate("abc"), 1);
        assert_eq!(CharRatioEstimator.estimate("abcd"), 1);
        assert_eq!(CharRatioEstimator.estimate("abcde"), 2);
        assert_eq!(CharRatioEstimator.estimate("ééééé"), 2);
    }

    #[test]
    fn entry_files_first_then_largest() {
        let mut recs = vec![
            sized("b.txt", 100),
            sized("index.js", 10),
            sized("c.txt", 50),
        ];
        sort_for_batching(&mut recs);
        let order: Vec<&str> = recs.iter().map(|r| r.relative_path.as_str()).collect();
        assert_eq!(order, vec!["index.js", "b.txt", "c.txt"]);
    }

    #[test]
    fn equal_sizes_keep_incoming_order() {
        let mut recs = vec![sized("z.txt", 8), sized("a.txt", 8), sized("m.txt", 8)];
        sort_for_batching(&mut recs);
        let order: Vec<&str> = recs.iter().map(|r| r.relative_path.as_str()).collect();
        assert_eq!(order, vec!["z.txt", "a.txt", "m.txt"]);
    }

    #[test]
    fn batches_close_before_overflow() {
        // 40 chars = 10 tokens each; budget of 25 fits two per batch
        let recs = vec![
            sized("a.txt", 40),
            sized("b.txt", 40),
            sized("c.txt", 40),
            sized("d.txt", 40),
            sized("e.txt", 40),
        ];
        let batches = build_batches(recs, &CharRatioEstimator, 25, None).unwrap();
        assert_eq!(batches.len(), 3);
        assert_eq!(paths(&batches[0]), vec!["a.txt", "b.txt"]);
        assert_eq!(paths(&batches[1]), vec!["c.txt", "d.txt"]);
        assert_eq!(paths(&batches[2]), vec!["e.txt"]);
        assert_eq!(
            batches.iter().map(|b| b.estimated_tokens).collect::<Vec<_>>(),
            vec![20, 20, 10]
        );
        assert_eq!(
            batches.iter().map(|b| b.index).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
    }

    #[test]
    fn exact_budget_fits() {
        let recs = vec![sized("a.txt", 40), sized("b.txt", 40)];
        let batches = build_batches(recs, &CharRatioEstimator, 20, None).unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].estimated_tokens, 20);
    }

    #[test]
    fn oversized_file_is_isolated_after_closing_current_batch() {
        // sorted order: big (400), small1 (20), small2 (20)
        let recs = vec![
            sized("small1.txt", 20),
            sized("big.txt", 400),
            sized("small2.txt", 20),
        ];
        let batches = build_batches(recs, &CharRatioEstimator, 50, None).unwrap();
        assert_eq!(batches.len(), 2);
        assert_eq!(paths(&batches[0]), vec!["big.txt"]);
        assert_eq!(batches[0].estimated_tokens, 100);
        assert_eq!(paths(&batches[1]), vec!["small1.txt", "small2.txt"]);
    }

    #[test]
    fn oversized_entry_file_splits_accumulated_batch() {
        // entry files sort first, largest first: main.rs, index.js, other.txt
        let recs = vec![
            sized("index.js", 20),
            sized("main.rs", 400),
            sized("other.txt", 8),
        ];
        let batches = build_batches(recs, &CharRatioEstimator, 50, None).unwrap();
        assert_eq!(paths(&batches[0]), vec!["main.rs"]);
        assert_eq!(paths(&batches[1]), vec!["index.js", "other.txt"]);
    }

    #[test]
    fn oversized_file_after_small_ones_closes_them_first() {
        let est = |text: &str| if text.starts_with('B') { 500 } else { 10 };
        // all non-entry with equal sizes keep incoming order
        let recs = vec![
            FileRecord::new("one.txt", "aaaa"),
            FileRecord::new("two.txt", "aaaa"),
            FileRecord::new("huge.txt", "BBBB"),
            FileRecord::new("three.txt", "aaaa"),
        ];
        let batches = build_batches(recs, &est, 100, None).unwrap();
        assert_eq!(batches.len(), 3);
        assert_eq!(paths(&batches[0]), vec!["one.txt", "two.txt"]);
        assert_eq!(paths(&batches[1]), vec!["huge.txt"]);
        assert_eq!(batches[1].estimated_tokens, 500);
        assert_eq!(paths(&batches[2]), vec!["three.txt"]);
    }

    #[test]
    fn batches_partition_the_sorted_input() {
        let recs: Vec<FileRecord> = (0..37)
            .map(|i| sized(&format!("f{i}.txt"), (i * 13) % 97 + 1))
            .collect();
        let mut expected = recs.clone();
        sort_for_batching(&mut expected);

        let batches = build_batches(recs, &CharRatioEstimator, 30, None).unwrap();
        let flattened: Vec<&str> = batches
            .iter()
            .flat_map(|b| b.files.iter().map(|f| f.relative_path.as_str()))
            .collect();
        let expected: Vec<&str> = expected.iter().map(|f| f.relative_path.as_str()).collect();
        assert_eq!(flattened, expected);

        for batch in &batches {
            if batch.files.len() > 1 {
                assert!(batch.estimated_tokens <= 30);
            }
        }
    }

    #[test]
    fn labels_summarize_entry_and_languages() {
        let recs = vec![
            FileRecord::new("index.js", "a"),
            FileRecord::new("lib/util.ts", "b"),
            FileRecord::new("lib/more.js", "c"),
        ];
        let batches = build_batches(recs, &CharRatioEstimator, 100, None).unwrap();
        assert_eq!(batches[0].label, "Core files (JavaScript, TypeScript)");
        assert!(batches[0].has_entry_file());

        let batches =
            build_batches(vec![FileRecord::new("x.py", "a")], &CharRatioEstimator, 100, None)
                .unwrap();
        assert_eq!(batches[0].label, "Additional files (Python)");
    }

    #[test]
    fn empty_input_yields_no_batches() {
        let batches = build_batches(Vec::new(), &CharRatioEstimator, 10, None).unwrap();
        assert!(batches.is_empty());
    }

    #[test]
    fn zero_budget_is_rejected() {
        let err = build_batches(Vec::new(), &CharRatioEstimator, 0, None).unwrap_err();
        assert!(matches!(err, AppError::InvalidArgument(_)));
    }
}
