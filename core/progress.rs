#[cfg(feature = "serde_support")]
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde_support", derive(Serialize))]
#[cfg_attr(feature = "serde_support", serde(rename_all = "lowercase"))]
pub enum Stage {
    Scanning,
    Analyzing,
    Chunking,
    Generating,
    Previewing,
    Saving,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Scanning => "scanning",
            Stage::Analyzing => "analyzing",
            Stage::Chunking => "chunking",
            Stage::Generating => "generating",
            Stage::Previewing => "previewing",
            Stage::Saving => "saving",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde_support", derive(Serialize))]
#[cfg_attr(feature = "serde_support", serde(rename_all = "camelCase"))]
pub struct ProgressEvent {
    pub stage: Stage,
    pub message: String,
    /// 0 to 100, non-decreasing within a stage.
    pub percentage: u8,
    #[cfg_attr(
        feature = "serde_support",
        serde(skip_serializing_if = "Option::is_none")
    )]
    pub current_file: Option<String>,
    #[cfg_attr(
        feature = "serde_support",
        serde(skip_serializing_if = "Option::is_none")
    )]
    pub total_files: Option<usize>,
    #[cfg_attr(
        feature = "serde_support",
        serde(skip_serializing_if = "Option::is_none")
    )]
    pub processed_files: Option<usize>,
}

impl ProgressEvent {
    pub fn new(stage: Stage, percentage: u8, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
            percentage: percentage.min(100),
            current_file: None,
            total_files: None,
            processed_files: None,
        }
    }

    pub fn with_files(mut self, current: Option<String>, processed: usize, total: usize) -> Self {
        self.current_file = current;
        self.processed_files = Some(processed);
        self.total_files = Some(total);
        self
    }
}

/// Best-effort send; a dropped receiver just means nobody is listening.
pub fn report(progress: Option<&Sender<ProgressEvent>>, event: ProgressEvent) {
    if let Some(tx) = progress {
        log::trace!("Progress [{}] {}%: {}", event.stage, event.percentage, event.message);
        if tx.send(event).is_err() {
            log::trace!("Progress receiver dropped; event discarded.");
        }
    }
}

/// Maps `done / total` into the `[start, end]` percentage range.
pub fn scale(done: usize, total: usize, start: u8, end: u8) -> u8 {
    if total == 0 {
        return end;
    }
    let span = end.saturating_sub(start) as usize;
    let scaled = start as usize + (done.min(total) * span) / total;
    scaled.min(end as usize) as u8
}

/// Cooperative cancellation flag shared between the caller and a pipeline run.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn scale_maps_into_range() {
        assert_eq!(scale(0, 10, 25, 55), 25);
        assert_eq!(scale(5, 10, 25, 55), 40);
        assert_eq!(scale(10, 10, 25, 55), 55);
        assert_eq!(scale(12, 10, 25, 55), 55);
        assert_eq!(scale(0, 0, 25, 55), 55);
    }

    #[test]
    fn report_survives_dropped_receiver() {
        let (tx, rx) = mpsc::channel();
        drop(rx);
        report(Some(&tx), ProgressEvent::new(Stage::Scanning, 10, "scan"));
    }

    #[test]
    fn cancellation_is_shared_between_clones() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }
}
