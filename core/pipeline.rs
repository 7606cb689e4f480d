use crate::analyzer::{ProjectAnalysis, analyze};
use crate::chunking::{Batch, build_batches, estimator_for};
use crate::config::Config;
use crate::discover::{DiscoveryReport, discover};
use crate::error::{AppError, Result};
use crate::ignore_rules::IgnoreRuleEngine;
use crate::loader::{FileRecord, LoadReport, load_files};
use crate::progress::{self, CancellationToken, ProgressEvent, Stage};
use log;
use std::collections::HashMap;
use std::path::Path;
use std::sync::mpsc::Sender;

pub const SCAN_PROGRESS: u8 = 10;

#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub discovery: DiscoveryReport,
    /// Skipped files only; loaded records are moved into `batches`.
    pub load: LoadReport,
    pub analysis: ProjectAnalysis,
    pub batches: Vec<Batch>,
}

impl PipelineOutput {
    /// Loaded records in discovery order.
    pub fn records(&self) -> Vec<&FileRecord> {
        let mut records: Vec<&FileRecord> =
            self.batches.iter().flat_map(|b| b.files.iter()).collect();
        let order: HashMap<&str, usize> = self
            .discovery
            .files
            .iter()
            .enumerate()
            .map(|(i, p)| (p.as_str(), i))
            .collect();
        records.sort_by_key(|r| order.get(r.relative_path.as_str()).copied());
        records
    }

    pub fn record_count(&self) -> usize {
        self.batches.iter().map(|b| b.files.len()).sum()
    }
}

/// Discover, load, analyze and chunk one project root. The configuration is
/// fixed for the lifetime of the pipeline.
pub struct Pipeline {
    config: Config,
    cancel: CancellationToken,
}

impl Pipeline {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn run(
        &self,
        root: &Path,
        progress: Option<&Sender<ProgressEvent>>,
    ) -> Result<PipelineOutput> {
        if !root.is_dir() {
            return Err(AppError::WorkspaceNotFound(root.to_path_buf()));
        }
        let max_file_size = self.config.max_file_size_bytes()?;
        let estimator = estimator_for(self.config.chunking.token_estimator)?;

        progress::report(
            progress,
            ProgressEvent::new(Stage::Scanning, SCAN_PROGRESS, "Scanning project files"),
        );
        log::debug!("Building ignore rules for {}", root.display());
        let engine = IgnoreRuleEngine::from_config(root, &self.config)?;
        let discovery = discover(root, &engine, self.config.scan.follow_links);
        if self.cancel.is_cancelled() {
            return Err(AppError::Cancelled);
        }

        let mut load = load_files(
            root,
            &discovery.files,
            max_file_size,
            progress,
            Some(&self.cancel),
        )?;

        let analysis = analyze(&load.records);

        if self.cancel.is_cancelled() {
            return Err(AppError::Cancelled);
        }
        let records = std::mem::take(&mut load.records);
        let batches = build_batches(
            records,
            estimator.as_ref(),
            self.config.chunking.max_tokens_per_chunk,
            progress,
        )?;

        Ok(PipelineOutput {
            discovery,
            load,
            analysis,
            batches,
        })
    }
}
