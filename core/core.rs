pub mod analyzer;
pub mod chunking;
pub mod classify;
pub mod config;
pub mod discover;
pub mod error;
pub mod generation;
pub mod ignore_rules;
pub mod loader;
pub mod output_formats;
pub mod pipeline;
pub mod progress;

pub use analyzer::{ProjectAnalysis, ProjectType, analyze};
pub use chunking::{Batch, CharRatioEstimator, TokenEstimator, build_batches};
pub use classify::{FileRole, language_of};
pub use config::Config;
pub use discover::{DiscoveryReport, discover};
pub use error::{AppError, GenerationError, Result};
pub use generation::{
    GeneratedDocument, GenerationClient, GenerationSettings, HttpGenerationClient,
    generate_document,
};
pub use ignore_rules::{IgnoreRule, IgnoreRuleEngine, is_binary_file};
pub use loader::{FileRecord, LoadReport, SkipReason};
pub use output_formats::{serialize_to_json, serialize_to_yaml};
pub use pipeline::{Pipeline, PipelineOutput};
pub use progress::{CancellationToken, ProgressEvent, Stage};
