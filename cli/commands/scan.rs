use anyhow::{Context, Result};
use colored::*;
use log;
use serde::Serialize;
use std::path::Path;

use projdoc_core::{Config, FileRecord, Pipeline, PipelineOutput, ProjectAnalysis};

use crate::cli_args::ScanArgs;
use crate::load_config_for_command;
use crate::output;

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SkippedFile {
    pub path: String,
    pub reason: String,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport<'a> {
    pub project_name: &'a str,
    pub project_root: String,
    pub analysis: &'a ProjectAnalysis,
    pub files: Vec<&'a FileRecord>,
    pub skipped: Vec<SkippedFile>,
    pub directory_errors: Vec<String>,
}

impl<'a> ScanReport<'a> {
    pub fn new(project_name: &'a str, project_root: &Path, output: &'a PipelineOutput) -> Self {
        Self {
            project_name,
            project_root: project_root.display().to_string(),
            analysis: &output.analysis,
            files: output.records(),
            skipped: output
                .load
                .skipped
                .iter()
                .map(|(path, reason)| SkippedFile {
                    path: path.clone(),
                    reason: reason.to_string(),
                })
                .collect(),
            directory_errors: output
                .discovery
                .errors
                .iter()
                .map(|e| match &e.path {
                    Some(p) => format!("{}: {}", p.display(), e.message),
                    None => e.message.clone(),
                })
                .collect(),
        }
    }
}

pub fn handle_scan_command(args: ScanArgs, quiet: bool) -> Result<()> {
    let project_root = Config::determine_project_root(args.project_config.project_root.as_ref())
        .context("Failed to determine project root")?;
    log::info!("Project root determined: {}", project_root.display());

    let config = load_config_for_command(
        &project_root,
        &args.project_config,
        Some(&args.scan),
        None,
    )?;
    let project_name = config.get_effective_project_name(&project_root);

    let pipeline = Pipeline::new(config);
    let result = pipeline
        .run(&project_root, None)
        .context("Failed to scan project")?;

    if !quiet {
        for error in &result.discovery.errors {
            eprintln!("{} {}", "Warning:".yellow(), error.message);
        }
    }

    let report = ScanReport::new(&project_name, &project_root, &result);
    output::print_data_or_text(
        &report,
        || output::print_analysis_pretty(&project_name, &result.analysis, &result.load),
        &args.format_output,
    )
}
