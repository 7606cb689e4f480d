use anyhow::{Context, Result};
use colored::Colorize;
use log;
use std::path::{Path, PathBuf};

use projdoc_core::progress::{self, ProgressEvent, Stage};
use projdoc_core::{
    Config, GenerationSettings, HttpGenerationClient, Pipeline, generate_document,
};

use crate::cli_args::GenerateArgs;
use crate::interrupt;
use crate::load_config_for_command;
use crate::output;

fn apply_generation_overrides(config: &mut Config, args: &GenerateArgs) {
    if let Some(model) = &args.model {
        config.generation.model = model.clone();
    }
    if let Some(endpoint) = &args.endpoint {
        config.generation.endpoint = endpoint.clone();
    }
    if let Some(delay) = &args.request_delay {
        config.generation.request_delay = delay.clone();
    }
    if args.no_backup {
        config.output.backup_existing = false;
    }
}

/// `--save` without a value falls back to `[output].file_name`; relative
/// paths resolve against the project root.
fn resolve_output_path(project_root: &Path, config: &Config, save: &Option<PathBuf>) -> PathBuf {
    let path = save.clone().unwrap_or_else(|| config.output.file_name.clone());
    if path.is_absolute() {
        path
    } else {
        project_root.join(path)
    }
}

pub fn handle_generate_command(args: GenerateArgs, quiet: bool) -> Result<()> {
    let project_root = Config::determine_project_root(args.project_config.project_root.as_ref())
        .context("Failed to determine project root")?;
    log::info!("Project root determined: {}", project_root.display());

    let mut config = load_config_for_command(
        &project_root,
        &args.project_config,
        Some(&args.scan),
        Some(&args.chunk),
    )?;
    apply_generation_overrides(&mut config, &args);
    config.validate().context("Invalid configuration")?;
    let project_name = config.get_effective_project_name(&project_root);

    // Credentials and settings are checked before any project file is read.
    let client = if args.dry_run {
        None
    } else {
        Some(HttpGenerationClient::from_config(&config)?)
    };
    let settings = GenerationSettings::from_config(&config)?;
    let backup_existing = config.output.backup_existing;
    let output_path = resolve_output_path(&project_root, &config, &args.save.clone().flatten());

    let pipeline = Pipeline::new(config);
    interrupt::install_interrupt_handler(pipeline.cancellation().clone(), quiet);
    let (progress_tx, progress_handle) = output::spawn_progress_printer(quiet);

    let run = pipeline
        .run(&project_root, Some(&progress_tx))
        .context("Failed to prepare project batches")
        .and_then(|result| match &client {
            None => Ok((result, None)),
            Some(client) => generate_document(
                client,
                &project_name,
                &result.analysis,
                &result.batches,
                &settings,
                Some(&progress_tx),
                Some(pipeline.cancellation()),
            )
            .context("Failed to generate document")
            .map(|doc| (result, Some(doc))),
        });

    if let Ok((_, document)) = &run {
        let event = match document {
            None => ProgressEvent::new(Stage::Previewing, 100, "Batch plan ready"),
            Some(_) if args.stdout || args.save.is_none() => {
                ProgressEvent::new(Stage::Previewing, 100, "Document ready")
            }
            Some(_) => ProgressEvent::new(
                Stage::Saving,
                100,
                format!("Saving {}", output_path.display()),
            ),
        };
        progress::report(Some(&progress_tx), event);
    }
    drop(progress_tx);
    if progress_handle.join().is_err() {
        log::warn!("Progress printer thread panicked.");
    }
    let (result, document) = run?;

    for (path, reason) in &result.load.skipped {
        log::warn!("Skipped {}: {}", path, reason);
    }

    let Some(document) = document else {
        if !quiet {
            println!(
                "{} Dry run: {} files in {} batches, no requests sent.",
                "ℹ".blue(),
                result.record_count().to_string().cyan(),
                result.batches.len().to_string().cyan()
            );
        }
        return output::print_batches_pretty(&result.batches);
    };

    let failed = document.failed_batches();
    if failed > 0 && !quiet {
        eprintln!(
            "{} {} of {} batches fell back to placeholder text.",
            "Warning:".yellow(),
            failed,
            document.outcomes.len()
        );
    }

    if args.stdout || args.save.is_none() {
        return output::write_to_stdout(&document.content);
    }

    let backup = output::save_document(&output_path, &document.content, backup_existing)?;
    if !quiet {
        if let Some(backup) = backup {
            println!(
                "{} Previous document kept at: {}",
                "↺".yellow(),
                backup.display().to_string().dimmed()
            );
        }
        println!(
            "{} Document saved to: {}",
            "✅".green(),
            output_path.display().to_string().blue()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn output_path_defaults_to_configured_file_under_root() {
        let config = Config::default();
        let root = Path::new("/work/demo");
        assert_eq!(
            resolve_output_path(root, &config, &None),
            PathBuf::from("/work/demo/README.md")
        );
        assert_eq!(
            resolve_output_path(root, &config, &Some(PathBuf::from("docs/OVERVIEW.md"))),
            PathBuf::from("/work/demo/docs/OVERVIEW.md")
        );
        assert_eq!(
            resolve_output_path(root, &config, &Some(PathBuf::from("/tmp/out.md"))),
            PathBuf::from("/tmp/out.md")
        );
    }
}
