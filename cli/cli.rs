mod cli_args;
mod commands;
mod interrupt;
mod output;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use colored::*;
use log;
use std::path::Path;
use std::process;

use cli_args::{ChunkOpts, Cli, Commands, ProjectConfigOpts, ScanOpts};
use projdoc_core::config::TokenEstimatorKind;
use projdoc_core::{AppError, Config};

fn main() {
    let cli_args = Cli::parse();

    setup_logging(cli_args.quiet, cli_args.verbose);

    let quiet = cli_args.quiet;

    log::debug!("CLI args parsed: {:?}", cli_args);

    let exit_code = match run_app(cli_args, quiet) {
        Ok(_) => {
            log::info!("Application finished successfully.");
            0
        }
        Err(e) => {
            let core_err = e.downcast_ref::<AppError>();
            let exit_code = exit_code_for(&e);

            // Configuration and workspace errors always reach the user, even with -q
            if !quiet || exit_code == 1 || exit_code == 2 || exit_code == 5 {
                eprintln!("{} {:#}", "Error:".red().bold(), e);
                if let Some(hint) = core_err.and_then(actionable_hint) {
                    eprintln!("{} {}", "Hint:".yellow().bold(), hint);
                }
            } else {
                log::error!("Application failed: {:#}", e);
            }

            exit_code
        }
    };
    log::debug!("Exiting with code {}", exit_code);
    process::exit(exit_code);
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<AppError>() {
        Some(AppError::Config(_)) => 1,
        Some(AppError::TomlParse(_)) => 1,
        Some(AppError::TomlSerialize(_)) => 1,
        Some(AppError::MissingCredential { .. }) => 1,
        Some(AppError::Io(_)) => 2,
        Some(AppError::FileRead { .. }) => 2,
        Some(AppError::FileWrite { .. }) => 2,
        Some(AppError::WorkspaceNotFound(_)) => 2,
        Some(AppError::InvalidArgument(_)) => 5,
        Some(AppError::DurationParse(_)) => 5,
        Some(AppError::JsonSerialize(_)) => 6,
        Some(AppError::YamlError(_)) => 6,
        Some(AppError::Generation(_)) => 7,
        Some(AppError::TikToken(_)) => 8,
        Some(AppError::Cancelled) => 130,
        Some(_) => 1,
        None => 1,
    }
}

fn actionable_hint(err: &AppError) -> Option<String> {
    match err {
        AppError::MissingCredential { env_var } => Some(format!(
            "export {}=<your key>, or set [generation].api_key in {}",
            env_var,
            Path::new(projdoc_core::config::DEFAULT_CONFIG_DIR)
                .join(projdoc_core::config::DEFAULT_CONFIG_FILENAME)
                .display()
        )),
        AppError::WorkspaceNotFound(_) => {
            Some("pass an existing directory with --project-root or set PROJECT_ROOT".to_string())
        }
        AppError::TomlParse(_) | AppError::Config(_) => {
            Some("run `projdoc config` to see the expected structure".to_string())
        }
        _ => None,
    }
}

fn setup_logging(quiet: bool, verbose: u8) {
    let log_level = if quiet {
        log::LevelFilter::Off
    } else {
        match verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    };
    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp(None)
        .init();
    log::trace!("Logger initialized with level: {:?}", log_level);
}

fn run_app(cli: Cli, quiet: bool) -> Result<()> {
    match cli.command {
        None => {
            Cli::command().print_help()?;
        }
        Some(command) => match command {
            Commands::Scan(args) => {
                log::debug!("Executing 'scan' command...");
                commands::scan::handle_scan_command(args, quiet)?;
            }
            Commands::Chunks(args) => {
                log::debug!("Executing 'chunks' command...");
                commands::chunks::handle_chunks_command(args, quiet)?;
            }
            Commands::Generate(args) => {
                log::debug!("Executing 'generate' command...");
                commands::generate::handle_generate_command(args, quiet)?;
            }
            Commands::Config(args) => {
                log::debug!("Executing 'config' command...");
                commands::config::handle_config_command(&args, quiet)?;
            }
            Commands::Completion(args) => {
                log::debug!("Executing 'completion' command...");
                commands::completion::handle_completion_command(&args, quiet)?;
            }
        },
    }
    Ok(())
}

fn merge_scan_overrides(config: &mut Config, scan: &ScanOpts) {
    if let Some(size) = &scan.max_file_size {
        config.scan.max_file_size = size.clone();
    }
    if !scan.exclude.is_empty() {
        config
            .scan
            .additional_exclude_patterns
            .extend(scan.exclude.iter().cloned());
    }
    if scan.no_ignore_file {
        config.general.use_ignore_file = false;
    }
    if scan.no_builtin_ignore {
        config.general.enable_builtin_ignore = false;
    }
    if scan.follow_links {
        config.scan.follow_links = true;
    }
}

fn merge_chunk_overrides(config: &mut Config, chunk: &ChunkOpts) {
    if let Some(max_tokens) = chunk.max_tokens {
        config.chunking.max_tokens_per_chunk = max_tokens;
    }
    if let Some(estimator) = chunk.token_estimator.as_deref() {
        config.chunking.token_estimator = match estimator {
            "cl100k" => TokenEstimatorKind::Cl100k,
            _ => TokenEstimatorKind::Chars,
        };
    }
}

/// Loads the config file for `project_root` (if any), applies CLI overrides
/// and validates the result once, before any pipeline work starts.
pub fn load_config_for_command(
    project_root: &Path,
    project_opts: &ProjectConfigOpts,
    scan: Option<&ScanOpts>,
    chunk: Option<&ChunkOpts>,
) -> Result<Config> {
    let config_path = Config::resolve_config_path(
        project_root,
        project_opts.config_file.as_ref(),
        project_opts.no_config_file,
    )
    .context("Failed to resolve configuration path")?;

    let mut config = match &config_path {
        Some(path) => Config::load_from_path(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::default(),
    };

    if let Some(name) = &project_opts.project_name {
        config.general.project_name = Some(name.clone());
    }
    if let Some(scan) = scan {
        merge_scan_overrides(&mut config, scan);
    }
    if let Some(chunk) = chunk {
        merge_chunk_overrides(&mut config, chunk);
    }

    config.general.project_name = Some(config.get_effective_project_name(project_root));
    config.validate().context("Invalid configuration")?;
    log::trace!("Effective config: {:?}", config);
    Ok(config)
}
