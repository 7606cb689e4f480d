use anyhow::{Context, Result};
use log;

use projdoc_core::{Config, Pipeline};

use crate::cli_args::ChunksArgs;
use crate::interrupt;
use crate::load_config_for_command;
use crate::output;

pub fn handle_chunks_command(args: ChunksArgs, quiet: bool) -> Result<()> {
    let project_root = Config::determine_project_root(args.project_config.project_root.as_ref())
        .context("Failed to determine project root")?;

    let config = load_config_for_command(
        &project_root,
        &args.project_config,
        Some(&args.scan),
        Some(&args.chunk),
    )?;
    log::debug!(
        "Batching with a budget of {} tokens ({:?} estimator)",
        config.chunking.max_tokens_per_chunk,
        config.chunking.token_estimator
    );

    let (progress_tx, progress_handle) = output::spawn_progress_printer(quiet);
    let pipeline = Pipeline::new(config);
    interrupt::install_interrupt_handler(pipeline.cancellation().clone(), quiet);
    let result = pipeline.run(&project_root, Some(&progress_tx));
    drop(progress_tx);
    if progress_handle.join().is_err() {
        log::warn!("Progress printer thread panicked.");
    }
    let result = result.context("Failed to build batches")?;

    output::print_data_or_text(
        &result.batches,
        || output::print_batches_pretty(&result.batches),
        &args.format_output,
    )
}
