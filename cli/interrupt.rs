use colored::*;
use log;
use std::process;
use std::thread;

use projdoc_core::CancellationToken;

/// What a Ctrl-C press should do given the current token state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptAction {
    /// First press: stop after the current file or batch.
    Cancel,
    /// Second press while already cancelling: leave immediately.
    Exit,
}

pub fn on_interrupt(token: &CancellationToken) -> InterruptAction {
    if token.is_cancelled() {
        InterruptAction::Exit
    } else {
        token.cancel();
        InterruptAction::Cancel
    }
}

/// Watches for Ctrl-C on a background thread and trips `token`. The thread
/// owns a small current-thread runtime just for the signal future.
pub fn install_interrupt_handler(token: CancellationToken, quiet: bool) {
    let spawned = thread::Builder::new()
        .name("projdoc-interrupt".to_string())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_io()
                .build()
            {
                Ok(rt) => rt,
                Err(e) => {
                    log::warn!("Could not start interrupt watcher: {}", e);
                    return;
                }
            };
            runtime.block_on(async move {
                loop {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        log::warn!("Could not listen for Ctrl-C: {}", e);
                        return;
                    }
                    match on_interrupt(&token) {
                        InterruptAction::Cancel => {
                            if !quiet {
                                eprintln!(
                                    "{} Interrupted, finishing the current step (Ctrl-C again to abort).",
                                    "⚠️".yellow()
                                );
                            }
                        }
                        InterruptAction::Exit => process::exit(130),
                    }
                }
            });
        });
    if let Err(e) = spawned {
        log::warn!("Could not spawn interrupt watcher: {}", e);
    }
}
