//! `lifecycles` - deterministic barrier-driven lifecycle orchestration

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use tokio::signal::unix::{Signal, SignalKind, signal};
use tokio_util::sync::CancellationToken;

use lifecycles::cli::args::Cli;
use lifecycles::cli::commands;
use lifecycles::error::{ExitCode, LifecycleError, ScenarioError};
use lifecycles::observability::init_logging;

/// Waits for SIGTERM, or forever if the handler could not be installed.
async fn sigterm(handler: &mut Option<Signal>) {
    match handler {
        Some(sig) => {
            sig.recv().await;
        }
        None => std::future::pending::<()>().await,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if !cli.quiet {
        init_logging(cli.log_format.into(), cli.verbose, cli.color);
    }

    let cancel = CancellationToken::new();
    let terminated = Arc::new(AtomicBool::new(false));

    // Spawn signal handler for graceful shutdown
    {
        let cancel = cancel.clone();
        let terminated = Arc::clone(&terminated);
        tokio::spawn(async move {
            let mut handler = signal(SignalKind::terminate())
                .inspect_err(|e| tracing::warn!(error = %e, "failed to register SIGTERM handler"))
                .ok();

            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                () = sigterm(&mut handler) => terminated.store(true, Ordering::SeqCst),
            }

            eprintln!("\nShutting down gracefully... (press Ctrl+C again to force)");
            cancel.cancel();

            tokio::select! {
                _ = tokio::signal::ctrl_c() => std::process::exit(ExitCode::INTERRUPTED),
                () = sigterm(&mut handler) => std::process::exit(ExitCode::TERMINATED),
            }
        });
    }

    match commands::dispatch(cli, cancel).await {
        Ok(()) => std::process::exit(ExitCode::SUCCESS),
        Err(LifecycleError::Scenario(ScenarioError::Interrupted))
            if terminated.load(Ordering::SeqCst) =>
        {
            eprintln!("error: {}", ScenarioError::Terminated);
            std::process::exit(ExitCode::TERMINATED);
        }
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(e.exit_code());
        }
    }
}
