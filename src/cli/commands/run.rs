//! `run` command
//!
//! Loads a scenario, drives it through a fresh engine and prints the
//! summary. Exits non-zero when any expectation fails.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::cli::args::{OutputFormat, RunArgs};
use crate::config::ConfigLoader;
use crate::error::{LifecycleError, ScenarioError};
use crate::host::{RunSummary, Runner};
use crate::observability::EventEmitter;

/// Run a scenario file.
///
/// # Errors
///
/// Returns a config error if the scenario does not load, an I/O error if
/// the events file cannot be created, and a scenario error if the run is
/// cancelled or an expectation fails.
pub async fn run(args: &RunArgs, cancel: CancellationToken) -> Result<(), LifecycleError> {
    if let Some(port) = args.metrics_port {
        crate::observability::init_metrics(Some(port))?;
        tracing::info!(port, "Prometheus metrics endpoint started");
    }

    tracing::info!(scenario = %args.scenario.display(), "loading scenario");
    let load_result = ConfigLoader::with_defaults().load(&args.scenario)?;

    for warning in &load_result.warnings {
        tracing::warn!(
            location = warning.location.as_deref().unwrap_or("<unknown>"),
            "{}",
            warning.message
        );
    }

    let emitter = if let Some(ref path) = args.events_file {
        EventEmitter::from_file(path)?
    } else {
        EventEmitter::stderr()
    };

    let mut runner = Runner::new(load_result.scenario, Arc::new(emitter))
        .realtime(args.realtime)
        .with_cancellation(cancel);
    let summary = runner.run().await?;

    print_summary(&summary, args.format)?;

    if summary.is_success() {
        Ok(())
    } else {
        Err(ScenarioError::ExpectationsFailed {
            failed: summary.failed(),
            total: summary.expectations.len(),
        }
        .into())
    }
}

fn print_summary(summary: &RunSummary, format: OutputFormat) -> Result<(), LifecycleError> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(summary)?);
        }
        OutputFormat::Human => {
            println!(
                "{}: {}/{} expectations passed after {} ticks",
                summary.scenario,
                summary.passed(),
                summary.expectations.len(),
                summary.ticks
            );
            for outcome in summary.expectations.iter().filter(|e| !e.passed()) {
                println!("  step {} ({}):", outcome.step, outcome.entity);
                for mismatch in &outcome.mismatches {
                    println!("    - {mismatch}");
                }
            }
            for entity in &summary.entities {
                let fault = entity
                    .fault_summary
                    .as_deref()
                    .map(|s| format!(" [{s}]"))
                    .unwrap_or_default();
                println!(
                    "  {:<16} {:<18} cycle {} {}{fault}",
                    entity.label,
                    entity.phase.name(),
                    entity.cycle,
                    if entity.is_active { "active" } else { "inactive" },
                );
            }
        }
    }
    Ok(())
}
