//! `phases` command
//!
//! Prints the ranked phase table with each phase's band and the hook that
//! reaches it.

use serde::Serialize;

use crate::cli::args::{OutputFormat, PhasesArgs};
use crate::error::LifecycleError;
use crate::lifecycle::{Band, Operation, Phase};

#[derive(Debug, Serialize)]
struct PhaseRow {
    rank: u16,
    phase: Phase,
    band: Option<Band>,
    operation: Option<Operation>,
    prerequisite: Option<Phase>,
}

fn rows() -> Vec<PhaseRow> {
    Phase::ALL
        .into_iter()
        .map(|phase| {
            let operation = phase.operation();
            PhaseRow {
                rank: phase.rank(),
                phase,
                band: phase.band(),
                operation,
                prerequisite: operation.and_then(Operation::prerequisite),
            }
        })
        .collect()
}

/// Print the phase table.
///
/// # Errors
///
/// Returns a JSON error if serialization fails.
pub fn run(args: &PhasesArgs) -> Result<(), LifecycleError> {
    let rows = rows();
    match args.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        OutputFormat::Human => {
            println!(
                "{:>5}  {:<18} {:<8} {:<18} REQUIRES",
                "RANK", "PHASE", "BAND", "HOOK"
            );
            for row in &rows {
                println!(
                    "{:>5}  {:<18} {:<8} {:<18} {}",
                    row.rank,
                    row.phase.name(),
                    row.band.map_or("-", Band::name),
                    row.operation.map_or("-", Operation::name),
                    row.prerequisite.map_or("-", Phase::name),
                );
            }
        }
    }
    Ok(())
}
