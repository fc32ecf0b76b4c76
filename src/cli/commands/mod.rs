//! CLI command dispatch and handlers
//!
//! Routes parsed CLI arguments to the appropriate command handler.

pub mod phases;
pub mod run;
pub mod validate;
pub mod version;

use tokio_util::sync::CancellationToken;

use crate::cli::args::{Cli, Commands};
use crate::error::LifecycleError;

/// Dispatch a parsed CLI invocation to the appropriate command handler.
///
/// `cancel` is fired by the signal handler in `main`.
///
/// # Errors
///
/// Returns an error if the dispatched command handler fails.
pub async fn dispatch(cli: Cli, cancel: CancellationToken) -> Result<(), LifecycleError> {
    match cli.command {
        Commands::Run(args) => run::run(&args, cancel).await,
        Commands::Validate(args) => validate::run(&args),
        Commands::Phases(args) => phases::run(&args),
        Commands::Version(args) => {
            version::run(&args);
            Ok(())
        }
    }
}
