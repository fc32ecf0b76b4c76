//! Tracing subscriber setup for the `lifecycles` binary.
//!
//! Verbosity flags only raise this crate's own targets; dependencies stay at
//! `warn` until `-vvv`. `LIFECYCLES_LOG_LEVEL` replaces the whole filter.

use std::io::IsTerminal;
use tracing_subscriber::EnvFilter;

use crate::cli::args::ColorChoice;

/// Environment variable that overrides the verbosity flags.
pub const LOG_LEVEL_ENV: &str = "LIFECYCLES_LOG_LEVEL";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable format with optional ANSI colors.
    #[default]
    Human,
    /// Newline-delimited JSON for machine consumption.
    Json,
}

/// Filter directive for a `-v` count.
///
/// | count | engine and runner | dependencies |
/// |-------|-------------------|--------------|
/// | 0     | warn              | warn         |
/// | 1     | info (run and tick summaries) | warn |
/// | 2     | debug (each phase reached)    | warn |
/// | 3+    | trace (skipped steps)         | info |
#[must_use]
pub const fn verbosity_to_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "warn,lifecycles=info",
        2 => "warn,lifecycles=debug",
        _ => "info,lifecycles=trace",
    }
}

fn ansi_enabled(color: ColorChoice, stderr_is_terminal: bool, no_color: bool) -> bool {
    match color {
        ColorChoice::Auto => stderr_is_terminal && !no_color,
        ColorChoice::Always => true,
        ColorChoice::Never => false,
    }
}

/// Initializes the global tracing subscriber on stderr.
///
/// Safe to call more than once; later calls are ignored.
pub fn init_logging(format: LogFormat, verbosity: u8, color: ColorChoice) {
    let filter = EnvFilter::try_from_env(LOG_LEVEL_ENV)
        .unwrap_or_else(|_| EnvFilter::new(verbosity_to_directive(verbosity)));

    // Targets only matter once more than one module is chatty.
    let show_target = verbosity >= 2;

    match format {
        LogFormat::Human => {
            let use_ansi = ansi_enabled(
                color,
                std::io::stderr().is_terminal(),
                std::env::var_os("NO_COLOR").is_some(),
            );
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(use_ansi)
                .with_target(show_target)
                .with_writer(std::io::stderr)
                .try_init();
        }
        LogFormat::Json => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .json()
                .with_target(show_target)
                .with_writer(std::io::stderr)
                .try_init();
        }
    }
}
