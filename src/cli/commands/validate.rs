//! `validate` command
//!
//! Loads and validates scenario files without running them.

use crate::cli::args::{OutputFormat, ValidateArgs};
use crate::config::{ConfigLoader, LoadWarning};
use crate::error::{ConfigError, LifecycleError, Severity, ValidationIssue};

/// Validate scenario files.
///
/// # Errors
///
/// Returns an I/O error if any file does not exist, or a config error
/// if validation fails (including warnings under `--strict`).
pub fn run(args: &ValidateArgs) -> Result<(), LifecycleError> {
    let loader = ConfigLoader::with_defaults();
    let mut report = Vec::with_capacity(args.files.len());

    for path in &args.files {
        if !path.exists() {
            return Err(LifecycleError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("file not found: {}", path.display()),
            )));
        }
        tracing::info!(file = %path.display(), "validating scenario");

        let load_result = loader.load(path)?;

        for warning in &load_result.warnings {
            tracing::warn!(
                location = warning.location.as_deref().unwrap_or("<unknown>"),
                "{}",
                warning.message
            );
        }

        if args.strict && !load_result.warnings.is_empty() {
            return Err(ConfigError::ValidationError {
                path: path.display().to_string(),
                errors: load_result.warnings.iter().map(as_error).collect(),
            }
            .into());
        }

        tracing::info!(file = %path.display(), "scenario valid");
        report.push(serde_json::json!({
            "file": path.display().to_string(),
            "scenario": load_result.scenario.name,
            "entities": load_result.scenario.entities.len(),
            "steps": load_result.scenario.steps.len(),
            "warnings": load_result
                .warnings
                .iter()
                .map(|w| w.message.clone())
                .collect::<Vec<_>>(),
        }));
    }

    match args.format {
        OutputFormat::Human => {
            for entry in &report {
                println!(
                    "ok {} ({} entities, {} steps, {} warnings)",
                    entry["file"].as_str().unwrap_or_default(),
                    entry["entities"],
                    entry["steps"],
                    entry["warnings"].as_array().map_or(0, Vec::len)
                );
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }
    Ok(())
}

/// Promotes a load warning to an error under `--strict`.
fn as_error(warning: &LoadWarning) -> ValidationIssue {
    ValidationIssue {
        path: warning.location.clone().unwrap_or_default(),
        message: warning.message.clone(),
        severity: Severity::Error,
    }
}
