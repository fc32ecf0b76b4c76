//! Error types for `lifecycles`
//!
//! Crate-level error hierarchy, exit codes for the CLI, validation issue
//! types, and the error type returned by phase hooks.

use std::path::PathBuf;
use thiserror::Error;

// ============================================================================
// Exit Codes
// ============================================================================

/// Exit codes for `lifecycles` CLI operations.
///
/// These codes follow Unix conventions.
pub struct ExitCode;

impl ExitCode {
    /// Successful execution
    pub const SUCCESS: i32 = 0;

    /// General error
    pub const ERROR: i32 = 1;

    /// Configuration error (invalid YAML, validation failure)
    pub const CONFIG_ERROR: i32 = 2;

    /// I/O error (file not found, permission denied)
    pub const IO_ERROR: i32 = 3;

    /// A scenario ran but one of its expectations did not hold
    pub const SCENARIO_FAILED: i32 = 5;

    /// Usage error (invalid arguments, missing required options)
    pub const USAGE_ERROR: i32 = 64;

    /// Interrupted by SIGINT (Ctrl+C)
    pub const INTERRUPTED: i32 = 130;

    /// Terminated by SIGTERM
    pub const TERMINATED: i32 = 143;
}

// ============================================================================
// Top-Level Error
// ============================================================================

/// Top-level error type for `lifecycles` operations.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// Scenario loading or validation error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Scenario execution error
    #[error(transparent)]
    Scenario(#[from] ScenarioError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl LifecycleError {
    /// Returns the appropriate exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Json(_) | Self::Yaml(_) => ExitCode::CONFIG_ERROR,
            Self::Scenario(err) => err.exit_code(),
            Self::Io(_) => ExitCode::IO_ERROR,
        }
    }
}

// ============================================================================
// Configuration Errors
// ============================================================================

/// Scenario file loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// YAML parsing failed
    #[error("parse error in {path}: {message}")]
    ParseError {
        /// Path to the scenario file
        path: PathBuf,
        /// Line number where the error occurred (if available)
        line: Option<usize>,
        /// Error message from the parser
        message: String,
    },

    /// Scenario validation failed
    #[error("validation failed for {path}")]
    ValidationError {
        /// Path to the scenario file
        path: String,
        /// List of validation issues found
        errors: Vec<ValidationIssue>,
    },

    /// Referenced scenario file not found
    #[error("file not found: {path}")]
    MissingFile {
        /// Path to the missing file
        path: PathBuf,
    },

    /// Field has an invalid value
    #[error("invalid value for '{field}': got '{value}', expected {expected}")]
    InvalidValue {
        /// Name of the field with invalid value
        field: String,
        /// The actual value provided
        value: String,
        /// Description of what was expected
        expected: String,
    },

    /// A configured limit was exceeded
    #[error("{what} exceeds limit: {actual} > {limit}")]
    LimitExceeded {
        /// What was measured
        what: String,
        /// Measured value
        actual: usize,
        /// Configured limit
        limit: usize,
    },
}

// ============================================================================
// Validation Types
// ============================================================================

/// A single validation issue found during scenario validation.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    /// Path to the problematic field (e.g., "steps[2].expect.entity")
    pub path: String,
    /// Description of the validation issue
    pub message: String,
    /// Severity level of the issue
    pub severity: Severity,
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefix = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{}: {} at {}", prefix, self.message, self.path)
    }
}

/// Severity level for validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Error - validation failure that prevents the scenario from running
    Error,
    /// Warning - potential issue that does not prevent the scenario from running
    Warning,
}

// ============================================================================
// Scenario Errors
// ============================================================================

/// Errors raised while a scenario script executes.
#[derive(Debug, Error)]
pub enum ScenarioError {
    /// One or more `expect` steps did not hold
    #[error("{failed} of {total} expectations failed")]
    ExpectationsFailed {
        /// Number of failed expectations
        failed: usize,
        /// Number of expectations checked
        total: usize,
    },

    /// A step referenced an entity the runner does not know
    #[error("unknown entity '{0}'")]
    UnknownEntity(String),

    /// Run was cancelled by a signal
    #[error("interrupted")]
    Interrupted,

    /// Run was terminated by SIGTERM
    #[error("terminated")]
    Terminated,
}

impl ScenarioError {
    /// Returns the exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::ExpectationsFailed { .. } => ExitCode::SCENARIO_FAILED,
            Self::UnknownEntity(_) => ExitCode::CONFIG_ERROR,
            Self::Interrupted => ExitCode::INTERRUPTED,
            Self::Terminated => ExitCode::TERMINATED,
        }
    }
}

// ============================================================================
// Hook Errors
// ============================================================================

/// Error returned (or synthesised) by a phase hook.
///
/// Only the fault sink sees this value. The entity record keeps its
/// rendered form.
#[derive(Debug, Error)]
pub enum HookError {
    /// The hook reported a failure
    #[error("{0}")]
    Failed(String),

    /// The hook panicked; carries the panic payload if it was a string
    #[error("hook panicked: {0}")]
    Panicked(String),

    /// Any other error the hook chose to surface
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl HookError {
    /// Shorthand for [`HookError::Failed`].
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    /// Returns `true` if the hook panicked rather than returning an error.
    #[must_use]
    pub const fn is_panic(&self) -> bool {
        matches!(self, Self::Panicked(_))
    }
}

// ============================================================================
// Result Type Alias
// ============================================================================

/// Result type alias for `lifecycles` operations.
pub type Result<T> = std::result::Result<T, LifecycleError>;

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(ExitCode::SUCCESS, 0);
        assert_eq!(ExitCode::ERROR, 1);
        assert_eq!(ExitCode::CONFIG_ERROR, 2);
        assert_eq!(ExitCode::IO_ERROR, 3);
        assert_eq!(ExitCode::SCENARIO_FAILED, 5);
        assert_eq!(ExitCode::USAGE_ERROR, 64);
        assert_eq!(ExitCode::INTERRUPTED, 130);
        assert_eq!(ExitCode::TERMINATED, 143);
    }

    #[test]
    fn test_config_error_exit_code() {
        let err: LifecycleError = ConfigError::MissingFile {
            path: PathBuf::from("/test"),
        }
        .into();
        assert_eq!(err.exit_code(), ExitCode::CONFIG_ERROR);
    }

    #[test]
    fn test_scenario_error_exit_codes() {
        let failed: LifecycleError = ScenarioError::ExpectationsFailed {
            failed: 1,
            total: 3,
        }
        .into();
        assert_eq!(failed.exit_code(), ExitCode::SCENARIO_FAILED);

        let interrupted: LifecycleError = ScenarioError::Interrupted.into();
        assert_eq!(interrupted.exit_code(), ExitCode::INTERRUPTED);

        let terminated: LifecycleError = ScenarioError::Terminated.into();
        assert_eq!(terminated.exit_code(), ExitCode::TERMINATED);
    }

    #[test]
    fn test_io_error_exit_code() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "not found");
        let err: LifecycleError = io_err.into();
        assert_eq!(err.exit_code(), ExitCode::IO_ERROR);
    }

    #[test]
    fn test_validation_issue_display() {
        let issue = ValidationIssue {
            path: "steps[0].awake".to_string(),
            message: "unknown entity".to_string(),
            severity: Severity::Error,
        };
        assert_eq!(issue.to_string(), "error: unknown entity at steps[0].awake");
    }

    #[test]
    fn test_validation_issue_warning_display() {
        let issue = ValidationIssue {
            path: "steps".to_string(),
            message: "script is empty".to_string(),
            severity: Severity::Warning,
        };
        assert_eq!(issue.to_string(), "warning: script is empty at steps");
    }

    #[test]
    fn test_hook_error_display() {
        assert_eq!(HookError::failed("boom").to_string(), "boom");
        let panic = HookError::Panicked("bad state".to_string());
        assert_eq!(panic.to_string(), "hook panicked: bad state");
        assert!(panic.is_panic());
    }

    #[test]
    fn test_hook_error_from_boxed() {
        let io_err = std::io::Error::other("disk gone");
        let boxed: Box<dyn std::error::Error + Send + Sync> = Box::new(io_err);
        let err = HookError::from(boxed);
        assert_eq!(err.to_string(), "disk gone");
        assert!(!err.is_panic());
    }
}
