//! Scenario loader
//!
//! Loading pipeline:
//! 1. Size check against [`ConfigLimits::max_config_size`]
//! 2. Read and strip a UTF-8 BOM
//! 3. YAML parsing
//! 4. Deserialization to [`Scenario`]
//! 5. Validation
//! 6. Freeze with `Arc`

use std::path::Path;
use std::sync::Arc;

use crate::config::schema::Scenario;
use crate::config::validation::Validator;
use crate::error::ConfigError;

// ============================================================================
// Public API
// ============================================================================

/// Options for the scenario loader.
#[derive(Debug, Clone, Default)]
pub struct LoaderOptions {
    /// Limits for scenario size.
    pub config_limits: ConfigLimits,
}

/// Limits on scenario size to prevent resource exhaustion.
#[derive(Debug, Clone)]
pub struct ConfigLimits {
    /// Maximum number of declared entities.
    pub max_entities: usize,

    /// Maximum number of script steps.
    pub max_steps: usize,

    /// Maximum tick count of a single `tick` step.
    pub max_ticks_per_step: u32,

    /// Maximum scenario file size in bytes.
    pub max_config_size: usize,
}

impl Default for ConfigLimits {
    fn default() -> Self {
        Self {
            max_entities: env_or("LIFECYCLES_MAX_ENTITIES", 1000),
            max_steps: env_or("LIFECYCLES_MAX_STEPS", 10_000),
            max_ticks_per_step: env_or("LIFECYCLES_MAX_TICKS_PER_STEP", 100_000),
            max_config_size: env_or("LIFECYCLES_MAX_CONFIG_SIZE", 1024 * 1024),
        }
    }
}

/// Result of loading a scenario file.
#[derive(Debug)]
pub struct LoadResult {
    /// The loaded and validated scenario.
    pub scenario: Arc<Scenario>,

    /// Warnings encountered during loading.
    pub warnings: Vec<LoadWarning>,
}

/// Warning during scenario loading.
#[derive(Debug, Clone)]
pub struct LoadWarning {
    /// Warning message.
    pub message: String,

    /// Location where the warning occurred.
    pub location: Option<String>,
}

/// Scenario loader.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    options: LoaderOptions,
}

impl ConfigLoader {
    /// Creates a loader with the given options.
    #[must_use]
    pub const fn new(options: LoaderOptions) -> Self {
        Self { options }
    }

    /// Creates a loader with default options.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(LoaderOptions::default())
    }

    /// Loads, validates and freezes a scenario file.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be read or is larger than the size limit
    /// - YAML parsing or deserialization fails
    /// - Validation reports any error
    pub fn load(&self, path: &Path) -> Result<LoadResult, ConfigError> {
        let metadata = std::fs::metadata(path).map_err(|_| ConfigError::MissingFile {
            path: path.to_path_buf(),
        })?;

        let limit = self.options.config_limits.max_config_size;
        let file_size = usize::try_from(metadata.len()).unwrap_or(usize::MAX);
        if file_size > limit {
            return Err(ConfigError::LimitExceeded {
                what: format!("{} size in bytes", path.display()),
                actual: file_size,
                limit,
            });
        }

        let raw = std::fs::read_to_string(path).map_err(|_| ConfigError::MissingFile {
            path: path.to_path_buf(),
        })?;

        self.parse(&raw, path)
    }

    /// Loads a scenario from an in-memory YAML document.
    ///
    /// `origin` is only used in error messages.
    ///
    /// # Errors
    ///
    /// Same as [`load`](Self::load), minus the file checks.
    pub fn load_str(&self, yaml: &str, origin: &Path) -> Result<LoadResult, ConfigError> {
        let limit = self.options.config_limits.max_config_size;
        if yaml.len() > limit {
            return Err(ConfigError::LimitExceeded {
                what: format!("{} size in bytes", origin.display()),
                actual: yaml.len(),
                limit,
            });
        }
        self.parse(yaml, origin)
    }

    fn parse(&self, raw: &str, path: &Path) -> Result<LoadResult, ConfigError> {
        let raw = raw.strip_prefix('\u{feff}').unwrap_or(raw);

        let root: serde_yaml::Value =
            serde_yaml::from_str(raw).map_err(|e| ConfigError::ParseError {
                path: path.to_path_buf(),
                line: e.location().map(|l| l.line()),
                message: e.to_string(),
            })?;

        if root.is_null() {
            return Err(ConfigError::ParseError {
                path: path.to_path_buf(),
                line: None,
                message: "Scenario file is empty".to_string(),
            });
        }

        let scenario: Scenario =
            serde_yaml::from_value(root).map_err(|e| ConfigError::ParseError {
                path: path.to_path_buf(),
                line: e.location().map(|l| l.line()),
                message: format!("Failed to deserialize scenario: {e}"),
            })?;

        let mut validator = Validator::new();
        let result = validator.validate(&scenario, &self.options.config_limits);

        if result.has_errors() {
            return Err(ConfigError::ValidationError {
                path: path.display().to_string(),
                errors: result.errors,
            });
        }

        let warnings = result
            .warnings
            .into_iter()
            .map(|issue| LoadWarning {
                message: issue.message,
                location: Some(issue.path),
            })
            .collect();

        Ok(LoadResult {
            scenario: Arc::new(scenario),
            warnings,
        })
    }
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
