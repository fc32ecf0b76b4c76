//! Scenario validation
//!
//! Schema and semantic checks run on a fully deserialized [`Scenario`].
//! Validation collects every issue rather than stopping at the first one.

use std::collections::HashSet;

use crate::config::loader::ConfigLimits;
use crate::config::schema::{EntitySpec, Expectation, Scenario, Step};
use crate::error::{Severity, ValidationIssue};
use crate::lifecycle::{Operation, Phase};

// ============================================================================
// Public API
// ============================================================================

/// Result of scenario validation.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// Validation errors (prevent loading).
    pub errors: Vec<ValidationIssue>,

    /// Validation warnings (informational).
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationResult {
    /// Returns `true` if there are any errors.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Returns `true` if validation passed (no errors).
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Scenario validator.
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<ValidationIssue>,
    warnings: Vec<ValidationIssue>,
}

impl Validator {
    /// Creates a new validator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates a scenario and returns every error and warning found.
    pub fn validate(&mut self, scenario: &Scenario, limits: &ConfigLimits) -> ValidationResult {
        self.errors.clear();
        self.warnings.clear();

        self.validate_metadata(scenario);
        self.validate_entities(&scenario.entities);
        self.validate_steps(scenario, limits);
        self.validate_limits(scenario, limits);

        ValidationResult {
            errors: std::mem::take(&mut self.errors),
            warnings: std::mem::take(&mut self.warnings),
        }
    }

    // ========================================================================
    // Metadata
    // ========================================================================

    fn validate_metadata(&mut self, scenario: &Scenario) {
        if scenario.name.trim().is_empty() {
            self.add_error("name", "Scenario name is required and cannot be empty");
        }

        if scenario.name.len() > 100 {
            self.add_warning("name", "Scenario name is unusually long (> 100 characters)");
        }

        if let Some(interval) = &scenario.tick_interval {
            self.validate_duration(interval, "tick_interval");
        }
    }

    /// Validates a duration string (e.g. "16ms", "1s").
    fn validate_duration(&mut self, duration: &str, path: &str) {
        match humantime::parse_duration(duration.trim()) {
            Ok(d) if d.is_zero() => {
                self.add_error(path, "Duration must be greater than zero");
            }
            Ok(_) => {}
            Err(e) => {
                self.add_error(path, &format!("Invalid duration '{duration}': {e}"));
            }
        }
    }

    // ========================================================================
    // Entities
    // ========================================================================

    fn validate_entities(&mut self, entities: &[EntitySpec]) {
        if entities.is_empty() {
            self.add_error("entities", "At least one entity must be declared");
            return;
        }

        let mut seen = HashSet::new();
        for (i, entity) in entities.iter().enumerate() {
            let path = format!("entities[{i}]");

            if entity.name.trim().is_empty() {
                self.add_error(&format!("{path}.name"), "Entity name cannot be empty");
            } else if !seen.insert(entity.name.as_str()) {
                self.add_error(
                    &format!("{path}.name"),
                    &format!("Duplicate entity name '{}'", entity.name),
                );
            }

            for op in &entity.fail {
                if entity.panic.contains(op) {
                    self.add_error(
                        &format!("{path}.panic"),
                        &format!("Hook '{}' cannot both fail and panic", op.name()),
                    );
                }
            }

            for op in &entity.absent {
                if entity.fail.contains(op)
                    || entity.panic.contains(op)
                    || entity.destroy_self_on.contains(op)
                {
                    self.add_warning(
                        &format!("{path}.absent"),
                        &format!(
                            "Hook '{}' is absent, so its injected behaviour never runs",
                            op.name()
                        ),
                    );
                }
            }
        }
    }

    // ========================================================================
    // Steps
    // ========================================================================

    fn validate_steps(&mut self, scenario: &Scenario, limits: &ConfigLimits) {
        if scenario.steps.is_empty() {
            self.add_warning("steps", "Scenario has no steps; nothing will run");
            return;
        }

        let declared: Vec<&str> = scenario.entities.iter().map(|e| e.name.as_str()).collect();
        let mut dropped: HashSet<&str> = HashSet::new();

        for (i, step) in scenario.steps.iter().enumerate() {
            let path = step_path(i, step);

            for name in step.entity_refs() {
                if !declared.contains(&name) {
                    let message = suggest(name, &declared).map_or_else(
                        || format!("Unknown entity '{name}'"),
                        |s| format!("Unknown entity '{name}'. Did you mean '{s}'?"),
                    );
                    self.add_error(&path, &message);
                } else if dropped.contains(name) && !matches!(step, Step::Expect(_)) {
                    self.add_warning(
                        &path,
                        &format!("Entity '{name}' was already dropped; this step is ignored"),
                    );
                }
            }

            match step {
                Step::Tick(0) => {
                    self.add_warning(&path, "'tick: 0' runs no barrier pass");
                }
                Step::Tick(n) if *n > limits.max_ticks_per_step => {
                    self.add_error(
                        &path,
                        &format!(
                            "Too many ticks in one step: {n} (maximum: {}). \
                             Set LIFECYCLES_MAX_TICKS_PER_STEP to increase the limit.",
                            limits.max_ticks_per_step
                        ),
                    );
                }
                Step::Drop(names) => {
                    dropped.extend(names.iter().map(String::as_str));
                }
                Step::Expect(expect) => self.validate_expectation(expect, &path),
                _ => {}
            }
        }
    }

    fn validate_expectation(&mut self, expect: &Expectation, path: &str) {
        if expect.is_empty() {
            self.add_warning(path, "Expectation has no assertions");
        }

        match (expect.phase, expect.faulted) {
            (Some(Phase::Faulted), Some(false)) => {
                self.add_warning(path, "phase 'faulted' contradicts 'faulted: false'");
            }
            (Some(phase), Some(true)) if phase != Phase::Faulted => {
                self.add_warning(
                    path,
                    &format!("A faulted entity reports phase 'faulted', not '{phase}'"),
                );
            }
            _ => {}
        }

        if expect
            .calls
            .get(&Operation::FirstActivation)
            .is_some_and(|n| *n > 1)
        {
            self.add_warning(path, "FirstActivation runs at most once per lifetime");
        }
    }

    // ========================================================================
    // Limits
    // ========================================================================

    fn validate_limits(&mut self, scenario: &Scenario, limits: &ConfigLimits) {
        if scenario.entities.len() > limits.max_entities {
            self.add_error(
                "entities",
                &format!(
                    "Too many entities: {} (maximum: {}). \
                     Set LIFECYCLES_MAX_ENTITIES to increase the limit.",
                    scenario.entities.len(),
                    limits.max_entities
                ),
            );
        }

        if scenario.steps.len() > limits.max_steps {
            self.add_error(
                "steps",
                &format!(
                    "Too many steps: {} (maximum: {}). \
                     Set LIFECYCLES_MAX_STEPS to increase the limit.",
                    scenario.steps.len(),
                    limits.max_steps
                ),
            );
        }
    }

    // ========================================================================
    // Helper Methods
    // ========================================================================

    fn add_error(&mut self, path: &str, message: &str) {
        self.errors.push(ValidationIssue {
            path: path.to_string(),
            message: message.to_string(),
            severity: Severity::Error,
        });
    }

    fn add_warning(&mut self, path: &str, message: &str) {
        self.warnings.push(ValidationIssue {
            path: path.to_string(),
            message: message.to_string(),
            severity: Severity::Warning,
        });
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Location of a step's entity reference, e.g. `steps[3].expect.entity`.
fn step_path(index: usize, step: &Step) -> String {
    match step {
        Step::SetEnabled(_) | Step::Expect(_) => {
            format!("steps[{index}].{}.entity", step.keyword())
        }
        _ => format!("steps[{index}].{}", step.keyword()),
    }
}

/// Closest declared name within a Damerau-Levenshtein distance of 3.
fn suggest<'a>(input: &str, candidates: &[&'a str]) -> Option<&'a str> {
    candidates
        .iter()
        .map(|c| (*c, strsim::damerau_levenshtein(input, c)))
        .filter(|(_, dist)| *dist <= 3)
        .min_by_key(|(_, dist)| *dist)
        .map(|(name, _)| name)
}
