//! Scenario schema types
//!
//! A scenario declares a set of scripted entities and a script of host
//! actions (requests, ticks, signal changes) interleaved with expectations
//! about the engine's records. These types are deserialized from YAML.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::lifecycle::{Operation, Phase};

// ============================================================================
// Top-Level Scenario
// ============================================================================

/// Root of a scenario file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Scenario {
    /// Scenario name (required)
    pub name: String,

    /// Free-form description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Pause between ticks in realtime mode (e.g. `"16ms"`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tick_interval: Option<String>,

    /// Scripted entities, created in declaration order
    #[serde(default)]
    pub entities: Vec<EntitySpec>,

    /// The script
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl Scenario {
    /// Looks up an entity declaration by name.
    #[must_use]
    pub fn entity(&self, name: &str) -> Option<&EntitySpec> {
        self.entities.iter().find(|e| e.name == name)
    }
}

// ============================================================================
// Entities
// ============================================================================

/// A scripted entity and its injected behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct EntitySpec {
    /// Unique name, also used as the entity label
    pub name: String,

    /// Initial `is_enabled` signal
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Hooks that return an error
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fail: Vec<Operation>,

    /// Hooks that panic
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub panic: Vec<Operation>,

    /// Hooks that request destroy of their own entity before returning
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub destroy_self_on: Vec<Operation>,

    /// Hooks left out of the entity's table
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub absent: Vec<Operation>,
}

const fn default_true() -> bool {
    true
}

// ============================================================================
// Steps
// ============================================================================

/// One script step.
///
/// Example YAML:
/// ```yaml
/// steps:
///   - awake: [player, enemy]
///   - tick: 1
///   - set_enabled: { entity: enemy, enabled: false }
///   - enable_all
///   - expect: { entity: player, phase: first_activation, active: true }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    /// `manage` each entity
    Manage(Vec<String>),
    /// `unmanage` each entity
    Unmanage(Vec<String>),
    /// `request_awake` each entity
    Awake(Vec<String>),
    /// `request_enable` each entity
    Enable(Vec<String>),
    /// `request_disable` each entity
    Disable(Vec<String>),
    /// `request_destroy` each entity (runs the immediate destroy pass)
    Destroy(Vec<String>),
    /// Run this many barrier passes
    Tick(u32),
    /// Change an entity's `is_enabled` signal
    SetEnabled(SetEnabled),
    /// Make `is_alive` return `false`
    Kill(Vec<String>),
    /// Make `is_alive` return `true` again
    Revive(Vec<String>),
    /// Release the host's handle to each entity
    Drop(Vec<String>),
    /// `request_all(awake)`
    AwakeAll,
    /// `request_all(enable)`
    EnableAll,
    /// `request_all(disable)`
    DisableAll,
    /// `request_all(destroy)`
    DestroyAll,
    /// Check an entity's record
    Expect(Expectation),
}

impl Step {
    /// Step keyword as written in YAML.
    #[must_use]
    pub const fn keyword(&self) -> &'static str {
        match self {
            Self::Manage(_) => "manage",
            Self::Unmanage(_) => "unmanage",
            Self::Awake(_) => "awake",
            Self::Enable(_) => "enable",
            Self::Disable(_) => "disable",
            Self::Destroy(_) => "destroy",
            Self::Tick(_) => "tick",
            Self::SetEnabled(_) => "set_enabled",
            Self::Kill(_) => "kill",
            Self::Revive(_) => "revive",
            Self::Drop(_) => "drop",
            Self::AwakeAll => "awake_all",
            Self::EnableAll => "enable_all",
            Self::DisableAll => "disable_all",
            Self::DestroyAll => "destroy_all",
            Self::Expect(_) => "expect",
        }
    }

    /// Entity names this step refers to.
    #[must_use]
    pub fn entity_refs(&self) -> Vec<&str> {
        match self {
            Self::Manage(names)
            | Self::Unmanage(names)
            | Self::Awake(names)
            | Self::Enable(names)
            | Self::Disable(names)
            | Self::Destroy(names)
            | Self::Kill(names)
            | Self::Revive(names)
            | Self::Drop(names) => names.iter().map(String::as_str).collect(),
            Self::SetEnabled(set) => vec![set.entity.as_str()],
            Self::Expect(expect) => vec![expect.entity.as_str()],
            Self::Tick(_)
            | Self::AwakeAll
            | Self::EnableAll
            | Self::DisableAll
            | Self::DestroyAll => Vec::new(),
        }
    }
}

/// Payload of a `set_enabled` step.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SetEnabled {
    /// Target entity
    pub entity: String,
    /// New signal value
    pub enabled: bool,
}

/// Assertions about one entity. Unset fields are not checked.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct Expectation {
    /// Target entity
    pub entity: String,

    /// Reported phase (`faulted` once faulted)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<Phase>,

    /// Active flag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,

    /// Fault flag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub faulted: Option<bool>,

    /// Whether the engine still tracks the entity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracked: Option<bool>,

    /// Enable cycle counter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cycle: Option<u32>,

    /// Exact hook invocation counts
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub calls: IndexMap<Operation, u64>,
}

impl Expectation {
    /// Returns `true` if no assertion is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.phase.is_none()
            && self.active.is_none()
            && self.faulted.is_none()
            && self.tracked.is_none()
            && self.cycle.is_none()
            && self.calls.is_empty()
    }
}
