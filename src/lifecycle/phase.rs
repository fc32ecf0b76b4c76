//! Phase table
//!
//! The ranked set of lifecycle phases, the four bands they are grouped
//! into, and the hook operations whose completion reaches each phase.
//! Rank order is the only mechanism used for "has reached" checks.

use serde::{Deserialize, Serialize};

// ============================================================================
// Phase
// ============================================================================

/// A ranked lifecycle phase.
///
/// Variants are declared in rank order, so the derived `Ord` matches
/// [`Phase::rank`]. `Faulted` sits outside the monotonic ordering and is
/// never stored as a reached phase; it is only reported.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Managed but nothing has run yet.
    #[default]
    None,

    // Awake band (once per lifetime)
    /// `Compose` completed.
    Composed,
    /// `VerifyComposition` completed.
    VerifiedStructure,
    /// `Register` completed.
    Registered,
    /// `Setup` completed.
    Setup,

    // Enable band (each enable cycle)
    /// `InitializeEnable` completed.
    InitializedEnable,
    /// `Subscribe` completed.
    Subscribed,
    /// `Activate` completed.
    Activated,
    /// `FirstActivation` completed (once per lifetime).
    FirstActivation,

    // Disable band (each disable cycle)
    /// `Deactivate` completed.
    Deactivated,
    /// `Unsubscribe` completed.
    Unsubscribed,
    /// `FinalizeDisable` completed.
    FinalizedDisable,

    // Destroy band (terminal)
    /// `Teardown` attempted.
    Teardown,
    /// `Unregister` attempted.
    Unregistered,
    /// `Dispose` attempted.
    Disposed,

    /// A hook failed. Absorbing.
    Faulted,
}

impl Phase {
    /// Every phase in rank order.
    pub const ALL: [Self; 16] = [
        Self::None,
        Self::Composed,
        Self::VerifiedStructure,
        Self::Registered,
        Self::Setup,
        Self::InitializedEnable,
        Self::Subscribed,
        Self::Activated,
        Self::FirstActivation,
        Self::Deactivated,
        Self::Unsubscribed,
        Self::FinalizedDisable,
        Self::Teardown,
        Self::Unregistered,
        Self::Disposed,
        Self::Faulted,
    ];

    /// Numeric rank of the phase.
    #[must_use]
    pub const fn rank(self) -> u16 {
        match self {
            Self::None => 0,
            Self::Composed => 10,
            Self::VerifiedStructure => 20,
            Self::Registered => 30,
            Self::Setup => 40,
            Self::InitializedEnable => 50,
            Self::Subscribed => 60,
            Self::Activated => 70,
            Self::FirstActivation => 80,
            Self::Deactivated => 90,
            Self::Unsubscribed => 100,
            Self::FinalizedDisable => 110,
            Self::Teardown => 120,
            Self::Unregistered => 130,
            Self::Disposed => 140,
            Self::Faulted => 1000,
        }
    }

    /// Display name of the phase.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Composed => "Composed",
            Self::VerifiedStructure => "VerifiedStructure",
            Self::Registered => "Registered",
            Self::Setup => "Setup",
            Self::InitializedEnable => "InitializedEnable",
            Self::Subscribed => "Subscribed",
            Self::Activated => "Activated",
            Self::FirstActivation => "FirstActivation",
            Self::Deactivated => "Deactivated",
            Self::Unsubscribed => "Unsubscribed",
            Self::FinalizedDisable => "FinalizedDisable",
            Self::Teardown => "Teardown",
            Self::Unregistered => "Unregistered",
            Self::Disposed => "Disposed",
            Self::Faulted => "Faulted",
        }
    }

    /// The band this phase belongs to, or `None` for `None` and `Faulted`.
    #[must_use]
    pub const fn band(self) -> Option<Band> {
        match self {
            Self::Composed | Self::VerifiedStructure | Self::Registered | Self::Setup => {
                Some(Band::Awake)
            }
            Self::InitializedEnable | Self::Subscribed | Self::Activated | Self::FirstActivation => {
                Some(Band::Enable)
            }
            Self::Deactivated | Self::Unsubscribed | Self::FinalizedDisable => Some(Band::Disable),
            Self::Teardown | Self::Unregistered | Self::Disposed => Some(Band::Destroy),
            Self::None | Self::Faulted => None,
        }
    }

    /// The operation whose completion reaches this phase.
    #[must_use]
    pub fn operation(self) -> Option<Operation> {
        Operation::ALL.into_iter().find(|op| op.target() == self)
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Band
// ============================================================================

/// A contiguous group of phases drained by one barrier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Band {
    /// Once per lifetime: compose through setup.
    Awake,
    /// Each enable cycle: initialize through first activation.
    Enable,
    /// Each disable cycle: deactivate through finalize.
    Disable,
    /// Terminal: teardown through dispose.
    Destroy,
}

impl Band {
    /// Fixed drain order used by every tick.
    pub const ORDER: [Self; 4] = [Self::Awake, Self::Enable, Self::Disable, Self::Destroy];

    /// The phase-steps of this band in rank order.
    #[must_use]
    pub const fn operations(self) -> &'static [Operation] {
        match self {
            Self::Awake => &[
                Operation::Compose,
                Operation::VerifyComposition,
                Operation::Register,
                Operation::Setup,
            ],
            Self::Enable => &[
                Operation::InitializeEnable,
                Operation::Subscribe,
                Operation::Activate,
                Operation::FirstActivation,
            ],
            Self::Disable => &[
                Operation::Deactivate,
                Operation::Unsubscribe,
                Operation::FinalizeDisable,
            ],
            Self::Destroy => &[
                Operation::Teardown,
                Operation::Unregister,
                Operation::Dispose,
            ],
        }
    }

    /// Display name of the band.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Awake => "awake",
            Self::Enable => "enable",
            Self::Disable => "disable",
            Self::Destroy => "destroy",
        }
    }

    /// Whether the fault gate is waived for this band.
    #[must_use]
    pub const fn runs_when_faulted(self) -> bool {
        matches!(self, Self::Destroy)
    }
}

impl std::fmt::Display for Band {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Operation
// ============================================================================

/// A hook an entity may provide, one per non-terminal phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Reaches [`Phase::Composed`].
    Compose,
    /// Reaches [`Phase::VerifiedStructure`].
    VerifyComposition,
    /// Reaches [`Phase::Registered`].
    Register,
    /// Reaches [`Phase::Setup`].
    Setup,
    /// Reaches [`Phase::InitializedEnable`].
    InitializeEnable,
    /// Reaches [`Phase::Subscribed`].
    Subscribe,
    /// Reaches [`Phase::Activated`].
    Activate,
    /// Reaches [`Phase::FirstActivation`].
    FirstActivation,
    /// Reaches [`Phase::Deactivated`].
    Deactivate,
    /// Reaches [`Phase::Unsubscribed`].
    Unsubscribe,
    /// Reaches [`Phase::FinalizedDisable`].
    FinalizeDisable,
    /// Reaches [`Phase::Teardown`].
    Teardown,
    /// Reaches [`Phase::Unregistered`].
    Unregister,
    /// Reaches [`Phase::Disposed`].
    Dispose,
}

impl Operation {
    /// Number of operations (size of a hook table).
    pub const COUNT: usize = 14;

    /// Every operation in rank order.
    pub const ALL: [Self; Self::COUNT] = [
        Self::Compose,
        Self::VerifyComposition,
        Self::Register,
        Self::Setup,
        Self::InitializeEnable,
        Self::Subscribe,
        Self::Activate,
        Self::FirstActivation,
        Self::Deactivate,
        Self::Unsubscribe,
        Self::FinalizeDisable,
        Self::Teardown,
        Self::Unregister,
        Self::Dispose,
    ];

    /// Slot of this operation in a hook table.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// The phase recorded once this operation completes.
    #[must_use]
    pub const fn target(self) -> Phase {
        match self {
            Self::Compose => Phase::Composed,
            Self::VerifyComposition => Phase::VerifiedStructure,
            Self::Register => Phase::Registered,
            Self::Setup => Phase::Setup,
            Self::InitializeEnable => Phase::InitializedEnable,
            Self::Subscribe => Phase::Subscribed,
            Self::Activate => Phase::Activated,
            Self::FirstActivation => Phase::FirstActivation,
            Self::Deactivate => Phase::Deactivated,
            Self::Unsubscribe => Phase::Unsubscribed,
            Self::FinalizeDisable => Phase::FinalizedDisable,
            Self::Teardown => Phase::Teardown,
            Self::Unregister => Phase::Unregistered,
            Self::Dispose => Phase::Disposed,
        }
    }

    /// The band this operation is drained in.
    #[must_use]
    pub const fn band(self) -> Band {
        match self {
            Self::Compose | Self::VerifyComposition | Self::Register | Self::Setup => Band::Awake,
            Self::InitializeEnable | Self::Subscribe | Self::Activate | Self::FirstActivation => {
                Band::Enable
            }
            Self::Deactivate | Self::Unsubscribe | Self::FinalizeDisable => Band::Disable,
            Self::Teardown | Self::Unregister | Self::Dispose => Band::Destroy,
        }
    }

    /// Phase that must already be reached before this operation may run.
    ///
    /// Disable and destroy steps mirror the step they unwind, so an entity
    /// that only got part of the way through a band unwinds only that part.
    #[must_use]
    pub const fn prerequisite(self) -> Option<Phase> {
        match self {
            Self::Compose | Self::Dispose => None,
            Self::VerifyComposition => Some(Phase::Composed),
            Self::Register => Some(Phase::VerifiedStructure),
            Self::Setup | Self::Unregister => Some(Phase::Registered),
            Self::InitializeEnable | Self::Teardown => Some(Phase::Setup),
            Self::Subscribe | Self::FinalizeDisable => Some(Phase::InitializedEnable),
            Self::Activate | Self::Unsubscribe => Some(Phase::Subscribed),
            Self::FirstActivation | Self::Deactivate => Some(Phase::Activated),
        }
    }

    /// Hook name used in fault summaries and logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Compose => "Compose",
            Self::VerifyComposition => "VerifyComposition",
            Self::Register => "Register",
            Self::Setup => "Setup",
            Self::InitializeEnable => "InitializeEnable",
            Self::Subscribe => "Subscribe",
            Self::Activate => "Activate",
            Self::FirstActivation => "FirstActivation",
            Self::Deactivate => "Deactivate",
            Self::Unsubscribe => "Unsubscribe",
            Self::FinalizeDisable => "FinalizeDisable",
            Self::Teardown => "Teardown",
            Self::Unregister => "Unregister",
            Self::Dispose => "Dispose",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
