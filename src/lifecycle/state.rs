//! Entity state record
//!
//! Per-entity record owned by the engine: reached phase, enable cycle,
//! active flag, first-activation flag and the first recorded fault. Guard
//! evaluation and outcome application live here so the barrier algorithm
//! stays a loop over snapshots.

use serde::Serialize;

use super::phase::{Band, Operation, Phase};

/// The first fault recorded for an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FaultRecord {
    /// Phase the failing operation would have reached.
    pub phase: Phase,
    /// The failing operation.
    pub operation: Operation,
    /// One-line summary (phase, operation, entity).
    pub summary: String,
    /// Rendered error.
    pub error: String,
}

/// Host signals sampled right before a step runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Liveness {
    /// `Managed::is_alive`
    pub alive: bool,
    /// `Managed::is_enabled`
    pub enabled: bool,
}

/// Why a step was not run for an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Entity is faulted and the band is gated.
    Faulted,
    /// Host reports the entity is no longer alive.
    NotAlive,
    /// Host reports the entity is disabled.
    NotEnabled,
    /// The step's prerequisite phase has not been reached.
    PrerequisiteMissing,
    /// The step's phase was already reached.
    AlreadyReached,
    /// `FirstActivation` already ran in this lifetime.
    FirstActivationDone,
}

/// Guard decision for one entity and one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepPlan {
    /// Run the hook. `reopen` starts a new enable cycle first.
    Run {
        /// Rewind to `Setup` and bump the cycle before recording.
        reopen: bool,
    },
    /// Leave the entity untouched.
    Skip(SkipReason),
}

/// What applying an outcome did to the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepEffect {
    /// Hook succeeded; phase recorded.
    Advanced,
    /// Hook failed. `first` is `true` when this is the recorded fault.
    Faulted {
        /// This failure became the entity's fault record.
        first: bool,
    },
}

/// Mutable per-entity lifecycle record.
#[derive(Debug, Clone, Default)]
pub struct EntityState {
    reached: Phase,
    cycle: u32,
    active: bool,
    first_activation_done: bool,
    fault: Option<FaultRecord>,
}

impl EntityState {
    /// Fresh record at [`Phase::None`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reported phase: `Faulted` once a fault is recorded.
    #[must_use]
    pub const fn phase(&self) -> Phase {
        if self.fault.is_some() {
            Phase::Faulted
        } else {
            self.reached
        }
    }

    /// Highest phase reached in the current cycle, ignoring faults.
    #[must_use]
    pub const fn reached(&self) -> Phase {
        self.reached
    }

    /// Enable cycle counter.
    #[must_use]
    pub const fn cycle(&self) -> u32 {
        self.cycle
    }

    /// `Activate` completed and `Deactivate` has not.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }

    /// A fault has been recorded.
    #[must_use]
    pub const fn is_faulted(&self) -> bool {
        self.fault.is_some()
    }

    /// `FirstActivation` has run in this lifetime.
    #[must_use]
    pub const fn first_activation_done(&self) -> bool {
        self.first_activation_done
    }

    /// The recorded fault, if any.
    #[must_use]
    pub const fn fault(&self) -> Option<&FaultRecord> {
        self.fault.as_ref()
    }

    /// Evaluates every guard for running `operation` on this entity.
    #[must_use]
    pub fn plan(&self, operation: Operation, liveness: Liveness) -> StepPlan {
        let band = operation.band();

        if !band.runs_when_faulted() {
            if self.is_faulted() {
                return StepPlan::Skip(SkipReason::Faulted);
            }
            if !liveness.alive {
                return StepPlan::Skip(SkipReason::NotAlive);
            }
        }

        if band == Band::Enable && !liveness.enabled {
            return StepPlan::Skip(SkipReason::NotEnabled);
        }

        // A disabled entity coming back opens a new enable cycle from Setup.
        let reopen = operation == Operation::InitializeEnable
            && self.reached.band() == Some(Band::Disable);
        let reached = if reopen { Phase::Setup } else { self.reached };

        if let Some(prerequisite) = operation.prerequisite() {
            if reached < prerequisite {
                return StepPlan::Skip(SkipReason::PrerequisiteMissing);
            }
        }

        if reached >= operation.target() {
            return StepPlan::Skip(SkipReason::AlreadyReached);
        }

        if operation == Operation::FirstActivation && self.first_activation_done {
            return StepPlan::Skip(SkipReason::FirstActivationDone);
        }

        StepPlan::Run { reopen }
    }

    /// Records the outcome of a hook that was run under `StepPlan::Run`.
    ///
    /// Destroy-band steps are marked reached even when they fail so they
    /// are never retried.
    pub fn apply(
        &mut self,
        operation: Operation,
        reopen: bool,
        outcome: Result<(), (String, String)>,
    ) -> StepEffect {
        if reopen {
            self.cycle = self.cycle.saturating_add(1);
            self.reached = Phase::Setup;
        }

        match outcome {
            Ok(()) => {
                self.reached = operation.target();
                match operation {
                    Operation::Activate => self.active = true,
                    Operation::Deactivate | Operation::Dispose => self.active = false,
                    Operation::FirstActivation => self.first_activation_done = true,
                    _ => {}
                }
                StepEffect::Advanced
            }
            Err((summary, error)) => {
                let first = self.fault.is_none();
                if first {
                    self.fault = Some(FaultRecord {
                        phase: operation.target(),
                        operation,
                        summary,
                        error,
                    });
                }
                if operation.band().runs_when_faulted() {
                    self.reached = operation.target();
                    if operation == Operation::Dispose {
                        self.active = false;
                    }
                }
                StepEffect::Faulted { first }
            }
        }
    }
}

/// Read-only projection of an entity's record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntitySnapshot {
    /// Entity label.
    pub label: String,
    /// Reported phase (`Faulted` once faulted).
    pub phase: Phase,
    /// Enable cycle counter.
    pub cycle: u32,
    /// Active flag.
    pub is_active: bool,
    /// Fault flag.
    pub is_faulted: bool,
    /// `FirstActivation` has run.
    pub first_activation_done: bool,
    /// Summary of the recorded fault.
    pub fault_summary: Option<String>,
}

impl EntitySnapshot {
    pub(crate) fn capture(label: &str, state: &EntityState) -> Self {
        Self {
            label: label.to_owned(),
            phase: state.phase(),
            cycle: state.cycle(),
            is_active: state.is_active(),
            is_faulted: state.is_faulted(),
            first_activation_done: state.first_activation_done(),
            fault_summary: state.fault().map(|f| f.summary.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIVE: Liveness = Liveness {
        alive: true,
        enabled: true,
    };

    fn run_band(state: &mut EntityState, band: Band, liveness: Liveness) {
        for op in band.operations() {
            if let StepPlan::Run { reopen } = state.plan(*op, liveness) {
                state.apply(*op, reopen, Ok(()));
            }
        }
    }

    fn failure() -> Result<(), (String, String)> {
        Err(("summary".to_owned(), "boom".to_owned()))
    }

    #[test]
    fn test_new_record() {
        let state = EntityState::new();
        assert_eq!(state.phase(), Phase::None);
        assert!(!state.is_active());
        assert!(!state.is_faulted());
        assert_eq!(state.cycle(), 0);
    }

    #[test]
    fn test_full_awake_band() {
        let mut state = EntityState::new();
        run_band(&mut state, Band::Awake, LIVE);
        assert_eq!(state.phase(), Phase::Setup);
    }

    #[test]
    fn test_enable_requires_setup() {
        let state = EntityState::new();
        assert_eq!(
            state.plan(Operation::InitializeEnable, LIVE),
            StepPlan::Skip(SkipReason::PrerequisiteMissing)
        );
    }

    #[test]
    fn test_enable_gate_only_for_enable_band() {
        let disabled = Liveness {
            alive: true,
            enabled: false,
        };
        let mut state = EntityState::new();
        assert_eq!(
            state.plan(Operation::Compose, disabled),
            StepPlan::Run { reopen: false }
        );
        run_band(&mut state, Band::Awake, disabled);
        assert_eq!(
            state.plan(Operation::InitializeEnable, disabled),
            StepPlan::Skip(SkipReason::NotEnabled)
        );
    }

    #[test]
    fn test_dead_entity_skips_gated_bands_but_not_destroy() {
        let dead = Liveness {
            alive: false,
            enabled: true,
        };
        let mut state = EntityState::new();
        assert_eq!(
            state.plan(Operation::Compose, dead),
            StepPlan::Skip(SkipReason::NotAlive)
        );
        run_band(&mut state, Band::Destroy, dead);
        assert_eq!(state.phase(), Phase::Disposed);
    }

    #[test]
    fn test_idempotent_replay() {
        let mut state = EntityState::new();
        run_band(&mut state, Band::Awake, LIVE);
        assert_eq!(
            state.plan(Operation::Compose, LIVE),
            StepPlan::Skip(SkipReason::AlreadyReached)
        );
    }

    #[test]
    fn test_fault_blocks_gated_bands() {
        let mut state = EntityState::new();
        state.apply(Operation::Compose, false, failure());
        assert_eq!(state.phase(), Phase::Faulted);
        assert_eq!(state.reached(), Phase::None);
        for op in [Operation::VerifyComposition, Operation::Deactivate] {
            assert_eq!(state.plan(op, LIVE), StepPlan::Skip(SkipReason::Faulted));
        }
        assert_eq!(
            state.plan(Operation::Dispose, LIVE),
            StepPlan::Run { reopen: false }
        );
    }

    #[test]
    fn test_first_fault_wins() {
        let mut state = EntityState::new();
        run_band(&mut state, Band::Awake, LIVE);
        let first = state.apply(Operation::Teardown, false, failure());
        assert_eq!(first, StepEffect::Faulted { first: true });
        let second = state.apply(
            Operation::Unregister,
            false,
            Err(("other".to_owned(), "again".to_owned())),
        );
        assert_eq!(second, StepEffect::Faulted { first: false });
        let fault = state.fault().unwrap();
        assert_eq!(fault.operation, Operation::Teardown);
        assert_eq!(fault.error, "boom");
    }

    #[test]
    fn test_failed_destroy_step_is_not_retried() {
        let mut state = EntityState::new();
        run_band(&mut state, Band::Awake, LIVE);
        state.apply(Operation::Teardown, false, failure());
        assert_eq!(
            state.plan(Operation::Teardown, LIVE),
            StepPlan::Skip(SkipReason::AlreadyReached)
        );
        assert_eq!(
            state.plan(Operation::Unregister, LIVE),
            StepPlan::Run { reopen: false }
        );
    }

    #[test]
    fn test_enable_cycle_reopens_after_disable() {
        let mut state = EntityState::new();
        run_band(&mut state, Band::Awake, LIVE);
        run_band(&mut state, Band::Enable, LIVE);
        assert_eq!(state.phase(), Phase::FirstActivation);
        assert!(state.is_active());

        run_band(&mut state, Band::Disable, LIVE);
        assert_eq!(state.phase(), Phase::FinalizedDisable);
        assert!(!state.is_active());

        let before = (state.cycle(), state.reached());
        run_band(&mut state, Band::Enable, LIVE);
        assert_eq!(state.cycle(), 1);
        assert_eq!(state.phase(), Phase::Activated);
        assert!(state.is_active());
        assert!(state.first_activation_done());
        assert!((state.cycle(), state.reached()) > before);
    }

    #[test]
    fn test_first_activation_once_per_lifetime() {
        let mut state = EntityState::new();
        run_band(&mut state, Band::Awake, LIVE);
        run_band(&mut state, Band::Enable, LIVE);
        run_band(&mut state, Band::Disable, LIVE);
        run_band(&mut state, Band::Enable, LIVE);
        assert_eq!(
            state.plan(Operation::FirstActivation, LIVE),
            StepPlan::Skip(SkipReason::FirstActivationDone)
        );
    }

    #[test]
    fn test_partial_enable_unwinds_partially() {
        let mut state = EntityState::new();
        run_band(&mut state, Band::Awake, LIVE);
        for op in [Operation::InitializeEnable, Operation::Subscribe] {
            state.apply(op, false, Ok(()));
        }
        assert_eq!(
            state.plan(Operation::Deactivate, LIVE),
            StepPlan::Skip(SkipReason::PrerequisiteMissing)
        );
        run_band(&mut state, Band::Disable, LIVE);
        assert_eq!(state.phase(), Phase::FinalizedDisable);
    }

    #[test]
    fn test_snapshot_reports_fault() {
        let mut state = EntityState::new();
        state.apply(Operation::Compose, false, failure());
        let snapshot = EntitySnapshot::capture("lamp", &state);
        assert!(snapshot.is_faulted);
        assert_eq!(snapshot.phase, Phase::Faulted);
        assert_eq!(snapshot.fault_summary.as_deref(), Some("summary"));
    }
}
