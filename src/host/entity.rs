//! Scripted entities
//!
//! A [`ScriptedEntity`] is a managed entity whose hooks are built from an
//! [`EntitySpec`]: every hook counts its invocations and may be told to
//! request its own destruction, return an error or panic.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;
use indexmap::IndexMap;

use crate::config::EntitySpec;
use crate::error::HookError;
use crate::lifecycle::{HookContext, Managed, Operation, PhaseHooks};

/// Per-operation invocation counters, shared with the runner so they
/// outlive the entity.
pub type CallCounts = Arc<DashMap<Operation, u64>>;

/// Injected behaviour of a single hook.
#[derive(Debug, Clone, Copy, Default)]
struct Injection {
    fail: bool,
    panic: bool,
    destroy_self: bool,
}

impl Injection {
    fn for_operation(spec: &EntitySpec, op: Operation) -> Self {
        Self {
            fail: spec.fail.contains(&op),
            panic: spec.panic.contains(&op),
            destroy_self: spec.destroy_self_on.contains(&op),
        }
    }

    fn run(self, name: &str, ctx: &HookContext<'_>) -> Result<(), HookError> {
        if self.destroy_self {
            ctx.engine().request_destroy(ctx.entity());
        }
        if self.panic {
            panic!("{name}: injected panic in {}", ctx.operation());
        }
        if self.fail {
            return Err(HookError::failed(format!(
                "{name}: injected failure in {}",
                ctx.operation()
            )));
        }
        Ok(())
    }
}

/// Entity driven by a scenario script.
pub struct ScriptedEntity {
    name: String,
    alive: AtomicBool,
    enabled: AtomicBool,
    calls: CallCounts,
    hooks: PhaseHooks,
}

impl ScriptedEntity {
    /// Builds the entity and its hook table from `spec`.
    #[must_use]
    pub fn from_spec(spec: &EntitySpec) -> Self {
        let calls = CallCounts::default();
        let mut hooks = PhaseHooks::new();

        for op in Operation::ALL {
            if spec.absent.contains(&op) {
                continue;
            }
            let injection = Injection::for_operation(spec, op);
            let counter = Arc::clone(&calls);
            let name = spec.name.clone();
            hooks.set(op, move |ctx| {
                *counter.entry(ctx.operation()).or_insert(0) += 1;
                injection.run(&name, ctx)
            });
        }

        Self {
            name: spec.name.clone(),
            alive: AtomicBool::new(true),
            enabled: AtomicBool::new(spec.enabled),
            calls,
            hooks,
        }
    }

    /// Entity name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sets the `is_alive` signal.
    pub fn set_alive(&self, alive: bool) {
        self.alive.store(alive, Ordering::SeqCst);
    }

    /// Sets the `is_enabled` signal.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    /// Handle to the invocation counters.
    #[must_use]
    pub fn call_counts(&self) -> CallCounts {
        Arc::clone(&self.calls)
    }

    /// Number of times the hook for `op` ran.
    #[must_use]
    pub fn calls(&self, op: Operation) -> u64 {
        calls_of(&self.calls, op)
    }

    /// Non-zero counters in operation order.
    #[must_use]
    pub fn call_summary(&self) -> IndexMap<Operation, u64> {
        Operation::ALL
            .into_iter()
            .filter_map(|op| {
                let n = self.calls(op);
                (n > 0).then_some((op, n))
            })
            .collect()
    }
}

/// Reads one counter, treating a missing entry as zero.
#[must_use]
pub fn calls_of(calls: &CallCounts, op: Operation) -> u64 {
    calls.get(&op).map_or(0, |n| *n)
}

impl Managed for ScriptedEntity {
    fn label(&self) -> String {
        self.name.clone()
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    fn hooks(&self) -> &PhaseHooks {
        &self.hooks
    }
}

impl std::fmt::Debug for ScriptedEntity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedEntity")
            .field("name", &self.name)
            .field("alive", &self.is_alive())
            .field("enabled", &self.is_enabled())
            .field("hooks", &self.hooks)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::{Band, EntityHandle, LifecycleEngine, Phase};

    fn spec(yaml: &str) -> EntitySpec {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_counts_every_invocation() {
        let engine = LifecycleEngine::new();
        let entity = Arc::new(ScriptedEntity::from_spec(&spec("name: a")));
        let handle: EntityHandle = entity.clone();
        engine.request_awake(&handle);
        engine.tick();

        for op in Band::Awake.operations() {
            assert_eq!(entity.calls(*op), 1, "{op}");
        }
        assert_eq!(entity.calls(Operation::Activate), 0);
        assert_eq!(entity.call_summary().len(), 4);
    }

    #[test]
    fn test_absent_hook_still_advances() {
        let engine = LifecycleEngine::new();
        let entity = Arc::new(ScriptedEntity::from_spec(&spec("name: a\nabsent: [register]")));
        assert!(!entity.hooks().contains(Operation::Register));

        let handle: EntityHandle = entity.clone();
        engine.request_awake(&handle);
        engine.tick();
        assert_eq!(entity.calls(Operation::Register), 0);
        assert_eq!(engine.phase(&handle), Some(Phase::Setup));
    }

    #[test]
    fn test_injected_failure() {
        let engine = LifecycleEngine::new();
        let entity = Arc::new(ScriptedEntity::from_spec(&spec("name: a\nfail: [verify_composition]")));
        let handle: EntityHandle = entity.clone();
        engine.request_awake(&handle);
        let report = engine.tick();

        assert_eq!(report.faulted(), 1);
        assert_eq!(engine.phase(&handle), Some(Phase::Faulted));
        assert_eq!(entity.calls(Operation::Register), 0);
    }

    #[test]
    fn test_injected_panic_is_contained() {
        let engine = LifecycleEngine::new();
        let entity = Arc::new(ScriptedEntity::from_spec(&spec("name: a\npanic: [compose]")));
        let handle: EntityHandle = entity.clone();
        engine.request_awake(&handle);
        let report = engine.tick();

        assert_eq!(report.steps[0].outcome, "panicked");
        assert!(engine.inspect(&handle).unwrap().is_faulted);
    }

    #[test]
    fn test_destroy_self_runs_in_same_tick() {
        let engine = LifecycleEngine::new();
        let entity = Arc::new(ScriptedEntity::from_spec(&spec("name: a\ndestroy_self_on: [setup]")));
        let handle: EntityHandle = entity.clone();
        engine.request_awake(&handle);
        let report = engine.tick();

        assert_eq!(entity.calls(Operation::Dispose), 1);
        assert_eq!(report.removed, 1);
        assert!(!engine.is_tracked(&handle));
    }

    #[test]
    fn test_signals() {
        let entity = ScriptedEntity::from_spec(&spec("name: a\nenabled: false"));
        assert!(!entity.is_enabled());
        entity.set_enabled(true);
        entity.set_alive(false);
        assert!(entity.is_enabled());
        assert!(!entity.is_alive());
        assert_eq!(entity.label(), "a");
    }
}
