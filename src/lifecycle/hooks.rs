//! Entity capability set and hook table
//!
//! A managed entity exposes liveness signals and a fixed table of optional
//! phase hooks. A missing table entry is a no-op step that still advances
//! the entity's phase.

use std::sync::Arc;

use crate::error::HookError;

use super::engine::LifecycleEngine;
use super::phase::{Band, Operation, Phase};

/// Boxed phase hook.
pub type HookFn = Box<dyn Fn(&HookContext<'_>) -> Result<(), HookError> + Send + Sync>;

/// Strong handle to a managed entity, owned by the host.
///
/// The engine only ever keeps a `Weak` to it.
pub type EntityHandle = Arc<dyn Managed>;

/// Capability set every managed entity provides.
pub trait Managed: Send + Sync {
    /// Identity used in fault summaries and logs.
    fn label(&self) -> String {
        std::any::type_name::<Self>().to_owned()
    }

    /// `false` once the host considers the entity gone.
    ///
    /// Checked before every awake, enable and disable step.
    fn is_alive(&self) -> bool {
        true
    }

    /// Host enable signal, checked before every enable step.
    fn is_enabled(&self) -> bool {
        true
    }

    /// The entity's hook table.
    fn hooks(&self) -> &PhaseHooks;
}

/// Fixed-size table of optional hooks keyed by [`Operation`].
#[derive(Default)]
pub struct PhaseHooks {
    table: [Option<HookFn>; Operation::COUNT],
}

impl PhaseHooks {
    /// Creates an empty table (every step is a no-op).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`set`](Self::set).
    #[must_use]
    pub fn on<F>(mut self, operation: Operation, hook: F) -> Self
    where
        F: Fn(&HookContext<'_>) -> Result<(), HookError> + Send + Sync + 'static,
    {
        self.set(operation, hook);
        self
    }

    /// Installs `hook` for `operation`, replacing any previous entry.
    pub fn set<F>(&mut self, operation: Operation, hook: F)
    where
        F: Fn(&HookContext<'_>) -> Result<(), HookError> + Send + Sync + 'static,
    {
        self.table[operation.index()] = Some(Box::new(hook));
    }

    /// Removes the hook for `operation`.
    pub fn clear(&mut self, operation: Operation) {
        self.table[operation.index()] = None;
    }

    /// Returns the hook for `operation`, if present.
    #[must_use]
    pub fn get(&self, operation: Operation) -> Option<&HookFn> {
        self.table[operation.index()].as_ref()
    }

    /// Returns `true` if a hook is installed for `operation`.
    #[must_use]
    pub fn contains(&self, operation: Operation) -> bool {
        self.table[operation.index()].is_some()
    }

    /// Number of installed hooks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.iter().filter(|slot| slot.is_some()).count()
    }

    /// Returns `true` if no hooks are installed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for PhaseHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let installed: Vec<&str> = Operation::ALL
            .into_iter()
            .filter(|op| self.contains(*op))
            .map(Operation::name)
            .collect();
        f.debug_struct("PhaseHooks")
            .field("installed", &installed)
            .finish()
    }
}

/// Context handed to every hook invocation.
///
/// Carries the engine explicitly so hooks can issue further requests
/// without a global service locator.
pub struct HookContext<'a> {
    engine: &'a LifecycleEngine,
    entity: &'a EntityHandle,
    operation: Operation,
    cycle: u32,
}

impl<'a> HookContext<'a> {
    pub(crate) const fn new(
        engine: &'a LifecycleEngine,
        entity: &'a EntityHandle,
        operation: Operation,
        cycle: u32,
    ) -> Self {
        Self {
            engine,
            entity,
            operation,
            cycle,
        }
    }

    /// The engine running this hook.
    #[must_use]
    pub const fn engine(&self) -> &'a LifecycleEngine {
        self.engine
    }

    /// The entity the hook runs for.
    #[must_use]
    pub const fn entity(&self) -> &'a EntityHandle {
        self.entity
    }

    /// The operation being run.
    #[must_use]
    pub const fn operation(&self) -> Operation {
        self.operation
    }

    /// Phase recorded if the hook succeeds.
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.operation.target()
    }

    /// Band being drained.
    #[must_use]
    pub const fn band(&self) -> Band {
        self.operation.band()
    }

    /// Enable cycle of the entity (0 for the first).
    #[must_use]
    pub const fn cycle(&self) -> u32 {
        self.cycle
    }
}

impl std::fmt::Debug for HookContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookContext")
            .field("entity", &self.entity.label())
            .field("operation", &self.operation)
            .field("cycle", &self.cycle)
            .finish_non_exhaustive()
    }
}
