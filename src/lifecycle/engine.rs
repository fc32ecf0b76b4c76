//! Lifecycle engine
//!
//! The `LifecycleEngine` owns every entity record and the four request
//! queues. Requests may arrive at any time from any thread; phase hooks only
//! run inside a barrier pass ([`LifecycleEngine::tick`]) or the immediate
//! destroy path, one at a time, in phase-major entity-minor order.
//!
//! Hooks never run while the registry lock is held, so a hook may call back
//! into the engine. A single in-progress flag, taken with compare-and-swap,
//! keeps barrier passes from nesting.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::{Duration, Instant};

use indexmap::{IndexMap, IndexSet};
use serde::Serialize;
use tracing::{debug, info, trace, warn};

use crate::observability::metrics;

use super::fault::{FaultReport, FaultSink, TracingFaultSink, summarize};
use super::hooks::{EntityHandle, HookContext, Managed};
use super::invoker::{self, HookOutcome};
use super::phase::{Band, Operation, Phase};
use super::queue::{EntityKey, RequestQueues};
use super::state::{EntitySnapshot, EntityState, Liveness, StepEffect, StepPlan};

// ============================================================================
// Reports
// ============================================================================

/// One executed phase step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepRecord {
    /// Entity label.
    pub entity: String,
    /// Operation run.
    pub operation: Operation,
    /// `completed`, `no_hook`, `failed` or `panicked`.
    pub outcome: &'static str,
    /// Rendered error when the step faulted.
    pub error: Option<String>,
    /// This failure became the entity's recorded fault.
    pub first_fault: bool,
}

impl StepRecord {
    /// `true` if the hook returned an error or panicked.
    #[must_use]
    pub const fn is_fault(&self) -> bool {
        self.error.is_some()
    }
}

/// Summary of one barrier pass (or one immediate destroy pass).
#[derive(Debug, Clone, Default, Serialize)]
pub struct TickReport {
    /// Tick number; `0` for an immediate destroy pass.
    pub tick: u64,
    /// The pass did not run because another pass was in progress.
    pub refused: bool,
    /// Executed steps in execution order.
    pub steps: Vec<StepRecord>,
    /// Steps skipped by a guard.
    pub skipped: usize,
    /// Entities removed after the destroy band.
    pub removed: usize,
    /// Records dropped because their entity no longer exists.
    pub reaped: usize,
    /// Wall-clock duration of the pass.
    #[serde(skip)]
    pub duration: Duration,
}

impl TickReport {
    fn new(tick: u64) -> Self {
        Self {
            tick,
            ..Self::default()
        }
    }

    fn refused(tick: u64) -> Self {
        Self {
            tick,
            refused: true,
            ..Self::default()
        }
    }

    /// Number of hooks run (including absent no-op hooks).
    #[must_use]
    pub fn invoked(&self) -> usize {
        self.steps.len()
    }

    /// Number of steps that faulted.
    #[must_use]
    pub fn faulted(&self) -> usize {
        self.steps.iter().filter(|s| s.is_fault()).count()
    }

    /// `true` if the pass ran nothing and removed nothing.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.steps.is_empty() && self.removed == 0 && self.reaped == 0
    }
}

// ============================================================================
// Registry
// ============================================================================

struct Tracked {
    handle: Weak<dyn Managed>,
    label: String,
    state: EntityState,
}

#[derive(Default)]
struct Registry {
    tracked: IndexMap<EntityKey, Tracked>,
    queues: RequestQueues,
    pending_removal: IndexSet<EntityKey>,
}

impl Registry {
    fn insert(&mut self, key: EntityKey, entity: &EntityHandle, label: String) -> bool {
        if self.tracked.contains_key(&key) {
            return false;
        }
        self.tracked.insert(
            key,
            Tracked {
                handle: Arc::downgrade(entity),
                label,
                state: EntityState::new(),
            },
        );
        true
    }

    fn remove(&mut self, key: EntityKey) -> Option<Tracked> {
        self.queues.remove(key);
        self.pending_removal.shift_remove(&key);
        self.tracked.shift_remove(&key)
    }
}

/// Resets the in-progress flag when a pass ends, including on unwind.
struct DrainGuard<'a>(&'a AtomicBool);

impl<'a> DrainGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn key_of(entity: &EntityHandle) -> EntityKey {
    EntityKey(Arc::as_ptr(entity).cast::<()>().addr())
}

fn key_of_weak(entity: &Weak<dyn Managed>) -> EntityKey {
    EntityKey(entity.as_ptr().cast::<()>().addr())
}

// ============================================================================
// Engine
// ============================================================================

/// Deterministic barrier-driven lifecycle engine.
///
/// See the module documentation for the execution model.
pub struct LifecycleEngine {
    registry: Mutex<Registry>,
    draining: AtomicBool,
    ticks: AtomicU64,
    sink: Arc<dyn FaultSink>,
}

impl Default for LifecycleEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for LifecycleEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleEngine")
            .field("tracked", &self.tracked_count())
            .field("draining", &self.is_draining())
            .field("ticks", &self.tick_count())
            .finish_non_exhaustive()
    }
}

impl LifecycleEngine {
    /// Creates an engine that reports faults through `tracing`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_fault_sink(Arc::new(TracingFaultSink))
    }

    /// Creates an engine that reports faults to `sink`.
    #[must_use]
    pub fn with_fault_sink(sink: Arc<dyn FaultSink>) -> Self {
        Self {
            registry: Mutex::new(Registry::default()),
            draining: AtomicBool::new(false),
            ticks: AtomicU64::new(0),
            sink,
        }
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ------------------------------------------------------------------
    // Registry
    // ------------------------------------------------------------------

    /// Starts tracking `entity` with a fresh record at [`Phase::None`].
    ///
    /// Returns `false` if it was already tracked.
    pub fn manage(&self, entity: &EntityHandle) -> bool {
        let key = key_of(entity);
        let label = entity.label();
        let (added, count) = {
            let mut reg = self.registry();
            let added = reg.insert(key, entity, label.clone());
            (added, reg.tracked.len())
        };
        if added {
            metrics::set_entities_tracked(count);
            debug!(entity = %label, %key, "entity managed");
        }
        added
    }

    /// [`manage`](Self::manage) for a non-owning handle.
    ///
    /// A handle whose entity is already gone is caller misuse: it is logged
    /// and ignored.
    pub fn manage_weak(&self, entity: &Weak<dyn Managed>) -> bool {
        entity.upgrade().map_or_else(
            || {
                warn!("tried to manage an entity that no longer exists");
                false
            },
            |handle| self.manage(&handle),
        )
    }

    /// Stops tracking `entity` and drops it from every queue.
    ///
    /// Returns `false` if it was not tracked.
    pub fn unmanage(&self, entity: &EntityHandle) -> bool {
        self.unmanage_key(key_of(entity))
    }

    /// [`unmanage`](Self::unmanage) for a non-owning handle. Works even if
    /// the entity is already gone.
    pub fn unmanage_weak(&self, entity: &Weak<dyn Managed>) -> bool {
        self.unmanage_key(key_of_weak(entity))
    }

    fn unmanage_key(&self, key: EntityKey) -> bool {
        let (removed, count) = {
            let mut reg = self.registry();
            let removed = reg.remove(key);
            (removed, reg.tracked.len())
        };
        removed.is_some_and(|tracked| {
            metrics::set_entities_tracked(count);
            debug!(entity = %tracked.label, %key, "entity unmanaged");
            true
        })
    }

    // ------------------------------------------------------------------
    // Requests
    // ------------------------------------------------------------------

    /// Queues the Awake band for `entity`, managing it first if needed.
    pub fn request_awake(&self, entity: &EntityHandle) {
        self.enqueue(Band::Awake, entity);
    }

    /// Queues the Enable band for `entity`, managing it first if needed.
    pub fn request_enable(&self, entity: &EntityHandle) {
        self.enqueue(Band::Enable, entity);
    }

    /// Queues the Disable band for `entity`, managing it first if needed.
    pub fn request_disable(&self, entity: &EntityHandle) {
        self.enqueue(Band::Disable, entity);
    }

    /// Queues the Destroy band for `entity` and runs it immediately.
    ///
    /// See [`destroy_immediate`](Self::destroy_immediate).
    pub fn request_destroy(&self, entity: &EntityHandle) {
        let report = self.destroy_immediate(entity);
        trace!(steps = report.invoked(), deferred = report.refused, "destroy requested");
    }

    /// Routes a request for `band` to the matching `request_*` method.
    pub fn request(&self, band: Band, entity: &EntityHandle) {
        match band {
            Band::Destroy => self.request_destroy(entity),
            _ => self.enqueue(band, entity),
        }
    }

    /// [`request`](Self::request) for a non-owning handle.
    ///
    /// A handle whose entity is already gone is caller misuse: it is logged
    /// and ignored.
    pub fn request_weak(&self, band: Band, entity: &Weak<dyn Managed>) {
        match entity.upgrade() {
            Some(handle) => self.request(band, &handle),
            None => warn!(%band, "tried to request a band for an entity that no longer exists"),
        }
    }

    /// Queues `band` for every tracked entity, in tracking order.
    ///
    /// Bulk destroy is left to the next barrier pass. Returns the number of
    /// entities queued.
    pub fn request_all(&self, band: Band) -> usize {
        let mut reg = self.registry();
        let keys: Vec<EntityKey> = reg.tracked.keys().copied().collect();
        for key in &keys {
            reg.queues.push(band, *key);
        }
        drop(reg);
        debug!(%band, entities = keys.len(), "band requested for every entity");
        keys.len()
    }

    fn enqueue(&self, band: Band, entity: &EntityHandle) {
        let key = key_of(entity);
        let label = entity.label();
        let (added, queued, count) = {
            let mut reg = self.registry();
            let added = reg.insert(key, entity, label.clone());
            let queued = reg.queues.push(band, key);
            (added, queued, reg.tracked.len())
        };
        if added {
            metrics::set_entities_tracked(count);
            debug!(entity = %label, %key, "entity managed on first request");
        }
        trace!(entity = %label, %band, queued, "request routed");
    }

    // ------------------------------------------------------------------
    // Barrier passes
    // ------------------------------------------------------------------

    /// Runs one barrier pass: drains Awake, Enable, Disable and Destroy in
    /// that order, then removes disposed entities and reaps records whose
    /// entity has been dropped.
    ///
    /// Never fails. A call made while another pass is running (from a hook,
    /// or from another thread) is refused and returns a report with
    /// `refused` set.
    pub fn tick(&self) -> TickReport {
        let Some(_guard) = DrainGuard::acquire(&self.draining) else {
            warn!("tick requested while a barrier pass is running; ignored");
            return TickReport::refused(self.tick_count());
        };

        let tick = self.ticks.fetch_add(1, Ordering::Relaxed) + 1;
        let started = Instant::now();
        let mut report = TickReport::new(tick);

        for band in Band::ORDER {
            let snapshot = self.snapshot(band);
            if snapshot.is_empty() {
                continue;
            }
            let before = report.steps.len();
            self.drain_band(band, &snapshot, &mut report);
            debug!(
                tick,
                %band,
                entities = snapshot.len(),
                steps = report.steps.len() - before,
                "band drained"
            );
        }

        report.removed = self.flush_removals();
        report.reaped = self.reap_dead();
        report.duration = started.elapsed();
        metrics::record_tick(report.duration);

        if !report.is_idle() {
            info!(
                tick,
                invoked = report.invoked(),
                faulted = report.faulted(),
                skipped = report.skipped,
                removed = report.removed,
                "tick completed"
            );
        }
        report
    }

    /// Runs the Destroy band for `entity` alone, right now.
    ///
    /// The entity is managed and queued for destroy first. When no pass is
    /// running, the destroy steps run against a single-entity snapshot and
    /// the entity is untracked before this returns. When a pass is already
    /// running the request stays queued for the next Destroy drain and the
    /// returned report has `refused` set.
    pub fn destroy_immediate(&self, entity: &EntityHandle) -> TickReport {
        self.enqueue(Band::Destroy, entity);

        let Some(_guard) = DrainGuard::acquire(&self.draining) else {
            debug!(
                entity = %entity.label(),
                "barrier pass in progress; destroy left for the destroy drain"
            );
            return TickReport::refused(0);
        };

        let started = Instant::now();
        let mut report = TickReport::new(0);
        let snapshot = [(key_of(entity), Arc::clone(entity))];
        self.drain_band(Band::Destroy, &snapshot, &mut report);
        report.removed = self.flush_removals();
        report.duration = started.elapsed();
        report
    }

    /// Takes the queue for `band` and resolves it to live handles.
    fn snapshot(&self, band: Band) -> Vec<(EntityKey, EntityHandle)> {
        let mut reg = self.registry();
        let keys = reg.queues.take(band);
        keys.into_iter()
            .filter_map(|key| {
                let tracked = reg.tracked.get(&key)?;
                let handle = tracked.handle.upgrade();
                if handle.is_none() {
                    debug!(entity = %tracked.label, %band, "dropping dead handle from snapshot");
                }
                handle.map(|h| (key, h))
            })
            .collect()
    }

    /// Phase-major, entity-minor: every entity finishes step N before any
    /// entity starts step N+1.
    fn drain_band(
        &self,
        band: Band,
        snapshot: &[(EntityKey, EntityHandle)],
        report: &mut TickReport,
    ) {
        for &operation in band.operations() {
            for (key, handle) in snapshot {
                self.step(*key, handle, operation, report);
            }
        }
    }

    /// Guarded advance of one entity by one step.
    fn step(
        &self,
        key: EntityKey,
        handle: &EntityHandle,
        operation: Operation,
        report: &mut TickReport,
    ) {
        let liveness = invoker::guarded(|| Liveness {
            alive: handle.is_alive(),
            enabled: handle.is_enabled(),
        })
        .unwrap_or_else(|panic| {
            warn!(%key, %operation, %panic, "liveness check panicked, treating entity as dead");
            Liveness {
                alive: false,
                enabled: false,
            }
        });

        let (plan, cycle, label) = {
            let reg = self.registry();
            let Some(tracked) = reg.tracked.get(&key) else {
                return;
            };
            (
                tracked.state.plan(operation, liveness),
                tracked.state.cycle(),
                tracked.label.clone(),
            )
        };

        let reopen = match plan {
            StepPlan::Run { reopen } => reopen,
            StepPlan::Skip(reason) => {
                trace!(entity = %label, %operation, ?reason, "step skipped");
                report.skipped += 1;
                return;
            }
        };

        let cycle = if reopen { cycle.saturating_add(1) } else { cycle };
        let ctx = HookContext::new(self, handle, operation, cycle);
        let outcome = invoker::invoke(&ctx);
        let outcome_label = outcome.label();
        metrics::record_hook(operation, outcome_label);

        let phase = operation.target();
        let (result, error) = match outcome {
            HookOutcome::Faulted(err) => (
                Err((summarize(phase, operation, &label), err.to_string())),
                Some(err),
            ),
            HookOutcome::Completed | HookOutcome::NoHook => (Ok(()), None),
        };

        let effect = {
            let mut reg = self.registry();
            let Some(tracked) = reg.tracked.get_mut(&key) else {
                // Unmanaged by its own hook.
                return;
            };
            let effect = tracked.state.apply(operation, reopen, result);
            if operation == Operation::Dispose {
                reg.pending_removal.insert(key);
            }
            effect
        };

        let first_fault = match effect {
            StepEffect::Advanced => {
                debug!(entity = %label, %operation, %phase, cycle, "phase reached");
                false
            }
            StepEffect::Faulted { first } => {
                metrics::record_fault(operation.band());
                if let Some(err) = &error {
                    let fault = FaultReport {
                        phase,
                        operation,
                        entity: &label,
                        error: err,
                        first,
                    };
                    if let Err(panic) = invoker::guarded(|| self.sink.report(&fault)) {
                        warn!(entity = %label, %operation, %panic, "fault sink panicked");
                    }
                }
                first
            }
        };

        report.steps.push(StepRecord {
            entity: label,
            operation,
            outcome: outcome_label,
            error: error.map(|e| e.to_string()),
            first_fault,
        });
    }

    /// Unmanages every entity that completed the Destroy band.
    fn flush_removals(&self) -> usize {
        let (removed, count) = {
            let mut reg = self.registry();
            let pending = std::mem::take(&mut reg.pending_removal);
            let removed: Vec<Tracked> = pending.into_iter().filter_map(|k| reg.remove(k)).collect();
            (removed, reg.tracked.len())
        };
        if removed.is_empty() {
            return 0;
        }
        for tracked in &removed {
            debug!(entity = %tracked.label, "entity removed after destroy");
        }
        metrics::record_removed(removed.len());
        metrics::set_entities_tracked(count);
        removed.len()
    }

    /// Drops records whose entity was released without a destroy request.
    fn reap_dead(&self) -> usize {
        let (dead, count) = {
            let mut reg = self.registry();
            let keys: Vec<EntityKey> = reg
                .tracked
                .iter()
                .filter(|(_, t)| t.handle.strong_count() == 0)
                .map(|(k, _)| *k)
                .collect();
            let dead: Vec<Tracked> = keys.into_iter().filter_map(|k| reg.remove(k)).collect();
            (dead, reg.tracked.len())
        };
        if dead.is_empty() {
            return 0;
        }
        for tracked in &dead {
            warn!(
                entity = %tracked.label,
                phase = %tracked.state.phase(),
                "entity dropped without a destroy request; record reaped"
            );
        }
        metrics::set_entities_tracked(count);
        dead.len()
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Read-only projection of `entity`'s record.
    #[must_use]
    pub fn inspect(&self, entity: &EntityHandle) -> Option<EntitySnapshot> {
        let reg = self.registry();
        reg.tracked
            .get(&key_of(entity))
            .map(|t| EntitySnapshot::capture(&t.label, &t.state))
    }

    /// [`inspect`](Self::inspect) for a non-owning handle. Works even if
    /// the entity is already gone.
    #[must_use]
    pub fn inspect_weak(&self, entity: &Weak<dyn Managed>) -> Option<EntitySnapshot> {
        let reg = self.registry();
        reg.tracked
            .get(&key_of_weak(entity))
            .map(|t| EntitySnapshot::capture(&t.label, &t.state))
    }

    /// Projections of every tracked record, in tracking order.
    #[must_use]
    pub fn snapshots(&self) -> Vec<EntitySnapshot> {
        let reg = self.registry();
        reg.tracked
            .values()
            .map(|t| EntitySnapshot::capture(&t.label, &t.state))
            .collect()
    }

    /// Reported phase of `entity`, or `None` if it is not tracked.
    #[must_use]
    pub fn phase(&self, entity: &EntityHandle) -> Option<Phase> {
        let reg = self.registry();
        reg.tracked.get(&key_of(entity)).map(|t| t.state.phase())
    }

    /// Returns `true` if `entity` is tracked.
    #[must_use]
    pub fn is_tracked(&self, entity: &EntityHandle) -> bool {
        self.registry().tracked.contains_key(&key_of(entity))
    }

    /// Returns `true` if `entity` is waiting in `band`'s queue.
    #[must_use]
    pub fn is_queued(&self, band: Band, entity: &EntityHandle) -> bool {
        self.registry().queues.contains(band, key_of(entity))
    }

    /// Number of entities waiting in `band`'s queue.
    #[must_use]
    pub fn queue_len(&self, band: Band) -> usize {
        self.registry().queues.len(band)
    }

    /// Number of tracked entities.
    #[must_use]
    pub fn tracked_count(&self) -> usize {
        self.registry().tracked.len()
    }

    /// Number of barrier passes run so far.
    #[must_use]
    pub fn tick_count(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    /// Returns `true` while a barrier pass is running.
    #[must_use]
    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::Acquire)
    }
}

// ============================================================================
// Tests
// ============================================================================
