//! Scenario runner
//!
//! Executes a scenario script against a fresh [`LifecycleEngine`], emitting
//! structured events for every executed step and checking expectations
//! against the engine's records.

use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::Utc;
use indexmap::IndexMap;
use serde::Serialize;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{Expectation, Scenario, Step};
use crate::error::ScenarioError;
use crate::lifecycle::{
    Band, EntitySnapshot, FanOutSink, FaultReport, FaultSink, LifecycleEngine, Managed,
    TickReport, TracingFaultSink,
};
use crate::observability::metrics;
use crate::observability::{Event, EventEmitter, StopReason};

use super::entity::{CallCounts, ScriptedEntity, calls_of};

// ============================================================================
// Fault sink
// ============================================================================

/// Forwards each entity's first fault to the event stream.
struct EventFaultSink {
    emitter: Arc<EventEmitter>,
}

impl FaultSink for EventFaultSink {
    fn report(&self, report: &FaultReport<'_>) {
        if !report.first {
            return;
        }
        self.emitter.emit(Event::EntityFaulted {
            timestamp: Utc::now(),
            entity: report.entity.to_owned(),
            operation: report.operation,
            phase: report.phase,
            error: report.error.to_string(),
        });
    }
}

// ============================================================================
// Summary
// ============================================================================

/// Outcome of one `expect` step.
#[derive(Debug, Clone, Serialize)]
pub struct ExpectationOutcome {
    /// Index of the step in the script.
    pub step: usize,
    /// Entity checked.
    pub entity: String,
    /// Mismatches, empty if the expectation held.
    pub mismatches: Vec<String>,
}

impl ExpectationOutcome {
    /// Returns `true` if every assertion held.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.mismatches.is_empty()
    }
}

/// Result of a completed scenario run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Unique id of the run.
    pub run_id: Uuid,
    /// Scenario name.
    pub scenario: String,
    /// Barrier passes executed.
    pub ticks: u64,
    /// Expectation outcomes in script order.
    pub expectations: Vec<ExpectationOutcome>,
    /// Final record of every tracked entity.
    pub entities: Vec<EntitySnapshot>,
}

impl RunSummary {
    /// Expectations that held.
    #[must_use]
    pub fn passed(&self) -> usize {
        self.expectations.iter().filter(|e| e.passed()).count()
    }

    /// Expectations that failed.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.expectations.len() - self.passed()
    }

    /// Returns `true` if no expectation failed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }
}

// ============================================================================
// Runner
// ============================================================================

/// The host's view of one scripted entity.
struct Slot {
    strong: Option<Arc<ScriptedEntity>>,
    weak: Weak<ScriptedEntity>,
    calls: CallCounts,
}

impl Slot {
    fn weak_handle(&self) -> Weak<dyn Managed> {
        self.weak.clone()
    }
}

/// Runs one scenario script.
pub struct Runner {
    engine: Arc<LifecycleEngine>,
    scenario: Arc<Scenario>,
    slots: IndexMap<String, Slot>,
    emitter: Arc<EventEmitter>,
    tick_interval: Option<Duration>,
    cancel: CancellationToken,
    run_id: Uuid,
    expectations: Vec<ExpectationOutcome>,
}

impl std::fmt::Debug for Runner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runner")
            .field("scenario", &self.scenario.name)
            .field("run_id", &self.run_id)
            .field("engine", &self.engine)
            .finish_non_exhaustive()
    }
}

impl Runner {
    /// Creates a runner with a fresh engine and one entity per declaration.
    #[must_use]
    pub fn new(scenario: Arc<Scenario>, emitter: Arc<EventEmitter>) -> Self {
        let sink = FanOutSink::new()
            .with(Arc::new(TracingFaultSink))
            .with(Arc::new(EventFaultSink {
                emitter: Arc::clone(&emitter),
            }));
        let engine = Arc::new(LifecycleEngine::with_fault_sink(Arc::new(sink)));

        let slots = scenario
            .entities
            .iter()
            .map(|spec| {
                let entity = Arc::new(ScriptedEntity::from_spec(spec));
                let slot = Slot {
                    weak: Arc::downgrade(&entity),
                    calls: entity.call_counts(),
                    strong: Some(entity),
                };
                (spec.name.clone(), slot)
            })
            .collect();

        Self {
            engine,
            scenario,
            slots,
            emitter,
            tick_interval: None,
            cancel: CancellationToken::new(),
            run_id: Uuid::new_v4(),
            expectations: Vec::new(),
        }
    }

    /// Paces ticks by the scenario's `tick_interval` when `enabled`.
    #[must_use]
    pub fn realtime(mut self, enabled: bool) -> Self {
        self.tick_interval = if enabled {
            self.scenario
                .tick_interval
                .as_deref()
                .and_then(|s| humantime::parse_duration(s.trim()).ok())
                .filter(|d| !d.is_zero())
        } else {
            None
        };
        self
    }

    /// Stops the run between steps once `token` is cancelled.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// The engine driven by this runner.
    #[must_use]
    pub const fn engine(&self) -> &Arc<LifecycleEngine> {
        &self.engine
    }

    /// The host's handle to `name`, unless it was dropped.
    #[must_use]
    pub fn entity(&self, name: &str) -> Option<Arc<ScriptedEntity>> {
        self.slots.get(name).and_then(|slot| slot.strong.clone())
    }

    /// Unique id of this run.
    #[must_use]
    pub const fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Executes every step in order.
    ///
    /// # Errors
    ///
    /// Returns [`ScenarioError::UnknownEntity`] if a step names an entity
    /// that was never declared, and [`ScenarioError::Interrupted`] if the
    /// cancellation token fires.
    pub async fn run(&mut self) -> Result<RunSummary, ScenarioError> {
        self.emitter.emit(Event::RunStarted {
            timestamp: Utc::now(),
            run_id: self.run_id,
            scenario: self.scenario.name.clone(),
            entities: self.slots.len(),
        });
        info!(
            scenario = %self.scenario.name,
            run_id = %self.run_id,
            entities = self.slots.len(),
            steps = self.scenario.steps.len(),
            "scenario started"
        );

        let mut interval = self.tick_interval.map(|period| {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });

        let scenario = Arc::clone(&self.scenario);
        for (index, step) in scenario.steps.iter().enumerate() {
            if self.cancel.is_cancelled() {
                return Err(self.cancelled());
            }
            debug!(step = index, keyword = step.keyword(), "executing step");

            if let Step::Tick(count) = step {
                for _ in 0..*count {
                    if let Some(interval) = interval.as_mut() {
                        tokio::select! {
                            () = self.cancel.cancelled() => return Err(self.cancelled()),
                            _ = interval.tick() => {}
                        }
                    } else if self.cancel.is_cancelled() {
                        return Err(self.cancelled());
                    }
                    let report = self.engine.tick();
                    self.emit_report(&report);
                }
                continue;
            }

            self.execute(index, step)?;
        }

        let summary = self.summary();
        self.emitter.emit(Event::RunFinished {
            timestamp: Utc::now(),
            run_id: self.run_id,
            ticks: summary.ticks,
            passed: summary.passed(),
            failed: summary.failed(),
            reason: StopReason::Completed,
        });
        metrics::record_scenario(&summary.scenario, summary.is_success());
        info!(
            scenario = %summary.scenario,
            ticks = summary.ticks,
            passed = summary.passed(),
            failed = summary.failed(),
            "scenario finished"
        );
        Ok(summary)
    }

    fn execute(&mut self, index: usize, step: &Step) -> Result<(), ScenarioError> {
        match step {
            Step::Manage(names) => {
                for name in names {
                    let weak = self.slot(name)?.weak_handle();
                    self.engine.manage_weak(&weak);
                }
            }
            Step::Unmanage(names) => {
                for name in names {
                    let weak = self.slot(name)?.weak_handle();
                    self.engine.unmanage_weak(&weak);
                }
            }
            Step::Awake(names) => self.request_named(Band::Awake, names)?,
            Step::Enable(names) => self.request_named(Band::Enable, names)?,
            Step::Disable(names) => self.request_named(Band::Disable, names)?,
            Step::Destroy(names) => {
                for name in names {
                    let weak = self.slot(name)?.weak_handle();
                    match weak.upgrade() {
                        Some(handle) => {
                            let report = self.engine.destroy_immediate(&handle);
                            self.emit_report(&report);
                        }
                        None => self.engine.request_weak(Band::Destroy, &weak),
                    }
                }
            }
            Step::AwakeAll => {
                self.engine.request_all(Band::Awake);
            }
            Step::EnableAll => {
                self.engine.request_all(Band::Enable);
            }
            Step::DisableAll => {
                self.engine.request_all(Band::Disable);
            }
            Step::DestroyAll => {
                self.engine.request_all(Band::Destroy);
            }
            Step::SetEnabled(set) => {
                if let Some(entity) = self.live(&set.entity)? {
                    entity.set_enabled(set.enabled);
                }
            }
            Step::Kill(names) => {
                for name in names {
                    if let Some(entity) = self.live(name)? {
                        entity.set_alive(false);
                    }
                }
            }
            Step::Revive(names) => {
                for name in names {
                    if let Some(entity) = self.live(name)? {
                        entity.set_alive(true);
                    }
                }
            }
            Step::Drop(names) => {
                for name in names {
                    let slot = self
                        .slots
                        .get_mut(name)
                        .ok_or_else(|| ScenarioError::UnknownEntity(name.clone()))?;
                    if slot.strong.take().is_none() {
                        warn!(entity = %name, "entity already dropped");
                    }
                }
            }
            Step::Expect(expect) => self.check(index, expect)?,
            Step::Tick(_) => {}
        }
        Ok(())
    }

    fn request_named(&self, band: Band, names: &[String]) -> Result<(), ScenarioError> {
        for name in names {
            let weak = self.slot(name)?.weak_handle();
            self.engine.request_weak(band, &weak);
        }
        Ok(())
    }

    fn slot(&self, name: &str) -> Result<&Slot, ScenarioError> {
        self.slots
            .get(name)
            .ok_or_else(|| ScenarioError::UnknownEntity(name.to_owned()))
    }

    /// The live entity, or `None` (with a warning) if the host dropped it.
    fn live(&self, name: &str) -> Result<Option<Arc<ScriptedEntity>>, ScenarioError> {
        let entity = self.slot(name)?.strong.clone();
        if entity.is_none() {
            warn!(entity = %name, "signal change on a dropped entity; ignored");
        }
        Ok(entity)
    }

    fn check(&mut self, index: usize, expect: &Expectation) -> Result<(), ScenarioError> {
        let slot = self.slot(&expect.entity)?;
        let snapshot = self.engine.inspect_weak(&slot.weak_handle());
        let mismatches = evaluate(expect, snapshot.as_ref(), &slot.calls);
        let passed = mismatches.is_empty();

        if passed {
            debug!(step = index, entity = %expect.entity, "expectation held");
        } else {
            warn!(
                step = index,
                entity = %expect.entity,
                mismatches = %mismatches.join("; "),
                "expectation failed"
            );
        }

        self.emitter.emit(Event::ExpectationChecked {
            timestamp: Utc::now(),
            step: index,
            entity: expect.entity.clone(),
            passed,
            mismatches: mismatches.clone(),
        });
        self.expectations.push(ExpectationOutcome {
            step: index,
            entity: expect.entity.clone(),
            mismatches,
        });
        Ok(())
    }

    fn emit_report(&self, report: &TickReport) {
        if report.refused {
            return;
        }
        for step in &report.steps {
            self.emitter.emit(Event::HookInvoked {
                timestamp: Utc::now(),
                tick: report.tick,
                entity: step.entity.clone(),
                operation: step.operation,
                phase: step.operation.target(),
                outcome: step.outcome,
            });
        }
        if report.tick > 0 {
            self.emitter.emit(Event::TickCompleted {
                timestamp: Utc::now(),
                tick: report.tick,
                invoked: report.invoked(),
                faulted: report.faulted(),
                removed: report.removed,
                duration_ms: u64::try_from(report.duration.as_millis()).unwrap_or(u64::MAX),
            });
        }
    }

    fn summary(&self) -> RunSummary {
        RunSummary {
            run_id: self.run_id,
            scenario: self.scenario.name.clone(),
            ticks: self.engine.tick_count(),
            expectations: self.expectations.clone(),
            entities: self.engine.snapshots(),
        }
    }

    fn cancelled(&self) -> ScenarioError {
        let summary = self.summary();
        self.emitter.emit(Event::RunFinished {
            timestamp: Utc::now(),
            run_id: self.run_id,
            ticks: summary.ticks,
            passed: summary.passed(),
            failed: summary.failed(),
            reason: StopReason::Cancelled,
        });
        info!(scenario = %summary.scenario, ticks = summary.ticks, "scenario cancelled");
        ScenarioError::Interrupted
    }
}

/// Compares an entity's record and call counters with `expect`.
fn evaluate(
    expect: &Expectation,
    snapshot: Option<&EntitySnapshot>,
    calls: &CallCounts,
) -> Vec<String> {
    let mut mismatches = Vec::new();

    if let Some(tracked) = expect.tracked {
        if tracked != snapshot.is_some() {
            mismatches.push(format!(
                "tracked: expected {tracked}, got {}",
                snapshot.is_some()
            ));
        }
    }

    let needs_record = expect.phase.is_some()
        || expect.active.is_some()
        || expect.faulted.is_some()
        || expect.cycle.is_some();

    match snapshot {
        Some(record) => {
            if let Some(phase) = expect.phase {
                if phase != record.phase {
                    mismatches.push(format!("phase: expected {phase}, got {}", record.phase));
                }
            }
            if let Some(active) = expect.active {
                if active != record.is_active {
                    mismatches.push(format!(
                        "active: expected {active}, got {}",
                        record.is_active
                    ));
                }
            }
            if let Some(faulted) = expect.faulted {
                if faulted != record.is_faulted {
                    mismatches.push(format!(
                        "faulted: expected {faulted}, got {}",
                        record.is_faulted
                    ));
                }
            }
            if let Some(cycle) = expect.cycle {
                if cycle != record.cycle {
                    mismatches.push(format!("cycle: expected {cycle}, got {}", record.cycle));
                }
            }
        }
        None if needs_record && expect.tracked != Some(false) => {
            mismatches.push("entity is not tracked".to_owned());
        }
        None => {}
    }

    for (op, expected) in &expect.calls {
        let actual = calls_of(calls, *op);
        if actual != *expected {
            mismatches.push(format!("calls.{op}: expected {expected}, got {actual}"));
        }
    }

    mismatches
}
