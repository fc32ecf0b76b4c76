mod common;

use std::sync::Arc;

use common::{CallLog, Recorder, calls_for, handle};
use lifecycles::lifecycle::{Band, EntityHandle, LifecycleEngine, Operation, Phase};
use proptest::prelude::*;

const ENTITIES: usize = 3;

#[derive(Debug, Clone)]
enum Action {
    Request(Band, usize),
    RequestAll(Band),
    Tick,
    Alive(usize, bool),
    Enabled(usize, bool),
    Unmanage(usize),
}

fn band() -> impl Strategy<Value = Band> {
    prop::sample::select(Band::ORDER.to_vec())
}

fn action() -> impl Strategy<Value = Action> {
    prop_oneof![
        6 => (band(), 0..ENTITIES).prop_map(|(b, i)| Action::Request(b, i)),
        1 => band().prop_map(Action::RequestAll),
        5 => Just(Action::Tick),
        1 => (0..ENTITIES, any::<bool>()).prop_map(|(i, v)| Action::Alive(i, v)),
        1 => (0..ENTITIES, any::<bool>()).prop_map(|(i, v)| Action::Enabled(i, v)),
        1 => (0..ENTITIES).prop_map(Action::Unmanage),
    ]
}

fn failures() -> impl Strategy<Value = Vec<Vec<Operation>>> {
    prop::collection::vec(
        prop::sample::subsequence(Operation::ALL.to_vec(), 0..=2),
        ENTITIES,
    )
}

struct World {
    engine: LifecycleEngine,
    log: CallLog,
    recorders: Vec<Arc<Recorder>>,
    handles: Vec<EntityHandle>,
}

impl World {
    fn new(failing: &[Vec<Operation>]) -> Self {
        let log = CallLog::default();
        let recorders: Vec<_> = failing
            .iter()
            .enumerate()
            .map(|(i, ops)| Recorder::new(&name(i), &log, ops))
            .collect();
        let handles = recorders.iter().map(handle).collect();
        Self {
            engine: LifecycleEngine::new(),
            log,
            recorders,
            handles,
        }
    }

    fn apply(&self, action: &Action) {
        match *action {
            Action::Request(band, i) => self.engine.request(band, &self.handles[i]),
            Action::RequestAll(band) => {
                self.engine.request_all(band);
            }
            Action::Tick => {
                self.engine.tick();
            }
            Action::Alive(i, v) => self.recorders[i].set_alive(v),
            Action::Enabled(i, v) => self.recorders[i].set_enabled(v),
            Action::Unmanage(i) => {
                self.engine.unmanage(&self.handles[i]);
            }
        }
    }

    fn calls(&self, i: usize) -> Vec<Operation> {
        calls_for(&self.log, &name(i))
    }
}

fn name(i: usize) -> String {
    format!("e{i}")
}

/// Per-entity observation carried between actions.
#[derive(Debug, Clone, Default)]
struct Seen {
    /// `(cycle, phase)` while tracked and not faulted.
    progress: Option<(u32, Phase)>,
    faulted: bool,
    /// Length of the call log when the current record was created.
    lifetime_start: usize,
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn progress_is_monotonic_within_a_lifetime(
        failing in failures(),
        actions in prop::collection::vec(action(), 1..60),
    ) {
        let world = World::new(&failing);
        let mut seen = vec![Seen::default(); ENTITIES];

        for action in &actions {
            let calls_before: Vec<usize> = (0..ENTITIES).map(|i| world.calls(i).len()).collect();
            world.apply(action);

            for (i, entry) in seen.iter_mut().enumerate() {
                let calls = world.calls(i);
                let Some(snapshot) = world.engine.inspect(&world.handles[i]) else {
                    *entry = Seen { lifetime_start: calls.len(), ..Seen::default() };
                    continue;
                };

                if entry.faulted {
                    // Faulted records stay faulted and only run destroy steps.
                    prop_assert!(snapshot.is_faulted);
                    prop_assert!(calls[calls_before[i]..]
                        .iter()
                        .all(|op| op.band() == Band::Destroy));
                }

                let first_activations = calls[entry.lifetime_start.min(calls.len())..]
                    .iter()
                    .filter(|op| **op == Operation::FirstActivation)
                    .count();
                prop_assert!(first_activations <= 1);

                if snapshot.is_faulted {
                    entry.faulted = true;
                    entry.progress = None;
                } else {
                    let now = (snapshot.cycle, snapshot.phase);
                    if let Some(before) = entry.progress {
                        prop_assert!(now >= before, "{now:?} regressed from {before:?}");
                    }
                    entry.progress = Some(now);
                }
            }
        }
    }

    #[test]
    fn idle_ticks_change_nothing(
        failing in failures(),
        actions in prop::collection::vec(action(), 1..40),
    ) {
        let world = World::new(&failing);
        for action in &actions {
            world.apply(action);
        }

        world.engine.tick();
        let settled = world.engine.snapshots();
        let calls = world.log.lock().unwrap().len();

        prop_assert!(world.engine.tick().is_idle());
        prop_assert!(world.engine.tick().is_idle());
        prop_assert_eq!(world.engine.snapshots(), settled);
        prop_assert_eq!(world.log.lock().unwrap().len(), calls);
    }

    #[test]
    fn active_implies_first_activation(
        actions in prop::collection::vec(action(), 1..60),
    ) {
        let world = World::new(&vec![Vec::new(); ENTITIES]);
        for action in &actions {
            world.apply(action);
            for h in &world.handles {
                if let Some(snapshot) = world.engine.inspect(h) {
                    if snapshot.is_active {
                        prop_assert!(snapshot.first_activation_done || snapshot.phase == Phase::Activated);
                        prop_assert!(snapshot.phase >= Phase::Activated);
                    }
                }
            }
        }
    }
}
