mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use common::{CallLog, Recorder, calls_for, handle};
use lifecycles::lifecycle::{Band, LifecycleEngine, Operation, Phase, PhaseHooks};

#[test]
fn full_lifecycle_round_trip() {
    let engine = LifecycleEngine::new();
    let log = CallLog::default();
    let player = handle(&Recorder::new("player", &log, &[]));

    engine.request_awake(&player);
    engine.tick();
    assert_eq!(engine.phase(&player), Some(Phase::Setup));

    engine.request_enable(&player);
    engine.tick();
    let snapshot = engine.inspect(&player).unwrap();
    assert_eq!(snapshot.phase, Phase::FirstActivation);
    assert!(snapshot.is_active);

    engine.request_disable(&player);
    engine.tick();
    let snapshot = engine.inspect(&player).unwrap();
    assert_eq!(snapshot.phase, Phase::FinalizedDisable);
    assert!(!snapshot.is_active);

    engine.request_destroy(&player);
    assert!(!engine.is_tracked(&player));
    assert_eq!(calls_for(&log, "player"), Operation::ALL.to_vec());
}

#[test]
fn awake_and_enable_in_one_tick() {
    let engine = LifecycleEngine::new();
    let log = CallLog::default();
    let a = handle(&Recorder::new("a", &log, &[]));

    engine.request_awake(&a);
    engine.request_enable(&a);
    let report = engine.tick();

    assert_eq!(report.invoked(), 8);
    assert_eq!(engine.phase(&a), Some(Phase::FirstActivation));
}

#[test]
fn destroy_request_cancels_pending_awake() {
    let engine = LifecycleEngine::new();
    let log = CallLog::default();
    let a = handle(&Recorder::new("a", &log, &[]));

    engine.request_awake(&a);
    assert!(engine.is_queued(Band::Awake, &a));
    engine.request_destroy(&a);

    assert!(!engine.is_queued(Band::Awake, &a));
    assert!(!engine.is_tracked(&a));
    assert!(engine.tick().is_idle());
    // Only Dispose has no prerequisite.
    assert_eq!(calls_for(&log, "a"), vec![Operation::Dispose]);
}

#[test]
fn opposite_requests_supersede_each_other() {
    let engine = LifecycleEngine::new();
    let log = CallLog::default();
    let a = handle(&Recorder::new("a", &log, &[]));

    engine.request_enable(&a);
    engine.request_disable(&a);
    assert!(!engine.is_queued(Band::Enable, &a));
    assert!(engine.is_queued(Band::Disable, &a));

    engine.request_enable(&a);
    assert!(engine.is_queued(Band::Enable, &a));
    assert!(!engine.is_queued(Band::Disable, &a));
}

#[test]
fn duplicate_requests_are_idempotent() {
    let engine = LifecycleEngine::new();
    let log = CallLog::default();
    let a = handle(&Recorder::new("a", &log, &[]));

    engine.request_awake(&a);
    engine.request_awake(&a);
    assert_eq!(engine.queue_len(Band::Awake), 1);
    assert_eq!(engine.tick().invoked(), 4);
}

#[test]
fn barrier_completes_each_phase_across_entities() {
    let engine = LifecycleEngine::new();
    let log = CallLog::default();
    let names = ["a", "b", "c"];
    let handles: Vec<_> = names
        .iter()
        .map(|n| handle(&Recorder::new(n, &log, &[])))
        .collect();
    for h in &handles {
        engine.request_awake(h);
    }
    engine.tick();

    let order = log.lock().unwrap().clone();
    for (i, (name, op)) in order.iter().enumerate() {
        assert_eq!(name, names[i % 3]);
        assert_eq!(*op, Band::Awake.operations()[i / 3]);
    }
}

#[test]
fn enable_cycles_repeat_without_first_activation() {
    let engine = LifecycleEngine::new();
    let log = CallLog::default();
    let a = handle(&Recorder::new("a", &log, &[]));

    engine.request_awake(&a);
    engine.tick();
    for _ in 0..3 {
        engine.request_enable(&a);
        engine.tick();
        engine.request_disable(&a);
        engine.tick();
    }
    engine.request_enable(&a);
    engine.tick();

    let calls = calls_for(&log, "a");
    let count = |op| calls.iter().filter(|c| **c == op).count();
    assert_eq!(count(Operation::FirstActivation), 1);
    assert_eq!(count(Operation::Activate), 4);
    assert_eq!(count(Operation::Deactivate), 3);

    let snapshot = engine.inspect(&a).unwrap();
    assert_eq!(snapshot.cycle, 3);
    assert_eq!(snapshot.phase, Phase::Activated);
    assert!(snapshot.is_active);
    assert!(snapshot.first_activation_done);
}

#[test]
fn request_from_hook_lands_in_later_band_of_same_tick() {
    let engine = LifecycleEngine::new();
    let hooks = PhaseHooks::new().on(Operation::Setup, |ctx| {
        ctx.engine().request_enable(ctx.entity());
        Ok(())
    });
    let a = handle(&Recorder::with_hooks("a", hooks));

    engine.request_awake(&a);
    engine.tick();
    assert_eq!(engine.phase(&a), Some(Phase::FirstActivation));
}

#[test]
fn request_for_drained_band_waits_for_next_tick() {
    let engine = LifecycleEngine::new();
    let seen = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&seen);
    let hooks = PhaseHooks::new().on(Operation::Activate, move |ctx| {
        counter.fetch_add(1, Ordering::SeqCst);
        if ctx.cycle() == 0 {
            ctx.engine().request_disable(ctx.entity());
        }
        Ok(())
    });
    let a = handle(&Recorder::with_hooks("a", hooks));

    engine.request_awake(&a);
    engine.request_enable(&a);
    engine.tick();
    // Disable drains after Enable within the same tick.
    assert_eq!(engine.phase(&a), Some(Phase::FinalizedDisable));

    engine.request_enable(&a);
    let report = engine.tick();
    assert_eq!(seen.load(Ordering::SeqCst), 2);
    assert_eq!(engine.phase(&a), Some(Phase::Activated));
    assert!(report.steps.iter().all(|s| s.operation.band() == Band::Enable));
}

#[test]
fn awake_requested_during_awake_drain_runs_next_tick() {
    let engine = Arc::new(LifecycleEngine::new());
    let log = CallLog::default();
    let late = Recorder::new("late", &log, &[]);
    let late_handle = handle(&late);

    let hooks = PhaseHooks::new().on(Operation::Compose, move |ctx| {
        ctx.engine().request_awake(&late_handle);
        Ok(())
    });
    let first = handle(&Recorder::with_hooks("first", hooks));

    engine.request_awake(&first);
    engine.tick();
    assert!(calls_for(&log, "late").is_empty());
    assert_eq!(engine.queue_len(Band::Awake), 1);

    engine.tick();
    assert_eq!(calls_for(&log, "late").len(), 4);
}

#[test]
fn dead_entity_skips_awake_but_still_destroys() {
    let engine = LifecycleEngine::new();
    let log = CallLog::default();
    let recorder = Recorder::new("a", &log, &[]);
    let a = handle(&recorder);

    engine.request_awake(&a);
    engine.tick();
    recorder.set_alive(false);
    engine.request_enable(&a);
    engine.tick();
    assert_eq!(engine.phase(&a), Some(Phase::Setup));

    engine.request_destroy(&a);
    assert!(!engine.is_tracked(&a));
    assert_eq!(
        &calls_for(&log, "a")[4..],
        &[Operation::Teardown, Operation::Unregister, Operation::Dispose]
    );
}

#[test]
fn disabled_entity_can_still_disable() {
    let engine = LifecycleEngine::new();
    let log = CallLog::default();
    let recorder = Recorder::new("a", &log, &[]);
    let a = handle(&recorder);

    engine.request_awake(&a);
    engine.request_enable(&a);
    engine.tick();
    recorder.set_enabled(false);
    engine.request_disable(&a);
    engine.tick();

    assert_eq!(engine.phase(&a), Some(Phase::FinalizedDisable));
}

#[test]
fn request_all_destroy_waits_for_tick() {
    let engine = LifecycleEngine::new();
    let log = CallLog::default();
    let a = handle(&Recorder::new("a", &log, &[]));
    let b = handle(&Recorder::new("b", &log, &[]));
    engine.request_awake(&a);
    engine.request_awake(&b);
    engine.tick();

    assert_eq!(engine.request_all(Band::Destroy), 2);
    assert_eq!(engine.tracked_count(), 2);

    let report = engine.tick();
    assert_eq!(report.removed, 2);
    assert_eq!(engine.tracked_count(), 0);
}

#[test]
fn unmanage_drops_queued_requests() {
    let engine = LifecycleEngine::new();
    let log = CallLog::default();
    let a = handle(&Recorder::new("a", &log, &[]));

    engine.request_awake(&a);
    assert!(engine.unmanage(&a));
    assert_eq!(engine.queue_len(Band::Awake), 0);
    assert!(engine.tick().is_idle());
    assert!(calls_for(&log, "a").is_empty());
}

#[test]
fn requests_from_other_threads() {
    let engine = Arc::new(LifecycleEngine::new());
    let log = CallLog::default();
    let handles: Vec<_> = (0..8)
        .map(|i| handle(&Recorder::new(&format!("e{i}"), &log, &[])))
        .collect();

    std::thread::scope(|scope| {
        for h in &handles {
            let engine = Arc::clone(&engine);
            scope.spawn(move || {
                engine.request_awake(h);
                engine.request_enable(h);
            });
        }
    });

    engine.tick();
    for h in &handles {
        assert_eq!(engine.phase(h), Some(Phase::FirstActivation));
    }
}
