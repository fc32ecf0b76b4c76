//! Shared integration-test helpers: a recording entity for driving the
//! engine directly, and helpers for spawning the `lifecycles` binary.

#![allow(dead_code)]

use std::path::PathBuf;
use std::process::Output;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use lifecycles::error::HookError;
use lifecycles::lifecycle::{EntityHandle, Managed, Operation, PhaseHooks};

/// Shared log of `(entity, operation)` pairs in invocation order.
pub type CallLog = Arc<Mutex<Vec<(String, Operation)>>>;

/// Entity whose hooks append to a shared [`CallLog`].
pub struct Recorder {
    name: String,
    hooks: PhaseHooks,
    alive: AtomicBool,
    enabled: AtomicBool,
}

impl Recorder {
    /// Creates a recorder whose hooks for `failing` return an error.
    pub fn new(name: &str, log: &CallLog, failing: &[Operation]) -> Arc<Self> {
        let mut hooks = PhaseHooks::new();
        for op in Operation::ALL {
            let log = Arc::clone(log);
            let label = name.to_owned();
            let fails = failing.contains(&op);
            hooks.set(op, move |ctx| {
                log.lock().unwrap().push((label.clone(), ctx.operation()));
                if fails {
                    Err(HookError::failed(format!("{label} refused {op}")))
                } else {
                    Ok(())
                }
            });
        }
        Self::with_hooks(name, hooks)
    }

    /// Creates a recorder with a custom hook table.
    pub fn with_hooks(name: &str, hooks: PhaseHooks) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_owned(),
            hooks,
            alive: AtomicBool::new(true),
            enabled: AtomicBool::new(true),
        })
    }

    pub fn set_alive(&self, alive: bool) {
        self.alive.store(alive, Ordering::SeqCst);
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }
}

impl Managed for Recorder {
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

/// Upcasts a recorder to the engine's handle type.
pub fn handle(recorder: &Arc<Recorder>) -> EntityHandle {
    Arc::clone(recorder) as EntityHandle
}

/// Operations logged for `name`, in order.
pub fn calls_for(log: &CallLog, name: &str) -> Vec<Operation> {
    log.lock()
        .unwrap()
        .iter()
        .filter(|(n, _)| n == name)
        .map(|(_, op)| *op)
        .collect()
}

/// Absolute path of a file under `tests/fixtures`.
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

/// Runs the `lifecycles` binary to completion with `--quiet`.
pub fn spawn_command(args: &[&str]) -> Output {
    std::process::Command::new(env!("CARGO_BIN_EXE_lifecycles"))
        .arg("--quiet")
        .args(args)
        .output()
        .expect("failed to spawn lifecycles")
}
