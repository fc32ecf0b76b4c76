//! Structured event stream for `lifecycles`.
//!
//! Discrete, typed events emitted while a scenario runs. Events are
//! serialized as newline-delimited JSON (JSONL) and include a monotonically
//! increasing sequence number for ordering guarantees.

use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::lifecycle::{Operation, Phase};

// ---------------------------------------------------------------------------
// Event variants
// ---------------------------------------------------------------------------

/// Why a scenario run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Every step ran.
    Completed,
    /// Cancelled by a shutdown signal.
    Cancelled,
}

/// A discrete event emitted during a scenario run.
///
/// Each variant is tagged with `"type"` when serialized to JSON so consumers
/// can dispatch on the event kind.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum Event {
    /// A scenario run started.
    RunStarted {
        /// When the run started.
        timestamp: DateTime<Utc>,
        /// Unique id of this run.
        run_id: Uuid,
        /// Scenario name.
        scenario: String,
        /// Number of scripted entities.
        entities: usize,
    },

    /// A phase step ran for an entity.
    HookInvoked {
        /// When the step ran.
        timestamp: DateTime<Utc>,
        /// Tick number (0 for the immediate destroy path).
        tick: u64,
        /// Entity label.
        entity: String,
        /// Operation run.
        operation: Operation,
        /// Phase targeted by the operation.
        phase: Phase,
        /// `completed`, `no_hook`, `failed` or `panicked`.
        outcome: &'static str,
    },

    /// An entity recorded its first fault.
    EntityFaulted {
        /// When the fault was recorded.
        timestamp: DateTime<Utc>,
        /// Entity label.
        entity: String,
        /// Failing operation.
        operation: Operation,
        /// Phase the operation would have reached.
        phase: Phase,
        /// Rendered error.
        error: String,
    },

    /// A barrier pass finished.
    TickCompleted {
        /// When the pass finished.
        timestamp: DateTime<Utc>,
        /// Tick number.
        tick: u64,
        /// Steps executed.
        invoked: usize,
        /// Steps that faulted.
        faulted: usize,
        /// Entities removed after the destroy band.
        removed: usize,
        /// Pass duration in milliseconds.
        duration_ms: u64,
    },

    /// An `expect` step was evaluated.
    ExpectationChecked {
        /// When the check ran.
        timestamp: DateTime<Utc>,
        /// Index of the step in the script.
        step: usize,
        /// Entity checked.
        entity: String,
        /// Whether every assertion held.
        passed: bool,
        /// Mismatches, empty when `passed`.
        mismatches: Vec<String>,
    },

    /// The scenario run finished.
    RunFinished {
        /// When the run finished.
        timestamp: DateTime<Utc>,
        /// Unique id of this run.
        run_id: Uuid,
        /// Ticks executed.
        ticks: u64,
        /// Expectations that held.
        passed: usize,
        /// Expectations that failed.
        failed: usize,
        /// Why the run stopped.
        reason: StopReason,
    },
}

// ---------------------------------------------------------------------------
// Envelope (adds sequence number via serde flatten)
// ---------------------------------------------------------------------------

/// Wraps an [`Event`] with a monotonically increasing sequence number.
#[derive(Debug, Serialize)]
struct EventEnvelope {
    /// Zero-based, monotonically increasing sequence counter.
    sequence: u64,
    /// The wrapped event (flattened into the same JSON object).
    #[serde(flatten)]
    event: Event,
}

// ---------------------------------------------------------------------------
// Emitter
// ---------------------------------------------------------------------------

/// Thread-safe, buffered JSONL event writer.
///
/// Each call to [`emit`](Self::emit) atomically increments the sequence
/// counter, serializes the event as a single JSON line, and flushes the
/// underlying writer. Serialization or I/O failures are dropped.
pub struct EventEmitter {
    writer: Mutex<BufWriter<Box<dyn Write + Send>>>,
    sequence: AtomicU64,
}

// Box<dyn Write> is not Debug
impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("sequence", &self.sequence.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl EventEmitter {
    /// Creates an emitter that writes to the given writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(BufWriter::new(writer)),
            sequence: AtomicU64::new(0),
        }
    }

    /// Creates an emitter that writes to stderr.
    #[must_use]
    pub fn stderr() -> Self {
        Self::new(Box::new(std::io::stderr()))
    }

    /// Creates an emitter that discards all events.
    #[must_use]
    pub fn noop() -> Self {
        Self::new(Box::new(std::io::sink()))
    }

    /// Creates an emitter that writes to a file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be created or opened.
    pub fn from_file(path: &Path) -> std::io::Result<Self> {
        let file = std::fs::File::create(path)?;
        Ok(Self::new(Box::new(file)))
    }

    /// Emits an event as a single JSONL line.
    pub fn emit(&self, event: Event) {
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
        let envelope = EventEnvelope {
            sequence: seq,
            event,
        };

        if let Ok(mut w) = self.writer.lock() {
            if let Ok(line) = serde_json::to_string(&envelope) {
                let _ = writeln!(w, "{line}");
                let _ = w.flush();
            }
        }
    }

    /// Returns the number of events emitted so far.
    #[must_use]
    pub fn event_count(&self) -> u64 {
        self.sequence.load(Ordering::Relaxed)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
