//! Fault reporting
//!
//! Hook failures are reported to a [`FaultSink`] with the phase, operation,
//! entity and error. The engine itself only keeps the summary.

use std::sync::Arc;

use tracing::error;

use crate::error::HookError;

use super::phase::{Operation, Phase};

/// A hook failure as seen by the fault sink.
#[derive(Debug)]
pub struct FaultReport<'a> {
    /// Phase the operation would have reached.
    pub phase: Phase,
    /// The failing operation.
    pub operation: Operation,
    /// Entity label.
    pub entity: &'a str,
    /// The original error.
    pub error: &'a HookError,
    /// `false` if the entity already carried an earlier fault.
    pub first: bool,
}

impl FaultReport<'_> {
    /// One-line summary stored on the entity record.
    #[must_use]
    pub fn summary(&self) -> String {
        summarize(self.phase, self.operation, self.entity)
    }
}

/// Formats the summary stored on a faulted entity.
#[must_use]
pub fn summarize(phase: Phase, operation: Operation, entity: &str) -> String {
    format!("{operation} failed entering {phase} on {entity}")
}

/// Receives hook failures.
///
/// Called outside the engine lock, so sinks may query the engine.
pub trait FaultSink: Send + Sync {
    /// Handles one failure.
    fn report(&self, report: &FaultReport<'_>);
}

/// Default sink: logs every failure through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingFaultSink;

impl FaultSink for TracingFaultSink {
    fn report(&self, report: &FaultReport<'_>) {
        error!(
            phase = %report.phase,
            operation = %report.operation,
            entity = report.entity,
            first = report.first,
            error = %report.error,
            "lifecycle hook failed"
        );
    }
}

/// Sink that forwards to several sinks in order.
#[derive(Default, Clone)]
pub struct FanOutSink {
    sinks: Vec<Arc<dyn FaultSink>>,
}

impl FanOutSink {
    /// Creates an empty fan-out.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a downstream sink.
    #[must_use]
    pub fn with(mut self, sink: Arc<dyn FaultSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl FaultSink for FanOutSink {
    fn report(&self, report: &FaultReport<'_>) {
        for sink in &self.sinks {
            sink.report(report);
        }
    }
}

impl std::fmt::Debug for FanOutSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FanOutSink")
            .field("sinks", &self.sinks.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct Collect(Mutex<Vec<String>>);

    impl FaultSink for Collect {
        fn report(&self, report: &FaultReport<'_>) {
            self.0.lock().unwrap().push(report.summary());
        }
    }

    #[test]
    fn test_summary_names_phase_operation_and_entity() {
        let summary = summarize(Phase::Activated, Operation::Activate, "player");
        assert_eq!(summary, "Activate failed entering Activated on player");
    }

    #[test]
    fn test_fan_out_reaches_every_sink() {
        let a = Arc::new(Collect::default());
        let b = Arc::new(Collect::default());
        let sink = FanOutSink::new()
            .with(Arc::clone(&a) as Arc<dyn FaultSink>)
            .with(Arc::clone(&b) as Arc<dyn FaultSink>);
        let err = HookError::failed("nope");
        sink.report(&FaultReport {
            phase: Phase::Setup,
            operation: Operation::Setup,
            entity: "lamp",
            error: &err,
            first: true,
        });
        assert_eq!(a.0.lock().unwrap().len(), 1);
        assert_eq!(b.0.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_tracing_sink_does_not_panic() {
        let err = HookError::Panicked("oops".to_owned());
        TracingFaultSink.report(&FaultReport {
            phase: Phase::Teardown,
            operation: Operation::Teardown,
            entity: "lamp",
            error: &err,
            first: false,
        });
    }
}
