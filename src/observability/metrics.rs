//! Metrics collection for `lifecycles`.
//!
//! Prometheus-compatible metrics recorded by the engine and the scripted
//! host. Every recording function is a no-op until a recorder is installed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::error::LifecycleError;
use crate::lifecycle::{Band, Operation};

/// Guard to prevent double-initialization of the metrics recorder.
static METRICS_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Maximum length for scenario name labels.
const MAX_SCENARIO_LABEL_LEN: usize = 64;

/// Initializes the global metrics recorder.
///
/// When `port` is `Some`, a Prometheus HTTP listener is started on
/// `127.0.0.1:<port>`. When `None`, the recorder is installed without
/// an HTTP endpoint.
///
/// # Errors
///
/// Returns `LifecycleError::Io` if the recorder or HTTP listener
/// cannot be installed (e.g. port already in use).
pub fn init_metrics(port: Option<u16>) -> Result<(), LifecycleError> {
    if METRICS_INITIALIZED.swap(true, Ordering::SeqCst) {
        tracing::debug!("metrics already initialized, skipping");
        return Ok(());
    }
    port.map_or_else(
        || PrometheusBuilder::new().install_recorder().map(|_| ()),
        |p| {
            PrometheusBuilder::new()
                .with_http_listener(([127, 0, 0, 1], p))
                .install()
        },
    )
    .map_err(|e| LifecycleError::Io(std::io::Error::other(e.to_string())))?;

    describe_metrics();
    Ok(())
}

/// Registers metric descriptions with the global recorder.
fn describe_metrics() {
    describe_counter!(
        "lifecycles_hook_invocations_total",
        "Phase steps executed, by operation and outcome"
    );
    describe_counter!(
        "lifecycles_faults_total",
        "Hook failures recorded, by band"
    );
    describe_counter!("lifecycles_ticks_total", "Barrier passes completed");
    describe_histogram!(
        "lifecycles_tick_duration_ms",
        "Barrier pass duration in milliseconds"
    );
    describe_gauge!(
        "lifecycles_entities_tracked",
        "Entities currently tracked by the engine"
    );
    describe_counter!(
        "lifecycles_entities_removed_total",
        "Entities removed after the destroy band"
    );
    describe_counter!(
        "lifecycles_scenarios_total",
        "Scenario runs, by scenario and result"
    );
}

/// Records one executed phase step.
pub fn record_hook(operation: Operation, outcome: &'static str) {
    counter!(
        "lifecycles_hook_invocations_total",
        "operation" => operation.name(),
        "outcome" => outcome,
    )
    .increment(1);
}

/// Records a hook failure.
pub fn record_fault(band: Band) {
    counter!("lifecycles_faults_total", "band" => band.name()).increment(1);
}

/// Records a completed barrier pass.
pub fn record_tick(duration: Duration) {
    counter!("lifecycles_ticks_total").increment(1);
    histogram!("lifecycles_tick_duration_ms").record(duration.as_secs_f64() * 1000.0);
}

/// Sets the tracked-entity gauge.
#[allow(clippy::cast_precision_loss)]
pub fn set_entities_tracked(count: usize) {
    gauge!("lifecycles_entities_tracked").set(count as f64);
}

/// Records entities removed from tracking.
pub fn record_removed(count: usize) {
    counter!("lifecycles_entities_removed_total").increment(count as u64);
}

/// Records the result of a scenario run.
///
/// Scenario names come from user files and are sanitized before use as a
/// label.
pub fn record_scenario(name: &str, passed: bool) {
    let result = if passed { "passed" } else { "failed" };
    counter!(
        "lifecycles_scenarios_total",
        "scenario" => sanitize_label(name),
        "result" => result,
    )
    .increment(1);
}

/// Truncates to [`MAX_SCENARIO_LABEL_LEN`] characters and replaces any
/// characters invalid in Prometheus labels with underscores.
fn sanitize_label(name: &str) -> String {
    name.chars()
        .take(MAX_SCENARIO_LABEL_LEN)
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
