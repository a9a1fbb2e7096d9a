//! Metrics collection for `escaperoom`.
//!
//! Prometheus-compatible metrics with label cardinality protection and
//! typed convenience functions for recording measurements.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::error::EscapeRoomError;

/// Guard to prevent double-initialization of the metrics recorder.
static METRICS_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Store operations used as metric labels.
const KNOWN_OPERATIONS: [&str; 4] = ["create", "list", "rename", "delete"];

/// Maximum length for scenario id labels.
const MAX_SCENARIO_LABEL_LEN: usize = 64;

/// Sanitizes a store operation name for use as a metrics label.
///
/// Returns `"__unknown__"` for anything outside [`KNOWN_OPERATIONS`].
#[must_use]
pub fn sanitize_operation_label(operation: &str) -> &str {
    if KNOWN_OPERATIONS.contains(&operation) {
        operation
    } else {
        "__unknown__"
    }
}

/// Initializes the global metrics recorder.
///
/// When `port` is `Some`, a Prometheus HTTP listener is started on
/// `127.0.0.1:<port>`. When `None`, the recorder is installed without an
/// HTTP endpoint.
///
/// # Errors
///
/// Returns `EscapeRoomError::Io` if the recorder or HTTP listener cannot be
/// installed (e.g. port already in use).
pub fn init_metrics(port: Option<u16>) -> Result<(), EscapeRoomError> {
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
    .map_err(|e| EscapeRoomError::Io(std::io::Error::other(e.to_string())))?;

    describe_metrics();
    Ok(())
}

/// Registers metric descriptions with the global recorder.
fn describe_metrics() {
    describe_counter!(
        "escaperoom_answers_total",
        "Answers judged, by validator kind and result"
    );
    describe_counter!(
        "escaperoom_icon_selections_total",
        "Icon picks, by result"
    );
    describe_counter!(
        "escaperoom_stage_transitions_total",
        "Stage advances, by whether the run completed"
    );
    describe_counter!("escaperoom_timer_expired_total", "Countdowns that ran out");
    describe_counter!("escaperoom_runs_started_total", "Runs started, by scenario");
    describe_gauge!("escaperoom_current_stage", "Index of the stage being played");
    describe_counter!(
        "escaperoom_store_requests_total",
        "Run store requests, by operation and status"
    );
    describe_histogram!(
        "escaperoom_store_request_duration_ms",
        "Run store request duration in milliseconds"
    );
    describe_gauge!("escaperoom_stored_runs", "Runs held by the in-memory store");
}

/// Records a judged answer.
///
/// `kind` is a validator kind label, which is a closed set.
pub fn record_answer(kind: &'static str, ok: bool) {
    let result = if ok { "pass" } else { "fail" };
    counter!("escaperoom_answers_total", "kind" => kind, "result" => result).increment(1);
}

/// Records an icon pick.
pub fn record_icon_selection(ok: bool) {
    let result = if ok { "pass" } else { "fail" };
    counter!("escaperoom_icon_selections_total", "result" => result).increment(1);
}

/// Records a stage advance.
pub fn record_stage_transition(completed: bool) {
    let completed = if completed { "true" } else { "false" };
    counter!("escaperoom_stage_transitions_total", "completed" => completed).increment(1);
}

/// Records a countdown running out.
pub fn record_timer_expired() {
    counter!("escaperoom_timer_expired_total").increment(1);
}

/// Records a run start.
///
/// Scenario ids come from configuration, so they are truncated and
/// restricted to label-safe characters.
pub fn record_run_started(scenario_id: &str) {
    counter!(
        "escaperoom_runs_started_total",
        "scenario" => sanitize_scenario_label(scenario_id)
    )
    .increment(1);
}

/// Sets the current stage gauge.
#[allow(clippy::cast_precision_loss)]
pub fn set_current_stage(index: usize) {
    gauge!("escaperoom_current_stage").set(index as f64);
}

/// Records one run store request.
pub fn record_store_request(operation: &str, success: bool, duration: Duration) {
    let label = sanitize_operation_label(operation);
    let status = if success { "success" } else { "error" };
    counter!(
        "escaperoom_store_requests_total",
        "operation" => label.to_owned(),
        "status" => status
    )
    .increment(1);
    histogram!("escaperoom_store_request_duration_ms", "operation" => label.to_owned())
        .record(duration.as_secs_f64() * 1000.0);
}

/// Sets the number of runs held by the in-memory store.
#[allow(clippy::cast_precision_loss)]
pub fn set_stored_runs(count: usize) {
    gauge!("escaperoom_stored_runs").set(count as f64);
}

fn sanitize_scenario_label(id: &str) -> String {
    id.chars()
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_known_operation_returns_original() {
        for op in &KNOWN_OPERATIONS {
            assert_eq!(sanitize_operation_label(op), *op);
        }
    }

    #[test]
    fn sanitize_unknown_operation_returns_unknown() {
        assert_eq!(sanitize_operation_label("drop-table"), "__unknown__");
        assert_eq!(sanitize_operation_label(""), "__unknown__");
    }

    #[test]
    fn scenario_label_is_truncated_and_cleaned() {
        assert_eq!(sanitize_scenario_label("debug-crypt"), "debug-crypt");
        assert_eq!(sanitize_scenario_label("a b/c"), "a_b_c");
        assert_eq!(sanitize_scenario_label(&"x".repeat(500)).len(), MAX_SCENARIO_LABEL_LEN);
    }

    #[test]
    fn record_functions_do_not_panic_without_recorder() {
        record_answer("normalized", true);
        record_icon_selection(false);
        record_stage_transition(true);
        record_timer_expired();
        record_run_started("format-lock");
        set_current_stage(2);
        record_store_request("create", true, Duration::from_millis(12));
        record_store_request("bogus", false, Duration::from_millis(1));
        set_stored_runs(4);
    }
}
