//! Prometheus metrics for gateway observability.
//!
//! Exposes metrics compatible with Prometheus/OpenMetrics format:
//! - `bastion_circuit_transitions_total{dependency,to}` - Counter of breaker state changes
//! - `bastion_circuit_short_circuits_total{dependency}` - Counter of calls rejected while open
//! - `bastion_rate_limit_rejections_total` - Counter of rejected rate-limit checks
//! - `bastion_rate_limit_warnings_total` - Counter of "approaching limit" signals
//! - `bastion_rate_limit_store_errors_total` - Counter of checks allowed because the store was down
//! - `bastion_dispatch_total{service,mode}` - Counter of routed requests by dispatch mode
//! - `bastion_saga_finished_total{status}` - Counter of sagas reaching a terminal status
//! - `bastion_reply_timeouts_total` - Counter of awaited commands that timed out
//! - `bastion_pending_replies` - Gauge of commands currently awaiting a reply
//!
//! Recording without an installed recorder is a no-op, so library users and
//! tests never need to call [`init_metrics`].

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder. Idempotent; later calls return the same handle.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    if let Some(handle) = PROMETHEUS_HANDLE.get() {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;

    describe_counter!("bastion_circuit_transitions_total", "Circuit breaker state transitions");
    describe_counter!(
        "bastion_circuit_short_circuits_total",
        "Calls rejected without invoking the dependency"
    );
    describe_counter!("bastion_rate_limit_rejections_total", "Rejected rate-limit checks");
    describe_counter!(
        "bastion_rate_limit_warnings_total",
        "Checks that crossed the approaching-limit ratio"
    );
    describe_counter!(
        "bastion_rate_limit_store_errors_total",
        "Rate-limit checks allowed because the state store was unreachable"
    );
    describe_counter!("bastion_dispatch_total", "Routed requests by service and dispatch mode");
    describe_counter!("bastion_saga_finished_total", "Sagas reaching a terminal status");
    describe_counter!("bastion_reply_timeouts_total", "Awaited commands that timed out");
    describe_gauge!("bastion_pending_replies", "Commands currently awaiting a reply");

    let _ = PROMETHEUS_HANDLE.set(handle.clone());
    Ok(handle)
}

/// Render metrics in Prometheus text format. Empty until [`init_metrics`] ran.
pub fn render_metrics() -> String {
    PROMETHEUS_HANDLE.get().map(PrometheusHandle::render).unwrap_or_default()
}

pub(crate) fn record_circuit_transition(dependency: &str, to: &str) {
    counter!(
        "bastion_circuit_transitions_total",
        "dependency" => dependency.to_string(),
        "to" => to.to_string()
    )
    .increment(1);
}

pub(crate) fn record_short_circuit(dependency: &str) {
    counter!("bastion_circuit_short_circuits_total", "dependency" => dependency.to_string())
        .increment(1);
}

pub(crate) fn record_rate_limit_rejection() {
    counter!("bastion_rate_limit_rejections_total").increment(1);
}

pub(crate) fn record_rate_limit_warning() {
    counter!("bastion_rate_limit_warnings_total").increment(1);
}

pub(crate) fn record_rate_limit_store_error() {
    counter!("bastion_rate_limit_store_errors_total").increment(1);
}

pub(crate) fn record_dispatch(service: &str, mode: &'static str) {
    counter!("bastion_dispatch_total", "service" => service.to_string(), "mode" => mode)
        .increment(1);
}

pub(crate) fn record_saga_finished(status: &'static str) {
    counter!("bastion_saga_finished_total", "status" => status).increment(1);
}

pub(crate) fn record_reply_timeout() {
    counter!("bastion_reply_timeouts_total").increment(1);
}

pub(crate) fn set_pending_replies(count: usize) {
    gauge!("bastion_pending_replies").set(count as f64);
}
