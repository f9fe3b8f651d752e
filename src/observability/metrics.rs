//! Metrics collection and exposition.
//!
//! # Metrics
//! - `lb_requests_total` (counter): inbound requests by method, status
//! - `lb_request_duration_seconds` (histogram): end-to-end latency
//! - `lb_attempts_total` (counter): forwarding attempts by outcome
//! - `lb_chaos_injected_total` (counter): synthetic chaos failures
//! - `lb_backend_health` (gauge): 1=healthy, 0=unhealthy, per backend
//! - `lb_config_reloads_total` (counter): reloads by result
//!
//! Recording goes through the `metrics` facade and is a no-op until a
//! recorder is installed with [`init_metrics`].

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{
    counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit,
};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

pub const REQUESTS_TOTAL: &str = "lb_requests_total";
pub const REQUEST_DURATION_SECONDS: &str = "lb_request_duration_seconds";
pub const ATTEMPTS_TOTAL: &str = "lb_attempts_total";
pub const CHAOS_INJECTED_TOTAL: &str = "lb_chaos_injected_total";
pub const BACKEND_HEALTH: &str = "lb_backend_health";
pub const CONFIG_RELOADS_TOTAL: &str = "lb_config_reloads_total";

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;

    describe_counter!(REQUESTS_TOTAL, Unit::Count, "Inbound requests handled by the dispatcher.");
    describe_histogram!(REQUEST_DURATION_SECONDS, Unit::Seconds, "End-to-end request latency.");
    describe_counter!(ATTEMPTS_TOTAL, Unit::Count, "Forwarding attempts by outcome.");
    describe_counter!(
        CHAOS_INJECTED_TOTAL,
        Unit::Count,
        "Requests answered with a synthetic chaos error."
    );
    describe_gauge!(BACKEND_HEALTH, "Backend health from the last probe (1 healthy, 0 unhealthy).");
    describe_counter!(CONFIG_RELOADS_TOTAL, Unit::Count, "Configuration reloads by result.");

    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    counter!(
        REQUESTS_TOTAL,
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!(REQUEST_DURATION_SECONDS).record(start.elapsed().as_secs_f64());
}

pub fn record_attempt(outcome: &'static str) {
    counter!(ATTEMPTS_TOTAL, "outcome" => outcome).increment(1);
}

pub fn record_chaos() {
    counter!(CHAOS_INJECTED_TOTAL).increment(1);
}

pub fn record_backend_health(backend: &str, healthy: bool) {
    gauge!(BACKEND_HEALTH, "backend" => backend.to_string()).set(if healthy { 1.0 } else { 0.0 });
}

pub fn record_config_reload(success: bool) {
    let result = if success { "success" } else { "failure" };
    counter!(CONFIG_RELOADS_TOTAL, "result" => result).increment(1);
}
