//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_events_total` (counter): telemetry events by name/category
//! - `gateway_cache_entries` (gauge): cached client handles
//! - `gateway_health_score` (gauge): connection health score
//! - `gateway_circuit_state` (gauge): 0=closed, 1=half-open, 2=open
//! - `gateway_operation_attempts` (histogram): attempts per retried operation

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::resilience::circuit_breaker::CircuitState;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_cache_size(entries: usize) {
    metrics::gauge!("gateway_cache_entries").set(entries as f64);
}

pub fn record_health_score(score: u8) {
    metrics::gauge!("gateway_health_score").set(f64::from(score));
}

pub fn record_circuit_state(state: CircuitState) {
    let value = match state {
        CircuitState::Closed => 0.0,
        CircuitState::HalfOpen => 1.0,
        CircuitState::Open => 2.0,
    };
    metrics::gauge!("gateway_circuit_state").set(value);
}

pub fn record_attempts(operation: &str, attempts: u32) {
    metrics::histogram!("gateway_operation_attempts", "operation" => operation.to_string())
        .record(f64::from(attempts));
}
