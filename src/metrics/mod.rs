//! Metrics module
//!
//! Prometheus metrics for the upload relay.

pub mod server;

use lazy_static::lazy_static;
use prometheus::{
    register_counter, register_counter_vec, register_histogram, Counter, CounterVec, Histogram,
};

lazy_static! {
    // Relay metrics
    pub static ref RELAY_REQUESTS_TOTAL: CounterVec = register_counter_vec!(
        "beyblade_arena_relay_requests_total",
        "Relay requests by route and outcome",
        &["route", "outcome"]
    ).expect("relay request counter registers once");

    pub static ref FORWARDED_BYTES_TOTAL: Counter = register_counter!(
        "beyblade_arena_forwarded_bytes_total",
        "Total bytes forwarded to the detection upstream"
    ).expect("forwarded bytes counter registers once");

    pub static ref UPSTREAM_DURATION: Histogram = register_histogram!(
        "beyblade_arena_upstream_duration_seconds",
        "Detection upstream round trip in seconds",
        vec![0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0]
    ).expect("upstream duration histogram registers once");

    // Error metrics
    pub static ref ERRORS_TOTAL: CounterVec = register_counter_vec!(
        "beyblade_arena_errors_total",
        "Total errors",
        &["kind"]
    ).expect("error counter registers once");
}

/// Record how a relay request ended ("success" or a relay error kind)
pub fn record_relay_outcome(route: &str, outcome: &str) {
    RELAY_REQUESTS_TOTAL
        .with_label_values(&[route, outcome])
        .inc();
}

/// Record bytes handed to the upstream
pub fn record_forwarded_bytes(bytes: u64) {
    FORWARDED_BYTES_TOTAL.inc_by(bytes as f64);
}

/// Record upstream round trip duration
pub fn record_upstream_duration(duration_secs: f64) {
    UPSTREAM_DURATION.observe(duration_secs);
}

/// Record an error
pub fn record_error(kind: &str) {
    ERRORS_TOTAL.with_label_values(&[kind]).inc();
}
