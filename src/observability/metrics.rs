//! Metrics collection and exposition.
//!
//! # Metrics
//! - `admission_decisions_total` (counter): decisions by stage and status
//! - `user_store_lookups_total` (counter): cache-miss lookups by outcome
//! - `verified_users` (gauge): size of the verified user set
//! - `rate_limit_tracked_clients` (gauge): windows held after the last sweep
//! - `upstream_requests_total` (counter): forwarded requests by status
//! - `upstream_request_duration_seconds` (histogram): forwarding latency

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install Prometheus metrics exporter"),
    }
}

pub fn record_decision(stage: &'static str, status: u16) {
    counter!("admission_decisions_total", "stage" => stage, "status" => status.to_string())
        .increment(1);
}

pub fn record_store_lookup(outcome: &'static str) {
    counter!("user_store_lookups_total", "outcome" => outcome).increment(1);
}

pub fn record_verified_users(count: usize) {
    gauge!("verified_users").set(count as f64);
}

pub fn record_tracked_clients(count: usize) {
    gauge!("rate_limit_tracked_clients").set(count as f64);
}

pub fn record_upstream(status: u16, start: Instant) {
    counter!("upstream_requests_total", "status" => status.to_string()).increment(1);
    histogram!("upstream_request_duration_seconds").record(start.elapsed().as_secs_f64());
}
