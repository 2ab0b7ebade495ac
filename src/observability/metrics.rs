//! Metrics collection.
//!
//! # Metrics
//! - `arsenal_requests_total` (counter): requests by kind and status
//! - `arsenal_request_duration_seconds` (histogram): time to build a response
//! - `arsenal_active_connections` (gauge): current connection count
//! - `arsenal_ws_clients` (gauge): registered chat peers
//! - `arsenal_ws_messages_total` (counter): frames fanned out
//!
//! # Design Decisions
//! - Recorded through the `metrics` facade; without an installed recorder
//!   every call is a no-op
//! - Labels stay low-cardinality: request kind, never the raw path

use std::time::Instant;

/// Record one answered HTTP request.
pub fn record_request(kind: &'static str, status: u16, start: Instant) {
    metrics::counter!(
        "arsenal_requests_total",
        "kind" => kind,
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("arsenal_request_duration_seconds", "kind" => kind)
        .record(start.elapsed().as_secs_f64());
}

pub fn connection_opened() {
    metrics::gauge!("arsenal_active_connections").increment(1.0);
}

pub fn connection_closed() {
    metrics::gauge!("arsenal_active_connections").decrement(1.0);
}

/// Set the number of registered chat peers.
pub fn record_ws_clients(count: usize) {
    metrics::gauge!("arsenal_ws_clients").set(count as f64);
}

/// Record one broadcast and how many peers received it.
pub fn record_ws_broadcast(delivered: usize) {
    metrics::counter!("arsenal_ws_messages_total").increment(delivered as u64);
}
