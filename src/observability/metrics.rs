//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): requests by method, status, cache status
//! - `proxy_request_duration_seconds` (histogram): latency distribution
//! - `proxy_cache_events_total` (counter): hit / miss / insertion / eviction / expiration
//! - `proxy_cache_resident_bytes` (gauge): bytes held by the response cache
//! - `proxy_blocked_total` (counter): requests refused by the blocklist
//! - `proxy_websocket_relays_active` (gauge): open relay pairs
//! - `proxy_websocket_frames_total` (counter): frames relayed by direction
//!
//! Without an installed recorder every call is a no-op.

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, cache: &'static str, start: Instant) {
    metrics::counter!(
        "proxy_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "cache" => cache
    )
    .increment(1);
    metrics::histogram!("proxy_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_cache_event(event: &'static str) {
    metrics::counter!("proxy_cache_events_total", "event" => event).increment(1);
}

pub fn record_cache_resident_bytes(bytes: usize) {
    metrics::gauge!("proxy_cache_resident_bytes").set(bytes as f64);
}

pub fn record_blocked() {
    metrics::counter!("proxy_blocked_total").increment(1);
}

pub fn record_relay_opened() {
    metrics::gauge!("proxy_websocket_relays_active").increment(1.0);
}

pub fn record_relay_closed() {
    metrics::gauge!("proxy_websocket_relays_active").decrement(1.0);
}

pub fn record_relay_frame(direction: &'static str) {
    metrics::counter!("proxy_websocket_frames_total", "direction" => direction).increment(1);
}
