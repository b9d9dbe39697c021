//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define receiver metrics (connections, frames, errors, events)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `receiver_connections_total` (counter): accepted connections by transport
//! - `receiver_active_connections` (gauge): open connections by transport
//! - `receiver_frames_total` (counter): dispatched frames by command
//! - `receiver_command_errors_total` (counter): error acks by class name
//! - `receiver_unsupported_commands_total` (counter): frames with unknown commands
//! - `receiver_framing_errors_total` (counter): connections lost to bad framing
//! - `receiver_events_total` (counter): events handed downstream

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_connection_opened(transport: &'static str) {
    counter!("receiver_connections_total", "transport" => transport).increment(1);
    gauge!("receiver_active_connections", "transport" => transport).increment(1.0);
}

pub fn record_connection_closed(transport: &'static str) {
    gauge!("receiver_active_connections", "transport" => transport).decrement(1.0);
}

pub fn record_frame(command: &'static str) {
    counter!("receiver_frames_total", "command" => command).increment(1);
}

pub fn record_command_error(class_name: &'static str) {
    counter!("receiver_command_errors_total", "class_name" => class_name).increment(1);
}

pub fn record_unsupported_command() {
    counter!("receiver_unsupported_commands_total").increment(1);
}

pub fn record_framing_error(kind: &'static str) {
    counter!("receiver_framing_errors_total", "kind" => kind).increment(1);
}

pub fn record_events(count: usize) {
    counter!("receiver_events_total").increment(count as u64);
}
