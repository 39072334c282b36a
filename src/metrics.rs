//! Metric helpers for `altcom`.
//!
//! This module defines metric names and simple helper functions wrapping the
//! [`metrics`](https://docs.rs/metrics) crate. Without the `metrics` feature
//! the helpers compile to no-ops.

#[cfg(feature = "metrics")]
use metrics::{counter, gauge};

/// Name of the gauge tracking pending calls.
pub const CALLS_PENDING: &str = "altcom_calls_pending";
/// Name of the counter tracking completed calls by outcome.
pub const CALLS_TOTAL: &str = "altcom_calls_total";
/// Name of the counter tracking frames read from the modem.
pub const FRAMES_INBOUND: &str = "altcom_frames_inbound_total";
/// Name of the counter tracking frames dropped by the inbound loop.
pub const FRAMES_DROPPED: &str = "altcom_frames_dropped_total";
/// Name of the counter tracking unsolicited events by delivery outcome.
pub const EVENTS_TOTAL: &str = "altcom_events_total";

/// Increment the pending calls gauge.
pub fn inc_pending() {
    #[cfg(feature = "metrics")]
    gauge!(CALLS_PENDING).increment(1.0);
}

/// Decrement the pending calls gauge.
pub fn dec_pending() {
    #[cfg(feature = "metrics")]
    gauge!(CALLS_PENDING).decrement(1.0);
}

/// Record a completed call.
pub fn inc_calls(outcome: &'static str) {
    #[cfg(feature = "metrics")]
    counter!(CALLS_TOTAL, "outcome" => outcome).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = outcome;
}

/// Record a complete frame read from the transport.
pub fn inc_inbound_frames() {
    #[cfg(feature = "metrics")]
    counter!(FRAMES_INBOUND).increment(1);
}

/// Record a frame dropped by the inbound loop.
pub fn inc_dropped(reason: &'static str) {
    #[cfg(feature = "metrics")]
    counter!(FRAMES_DROPPED, "reason" => reason).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = reason;
}

/// Record the routing outcome of an event.
pub fn inc_events(outcome: &'static str) {
    #[cfg(feature = "metrics")]
    counter!(EVENTS_TOTAL, "outcome" => outcome).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = outcome;
}
