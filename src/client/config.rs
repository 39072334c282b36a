//! Runtime settings for an [`AltcomClient`](super::AltcomClient).

use tokio::time::Duration;

use crate::{
    codec::{DEFAULT_MAX_PAYLOAD_LEN, clamp_payload_length},
    events::DEFAULT_EVENT_CAPACITY,
};

/// Default time a call waits for its response.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(5);
/// Default time a partially received frame may stay incomplete.
pub const DEFAULT_FRAME_TIMEOUT: Duration = Duration::from_secs(1);
/// Default period of the expired-call sweeper.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_millis(100);

const MIN_TIMEOUT: Duration = Duration::from_millis(1);

/// Timeouts and limits used by the client.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use altcom::client::ClientConfig;
///
/// let config = ClientConfig::default().call_timeout(Duration::from_secs(2));
/// assert_eq!(config.call_timeout_value(), Duration::from_secs(2));
/// assert_eq!(config.event_capacity_value(), 64);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClientConfig {
    call_timeout: Duration,
    frame_timeout: Duration,
    sweep_interval: Duration,
    event_capacity: usize,
    max_payload_len: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            call_timeout: DEFAULT_CALL_TIMEOUT,
            frame_timeout: DEFAULT_FRAME_TIMEOUT,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            max_payload_len: DEFAULT_MAX_PAYLOAD_LEN,
        }
    }
}

impl ClientConfig {
    /// Set the default call timeout. Values below one millisecond are raised.
    #[must_use]
    pub fn call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout.max(MIN_TIMEOUT);
        self
    }

    /// Set the per-frame read timeout. Values below one millisecond are raised.
    #[must_use]
    pub fn frame_timeout(mut self, timeout: Duration) -> Self {
        self.frame_timeout = timeout.max(MIN_TIMEOUT);
        self
    }

    /// Set the sweeper period. Values below one millisecond are raised.
    #[must_use]
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval.max(MIN_TIMEOUT);
        self
    }

    /// Set the event queue capacity (at least one).
    #[must_use]
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }

    /// Set the largest payload accepted in either direction.
    ///
    /// The value is clamped to what the 16-bit length field can express.
    #[must_use]
    pub fn max_payload_len(mut self, len: usize) -> Self {
        self.max_payload_len = clamp_payload_length(len);
        self
    }

    /// Configured default call timeout.
    #[must_use]
    pub fn call_timeout_value(&self) -> Duration { self.call_timeout }

    /// Configured per-frame read timeout.
    #[must_use]
    pub fn frame_timeout_value(&self) -> Duration { self.frame_timeout }

    /// Configured sweeper period.
    #[must_use]
    pub fn sweep_interval_value(&self) -> Duration { self.sweep_interval }

    /// Configured event queue capacity.
    #[must_use]
    pub fn event_capacity_value(&self) -> usize { self.event_capacity }

    /// Configured payload limit.
    #[must_use]
    pub fn max_payload_len_value(&self) -> usize { self.max_payload_len }
}
