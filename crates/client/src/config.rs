//! Client configuration

use std::time::Duration;

/// Tunables for the stream client. `ClientConfig::new(url)` gives the
/// defaults used in production; tests shrink the timers.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// WebSocket endpoint, e.g. `ws://127.0.0.1:4000/ws`.
    pub url: String,
    /// First reconnect delay; doubles per attempt.
    pub reconnect_base_delay: Duration,
    /// Reconnect attempts before giving up until the next explicit connect.
    pub max_reconnect_attempts: u32,
    /// Interval between keepalive `ping` control messages.
    pub keepalive_interval: Duration,
    /// Sliding-window cap on the coalesced display log per session.
    pub display_log_cap: usize,
    /// Cap on the per-session raw diagnostic tap.
    pub raw_tap_cap: usize,
}

impl ClientConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            reconnect_base_delay: Duration::from_millis(500),
            max_reconnect_attempts: 8,
            keepalive_interval: Duration::from_secs(30),
            display_log_cap: 256,
            raw_tap_cap: 64,
        }
    }
}
