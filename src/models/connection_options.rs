use serde::{Deserialize, Serialize};

/// Connection-level options for the live transport.
///
/// Controls automatic reconnection behavior. Chosen conservatively: base
/// delay 1s, exponential factor 2, capped at 30s, with deterministic jitter
/// applied by the connection manager.
///
/// # Example
///
/// ```rust
/// use hearth_link::ConnectionOptions;
///
/// let options = ConnectionOptions::default()
///     .with_auto_reconnect(true)
///     .with_reconnect_delay_ms(2000)
///     .with_max_consecutive_failures(Some(5));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionOptions {
    /// Enable automatic reconnection on connection loss.
    /// Default: true
    #[serde(default = "default_auto_reconnect")]
    pub auto_reconnect: bool,

    /// Initial delay in milliseconds between reconnection attempts.
    /// Default: 1000ms. Doubles on each consecutive failure up to
    /// `max_reconnect_delay_ms`.
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,

    /// Maximum delay between reconnection attempts (backoff cap).
    /// Default: 30000ms (30 seconds)
    #[serde(default = "default_max_reconnect_delay_ms")]
    pub max_reconnect_delay_ms: u64,

    /// Number of consecutive failed reconnection attempts after which the
    /// manager moves to `Failed` and stops retrying. `None` retries
    /// indefinitely while the session remains authenticated.
    /// Default: Some(10)
    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: Option<u32>,
}

fn default_auto_reconnect() -> bool {
    true
}

fn default_reconnect_delay_ms() -> u64 {
    1000
}

fn default_max_reconnect_delay_ms() -> u64 {
    30000
}

fn default_max_consecutive_failures() -> Option<u32> {
    Some(10)
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            auto_reconnect: default_auto_reconnect(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            max_reconnect_delay_ms: default_max_reconnect_delay_ms(),
            max_consecutive_failures: default_max_consecutive_failures(),
        }
    }
}

impl ConnectionOptions {
    /// Create options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set whether to automatically reconnect on connection loss.
    pub fn with_auto_reconnect(mut self, enabled: bool) -> Self {
        self.auto_reconnect = enabled;
        self
    }

    /// Set the initial reconnection delay in milliseconds.
    pub fn with_reconnect_delay_ms(mut self, ms: u64) -> Self {
        self.reconnect_delay_ms = ms;
        self
    }

    /// Set the maximum reconnection delay in milliseconds.
    pub fn with_max_reconnect_delay_ms(mut self, ms: u64) -> Self {
        self.max_reconnect_delay_ms = ms;
        self
    }

    /// Set the consecutive-failure limit before giving up (`None` = never).
    pub fn with_max_consecutive_failures(mut self, max: Option<u32>) -> Self {
        self.max_consecutive_failures = max;
        self
    }
}
