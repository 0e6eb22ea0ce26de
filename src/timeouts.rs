//! Timing knobs shared by the REST client and the live transport.
//!
//! Centralizes the timing knobs for the REST client and the live transport:
//! connection establishment, request round-trips, and the keepalive /
//! dead-connection detection cycle on the WebSocket.

use std::time::Duration;

/// Timing knobs for the REST client and the live connection.
///
/// The defaults suit a reasonable home or school network; `fast()` and
/// `relaxed()` cover the common deviations, and the builder covers the rest.
///
/// ```rust
/// use hearth_link::HearthLinkTimeouts;
/// use std::time::Duration;
///
/// let timeouts = HearthLinkTimeouts::builder()
///     .connection_timeout(Duration::from_secs(60))
///     .request_timeout(Duration::from_secs(120))
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct HearthLinkTimeouts {
    /// Deadline for getting a connection open end to end, covering TCP,
    /// TLS, and the WebSocket upgrade. Default: 10 seconds.
    pub connection_timeout: Duration,

    /// Deadline for a REST round-trip, request sent to response read.
    /// Default: 30 seconds.
    pub request_timeout: Duration,

    /// How long the live connection may sit idle before a Ping goes out.
    /// Zero disables keepalive entirely. Default: 25 seconds.
    pub keepalive_interval: Duration,

    /// After a keepalive Ping, how long silence is tolerated before the
    /// connection is declared dead. Any inbound frame resets the clock, not
    /// just the Pong. Zero disables the check. Default: 10 seconds.
    pub pong_timeout: Duration,
}

impl Default for HearthLinkTimeouts {
    fn default() -> Self {
        Self {
            connection_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            keepalive_interval: Duration::from_secs(25),
            pong_timeout: Duration::from_secs(10),
        }
    }
}

impl HearthLinkTimeouts {
    /// Builder starting from the defaults.
    pub fn builder() -> HearthLinkTimeoutsBuilder {
        HearthLinkTimeoutsBuilder::new()
    }

    /// Tight timeouts for localhost development, where waiting the full
    /// default on a dead server is just annoying.
    pub fn fast() -> Self {
        Self {
            connection_timeout: Duration::from_secs(2),
            request_timeout: Duration::from_secs(5),
            keepalive_interval: Duration::from_secs(10),
            pong_timeout: Duration::from_secs(3),
        }
    }

    /// Generous timeouts for slow or lossy networks (mobile data, rural
    /// DSL).
    pub fn relaxed() -> Self {
        Self {
            connection_timeout: Duration::from_secs(30),
            request_timeout: Duration::from_secs(120),
            keepalive_interval: Duration::from_secs(45),
            pong_timeout: Duration::from_secs(20),
        }
    }

    /// Treats zero and absurdly large durations as "never time out".
    pub fn is_no_timeout(duration: Duration) -> bool {
        duration.is_zero() || duration > Duration::from_secs(86400 * 365)
    }
}

/// Incrementally overrides fields of [`HearthLinkTimeouts`].
#[derive(Debug, Clone)]
pub struct HearthLinkTimeoutsBuilder {
    timeouts: HearthLinkTimeouts,
}

impl HearthLinkTimeoutsBuilder {
    fn new() -> Self {
        Self {
            timeouts: HearthLinkTimeouts::default(),
        }
    }

    /// Override the connection-establishment deadline.
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.connection_timeout = timeout;
        self
    }

    /// Same as [`connection_timeout`](Self::connection_timeout), in whole
    /// seconds.
    pub fn connection_timeout_secs(self, secs: u64) -> Self {
        self.connection_timeout(Duration::from_secs(secs))
    }

    /// Override the REST round-trip deadline.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.request_timeout = timeout;
        self
    }

    /// Same as [`request_timeout`](Self::request_timeout), in whole seconds.
    pub fn request_timeout_secs(self, secs: u64) -> Self {
        self.request_timeout(Duration::from_secs(secs))
    }

    /// Override the keepalive Ping interval; zero turns keepalive off.
    pub fn keepalive_interval(mut self, interval: Duration) -> Self {
        self.timeouts.keepalive_interval = interval;
        self
    }

    /// Same as [`keepalive_interval`](Self::keepalive_interval), in whole
    /// seconds.
    pub fn keepalive_interval_secs(self, secs: u64) -> Self {
        self.keepalive_interval(Duration::from_secs(secs))
    }

    /// Override the post-Ping silence window; zero disables the dead
    /// connection check.
    pub fn pong_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.pong_timeout = timeout;
        self
    }

    /// Same as [`pong_timeout`](Self::pong_timeout), in whole seconds.
    pub fn pong_timeout_secs(self, secs: u64) -> Self {
        self.pong_timeout(Duration::from_secs(secs))
    }

    /// Finish and hand back the configured timeouts.
    pub fn build(self) -> HearthLinkTimeouts {
        self.timeouts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_timeouts() {
        let timeouts = HearthLinkTimeouts::default();
        assert_eq!(timeouts.connection_timeout, Duration::from_secs(10));
        assert_eq!(timeouts.request_timeout, Duration::from_secs(30));
        assert!(!timeouts.keepalive_interval.is_zero());
    }

    #[test]
    fn test_builder() {
        let timeouts = HearthLinkTimeouts::builder()
            .connection_timeout_secs(60)
            .request_timeout_secs(120)
            .keepalive_interval_secs(0)
            .build();

        assert_eq!(timeouts.connection_timeout, Duration::from_secs(60));
        assert_eq!(timeouts.request_timeout, Duration::from_secs(120));
        assert!(timeouts.keepalive_interval.is_zero());
    }

    #[test]
    fn test_fast_preset() {
        let timeouts = HearthLinkTimeouts::fast();
        assert!(timeouts.connection_timeout <= Duration::from_secs(5));
    }

    #[test]
    fn test_relaxed_preset() {
        let timeouts = HearthLinkTimeouts::relaxed();
        assert!(timeouts.connection_timeout >= Duration::from_secs(30));
    }

    #[test]
    fn test_is_no_timeout() {
        assert!(HearthLinkTimeouts::is_no_timeout(Duration::ZERO));
        assert!(!HearthLinkTimeouts::is_no_timeout(Duration::from_secs(1)));
    }
}
