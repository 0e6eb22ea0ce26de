use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of the live connection.
///
/// Exactly one instance per session. Transitions are owned solely by the
/// connection manager; observers read it through the state watch channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No live connection; either never started or explicitly torn down.
    Disconnected,
    /// Initial connection attempt in progress.
    Connecting,
    /// Live connection open; events are flowing.
    Connected,
    /// Connection dropped; automatic reconnection with backoff in progress.
    Reconnecting,
    /// Gave up after too many consecutive failures. Requires an explicit
    /// `connect` call to retry.
    Failed,
}

impl ConnectionState {
    /// `true` when a connection attempt or an open connection exists.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Connecting | Self::Connected | Self::Reconnecting)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}
