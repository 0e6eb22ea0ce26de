//! Lifecycle callbacks for the live connection.
//!
//! Callback-based hooks for observing the live connection:
//!
//! - [`on_connect`](EventHandlers::on_connect): fired when the live connection opens
//! - [`on_disconnect`](EventHandlers::on_disconnect): fired when it closes
//! - [`on_error`](EventHandlers::on_error): fired on transport or protocol errors
//! - [`on_state_change`](EventHandlers::on_state_change): fired on every state transition
//!
//! # Example
//!
//! ```rust
//! use hearth_link::EventHandlers;
//!
//! let handlers = EventHandlers::new()
//!     .on_connect(|| println!("live updates on"))
//!     .on_disconnect(|reason| println!("live updates off: {}", reason))
//!     .on_error(|error| eprintln!("connection error: {}", error));
//! ```

use crate::models::ConnectionState;
use std::fmt;
use std::sync::Arc;

/// Why the live connection went away, as handed to `on_disconnect`.
#[derive(Debug, Clone)]
pub struct DisconnectReason {
    /// What happened, in words suitable for a log line or status banner.
    pub message: String,
    /// Close code from the transport when one was sent (1000 for a clean
    /// close; absent for aborted or locally initiated teardowns).
    pub code: Option<u16>,
}

impl DisconnectReason {
    /// Reason without a transport close code.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }

    /// Reason carrying the transport's close code.
    pub fn with_code(message: impl Into<String>, code: u16) -> Self {
        Self {
            message: message.into(),
            code: Some(code),
        }
    }
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(code) = self.code {
            write!(f, "{} (code: {})", self.message, code)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

/// Failure notice handed to the `on_error` handler.
#[derive(Debug, Clone)]
pub struct ConnectionError {
    /// Description of the failure.
    pub message: String,
    /// `false` means retrying cannot help (auth rejection, retry budget
    /// exhausted); the UI should surface a persistent offline indicator.
    pub recoverable: bool,
}

impl ConnectionError {
    /// Build a failure notice.
    pub fn new(message: impl Into<String>, recoverable: bool) -> Self {
        Self {
            message: message.into(),
            recoverable,
        }
    }
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Callback signature for `on_connect`.
pub type OnConnectCallback = Arc<dyn Fn() + Send + Sync>;

/// Callback signature for `on_disconnect`.
pub type OnDisconnectCallback = Arc<dyn Fn(DisconnectReason) + Send + Sync>;

/// Callback signature for `on_error`.
pub type OnErrorCallback = Arc<dyn Fn(ConnectionError) + Send + Sync>;

/// Callback signature for `on_state_change`.
pub type OnStateChangeCallback = Arc<dyn Fn(ConnectionState) + Send + Sync>;

/// Optional lifecycle callbacks for the live connection.
///
/// Register only what you need; unregistered hooks cost nothing. Callbacks
/// run on the connection task, so they must be `Send + Sync` and should
/// return quickly (hand heavy work to a channel).
#[derive(Clone, Default)]
pub struct EventHandlers {
    /// Fires once the live connection is open and events are flowing.
    pub(crate) on_connect: Option<OnConnectCallback>,

    /// Fires when an open connection goes away, however that happens.
    pub(crate) on_disconnect: Option<OnDisconnectCallback>,

    /// Fires on transport failures and failed connection attempts.
    pub(crate) on_error: Option<OnErrorCallback>,

    /// Fires on every state transition, including the ones above.
    pub(crate) on_state_change: Option<OnStateChangeCallback>,
}

impl fmt::Debug for EventHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHandlers")
            .field("on_connect", &self.on_connect.is_some())
            .field("on_disconnect", &self.on_disconnect.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("on_state_change", &self.on_state_change.is_some())
            .finish()
    }
}

impl EventHandlers {
    /// No callbacks registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// React to the live connection opening.
    pub fn on_connect(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_connect = Some(Arc::new(f));
        self
    }

    /// React to the live connection closing; the [`DisconnectReason`]
    /// says whether it was a clean close, a drop, or a local teardown.
    pub fn on_disconnect(mut self, f: impl Fn(DisconnectReason) + Send + Sync + 'static) -> Self {
        self.on_disconnect = Some(Arc::new(f));
        self
    }

    /// React to connection failures. Check [`ConnectionError::recoverable`]
    /// before treating one as fatal; reconnection may already be underway.
    pub fn on_error(mut self, f: impl Fn(ConnectionError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }

    /// React to every [`ConnectionState`] transition.
    pub fn on_state_change(
        mut self,
        f: impl Fn(ConnectionState) + Send + Sync + 'static,
    ) -> Self {
        self.on_state_change = Some(Arc::new(f));
        self
    }

    /// Whether at least one callback is registered.
    pub fn has_any(&self) -> bool {
        self.on_connect.is_some()
            || self.on_disconnect.is_some()
            || self.on_error.is_some()
            || self.on_state_change.is_some()
    }

    // ---------------------------------------------------------------
    // Internal dispatch helpers
    // ---------------------------------------------------------------

    /// Run the connect hook, if registered.
    pub(crate) fn emit_connect(&self) {
        if let Some(cb) = &self.on_connect {
            cb();
        }
    }

    /// Run the disconnect hook, if registered.
    pub(crate) fn emit_disconnect(&self, reason: DisconnectReason) {
        if let Some(cb) = &self.on_disconnect {
            cb(reason);
        }
    }

    /// Run the error hook, if registered.
    pub(crate) fn emit_error(&self, error: ConnectionError) {
        if let Some(cb) = &self.on_error {
            cb(error);
        }
    }

    /// Run the state-change hook, if registered.
    pub(crate) fn emit_state_change(&self, state: ConnectionState) {
        if let Some(cb) = &self.on_state_change {
            cb(state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_empty_handlers() {
        let handlers = EventHandlers::new();
        assert!(!handlers.has_any());
        // Emitting with nothing registered must be a no-op.
        handlers.emit_connect();
        handlers.emit_disconnect(DisconnectReason::new("bye"));
        handlers.emit_error(ConnectionError::new("oops", true));
    }

    #[test]
    fn test_callbacks_fire() {
        let connects = Arc::new(AtomicUsize::new(0));
        let connects_clone = connects.clone();

        let handlers = EventHandlers::new().on_connect(move || {
            connects_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert!(handlers.has_any());
        handlers.emit_connect();
        handlers.emit_connect();
        assert_eq!(connects.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_disconnect_reason_display() {
        let plain = DisconnectReason::new("server closed connection");
        assert_eq!(plain.to_string(), "server closed connection");

        let coded = DisconnectReason::with_code("going away", 1001);
        assert_eq!(coded.to_string(), "going away (code: 1001)");
    }
}
