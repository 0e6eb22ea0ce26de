//! Live connection manager.
//!
//! Owns the live transport and its lifecycle state machine:
//!
//! - `connect(user_id)` is idempotent while a connection attempt or open
//!   connection exists for the same user
//! - automatic reconnection with capped exponential backoff and jitter
//! - after a configurable number of consecutive failures the manager moves
//!   to `Failed` and waits for an explicit `connect` call
//! - every received [`LiveEvent`] is forwarded in arrival order to the
//!   event channel handed out at construction
//! - if no transport is available at runtime, `connect` logs a warning and
//!   leaves the state at `Disconnected`; the rest of the application keeps
//!   working without live updates

use crate::event_handlers::{ConnectionError, DisconnectReason, EventHandlers};
use crate::models::{ConnectionOptions, ConnectionState, LiveEvent};
use crate::transport::{channels_for, LiveTransport};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// Capacity of the forwarded-event channel.
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Commands sent from the public API to the background connection task.
enum ConnCmd {
    /// Gracefully shut down the connection.
    Shutdown,
}

/// Handle to the background task serving one `connect` call.
struct ActiveConnection {
    user_id: String,
    cmd_tx: mpsc::Sender<ConnCmd>,
    task: JoinHandle<()>,
}

/// Manages the live connection for one session.
///
/// Created via [`ConnectionManager::new`], which also returns the receiver
/// end of the event channel (consumed by the notification reconciler).
pub struct ConnectionManager {
    transport: Option<Arc<dyn LiveTransport>>,
    options: ConnectionOptions,
    handlers: EventHandlers,
    event_tx: mpsc::Sender<LiveEvent>,
    /// Whether the live connection is currently open.
    connected: Arc<AtomicBool>,
    state_tx: watch::Sender<ConnectionState>,
    active: Mutex<Option<ActiveConnection>>,
}

impl ConnectionManager {
    /// Create a manager and the event receiver it will feed.
    ///
    /// `transport` may be `None` when the live transport is unavailable in
    /// the current environment; the manager then degrades gracefully.
    pub fn new(
        transport: Option<Arc<dyn LiveTransport>>,
        options: ConnectionOptions,
        handlers: EventHandlers,
    ) -> (Self, mpsc::Receiver<LiveEvent>) {
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);

        let manager = Self {
            transport,
            options,
            handlers,
            event_tx,
            connected: Arc::new(AtomicBool::new(false)),
            state_tx,
            active: Mutex::new(None),
        };
        (manager, event_rx)
    }

    /// Open the live connection for `user_id`.
    ///
    /// No-op when a connection attempt or open connection already exists
    /// for the same user. A `Failed` connection is restarted. When the
    /// transport is unavailable this logs a warning and leaves the state
    /// at `Disconnected`.
    pub fn connect(&self, user_id: &str) {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(existing) = active.as_ref() {
            let state = *self.state_tx.borrow();
            if existing.user_id == user_id && state.is_active() && !existing.task.is_finished() {
                log::debug!(
                    "[hearth-link] connect({}) ignored, already {}",
                    user_id,
                    state,
                );
                return;
            }
            // Different user, or a finished/failed task: tear down and restart.
            if let Some(old) = active.take() {
                let _ = old.cmd_tx.try_send(ConnCmd::Shutdown);
                old.task.abort();
                // The old connection is gone; `connected` must not keep
                // reporting true while the replacement is still connecting.
                if self.connected.swap(false, Ordering::SeqCst) {
                    self.handlers
                        .emit_disconnect(DisconnectReason::new("Client disconnected"));
                }
            }
        }

        let transport = match &self.transport {
            Some(t) => t.clone(),
            None => {
                log::warn!(
                    "[hearth-link] Live transport unavailable, continuing without real-time updates",
                );
                publish_state(&self.state_tx, &self.handlers, ConnectionState::Disconnected);
                return;
            },
        };

        publish_state(&self.state_tx, &self.handlers, ConnectionState::Connecting);

        let (cmd_tx, cmd_rx) = mpsc::channel(8);
        let task = tokio::spawn(connection_task(
            transport,
            user_id.to_string(),
            self.options.clone(),
            self.handlers.clone(),
            self.event_tx.clone(),
            self.connected.clone(),
            self.state_tx.clone(),
            cmd_rx,
        ));

        *active = Some(ActiveConnection {
            user_id: user_id.to_string(),
            cmd_tx,
            task,
        });
    }

    /// Tear down the live connection.
    ///
    /// Idempotent: calling while already disconnected does nothing. Any
    /// pending reconnect backoff timer is cancelled before this returns, so
    /// a logout followed immediately by a new login cannot be affected by a
    /// stale timer.
    pub fn disconnect(&self) {
        let taken = {
            let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
            active.take()
        };

        let Some(existing) = taken else {
            return; // never connected, nothing to alter
        };

        // Best-effort graceful close, then hard-cancel the task so no
        // backoff timer or read can fire after this call returns.
        let _ = existing.cmd_tx.try_send(ConnCmd::Shutdown);
        existing.task.abort();

        let was_connected = self.connected.swap(false, Ordering::SeqCst);
        publish_state(&self.state_tx, &self.handlers, ConnectionState::Disconnected);
        if was_connected {
            self.handlers
                .emit_disconnect(DisconnectReason::new("Client disconnected"));
        }
    }

    /// Whether the live connection is currently open.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    /// Current connection state snapshot.
    pub fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    /// Subscribe to connection state changes.
    ///
    /// Observers always see the latest state and are notified on change.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(existing) = active.take() {
            let _ = existing.cmd_tx.try_send(ConnCmd::Shutdown);
            existing.task.abort();
        }
    }
}

/// Publish a state transition through the watch channel and the handler.
fn publish_state(
    state_tx: &watch::Sender<ConnectionState>,
    handlers: &EventHandlers,
    state: ConnectionState,
) {
    let changed = state_tx.send_if_modified(|current| {
        if *current != state {
            *current = state;
            true
        } else {
            false
        }
    });
    if changed {
        handlers.emit_state_change(state);
    }
}

/// The background task owning the live stream.
///
/// Lifecycle:
/// 1. Open the stream keyed by the user identity
/// 2. Forward events in arrival order to the event channel
/// 3. On drop: reconnect with capped exponential backoff and jitter
/// 4. After `max_consecutive_failures` failed attempts: move to `Failed`
///    and exit (an explicit `connect` call starts a fresh task)
#[allow(clippy::too_many_arguments)]
async fn connection_task(
    transport: Arc<dyn LiveTransport>,
    user_id: String,
    options: ConnectionOptions,
    handlers: EventHandlers,
    event_tx: mpsc::Sender<LiveEvent>,
    connected: Arc<AtomicBool>,
    state_tx: watch::Sender<ConnectionState>,
    mut cmd_rx: mpsc::Receiver<ConnCmd>,
) {
    let channels = channels_for(&user_id);
    let mut consecutive_failures: u32 = 0;

    loop {
        match transport.open(&user_id, &channels).await {
            Ok(mut stream) => {
                consecutive_failures = 0;
                connected.store(true, Ordering::SeqCst);
                publish_state(&state_tx, &handlers, ConnectionState::Connected);
                handlers.emit_connect();

                let reason = 'read: loop {
                    tokio::select! {
                        biased;

                        // Shutdown command (or manager dropped)
                        _ = cmd_rx.recv() => {
                            stream.close().await;
                            let was_connected = connected.swap(false, Ordering::SeqCst);
                            publish_state(&state_tx, &handlers, ConnectionState::Disconnected);
                            if was_connected {
                                handlers.emit_disconnect(
                                    DisconnectReason::new("Client disconnected"),
                                );
                            }
                            return;
                        }

                        event = stream.next_event() => match event {
                            Some(Ok(event)) => {
                                // Arrival order within a channel is preserved:
                                // a single reader task and an ordered channel.
                                if event_tx.send(event).await.is_err() {
                                    log::debug!("[hearth-link] Event receiver dropped");
                                }
                            },
                            Some(Err(e)) => {
                                handlers.emit_error(ConnectionError::new(
                                    e.to_string(),
                                    e.is_recoverable(),
                                ));
                                break 'read DisconnectReason::new(format!(
                                    "Live stream error: {}",
                                    e
                                ));
                            },
                            None => break 'read DisconnectReason::new("Live stream ended"),
                        }
                    }
                };

                connected.store(false, Ordering::SeqCst);
                handlers.emit_disconnect(reason);
            },
            Err(e) => {
                // Session-level rejection is not retried locally.
                if e.is_auth_rejected() {
                    log::warn!("[hearth-link] Live connection rejected: {}", e);
                    handlers.emit_error(ConnectionError::new(e.to_string(), false));
                    publish_state(&state_tx, &handlers, ConnectionState::Failed);
                    return;
                }
                log::warn!(
                    "[hearth-link] Live connection attempt failed for {}: {}",
                    user_id,
                    e,
                );
                handlers.emit_error(ConnectionError::new(e.to_string(), true));
            },
        }

        if !options.auto_reconnect {
            publish_state(&state_tx, &handlers, ConnectionState::Disconnected);
            return;
        }

        let attempt = consecutive_failures;
        consecutive_failures += 1;

        if let Some(max) = options.max_consecutive_failures {
            if attempt >= max {
                log::warn!(
                    "[hearth-link] Giving up after {} consecutive failed reconnection attempts",
                    max,
                );
                handlers.emit_error(ConnectionError::new(
                    format!("Max consecutive failures ({}) reached", max),
                    false,
                ));
                publish_state(&state_tx, &handlers, ConnectionState::Failed);
                return;
            }
        }

        publish_state(&state_tx, &handlers, ConnectionState::Reconnecting);

        let delay = backoff_delay(&options, attempt, &user_id);
        log::info!(
            "[hearth-link] Reconnecting in {:?} (attempt {})",
            delay,
            attempt + 1,
        );

        // Wait out the backoff, but react to shutdown immediately.
        tokio::select! {
            biased;
            _ = cmd_rx.recv() => {
                publish_state(&state_tx, &handlers, ConnectionState::Disconnected);
                return;
            }
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

/// Capped exponential backoff: base * 2^attempt, bounded by the configured
/// maximum, with jitter applied.
fn backoff_delay(options: &ConnectionOptions, attempt: u32, key: &str) -> Duration {
    let exponential = options
        .reconnect_delay_ms
        .saturating_mul(2u64.saturating_pow(attempt));
    let capped = exponential.min(options.max_reconnect_delay_ms);
    Duration::from_millis(jitter_ms(capped, key, attempt))
}

/// +/-20% jitter derived deterministically from the channel key and attempt
/// number, so concurrent clients spread out without a shared RNG.
fn jitter_ms(base_ms: u64, key: &str, attempt: u32) -> u64 {
    if base_ms <= 1 {
        return base_ms;
    }

    let jitter_span = (base_ms / 5).max(1);
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    attempt.hash(&mut hasher);
    let hashed = hasher.finish();

    let offset = (hashed % (2 * jitter_span + 1)) as i64 - jitter_span as i64;
    if offset >= 0 {
        base_ms.saturating_add(offset as u64)
    } else {
        base_ms.saturating_sub((-offset) as u64).max(1)
    }
}
