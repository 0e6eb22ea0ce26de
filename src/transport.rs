//! Live transport abstraction and its WebSocket implementation.
//!
//! The connection manager talks to the transport only through the
//! [`LiveTransport`] / [`LiveStream`] traits: open(key), read events, close.
//! The concrete wire protocol is an implementation detail, and the core
//! must tolerate the transport being entirely absent at runtime (the
//! manager holds an `Option<Arc<dyn LiveTransport>>`).
//!
//! [`WebSocketTransport`] is the production implementation. It handles the
//! upgrade handshake with session auth, parses JSON frames into
//! [`LiveEvent`]s, and runs an application keepalive cycle: a Ping at the
//! configured interval, and if no frame at all arrives within the pong
//! timeout the stream reports the connection dead so the manager can
//! reconnect.

use crate::auth::AuthProvider;
use crate::error::{HearthLinkError, Result};
use crate::models::LiveEvent;
use crate::timeouts::HearthLinkTimeouts;
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::Instant as TokioInstant;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{client::IntoClientRequest, protocol::Message},
    MaybeTlsStream, WebSocketStream,
};

/// Maximum text message size (16 MiB).
const MAX_TEXT_MESSAGE_BYTES: usize = 16 << 20;

/// Maximum sleep duration that won't overflow `Instant + Duration`.
/// ~100 years is far enough into the future to be effectively "never".
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 3600);

/// A source of live events, opened per authenticated user.
#[async_trait]
pub trait LiveTransport: Send + Sync {
    /// Open a stream of live events for `user_id`, subscribed to `channels`.
    async fn open(&self, user_id: &str, channels: &[String]) -> Result<Box<dyn LiveStream>>;
}

/// An open live event stream.
#[async_trait]
pub trait LiveStream: Send {
    /// Wait for the next event.
    ///
    /// `Some(Ok(event))` delivers an event, `Some(Err(_))` reports a
    /// transport-level failure, `None` means the stream ended. After an
    /// error or `None` the stream must not be polled again.
    async fn next_event(&mut self) -> Option<Result<LiveEvent>>;

    /// Gracefully close the stream. Best effort.
    async fn close(&mut self);
}

/// Channels implied by the authenticated identity: the per-user channel
/// (conversation fan-out) and the user's notification feed.
pub fn channels_for(user_id: &str) -> Vec<String> {
    vec![
        format!("user:{}", user_id),
        format!("notifications:{}", user_id),
    ]
}

// ── Wire frames ──────────────────────────────────────────────────────────────

/// Frames the server sends over the live connection.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ServerFrame {
    /// A live event for one of the subscribed channels.
    Event { event: LiveEvent },
    /// Application-level pong (browser clients cannot send protocol pings).
    Pong,
    /// Server-side error notice. Logged, never fatal.
    Error { message: String },
}

// ── WebSocket implementation ────────────────────────────────────────────────

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Production [`LiveTransport`] over a WebSocket connection.
pub struct WebSocketTransport {
    base_url: String,
    auth: AuthProvider,
    timeouts: HearthLinkTimeouts,
}

impl WebSocketTransport {
    /// Create a transport for the given portal base URL.
    pub fn new(base_url: impl Into<String>, auth: AuthProvider, timeouts: HearthLinkTimeouts) -> Self {
        Self {
            base_url: base_url.into(),
            auth,
            timeouts,
        }
    }
}

/// Convert the HTTP base URL into the live endpoint URL.
fn resolve_live_url(base_url: &str, user_id: &str, channels: &[String]) -> Result<String> {
    let trimmed = base_url.trim_end_matches('/');
    let ws_base = if let Some(rest) = trimmed.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = trimmed.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else if trimmed.starts_with("ws://") || trimmed.starts_with("wss://") {
        trimmed.to_string()
    } else {
        return Err(HearthLinkError::ConfigurationError(format!(
            "Unsupported base URL scheme: {}",
            base_url
        )));
    };

    Ok(format!(
        "{}/v1/live?user={}&channels={}",
        ws_base,
        user_id,
        channels.join(",")
    ))
}

#[async_trait]
impl LiveTransport for WebSocketTransport {
    async fn open(&self, user_id: &str, channels: &[String]) -> Result<Box<dyn LiveStream>> {
        let url = resolve_live_url(&self.base_url, user_id, channels)?;
        log::debug!("[hearth-link] Opening live connection to {}", url);

        let mut request = url.into_client_request().map_err(|e| {
            HearthLinkError::TransportError(format!("Failed to build upgrade request: {}", e))
        })?;
        self.auth.apply_to_ws_request(&mut request)?;

        let connect_result = if !HearthLinkTimeouts::is_no_timeout(self.timeouts.connection_timeout)
        {
            tokio::time::timeout(self.timeouts.connection_timeout, connect_async(request))
                .await
                .map_err(|_| {
                    HearthLinkError::TimeoutError(format!(
                        "Live connection timeout ({:?})",
                        self.timeouts.connection_timeout
                    ))
                })?
        } else {
            connect_async(request).await
        };

        let ws = match connect_result {
            Ok((stream, _response)) => stream,
            Err(tokio_tungstenite::tungstenite::Error::Http(response)) => {
                let status = response.status();
                let message = match status.as_u16() {
                    401 | 403 => {
                        return Err(HearthLinkError::AuthRejected(format!(
                            "Live connection rejected ({})",
                            status
                        )))
                    },
                    code => format!("Live connection HTTP error: {}", code),
                };
                return Err(HearthLinkError::TransportError(message));
            },
            Err(e) => {
                return Err(HearthLinkError::TransportError(format!(
                    "Live connection failed: {}",
                    e
                )))
            },
        };

        log::info!("[hearth-link] Live connection established for {}", user_id);
        Ok(Box::new(WebSocketLiveStream::new(ws, self.timeouts.clone())))
    }
}

/// Open WebSocket wrapped with keepalive bookkeeping.
struct WebSocketLiveStream {
    ws: WsStream,
    keepalive_interval: Duration,
    pong_timeout: Duration,
    idle_deadline: TokioInstant,
    pong_deadline: TokioInstant,
    awaiting_pong: bool,
}

impl WebSocketLiveStream {
    fn new(ws: WsStream, timeouts: HearthLinkTimeouts) -> Self {
        let keepalive_interval = timeouts.keepalive_interval;
        let idle_deadline = if keepalive_interval.is_zero() {
            TokioInstant::now() + FAR_FUTURE
        } else {
            TokioInstant::now() + keepalive_interval
        };

        Self {
            ws,
            keepalive_interval,
            pong_timeout: timeouts.pong_timeout,
            idle_deadline,
            // Inactive until the first Ping is sent.
            pong_deadline: TokioInstant::now() + FAR_FUTURE,
            awaiting_pong: false,
        }
    }

    fn has_keepalive(&self) -> bool {
        !self.keepalive_interval.is_zero()
    }

    fn has_pong_timeout(&self) -> bool {
        self.has_keepalive() && !self.pong_timeout.is_zero()
    }

    /// Any frame received proves the connection is alive.
    fn note_frame_received(&mut self) {
        if self.has_keepalive() {
            self.idle_deadline = TokioInstant::now() + self.keepalive_interval;
        }
        if self.awaiting_pong {
            self.awaiting_pong = false;
            self.pong_deadline = TokioInstant::now() + FAR_FUTURE;
        }
    }
}

#[async_trait]
impl LiveStream for WebSocketLiveStream {
    async fn next_event(&mut self) -> Option<Result<LiveEvent>> {
        loop {
            let idle_sleep = tokio::time::sleep_until(self.idle_deadline);
            tokio::pin!(idle_sleep);
            let pong_sleep = tokio::time::sleep_until(self.pong_deadline);
            tokio::pin!(pong_sleep);

            tokio::select! {
                biased;

                // Pong timeout: no frame arrived since we sent our Ping.
                _ = &mut pong_sleep, if self.has_pong_timeout() && self.awaiting_pong => {
                    log::warn!(
                        "[hearth-link] Pong timeout ({:?}), server unresponsive",
                        self.pong_timeout,
                    );
                    return Some(Err(HearthLinkError::TimeoutError(format!(
                        "Pong timeout ({:?})",
                        self.pong_timeout
                    ))));
                }

                // Keepalive ping
                _ = &mut idle_sleep, if self.has_keepalive() && !self.awaiting_pong => {
                    if let Err(e) = self.ws.send(Message::Ping(Bytes::new())).await {
                        return Some(Err(HearthLinkError::TransportError(format!(
                            "Keepalive ping failed: {}",
                            e
                        ))));
                    }
                    if self.has_pong_timeout() {
                        self.awaiting_pong = true;
                        self.pong_deadline = TokioInstant::now() + self.pong_timeout;
                    }
                    self.idle_deadline = TokioInstant::now() + self.keepalive_interval;
                }

                frame = self.ws.next() => {
                    self.note_frame_received();

                    match frame {
                        Some(Ok(Message::Text(text))) => {
                            if text.len() > MAX_TEXT_MESSAGE_BYTES {
                                log::warn!("Text message too large ({} bytes)", text.len());
                                continue;
                            }
                            match serde_json::from_str::<ServerFrame>(text.as_str()) {
                                Ok(ServerFrame::Event { event }) => return Some(Ok(event)),
                                Ok(ServerFrame::Pong) => continue,
                                Ok(ServerFrame::Error { message }) => {
                                    log::warn!("[hearth-link] Server error frame: {}", message);
                                    continue;
                                },
                                Err(e) => {
                                    log::warn!("Failed to parse live frame: {}", e);
                                    continue;
                                },
                            }
                        },
                        Some(Ok(Message::Binary(_))) => {
                            log::debug!("[hearth-link] Ignoring binary frame");
                            continue;
                        },
                        Some(Ok(Message::Ping(payload))) => {
                            let _ = self.ws.send(Message::Pong(payload)).await;
                            continue;
                        },
                        Some(Ok(Message::Pong(_))) => continue,
                        Some(Ok(Message::Close(frame))) => {
                            if let Some(f) = frame {
                                log::info!(
                                    "[hearth-link] Server closed live connection: {} (code {})",
                                    f.reason,
                                    u16::from(f.code),
                                );
                            }
                            return None;
                        },
                        Some(Ok(Message::Frame(_))) => continue,
                        Some(Err(e)) => {
                            return Some(Err(HearthLinkError::TransportError(e.to_string())));
                        },
                        None => return None,
                    }
                }
            }
        }
    }

    async fn close(&mut self) {
        let _ = self.ws.close(None).await;
    }
}
