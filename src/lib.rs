//! # hearth-link
//!
//! Client-side synchronization core for the Hearth community portal: keeps
//! a running client session consistent with the server in real time.
//!
//! Four cooperating components, usable individually or wired together by
//! [`SyncSession`]:
//!
//! - [`ConnectionManager`]: the live WebSocket connection, with automatic
//!   reconnection (capped exponential backoff with jitter) and keepalive.
//! - [`CredentialRefresher`]: short-lived media credential, renewed in the
//!   background before expiry.
//! - [`SubscriptionManager`]: browser push subscription lifecycle, degrading
//!   to no-ops on platforms without push support.
//! - [`NotificationReconciler`]: merges live events into locally cached
//!   feeds using per-feed sequence watermarks, dropping duplicates and
//!   tolerating gaps.
//!
//! # Example
//!
//! ```rust,no_run
//! use hearth_link::{HearthLinkClient, SyncSession};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = HearthLinkClient::builder()
//!     .base_url("https://portal.example.org")
//!     .bearer_token("session-token")
//!     .build()?;
//!
//! let session = SyncSession::builder()
//!     .user_id("user-7")
//!     .client(client)
//!     .build()?;
//!
//! session.start().await?;
//! // ... the session keeps feeds fresh until:
//! session.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod client;
pub mod connection;
pub mod credential;
pub mod error;
pub mod event_handlers;
pub mod models;
pub mod push;
pub mod reconciler;
pub mod session;
pub mod timeouts;
pub mod transport;

pub use auth::AuthProvider;
pub use client::{HearthLinkClient, HearthLinkClientBuilder};
pub use connection::ConnectionManager;
pub use credential::{CredentialRefresher, CredentialSource};
pub use error::{HearthLinkError, Result};
pub use event_handlers::{ConnectionError, DisconnectReason, EventHandlers};
pub use models::{
    ConnectionOptions, ConnectionState, ConversationSummary, ConversationsResponse, FeedId,
    FeedItem, FeedSnapshot, LiveEvent, LiveEventKind, MediaCredential, NotificationsResponse,
    PushSubscriptionRecord,
};
pub use push::{PushEndpointRegistry, PushPermission, PushPlatform, SubscriptionManager};
pub use reconciler::NotificationReconciler;
pub use session::{SyncSession, SyncSessionBuilder};
pub use timeouts::{HearthLinkTimeouts, HearthLinkTimeoutsBuilder};
pub use transport::{LiveStream, LiveTransport, WebSocketTransport};
