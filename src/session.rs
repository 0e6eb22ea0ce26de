//! Session shell tying the synchronization components together.
//!
//! A [`SyncSession`] owns one of each: connection manager, credential
//! refresher, push subscription manager, and reconciler, plus the pump task
//! moving live events from the connection into the reconciler. Components
//! stay independently usable; the session only sequences startup and
//! teardown.

use crate::{
    client::HearthLinkClient,
    connection::ConnectionManager,
    credential::{CredentialRefresher, CredentialSource},
    error::{HearthLinkError, Result},
    event_handlers::EventHandlers,
    models::{ConnectionOptions, ConnectionState, FeedSnapshot, FeedId},
    push::{PushEndpointRegistry, PushPermission, PushPlatform, SubscriptionManager},
    reconciler::NotificationReconciler,
    transport::{LiveTransport, WebSocketTransport},
};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;

/// One user's synchronization session.
///
/// Built with [`SyncSession::builder`]; [`start`](Self::start) brings every
/// component up, [`shutdown`](Self::shutdown) tears them down in reverse
/// dependency order. A session is single-use: after shutdown, build a new
/// one.
pub struct SyncSession {
    user_id: String,
    client: Arc<HearthLinkClient>,
    connection: ConnectionManager,
    credentials: CredentialRefresher,
    push: SubscriptionManager,
    reconciler: Arc<NotificationReconciler>,
    pump: Mutex<Option<JoinHandle<()>>>,
    event_rx: Mutex<Option<tokio::sync::mpsc::Receiver<crate::models::LiveEvent>>>,
}

impl SyncSession {
    /// Create a new builder for configuring the session.
    pub fn builder() -> SyncSessionBuilder {
        SyncSessionBuilder::new()
    }

    /// User this session belongs to.
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// REST client shared with the session components.
    pub fn client(&self) -> &HearthLinkClient {
        &self.client
    }

    /// The live connection manager.
    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    /// The media credential refresher.
    pub fn credentials(&self) -> &CredentialRefresher {
        &self.credentials
    }

    /// The push subscription manager.
    pub fn push(&self) -> &SubscriptionManager {
        &self.push
    }

    /// The notification reconciler.
    pub fn reconciler(&self) -> &Arc<NotificationReconciler> {
        &self.reconciler
    }

    /// Bring the session up: open the live connection, start the event
    /// pump, seed feeds from REST, and fetch the first media credential.
    ///
    /// REST seeding failures are logged but do not abort startup; the live
    /// connection keeps retrying independently and feeds can be re-seeded
    /// later via [`refresh_feeds`](Self::refresh_feeds).
    pub async fn start(&self) -> Result<()> {
        log::info!("[hearth-link] Starting session for {}", self.user_id);

        // Pump first so no event is lost between connect and seed.
        self.spawn_pump()?;
        self.connection.connect(&self.user_id);

        if let Err(e) = self.refresh_feeds().await {
            if e.is_auth_rejected() {
                return Err(e);
            }
            log::warn!("[hearth-link] Initial feed refresh failed: {}", e);
        }

        match self.credentials.fetch().await {
            Ok(_) => {},
            Err(e) if e.is_auth_rejected() => return Err(e),
            Err(e) => log::warn!("[hearth-link] Initial credential fetch failed: {}", e),
        }

        Ok(())
    }

    /// Re-seed the reconciler from REST reads. Used at startup and after
    /// reconnects, when the gap since the last watermark may hide events.
    pub async fn refresh_feeds(&self) -> Result<()> {
        let notifications = self.client.fetch_notifications().await?;
        self.reconciler
            .seed(notifications.feed, notifications.items, notifications.last_seq);

        let conversations = self.client.fetch_conversations().await?;
        for conversation in conversations.conversations {
            self.reconciler
                .seed(conversation.feed, conversation.items, conversation.last_seq);
        }
        Ok(())
    }

    /// Enable push notifications for this session. Returns `true` when a
    /// subscription is in place afterwards.
    pub async fn enable_push(&self) -> bool {
        self.push.subscribe().await
    }

    /// Current state of the live connection.
    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// Snapshot of one reconciled feed.
    pub fn snapshot(&self, feed: &FeedId) -> Option<FeedSnapshot> {
        self.reconciler.snapshot(feed)
    }

    /// Sign a media URL with the current credential (passthrough when no
    /// credential is held).
    pub fn sign_url(&self, url: &str) -> String {
        self.credentials.sign_url(url)
    }

    /// Tear the session down in reverse dependency order: stop the event
    /// pump, drop the push subscription, discard credentials, then close
    /// the live connection. Idempotent.
    pub async fn shutdown(&self) {
        log::info!("[hearth-link] Shutting down session for {}", self.user_id);

        if let Some(pump) = self.take_pump() {
            pump.abort();
        }
        self.push.unsubscribe().await;
        self.credentials.clear();
        self.connection.disconnect();
        self.reconciler.reset();
    }

    fn spawn_pump(&self) -> Result<()> {
        let mut event_rx = self
            .event_rx
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
            .ok_or_else(|| {
                HearthLinkError::InternalError("session already started".into())
            })?;

        let reconciler = Arc::clone(&self.reconciler);
        let pump = tokio::spawn(async move {
            while let Some(event) = event_rx.recv().await {
                reconciler.apply(event);
            }
            log::debug!("[hearth-link] Event pump stopped");
        });

        *self.pump.lock().unwrap_or_else(|e| e.into_inner()) = Some(pump);
        Ok(())
    }

    fn take_pump(&self) -> Option<JoinHandle<()>> {
        self.pump.lock().unwrap_or_else(|e| e.into_inner()).take()
    }
}

impl Drop for SyncSession {
    fn drop(&mut self) {
        if let Some(pump) = self.take_pump() {
            pump.abort();
        }
    }
}

/// Builder for configuring [`SyncSession`] instances.
///
/// Requires a user id and a REST client. The live transport, credential
/// source, and push platform default to the real implementations; each can
/// be overridden at the trait seam.
pub struct SyncSessionBuilder {
    user_id: Option<String>,
    client: Option<HearthLinkClient>,
    transport: Option<Arc<dyn LiveTransport>>,
    transport_set: bool,
    credential_source: Option<Arc<dyn CredentialSource>>,
    push_platform: Option<Arc<dyn PushPlatform>>,
    options: ConnectionOptions,
    handlers: EventHandlers,
}

impl SyncSessionBuilder {
    fn new() -> Self {
        Self {
            user_id: None,
            client: None,
            transport: None,
            transport_set: false,
            credential_source: None,
            push_platform: None,
            options: ConnectionOptions::default(),
            handlers: EventHandlers::new(),
        }
    }

    /// Set the session user (required).
    pub fn user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Set the REST client (required).
    pub fn client(mut self, client: HearthLinkClient) -> Self {
        self.client = Some(client);
        self
    }

    /// Override the live transport. `None` disables the live connection
    /// entirely; the session still works through REST reads.
    pub fn transport(mut self, transport: Option<Arc<dyn LiveTransport>>) -> Self {
        self.transport = transport;
        self.transport_set = true;
        self
    }

    /// Override the credential source (defaults to the REST client).
    pub fn credential_source(mut self, source: Arc<dyn CredentialSource>) -> Self {
        self.credential_source = Some(source);
        self
    }

    /// Set the push platform bridge. Without one, push is unsupported and
    /// subscribe attempts are no-ops.
    pub fn push_platform(mut self, platform: Arc<dyn PushPlatform>) -> Self {
        self.push_platform = Some(platform);
        self
    }

    /// Set reconnection behavior for the live connection.
    pub fn connection_options(mut self, options: ConnectionOptions) -> Self {
        self.options = options;
        self
    }

    /// Set lifecycle callbacks for the live connection.
    pub fn event_handlers(mut self, handlers: EventHandlers) -> Self {
        self.handlers = handlers;
        self
    }

    /// Build the session.
    pub fn build(self) -> Result<SyncSession> {
        let user_id = self
            .user_id
            .ok_or_else(|| HearthLinkError::ConfigurationError("user_id is required".into()))?;
        let client = Arc::new(self.client.ok_or_else(|| {
            HearthLinkError::ConfigurationError("client is required".into())
        })?);

        let transport = if self.transport_set {
            self.transport
        } else {
            Some(Arc::new(WebSocketTransport::new(
                client.base_url(),
                client.auth().clone(),
                client.timeouts().clone(),
            )) as Arc<dyn LiveTransport>)
        };

        let (connection, event_rx) =
            ConnectionManager::new(transport, self.options, self.handlers);

        let credential_source = self
            .credential_source
            .unwrap_or_else(|| Arc::clone(&client) as Arc<dyn CredentialSource>);
        let credentials = CredentialRefresher::new(credential_source);

        let platform = self
            .push_platform
            .unwrap_or_else(|| Arc::new(UnsupportedPushPlatform));
        let registry: Arc<dyn PushEndpointRegistry> = client.clone();
        let push = SubscriptionManager::new(platform, registry);

        let reconciler = Arc::new(NotificationReconciler::new(user_id.clone()));

        Ok(SyncSession {
            user_id,
            client,
            connection,
            credentials,
            push,
            reconciler,
            pump: Mutex::new(None),
            event_rx: Mutex::new(Some(event_rx)),
        })
    }
}

/// Platform bridge for environments without push support. Every capability
/// probe answers no, so the subscription manager degrades to no-ops.
struct UnsupportedPushPlatform;

#[async_trait]
impl PushPlatform for UnsupportedPushPlatform {
    fn has_background_registration(&self) -> bool {
        false
    }

    fn has_push_messaging(&self) -> bool {
        false
    }

    fn permission(&self) -> PushPermission {
        PushPermission::Denied
    }

    async fn request_permission(&self) -> Result<PushPermission> {
        Ok(PushPermission::Denied)
    }

    async fn register(&self) -> Result<crate::models::PushSubscriptionRecord> {
        Err(HearthLinkError::Unsupported("push messaging".into()))
    }

    async fn unregister(&self) -> Result<()> {
        Ok(())
    }

    async fn current_registration(&self) -> Option<crate::models::PushSubscriptionRecord> {
        None
    }
}
