//! Browser push-notification subscription management.
//!
//! The platform (permission prompt, push registration) and the server-side
//! endpoint registry are consumed as black boxes behind the
//! [`PushPlatform`] and [`PushEndpointRegistry`] traits; the manager
//! branches only on their success/failure/unsupported outcomes.
//!
//! Capability absence is a defined outcome, not an error: on an
//! unsupported platform `subscribe` returns `false` without side effects.

use crate::error::Result;
use crate::models::PushSubscriptionRecord;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// Platform permission state for showing notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PushPermission {
    /// The user has not been asked yet.
    #[default]
    Prompt,
    /// The user granted permission.
    Granted,
    /// The user denied permission. Asking again has no effect.
    Denied,
}

/// Host platform capabilities for push notifications.
#[async_trait]
pub trait PushPlatform: Send + Sync {
    /// Capability probe: background (service worker) registration available.
    fn has_background_registration(&self) -> bool;

    /// Capability probe: push messaging available.
    fn has_push_messaging(&self) -> bool;

    /// Current permission state without prompting.
    fn permission(&self) -> PushPermission;

    /// Prompt the user for permission. Returns the resulting state.
    async fn request_permission(&self) -> Result<PushPermission>;

    /// Register a push endpoint with the platform's push service.
    async fn register(&self) -> Result<PushSubscriptionRecord>;

    /// Remove the platform-side push registration.
    async fn unregister(&self) -> Result<()>;

    /// The registration the platform currently holds, if any. The platform
    /// may silently revoke registrations; this reports the actual state.
    async fn current_registration(&self) -> Option<PushSubscriptionRecord>;
}

/// Server-side registry mirroring push endpoints (the REST client in
/// production).
#[async_trait]
pub trait PushEndpointRegistry: Send + Sync {
    /// Persist an endpoint record so the server can push to this client.
    async fn register_endpoint(&self, record: &PushSubscriptionRecord) -> Result<()>;

    /// Delete the server-side record for an endpoint.
    async fn unregister_endpoint(&self, endpoint: &str) -> Result<()>;
}

/// Manages the push subscription for one session.
pub struct SubscriptionManager {
    platform: Arc<dyn PushPlatform>,
    registry: Arc<dyn PushEndpointRegistry>,
    supported: bool,
    record: Mutex<Option<PushSubscriptionRecord>>,
}

impl SubscriptionManager {
    /// Create a manager; probes platform capabilities once at construction.
    pub fn new(platform: Arc<dyn PushPlatform>, registry: Arc<dyn PushEndpointRegistry>) -> Self {
        let supported = platform.has_background_registration() && platform.has_push_messaging();
        if !supported {
            log::info!("[hearth-link] Push notifications unsupported on this platform");
        }
        Self {
            platform,
            registry,
            supported,
            record: Mutex::new(None),
        }
    }

    /// Whether the platform supports push notifications at all.
    pub fn is_supported(&self) -> bool {
        self.supported
    }

    /// Whether a subscription is currently assumed active.
    pub fn is_subscribed(&self) -> bool {
        self.lock().is_some()
    }

    /// Current platform permission state.
    pub fn permission(&self) -> PushPermission {
        self.platform.permission()
    }

    /// Opt in to push notifications.
    ///
    /// Requests permission if needed, registers a platform endpoint, and
    /// persists the record server-side. Returns `true` only when all three
    /// steps succeed. Partial failure rolls the local state back to "not
    /// subscribed". On an unsupported platform this returns `false`
    /// immediately with zero side effects.
    pub async fn subscribe(&self) -> bool {
        if !self.supported {
            return false;
        }

        let permission = match self.platform.permission() {
            PushPermission::Granted => PushPermission::Granted,
            PushPermission::Denied => {
                log::debug!("[hearth-link] Push permission previously denied");
                return false;
            },
            PushPermission::Prompt => match self.platform.request_permission().await {
                Ok(state) => state,
                Err(e) => {
                    log::warn!("[hearth-link] Permission request failed: {}", e);
                    return false;
                },
            },
        };
        if permission != PushPermission::Granted {
            return false;
        }

        let record = match self.platform.register().await {
            Ok(record) => record,
            Err(e) => {
                log::warn!("[hearth-link] Platform push registration failed: {}", e);
                return false;
            },
        };

        if let Err(e) = self.registry.register_endpoint(&record).await {
            log::warn!(
                "[hearth-link] Server push registration failed, rolling back: {}",
                e,
            );
            // Roll back the platform registration so local state and the
            // platform agree on "not subscribed".
            if let Err(e) = self.platform.unregister().await {
                log::warn!("[hearth-link] Rollback of platform registration failed: {}", e);
            }
            *self.lock() = None;
            return false;
        }

        *self.lock() = Some(record);
        log::info!("[hearth-link] Push subscription active");
        true
    }

    /// Opt out of push notifications.
    ///
    /// Deletes both the platform registration and the server-side record.
    /// Safe to call when not subscribed (no-op, returns `true`).
    pub async fn unsubscribe(&self) -> bool {
        let record = self.lock().take();
        let Some(record) = record else {
            return true;
        };

        let mut ok = true;
        if let Err(e) = self.platform.unregister().await {
            log::warn!("[hearth-link] Platform push unregistration failed: {}", e);
            ok = false;
        }
        if let Err(e) = self.registry.unregister_endpoint(&record.endpoint).await {
            log::warn!("[hearth-link] Server push unregistration failed: {}", e);
            ok = false;
        }
        ok
    }

    /// Reconcile the assumed subscription state against the platform.
    ///
    /// The platform may silently revoke a registration; this corrects
    /// `is_subscribed` in either direction. Does not talk to the server.
    pub async fn check_subscription(&self) {
        if !self.supported {
            return;
        }

        let actual = self.platform.current_registration().await;
        let mut record = self.lock();
        match (&*record, actual) {
            (Some(_), None) => {
                log::info!("[hearth-link] Push subscription was revoked by the platform");
                *record = None;
            },
            (None, Some(actual)) => {
                *record = Some(actual);
            },
            _ => {},
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<PushSubscriptionRecord>> {
        self.record.lock().unwrap_or_else(|e| e.into_inner())
    }
}
