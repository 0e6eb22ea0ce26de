//! Main hearth-link client with builder pattern.
//!
//! The REST side of the portal: feed reads, read receipts, the media
//! credential endpoint, and push endpoint registration. The live side is
//! handled by [`ConnectionManager`](crate::connection::ConnectionManager);
//! [`SyncSession`](crate::session::SyncSession) wires both together.

use crate::{
    auth::AuthProvider,
    credential::CredentialSource,
    error::{HearthLinkError, Result},
    models::{
        ConversationsResponse, MediaCredential, MediaCredentialResponse, NotificationsResponse,
        PushSubscriptionRecord,
    },
    push::PushEndpointRegistry,
    timeouts::HearthLinkTimeouts,
};
use async_trait::async_trait;

/// HTTP client for the portal's REST API.
///
/// Use [`HearthLinkClient::builder`] to construct instances with custom
/// configuration.
///
/// # Examples
///
/// ```rust,no_run
/// use hearth_link::HearthLinkClient;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = HearthLinkClient::builder()
///     .base_url("https://portal.example.org")
///     .bearer_token("session-token")
///     .build()?;
///
/// let response = client.fetch_notifications().await?;
/// println!("{} notifications", response.items.len());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct HearthLinkClient {
    base_url: String,
    http_client: reqwest::Client,
    auth: AuthProvider,
    timeouts: HearthLinkTimeouts,
}

impl HearthLinkClient {
    /// Create a new builder for configuring the client.
    pub fn builder() -> HearthLinkClientBuilder {
        HearthLinkClientBuilder::new()
    }

    /// Base URL the client was configured with.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Authentication provider in use.
    pub fn auth(&self) -> &AuthProvider {
        &self.auth
    }

    /// Get the configured timeouts.
    pub fn timeouts(&self) -> &HearthLinkTimeouts {
        &self.timeouts
    }

    /// Fetch the current state of the user's notification feed.
    pub async fn fetch_notifications(&self) -> Result<NotificationsResponse> {
        let url = format!("{}/v1/api/notifications", self.base_url);
        log::debug!("[NOTIFICATIONS] Fetching from url={}", url);
        let response = self
            .auth
            .apply_to_request(self.http_client.get(&url))
            .send()
            .await?;
        Self::check_status(response).await?.json().await.map_err(Into::into)
    }

    /// Mark one notification as read on the server.
    ///
    /// The resulting read receipt comes back over the live connection, so
    /// the local cache is updated through the normal event path.
    pub async fn mark_notification_read(&self, item_id: &str) -> Result<()> {
        let url = format!("{}/v1/api/notifications/{}/read", self.base_url, item_id);
        log::debug!("[NOTIFICATIONS] Marking read at url={}", url);
        let response = self
            .auth
            .apply_to_request(self.http_client.post(&url))
            .send()
            .await?;
        Self::check_status(response).await?;
        Ok(())
    }

    /// Fetch the user's conversation list with per-conversation watermarks.
    pub async fn fetch_conversations(&self) -> Result<ConversationsResponse> {
        let url = format!("{}/v1/api/conversations", self.base_url);
        log::debug!("[CONVERSATIONS] Fetching from url={}", url);
        let response = self
            .auth
            .apply_to_request(self.http_client.get(&url))
            .send()
            .await?;
        Self::check_status(response).await?.json().await.map_err(Into::into)
    }

    /// Fetch a fresh short-lived media credential.
    pub async fn fetch_media_credential(&self) -> Result<MediaCredential> {
        let url = format!("{}/v1/api/media/credential", self.base_url);
        log::debug!("[MEDIA] Fetching credential from url={}", url);
        let response = self
            .auth
            .apply_to_request(self.http_client.get(&url))
            .send()
            .await?;
        let payload: MediaCredentialResponse =
            Self::check_status(response).await?.json().await?;
        log::debug!("[MEDIA] Credential granted, ttl={}s", payload.ttl_secs);
        Ok(payload.into())
    }

    /// Register a push endpoint so the server can deliver push messages to
    /// this client while it is not running.
    pub async fn register_push_endpoint(&self, record: &PushSubscriptionRecord) -> Result<()> {
        let url = format!("{}/v1/api/push/endpoints", self.base_url);
        log::debug!("[PUSH] Registering endpoint at url={}", url);
        let response = self
            .auth
            .apply_to_request(self.http_client.post(&url))
            .json(record)
            .send()
            .await?;
        Self::check_status(response).await?;
        Ok(())
    }

    /// Delete the server-side record for a push endpoint.
    pub async fn unregister_push_endpoint(&self, endpoint: &str) -> Result<()> {
        let url = format!("{}/v1/api/push/endpoints", self.base_url);
        log::debug!("[PUSH] Unregistering endpoint at url={}", url);
        let response = self
            .auth
            .apply_to_request(self.http_client.delete(&url))
            .json(&serde_json::json!({ "endpoint": endpoint }))
            .send()
            .await?;
        Self::check_status(response).await?;
        Ok(())
    }

    /// Map non-success statuses onto the error taxonomy. 401/403 become
    /// [`HearthLinkError::AuthRejected`] so callers can force
    /// re-authentication instead of retrying.
    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response
            .text()
            .await
            .unwrap_or_else(|_| status.to_string());
        if status == reqwest::StatusCode::UNAUTHORIZED
            || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(HearthLinkError::AuthRejected(message));
        }
        Err(HearthLinkError::ApiError {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl CredentialSource for HearthLinkClient {
    async fn fetch_credential(&self) -> Result<MediaCredential> {
        self.fetch_media_credential().await
    }
}

#[async_trait]
impl PushEndpointRegistry for HearthLinkClient {
    async fn register_endpoint(&self, record: &PushSubscriptionRecord) -> Result<()> {
        self.register_push_endpoint(record).await
    }

    async fn unregister_endpoint(&self, endpoint: &str) -> Result<()> {
        self.unregister_push_endpoint(endpoint).await
    }
}

/// Builder for configuring [`HearthLinkClient`] instances.
pub struct HearthLinkClientBuilder {
    base_url: Option<String>,
    auth: AuthProvider,
    timeouts: HearthLinkTimeouts,
}

impl HearthLinkClientBuilder {
    fn new() -> Self {
        Self {
            base_url: None,
            auth: AuthProvider::none(),
            timeouts: HearthLinkTimeouts::default(),
        }
    }

    /// Set the base URL of the portal server.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        let mut url = url.into();
        while url.ends_with('/') {
            url.pop();
        }
        self.base_url = Some(url);
        self
    }

    /// Set bearer token authentication.
    pub fn bearer_token(mut self, token: impl Into<String>) -> Self {
        self.auth = AuthProvider::bearer_token(token.into());
        self
    }

    /// Set authentication provider directly.
    ///
    /// Allows setting any [`AuthProvider`] variant including BasicAuth.
    pub fn auth(mut self, auth: AuthProvider) -> Self {
        self.auth = auth;
        self
    }

    /// Set comprehensive timeout configuration for all operations.
    pub fn timeouts(mut self, timeouts: HearthLinkTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<HearthLinkClient> {
        let base_url = self
            .base_url
            .ok_or_else(|| HearthLinkError::ConfigurationError("base_url is required".into()))?;

        // Keep-alive pooling: feed refreshes and credential renewals hit the
        // same host repeatedly.
        let http_client = reqwest::Client::builder()
            .timeout(self.timeouts.request_timeout)
            .connect_timeout(self.timeouts.connection_timeout)
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(std::time::Duration::from_secs(90))
            .build()
            .map_err(|e| HearthLinkError::ConfigurationError(e.to_string()))?;

        Ok(HearthLinkClient {
            base_url,
            http_client,
            auth: self.auth,
            timeouts: self.timeouts,
        })
    }
}
