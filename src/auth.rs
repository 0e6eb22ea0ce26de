//! Session authentication for the Hearth REST and live-transport endpoints.
//!
//! Handles bearer tokens (the normal portal session) and HTTP Basic Auth
//! (local development servers). The provider attaches the appropriate
//! `Authorization` header to both REST requests and the WebSocket upgrade
//! request.

use crate::error::{HearthLinkError, Result};
use base64::{engine::general_purpose, Engine as _};

/// Authentication credentials for the portal server.
///
/// # Examples
///
/// ```rust
/// use hearth_link::AuthProvider;
///
/// // Bearer token from the portal session (recommended)
/// let auth = AuthProvider::bearer_token("eyJhbGc...".to_string());
///
/// // HTTP Basic Auth for local development
/// let auth = AuthProvider::basic_auth("alice".to_string(), "secret".to_string());
///
/// // No authentication
/// let auth = AuthProvider::none();
/// ```
#[derive(Debug, Clone)]
pub enum AuthProvider {
    /// Bearer token authentication (portal session token)
    BearerToken(String),

    /// HTTP Basic Auth (username, password)
    BasicAuth(String, String),

    /// No authentication
    None,
}

impl AuthProvider {
    /// Create bearer token authentication.
    pub fn bearer_token(token: String) -> Self {
        Self::BearerToken(token)
    }

    /// Create HTTP Basic Auth.
    ///
    /// Encodes username:password as base64 for the `Authorization: Basic`
    /// header following RFC 7617.
    pub fn basic_auth(username: String, password: String) -> Self {
        Self::BasicAuth(username, password)
    }

    /// No authentication.
    pub fn none() -> Self {
        Self::None
    }

    /// The `Authorization` header value for this provider, if any.
    pub fn header_value(&self) -> Option<String> {
        match self {
            Self::BearerToken(token) => Some(format!("Bearer {}", token)),
            Self::BasicAuth(username, password) => {
                let credentials = format!("{}:{}", username, password);
                let encoded = general_purpose::STANDARD.encode(credentials.as_bytes());
                Some(format!("Basic {}", encoded))
            },
            Self::None => None,
        }
    }

    /// Attach authentication headers to an HTTP request builder.
    pub fn apply_to_request(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.header_value() {
            Some(value) => request.header("Authorization", value),
            None => request,
        }
    }

    /// Attach authentication headers to a WebSocket upgrade request.
    pub fn apply_to_ws_request(
        &self,
        request: &mut tokio_tungstenite::tungstenite::handshake::client::Request,
    ) -> Result<()> {
        if let Some(value) = self.header_value() {
            let header = value.parse().map_err(|e| {
                HearthLinkError::ConfigurationError(format!("Invalid auth header: {}", e))
            })?;
            request.headers_mut().insert("Authorization", header);
        }
        Ok(())
    }

    /// Check if authentication is configured.
    pub fn is_authenticated(&self) -> bool {
        !matches!(self, Self::None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_provider_creation() {
        let bearer = AuthProvider::bearer_token("test_token".to_string());
        assert!(bearer.is_authenticated());

        let basic = AuthProvider::basic_auth("alice".to_string(), "secret".to_string());
        assert!(basic.is_authenticated());

        let none = AuthProvider::none();
        assert!(!none.is_authenticated());
    }

    #[test]
    fn test_bearer_header_value() {
        let auth = AuthProvider::bearer_token("abc123".to_string());
        assert_eq!(auth.header_value(), Some("Bearer abc123".to_string()));
    }

    #[test]
    fn test_basic_auth_base64_format() {
        let auth = AuthProvider::basic_auth("alice".to_string(), "secret123".to_string());
        assert_eq!(
            auth.header_value(),
            Some("Basic YWxpY2U6c2VjcmV0MTIz".to_string())
        );
    }

    #[test]
    fn test_none_has_no_header() {
        assert_eq!(AuthProvider::none().header_value(), None);
    }
}
