//! Error types for the hearth-link synchronization core.
//!
//! The taxonomy mirrors how failures are expected to behave:
//!
//! - [`Unsupported`](HearthLinkError::Unsupported): a platform capability is
//!   absent. Expected and non-fatal; components surface this as a boolean
//!   outcome rather than an error at their public boundary.
//! - [`TransportError`](HearthLinkError::TransportError): the live connection
//!   dropped or could not be opened. Retried via backoff by the connection
//!   manager.
//! - [`AuthRejected`](HearthLinkError::AuthRejected): the session itself is
//!   invalid. Never retried locally; propagated so the session layer can
//!   force re-authentication.
//!
//! No error from this crate should be fatal to the host application.

use thiserror::Error;

/// Errors that can occur in hearth-link operations.
#[derive(Debug, Error)]
pub enum HearthLinkError {
    /// Live transport failed (connect, read, or keepalive).
    #[error("Transport error: {0}")]
    TransportError(String),

    /// An operation exceeded its configured timeout.
    #[error("Timeout: {0}")]
    TimeoutError(String),

    /// The server rejected the session credentials (401/403).
    ///
    /// Propagated to the session layer; not retried locally.
    #[error("Authentication rejected: {0}")]
    AuthRejected(String),

    /// A required platform capability is absent.
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// The server returned a non-success status for a REST call.
    #[error("API error ({status}): {message}")]
    ApiError {
        /// HTTP status code returned by the server.
        status: u16,
        /// Response body or status text.
        message: String,
    },

    /// Invalid client configuration (builder misuse, bad URL).
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// HTTP-level failure from the REST client.
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// JSON encode/decode failure.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Invariant violation inside the crate (poisoned lock, dead task).
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl HearthLinkError {
    /// `true` when the error means the session must re-authenticate.
    pub fn is_auth_rejected(&self) -> bool {
        matches!(self, Self::AuthRejected(_))
    }

    /// `true` when retrying the operation may succeed (transient failures).
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::TransportError(_) | Self::TimeoutError(_) | Self::HttpError(_)
        )
    }
}

/// Result type alias for hearth-link operations.
pub type Result<T> = std::result::Result<T, HearthLinkError>;
