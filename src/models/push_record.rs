use serde::{Deserialize, Serialize};

/// Platform-issued push endpoint descriptor, mirrored to the server.
///
/// Created on opt-in, deleted on opt-out or logout. The platform may
/// silently invalidate it; that is detected lazily on the next
/// subscription check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushSubscriptionRecord {
    /// Push service endpoint URL.
    pub endpoint: String,

    /// Client public key (p256dh), base64url-encoded.
    pub p256dh_key: String,

    /// Authentication secret, base64url-encoded.
    pub auth_key: String,
}

impl PushSubscriptionRecord {
    /// Create a record from platform registration output.
    pub fn new(
        endpoint: impl Into<String>,
        p256dh_key: impl Into<String>,
        auth_key: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            p256dh_key: p256dh_key.into(),
            auth_key: auth_key.into(),
        }
    }
}
