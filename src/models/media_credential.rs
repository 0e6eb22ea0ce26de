use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;

/// Short-lived credential for authenticated media fetches.
///
/// Owned exclusively by the credential refresher; exists only in memory for
/// the session's lifetime and is replaced, never mutated, on each renewal.
#[derive(Debug, Clone)]
pub struct MediaCredential {
    /// Opaque token string appended to protected resource URLs.
    pub token: String,
    /// Absolute expiry instant.
    pub expires_at: Instant,
    /// Total lifetime the server granted, used to compute the renewal lead.
    pub lifetime: Duration,
}

/// Upper bound on an accepted credential lifetime (30 days). A larger
/// server-supplied TTL is clamped; unbounded values would overflow the
/// `Instant` arithmetic below.
const MAX_LIFETIME: Duration = Duration::from_secs(30 * 24 * 3600);

impl MediaCredential {
    /// Build a credential from a server response, anchored at `now`.
    pub fn new(token: String, lifetime: Duration) -> Self {
        let lifetime = lifetime.min(MAX_LIFETIME);
        Self {
            token,
            expires_at: Instant::now() + lifetime,
            lifetime,
        }
    }

    /// `true` once the hard expiry has passed.
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }

    /// Instant at which a renewal should fire: 80% of the total lifetime,
    /// so a single missed renewal attempt still leaves margin before hard
    /// expiry.
    pub fn renew_at(&self) -> Instant {
        let lead = self.lifetime.mul_f64(0.2);
        self.expires_at - lead
    }
}

/// REST payload for the media credential endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaCredentialResponse {
    /// Opaque token string.
    pub token: String,
    /// Lifetime in seconds.
    pub ttl_secs: u64,
}

impl From<MediaCredentialResponse> for MediaCredential {
    fn from(response: MediaCredentialResponse) -> Self {
        Self::new(response.token, Duration::from_secs(response.ttl_secs))
    }
}
