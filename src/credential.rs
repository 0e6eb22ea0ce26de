//! Short-lived media credential management.
//!
//! The portal serves protected media (photos, attachments) through URLs
//! signed with a short-lived token. [`CredentialRefresher`] owns that token
//! for the session: it fetches it, schedules a renewal before expiry, and
//! signs resource URLs for consumers.
//!
//! Policies:
//!
//! - Renewal fires at 80% of the credential lifetime, so one missed attempt
//!   still leaves margin before hard expiry.
//! - A failed fetch clears the cached credential and does not reschedule;
//!   the next consumer that needs a credential triggers `fetch` again.
//!   Session-level rejections (`AuthRejected`) are propagated.
//! - Racing fetches are last-writer-wins: each success stores its own
//!   credential and reschedules from it. Credential correctness only
//!   requires "not expired", not "most recently requested".
//! - `clear` cancels the pending renewal synchronously and invalidates any
//!   in-flight fetch, so a logout followed by a new login cannot be touched
//!   by a stale timer or response.

use crate::error::Result;
use crate::models::MediaCredential;
use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;

/// Source of fresh media credentials (the REST client in production).
#[async_trait]
pub trait CredentialSource: Send + Sync + 'static {
    /// Request a new credential from the server.
    async fn fetch_credential(&self) -> Result<MediaCredential>;
}

struct RefresherInner {
    credential: Option<MediaCredential>,
    /// Bumped by `clear`. A fetch that resolves against an older epoch is
    /// discarded instead of resurrecting state for a torn-down session.
    epoch: u64,
    renewal: Option<JoinHandle<()>>,
}

/// Session-scoped owner of the media credential.
///
/// Cheap to clone; clones share the same cached credential and renewal
/// timer.
#[derive(Clone)]
pub struct CredentialRefresher {
    source: Arc<dyn CredentialSource>,
    inner: Arc<Mutex<RefresherInner>>,
}

impl CredentialRefresher {
    /// Create a refresher over a credential source. No fetch is performed
    /// until [`fetch`](Self::fetch) is called.
    pub fn new(source: Arc<dyn CredentialSource>) -> Self {
        Self {
            source,
            inner: Arc::new(Mutex::new(RefresherInner {
                credential: None,
                epoch: 0,
                renewal: None,
            })),
        }
    }

    /// Fetch a new credential and schedule its renewal.
    ///
    /// On success the credential is cached and a renewal is scheduled at
    /// 80% of its lifetime. On transient failure the cached credential is
    /// cleared (callers must never read a token the server may have
    /// invalidated) and `Ok(None)` is returned; `AuthRejected` propagates.
    ///
    /// Boxed because the scheduled renewal calls `fetch` again; the
    /// indirection keeps the recursive future sized and `Send`.
    pub fn fetch(&self) -> Pin<Box<dyn Future<Output = Result<Option<MediaCredential>>> + Send + '_>> {
        Box::pin(self.fetch_inner())
    }

    async fn fetch_inner(&self) -> Result<Option<MediaCredential>> {
        let started_epoch = self.lock().epoch;

        match self.source.fetch_credential().await {
            Ok(credential) => {
                let mut inner = self.lock();
                if inner.epoch != started_epoch {
                    log::debug!(
                        "[hearth-link] Discarding credential fetched before clear()",
                    );
                    return Ok(None);
                }

                if let Some(old) = inner.renewal.take() {
                    old.abort();
                }

                let renew_at = credential.renew_at();
                inner.credential = Some(credential.clone());

                let this = self.clone();
                inner.renewal = Some(tokio::spawn(async move {
                    tokio::time::sleep_until(renew_at).await;
                    log::debug!("[hearth-link] Scheduled credential renewal firing");
                    if let Err(e) = this.fetch().await {
                        log::warn!("[hearth-link] Scheduled credential renewal failed: {}", e);
                    }
                }));

                Ok(Some(credential))
            },
            Err(e) => {
                {
                    let mut inner = self.lock();
                    if inner.epoch == started_epoch {
                        inner.credential = None;
                        if let Some(old) = inner.renewal.take() {
                            old.abort();
                        }
                    }
                }

                if e.is_auth_rejected() {
                    return Err(e);
                }
                log::warn!("[hearth-link] Media credential fetch failed: {}", e);
                Ok(None)
            },
        }
    }

    /// The cached credential, if present and not expired.
    pub fn get(&self) -> Option<MediaCredential> {
        self.lock()
            .credential
            .clone()
            .filter(|credential| !credential.is_expired())
    }

    /// Discard the cached credential and cancel the pending renewal.
    ///
    /// Must be called on logout so a stale timer cannot fire against a new
    /// session's identity. Cancellation happens before this returns.
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.epoch += 1;
        inner.credential = None;
        if let Some(old) = inner.renewal.take() {
            old.abort();
        }
    }

    /// Append the current credential to a protected resource URL.
    ///
    /// Returns the URL unmodified when no valid credential is cached:
    /// best-effort degrade rather than blocking the caller.
    pub fn sign_url(&self, url: &str) -> String {
        match self.get() {
            Some(credential) => {
                let separator = if url.contains('?') { '&' } else { '?' };
                format!("{}{}token={}", url, separator, credential.token)
            },
            None => url.to_string(),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RefresherInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HearthLinkError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct FixedSource {
        fetches: AtomicUsize,
        ttl: Duration,
    }

    #[async_trait]
    impl CredentialSource for FixedSource {
        async fn fetch_credential(&self) -> Result<MediaCredential> {
            let n = self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(MediaCredential::new(format!("token-{}", n), self.ttl))
        }
    }

    struct FailingSource;

    #[async_trait]
    impl CredentialSource for FailingSource {
        async fn fetch_credential(&self) -> Result<MediaCredential> {
            Err(HearthLinkError::TransportError("no route".into()))
        }
    }

    #[tokio::test]
    async fn test_fetch_caches_credential() {
        let refresher = CredentialRefresher::new(Arc::new(FixedSource {
            fetches: AtomicUsize::new(0),
            ttl: Duration::from_secs(300),
        }));

        assert!(refresher.get().is_none());
        let credential = refresher.fetch().await.unwrap().unwrap();
        assert_eq!(credential.token, "token-0");
        assert_eq!(refresher.get().unwrap().token, "token-0");
    }

    #[tokio::test]
    async fn test_transient_failure_clears_credential() {
        let refresher = CredentialRefresher::new(Arc::new(FixedSource {
            fetches: AtomicUsize::new(0),
            ttl: Duration::from_secs(300),
        }));
        refresher.fetch().await.unwrap();
        assert!(refresher.get().is_some());

        let failing = CredentialRefresher {
            source: Arc::new(FailingSource),
            inner: refresher.inner.clone(),
        };
        let result = failing.fetch().await.unwrap();
        assert!(result.is_none());
        assert!(refresher.get().is_none());
    }

    #[tokio::test]
    async fn test_auth_rejected_propagates() {
        struct RejectingSource;

        #[async_trait]
        impl CredentialSource for RejectingSource {
            async fn fetch_credential(&self) -> Result<MediaCredential> {
                Err(HearthLinkError::AuthRejected("session expired".into()))
            }
        }

        let refresher = CredentialRefresher::new(Arc::new(RejectingSource));
        let err = refresher.fetch().await.unwrap_err();
        assert!(err.is_auth_rejected());
        assert!(refresher.get().is_none());
    }

    #[tokio::test]
    async fn test_sign_url() {
        let refresher = CredentialRefresher::new(Arc::new(FixedSource {
            fetches: AtomicUsize::new(0),
            ttl: Duration::from_secs(300),
        }));

        // No credential cached: URL passes through unchanged.
        assert_eq!(
            refresher.sign_url("https://portal.example.org/media/1.jpg"),
            "https://portal.example.org/media/1.jpg"
        );

        refresher.fetch().await.unwrap();
        assert_eq!(
            refresher.sign_url("https://portal.example.org/media/1.jpg"),
            "https://portal.example.org/media/1.jpg?token=token-0"
        );
        assert_eq!(
            refresher.sign_url("https://portal.example.org/media/1.jpg?w=64"),
            "https://portal.example.org/media/1.jpg?w=64&token=token-0"
        );
    }

    #[tokio::test]
    async fn test_clear_discards_credential() {
        let refresher = CredentialRefresher::new(Arc::new(FixedSource {
            fetches: AtomicUsize::new(0),
            ttl: Duration::from_secs(300),
        }));
        refresher.fetch().await.unwrap();
        refresher.clear();
        assert!(refresher.get().is_none());

        // clear on an empty refresher is a no-op
        refresher.clear();
    }

    #[tokio::test]
    async fn test_clear_invalidates_in_flight_fetch() {
        struct GatedSource {
            gate: tokio::sync::Notify,
        }

        #[async_trait]
        impl CredentialSource for GatedSource {
            async fn fetch_credential(&self) -> Result<MediaCredential> {
                self.gate.notified().await;
                Ok(MediaCredential::new(
                    "stale".to_string(),
                    Duration::from_secs(300),
                ))
            }
        }

        let source = Arc::new(GatedSource {
            gate: tokio::sync::Notify::new(),
        });
        let refresher = CredentialRefresher::new(source.clone());

        let in_flight = {
            let refresher = refresher.clone();
            tokio::spawn(async move { refresher.fetch().await })
        };
        tokio::task::yield_now().await;

        // Logout happens while the fetch is still on the wire.
        refresher.clear();
        source.gate.notify_one();

        let result = in_flight.await.unwrap().unwrap();
        assert!(result.is_none());
        assert!(refresher.get().is_none());
    }

    #[tokio::test]
    async fn test_later_fetch_wins() {
        let refresher = CredentialRefresher::new(Arc::new(FixedSource {
            fetches: AtomicUsize::new(0),
            ttl: Duration::from_secs(300),
        }));

        refresher.fetch().await.unwrap();
        refresher.fetch().await.unwrap();
        assert_eq!(refresher.get().unwrap().token, "token-1");
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_credential_is_not_returned() {
        // Plant a credential without a renewal timer so it can age out.
        let refresher = CredentialRefresher {
            source: Arc::new(FailingSource),
            inner: Arc::new(Mutex::new(RefresherInner {
                credential: Some(MediaCredential::new(
                    "old".to_string(),
                    Duration::from_secs(10),
                )),
                epoch: 0,
                renewal: None,
            })),
        };
        assert!(refresher.get().is_some());

        tokio::time::advance(Duration::from_secs(11)).await;
        assert!(refresher.get().is_none());
        // An expired credential must not be appended to URLs either.
        assert_eq!(refresher.sign_url("/media/1.jpg"), "/media/1.jpg");
    }
}
