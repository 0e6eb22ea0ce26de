#![allow(dead_code)]
//! Shared fakes for integration tests. Each fake plugs into one of the
//! library's trait seams and records the calls made against it.

use async_trait::async_trait;
use hearth_link::{
    CredentialSource, HearthLinkClient, HearthLinkError, LiveEvent, LiveStream, LiveTransport,
    MediaCredential, PushEndpointRegistry, PushPermission, PushPlatform, PushSubscriptionRecord,
    Result,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// Capture library logs in test output when `RUST_LOG` is set. Safe to
/// call from every fixture; only the first call wins.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// REST client pointed at a dead address. Tests that exercise REST paths
/// expect the resulting errors to be tolerated, not to reach a server.
pub fn offline_client() -> HearthLinkClient {
    init_logging();
    HearthLinkClient::builder()
        .base_url("http://127.0.0.1:9")
        .bearer_token("test-token")
        .build()
        .unwrap()
}

// ── Live transport ───────────────────────────────────────────────────────────

enum OpenOutcome {
    Stream(mpsc::UnboundedReceiver<Result<LiveEvent>>),
    AuthRejected,
}

/// Scripted [`LiveTransport`]: each `push_stream`/`push_auth_rejected`
/// queues the outcome of one future `open` call. An open with an empty
/// script fails with a transport error, so "connection keeps failing" is
/// the default behavior.
#[derive(Default)]
pub struct FakeTransport {
    opens: AtomicUsize,
    script: Mutex<VecDeque<OpenOutcome>>,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        init_logging();
        Arc::new(Self::default())
    }

    /// Queue a successful open; events sent on the returned sender flow out
    /// of the stream. Dropping the sender ends the stream.
    pub fn push_stream(&self) -> mpsc::UnboundedSender<Result<LiveEvent>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().push_back(OpenOutcome::Stream(rx));
        tx
    }

    /// Queue an open that is rejected with an authentication error.
    pub fn push_auth_rejected(&self) {
        self.lock().push_back(OpenOutcome::AuthRejected);
    }

    /// Number of `open` calls made so far.
    pub fn open_attempts(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<OpenOutcome>> {
        self.script.lock().unwrap()
    }
}

#[async_trait]
impl LiveTransport for FakeTransport {
    async fn open(&self, _user_id: &str, _channels: &[String]) -> Result<Box<dyn LiveStream>> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        match self.lock().pop_front() {
            Some(OpenOutcome::Stream(rx)) => Ok(Box::new(FakeStream { rx })),
            Some(OpenOutcome::AuthRejected) => Err(HearthLinkError::AuthRejected(
                "session rejected".into(),
            )),
            None => Err(HearthLinkError::TransportError("connection refused".into())),
        }
    }
}

struct FakeStream {
    rx: mpsc::UnboundedReceiver<Result<LiveEvent>>,
}

#[async_trait]
impl LiveStream for FakeStream {
    async fn next_event(&mut self) -> Option<Result<LiveEvent>> {
        self.rx.recv().await
    }

    async fn close(&mut self) {
        self.rx.close();
    }
}

// ── Credential source ────────────────────────────────────────────────────────

/// Credential source handing out sequentially numbered tokens with a fixed
/// lifetime, counting fetches.
pub struct CountingCredentialSource {
    pub fetches: AtomicUsize,
    lifetime: Duration,
}

impl CountingCredentialSource {
    pub fn new(lifetime: Duration) -> Arc<Self> {
        init_logging();
        Arc::new(Self {
            fetches: AtomicUsize::new(0),
            lifetime,
        })
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialSource for CountingCredentialSource {
    async fn fetch_credential(&self) -> Result<MediaCredential> {
        let n = self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(MediaCredential::new(format!("token-{}", n), self.lifetime))
    }
}

// ── Push platform / registry ─────────────────────────────────────────────────

/// Platform with both capabilities present and permission already granted.
#[derive(Default)]
pub struct GrantedPushPlatform {
    registered: AtomicBool,
}

#[async_trait]
impl PushPlatform for GrantedPushPlatform {
    fn has_background_registration(&self) -> bool {
        true
    }

    fn has_push_messaging(&self) -> bool {
        true
    }

    fn permission(&self) -> PushPermission {
        PushPermission::Granted
    }

    async fn request_permission(&self) -> Result<PushPermission> {
        Ok(PushPermission::Granted)
    }

    async fn register(&self) -> Result<PushSubscriptionRecord> {
        self.registered.store(true, Ordering::SeqCst);
        Ok(PushSubscriptionRecord::new(
            "https://push.example.org/ep/it",
            "p256dh",
            "auth",
        ))
    }

    async fn unregister(&self) -> Result<()> {
        self.registered.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn current_registration(&self) -> Option<PushSubscriptionRecord> {
        if self.registered.load(Ordering::SeqCst) {
            Some(PushSubscriptionRecord::new(
                "https://push.example.org/ep/it",
                "p256dh",
                "auth",
            ))
        } else {
            None
        }
    }
}

/// Endpoint registry that accepts everything and counts calls.
#[derive(Default)]
pub struct RecordingRegistry {
    pub registered: AtomicUsize,
    pub unregistered: AtomicUsize,
}

#[async_trait]
impl PushEndpointRegistry for RecordingRegistry {
    async fn register_endpoint(&self, _record: &PushSubscriptionRecord) -> Result<()> {
        self.registered.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn unregister_endpoint(&self, _endpoint: &str) -> Result<()> {
        self.unregistered.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Let spawned tasks react to whatever the test just did. Paused-clock
/// tests advance time through the sleeps in those tasks.
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}
