//! Reconciliation of live events with REST-fetched feed state.
//!
//! Each feed (a conversation or the notification feed) carries a watermark:
//! the highest event sequence number already applied. REST reads `seed` a
//! feed wholesale and establish the watermark; live events `apply`
//! incrementally on top.
//!
//! Invariants:
//!
//! - the watermark is monotonically non-decreasing per feed
//! - an event with `seq <= watermark` is a duplicate (or an out-of-order
//!   replay) and is dropped without mutating items or unread counts
//! - a gap (`seq > watermark + 1`) is tolerated, not an error: the event is
//!   applied and the watermark advances; backfilling the gap is the job of
//!   the next full `seed` from a REST refresh

use crate::models::{FeedId, FeedItem, FeedSnapshot, LiveEvent, LiveEventKind};
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::watch;

/// Per-feed cached state.
#[derive(Debug, Clone, Default)]
struct FeedCache {
    /// Items in display order (newest first).
    items: Vec<FeedItem>,
    /// Highest event sequence number already applied.
    last_seen_seq: u64,
    /// Number of unread items.
    unread_count: u32,
}

/// Merges live events into locally cached feed collections.
///
/// Sits above the connection manager; the UI layer observes it through
/// [`snapshot`](Self::snapshot) and the change counter from
/// [`watch_changes`](Self::watch_changes).
pub struct NotificationReconciler {
    /// Identity of the session user; their own content never counts as
    /// unread.
    self_user: String,
    feeds: Mutex<HashMap<FeedId, FeedCache>>,
    /// Bumped on every mutation so observers can poll a versioned snapshot.
    version_tx: watch::Sender<u64>,
}

impl NotificationReconciler {
    /// Create an empty reconciler for the given session user.
    pub fn new(self_user: impl Into<String>) -> Self {
        let (version_tx, _) = watch::channel(0);
        Self {
            self_user: self_user.into(),
            feeds: Mutex::new(HashMap::new()),
            version_tx,
        }
    }

    /// Replace the cache for a feed wholesale after a REST read.
    ///
    /// `last_seq` is the server-reported watermark covered by the read.
    pub fn seed(&self, feed: impl Into<FeedId>, items: Vec<FeedItem>, last_seq: u64) {
        let feed = feed.into();
        let unread_count = items
            .iter()
            .filter(|item| !item.read && item.author_id.as_deref() != Some(self.self_user.as_str()))
            .count() as u32;

        {
            let mut feeds = self.lock();
            feeds.insert(
                feed,
                FeedCache {
                    items,
                    last_seen_seq: last_seq,
                    unread_count,
                },
            );
        }
        self.bump_version();
    }

    /// Apply one live event.
    ///
    /// Returns `true` if the event mutated the cache, `false` if it was
    /// dropped as a duplicate.
    pub fn apply(&self, event: LiveEvent) -> bool {
        let mutated = {
            let mut feeds = self.lock();

            if let Some(cache) = feeds.get(&event.feed) {
                if event.seq <= cache.last_seen_seq {
                    log::debug!(
                        "[hearth-link] Dropping duplicate event seq={} (watermark {}) for {}",
                        event.seq,
                        cache.last_seen_seq,
                        event.feed,
                    );
                    return false;
                }
            }
            let cache = feeds.entry(event.feed.clone()).or_default();

            match event.kind {
                LiveEventKind::NewMessage { item } | LiveEventKind::NewNotification { item } => {
                    self.merge_item(cache, item);
                },
                LiveEventKind::ReadReceipt { item_id, reader_id } => {
                    // Only the session user's own read receipts (e.g. from
                    // another device) affect local unread state.
                    if reader_id == self.self_user {
                        if let Some(item) =
                            cache.items.iter_mut().find(|item| item.id == item_id)
                        {
                            if !item.read {
                                item.read = true;
                                cache.unread_count = cache.unread_count.saturating_sub(1);
                            }
                        }
                    }
                },
                LiveEventKind::PresenceChange { .. } => {
                    // Presence is transient; nothing cached, but the
                    // watermark still advances below.
                },
            }

            cache.last_seen_seq = event.seq;
            true
        };

        if mutated {
            self.bump_version();
        }
        mutated
    }

    /// Prepend or update an item and adjust the unread count.
    fn merge_item(&self, cache: &mut FeedCache, item: FeedItem) {
        let own = item.author_id.as_deref() == Some(self.self_user.as_str());

        if let Some(existing) = cache.items.iter_mut().find(|e| e.id == item.id) {
            // Update in place; unread count is unaffected by edits.
            *existing = item;
            return;
        }

        if !item.read && !own {
            cache.unread_count += 1;
        }
        cache.items.insert(0, item);
    }

    /// Clone out the current state of one feed.
    pub fn snapshot(&self, feed: &FeedId) -> Option<FeedSnapshot> {
        let feeds = self.lock();
        feeds.get(feed).map(|cache| FeedSnapshot {
            feed: feed.clone(),
            items: cache.items.clone(),
            last_seen_seq: cache.last_seen_seq,
            unread_count: cache.unread_count,
        })
    }

    /// Unread count for one feed (0 when the feed is unknown).
    pub fn unread_count(&self, feed: &FeedId) -> u32 {
        self.lock().get(feed).map_or(0, |cache| cache.unread_count)
    }

    /// Total unread count across all feeds.
    pub fn total_unread(&self) -> u32 {
        self.lock().values().map(|cache| cache.unread_count).sum()
    }

    /// Subscribe to the change counter. The value increases on every
    /// mutation; observers re-read snapshots when it changes, so no update
    /// is ever missed.
    pub fn watch_changes(&self) -> watch::Receiver<u64> {
        self.version_tx.subscribe()
    }

    /// Drop all cached feeds (logout).
    pub fn reset(&self) {
        self.lock().clear();
        self.bump_version();
    }

    fn bump_version(&self) {
        self.version_tx.send_modify(|version| *version += 1);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<FeedId, FeedCache>> {
        self.feeds.lock().unwrap_or_else(|e| e.into_inner())
    }
}
