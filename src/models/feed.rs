use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;

/// Identifier of an event feed: a conversation or a notification feed.
///
/// Server-issued opaque string, e.g. `"conversation:42"` or
/// `"notifications:user-7"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeedId(String);

impl FeedId {
    /// Wrap a raw feed identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Raw string representation.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FeedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for FeedId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for FeedId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A single item in a feed: a message or a notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedItem {
    /// Server-assigned item identifier.
    pub id: String,

    /// Author of the item, if any. Used to avoid counting the user's own
    /// content as unread.
    #[serde(default)]
    pub author_id: Option<String>,

    /// Whether the current user has already read this item.
    #[serde(default)]
    pub read: bool,

    /// Opaque item payload (title, body, attachment refs). Not interpreted
    /// by the sync core.
    #[serde(default)]
    pub body: JsonValue,
}

impl FeedItem {
    /// Create an item with an id and payload; unread, no author.
    pub fn new(id: impl Into<String>, body: JsonValue) -> Self {
        Self {
            id: id.into(),
            author_id: None,
            read: false,
            body,
        }
    }

    /// Set the author.
    pub fn with_author(mut self, author_id: impl Into<String>) -> Self {
        self.author_id = Some(author_id.into());
        self
    }

    /// Mark as already read.
    pub fn with_read(mut self, read: bool) -> Self {
        self.read = read;
        self
    }
}

/// Read-only snapshot of a reconciled feed, cloned out of the cache for
/// observers.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedSnapshot {
    /// Feed the snapshot belongs to.
    pub feed: FeedId,
    /// Items in display order (newest first).
    pub items: Vec<FeedItem>,
    /// Highest event sequence number already applied to this feed.
    pub last_seen_seq: u64,
    /// Number of unread items.
    pub unread_count: u32,
}

/// REST payload for a notification feed read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsResponse {
    /// Feed the items belong to.
    pub feed: FeedId,
    /// Items in display order (newest first).
    pub items: Vec<FeedItem>,
    /// Server-reported watermark: highest sequence covered by this read.
    pub last_seq: u64,
}
