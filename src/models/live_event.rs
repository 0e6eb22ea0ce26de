use serde::{Deserialize, Serialize};

use super::feed::{FeedId, FeedItem};

/// Event pushed by the server over the live connection.
///
/// Transient: consumed by the reconciler and not stored beyond that. The
/// `seq` is server-assigned and monotonically increasing *per feed*; no
/// ordering is guaranteed across feeds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveEvent {
    /// Feed (conversation or notification feed) the event belongs to.
    pub feed: FeedId,

    /// Per-feed monotonically increasing sequence number.
    pub seq: u64,

    /// Event payload.
    #[serde(flatten)]
    pub kind: LiveEventKind,
}

/// Payload variants for [`LiveEvent`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LiveEventKind {
    /// A new chat message arrived in a conversation feed.
    NewMessage {
        /// The message item.
        item: FeedItem,
    },

    /// A new notification arrived in the user's notification feed.
    NewNotification {
        /// The notification item.
        item: FeedItem,
    },

    /// An item was read (possibly on another device of the same user).
    ReadReceipt {
        /// Item that was read.
        item_id: String,
        /// User who read it.
        reader_id: String,
    },

    /// A participant went online or offline.
    PresenceChange {
        /// User whose presence changed.
        user_id: String,
        /// Current presence.
        online: bool,
    },
}

impl LiveEvent {
    /// Construct an event for a feed.
    pub fn new(feed: impl Into<FeedId>, seq: u64, kind: LiveEventKind) -> Self {
        Self {
            feed: feed.into(),
            seq,
            kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_message_wire_format() {
        let raw = json!({
            "feed": "conversation:42",
            "seq": 17,
            "kind": "new_message",
            "item": {"id": "msg-9", "author_id": "user-3", "body": {"text": "hi"}}
        });

        let event: LiveEvent = serde_json::from_value(raw).unwrap();
        assert_eq!(event.feed.as_str(), "conversation:42");
        assert_eq!(event.seq, 17);
        match &event.kind {
            LiveEventKind::NewMessage { item } => {
                assert_eq!(item.id, "msg-9");
                assert_eq!(item.author_id.as_deref(), Some("user-3"));
            },
            other => panic!("expected NewMessage, got {:?}", other),
        }
    }

    #[test]
    fn test_presence_change_wire_format() {
        let raw = json!({
            "feed": "conversation:42",
            "seq": 3,
            "kind": "presence_change",
            "user_id": "user-8",
            "online": true
        });

        let event: LiveEvent = serde_json::from_value(raw).unwrap();
        assert_eq!(
            event.kind,
            LiveEventKind::PresenceChange {
                user_id: "user-8".to_string(),
                online: true
            }
        );
    }

    #[test]
    fn test_read_receipt_round_trip() {
        let event = LiveEvent::new(
            "notifications:user-1",
            21,
            LiveEventKind::ReadReceipt {
                item_id: "n-5".to_string(),
                reader_id: "user-1".to_string(),
            },
        );

        let json = serde_json::to_string(&event).unwrap();
        let parsed: LiveEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, event);
    }
}
