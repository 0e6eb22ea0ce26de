use serde::{Deserialize, Serialize};

use super::feed::{FeedId, FeedItem};

/// One conversation in the user's conversation list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSummary {
    /// Feed identifier for this conversation.
    pub feed: FeedId,

    /// Display title (room name or participant names).
    pub title: String,

    /// Most recent messages, newest first.
    #[serde(default)]
    pub items: Vec<FeedItem>,

    /// Server-reported watermark for this conversation.
    pub last_seq: u64,
}

/// REST payload for the conversation list endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationsResponse {
    /// The user's conversations, most recently active first.
    pub conversations: Vec<ConversationSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_conversation_list() {
        let raw = json!({
            "conversations": [
                {"feed": "conversation:1", "title": "Class 3b", "last_seq": 40},
                {"feed": "conversation:2", "title": "Cleaning roster", "last_seq": 7,
                 "items": [{"id": "m-1", "body": {"text": "done"}}]}
            ]
        });

        let response: ConversationsResponse = serde_json::from_value(raw).unwrap();
        assert_eq!(response.conversations.len(), 2);
        assert_eq!(response.conversations[0].items.len(), 0);
        assert_eq!(response.conversations[1].items[0].id, "m-1");
    }
}
