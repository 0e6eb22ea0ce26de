//! Data models shared across the hearth-link components.

mod connection_options;
mod connection_state;
mod conversation;
mod feed;
mod live_event;
mod media_credential;
mod push_record;

pub use connection_options::ConnectionOptions;
pub use connection_state::ConnectionState;
pub use conversation::{ConversationSummary, ConversationsResponse};
pub use feed::{FeedId, FeedItem, FeedSnapshot, NotificationsResponse};
pub use live_event::{LiveEvent, LiveEventKind};
pub use media_credential::{MediaCredential, MediaCredentialResponse};
pub use push_record::PushSubscriptionRecord;
