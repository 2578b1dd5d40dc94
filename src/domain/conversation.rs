//! Conversation domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ConversationId, Message, UserRef};

/// A direct conversation between two marketplace users.
///
/// Messages are not embedded: only the active conversation has its messages
/// resident, and those are owned by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    /// Server-assigned id.
    pub id: ConversationId,
    /// Everyone in the conversation, including the current user.
    pub participants: Vec<UserRef>,
    /// The counterpart shown in the conversation list.
    pub other_user: UserRef,
    /// Preview of the latest message.
    pub last_message_content: String,
    /// Time of the latest message.
    pub last_message_time: DateTime<Utc>,
    /// Messages from others not yet read by the current user.
    pub unread_count: u32,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
    /// Optional subject, set for inquiry-backed conversations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
}

impl Conversation {
    /// Returns true if the conversation has unread messages.
    pub fn has_unread(&self) -> bool {
        self.unread_count > 0
    }

    /// Updates the list preview after a message is confirmed.
    ///
    /// Out-of-order confirmations never move the preview backwards in time.
    pub fn record_activity(&mut self, message: &Message) {
        if message.created_at >= self.last_message_time {
            self.last_message_content = message.content.clone();
            self.last_message_time = message.created_at;
        }
        if message.created_at > self.updated_at {
            self.updated_at = message.created_at;
        }
    }
}

/// Sorts conversations most-recent-activity first.
pub fn sort_by_activity(conversations: &mut [Conversation]) {
    conversations.sort_by(|a, b| b.last_message_time.cmp(&a.last_message_time));
}
