//! Message domain types.
//!
//! A [`Message`] is either still in flight (pending or failed, no server id)
//! or confirmed by the server. [`Delivery`] carries the server id only in the
//! confirmed state, so a message can never claim an id it was not given.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ConversationId, CorrelationKey, MessageId, UserRef};

/// Delivery state of a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Delivery {
    /// Inserted locally, awaiting the server.
    Pending,
    /// Accepted by the server.
    Confirmed {
        /// Server-assigned id.
        id: MessageId,
    },
    /// The send failed. Kept visible until retried or dismissed.
    Failed {
        /// Human-readable failure reason.
        reason: String,
    },
}

/// A validated attachment reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentRef {
    /// File name as supplied by the user.
    pub file_name: String,
    /// MIME type inferred from the extension.
    pub content_type: String,
    /// Size in bytes.
    pub size_bytes: u64,
}

/// A single message in a conversation or inquiry thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Client-side key, stable for the lifetime of the entry.
    pub correlation_key: CorrelationKey,
    /// Conversation this message belongs to.
    pub conversation_id: ConversationId,
    /// Author.
    pub sender: UserRef,
    /// Recipient.
    pub receiver: UserRef,
    /// Text body.
    pub content: String,
    /// Optional attachment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<AttachmentRef>,
    /// Whether the receiver has read the message.
    pub is_read: bool,
    /// Creation time (local for pending, server for confirmed).
    pub created_at: DateTime<Utc>,
    /// Delivery state.
    pub delivery: Delivery,
    /// Subject line, used by inquiry threads.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
}

impl Message {
    /// Builds a message the server already knows about.
    #[allow(clippy::too_many_arguments)]
    pub fn confirmed(
        id: MessageId,
        conversation_id: ConversationId,
        sender: UserRef,
        receiver: UserRef,
        content: impl Into<String>,
        is_read: bool,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            correlation_key: CorrelationKey::for_server_id(&id),
            conversation_id,
            sender,
            receiver,
            content: content.into(),
            attachment: None,
            is_read,
            created_at,
            delivery: Delivery::Confirmed { id },
            subject: None,
        }
    }

    /// Attaches a file reference.
    pub fn with_attachment(mut self, attachment: AttachmentRef) -> Self {
        self.attachment = Some(attachment);
        self
    }

    /// Sets the subject line.
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Returns the server id, present only once confirmed.
    pub fn id(&self) -> Option<&MessageId> {
        match &self.delivery {
            Delivery::Confirmed { id } => Some(id),
            _ => None,
        }
    }

    /// Returns true while awaiting the server.
    pub fn is_pending(&self) -> bool {
        matches!(self.delivery, Delivery::Pending)
    }

    /// Returns true if the send failed.
    pub fn is_failed(&self) -> bool {
        matches!(self.delivery, Delivery::Failed { .. })
    }

    /// Returns true once confirmed.
    pub fn is_confirmed(&self) -> bool {
        matches!(self.delivery, Delivery::Confirmed { .. })
    }

    /// Returns true if this message counts toward `viewer`'s unread total.
    pub fn is_unread_for(&self, viewer: &super::UserId) -> bool {
        !self.is_read && &self.sender.id != viewer
    }
}
