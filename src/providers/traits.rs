//! Messaging API collaborator trait definition.
//!
//! This module defines the [`MessagingApi`] trait, the engine's only view of
//! the remote marketplace backend. Implementations own transport concerns;
//! the engine only sees the logical request/response contract below.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{
    Conversation, ConversationId, InquiryDashboardSnapshot, Message, MessageId,
};

/// Result type alias for API operations.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Errors that can occur when talking to the messaging backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// Network or connection error. Transient and retryable.
    #[error("network error: {0}")]
    Network(String),

    /// The referenced conversation or message no longer exists.
    #[error("not found: {0}")]
    NotFound(String),

    /// The backend rejected the request payload.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The request conflicts with the current server state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Any other non-success response.
    #[error("server error ({status}): {message}")]
    Server {
        /// HTTP status or backend error code.
        status: u16,
        /// Response body or message.
        message: String,
    },

    /// The response could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),
}

/// A message to be sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    /// Target conversation.
    pub conversation_id: ConversationId,
    /// Text body.
    pub content: String,
    /// Optional subject, used by inquiry threads.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    /// Attachment payload, already validated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment: Option<OutgoingAttachment>,
}

/// An attachment to be uploaded with an outgoing message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutgoingAttachment {
    /// Filename for the attachment.
    pub file_name: String,
    /// MIME content type.
    pub content_type: String,
    /// Raw attachment data.
    #[serde(with = "base64_serde")]
    pub data: Vec<u8>,
}

/// The server's confirmation of a sent message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentMessage {
    /// Server-assigned id.
    pub id: MessageId,
    /// Server timestamp.
    pub created_at: DateTime<Utc>,
}

/// Remote messaging backend.
///
/// Every method is a suspension point for the engine. None of them retry.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessagingApi: Send + Sync {
    /// Fetches the conversation list for the current user.
    async fn fetch_conversations(&self) -> ApiResult<Vec<Conversation>>;

    /// Fetches all messages of a conversation, oldest first.
    async fn fetch_messages(&self, conversation_id: &ConversationId) -> ApiResult<Vec<Message>>;

    /// Sends a message and returns the server's confirmation.
    async fn send_message(&self, message: &OutgoingMessage) -> ApiResult<SentMessage>;

    /// Marks a single message as read.
    async fn mark_message_read(&self, message_id: &MessageId) -> ApiResult<()>;

    /// Fetches the inquiry dashboard statistics.
    async fn fetch_inquiry_stats(&self) -> ApiResult<InquiryDashboardSnapshot>;
}

mod base64_serde {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        STANDARD.encode(bytes).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> std::result::Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        STANDARD
            .decode(&s)
            .map_err(|e| serde::de::Error::custom(e.to_string()))
    }
}
