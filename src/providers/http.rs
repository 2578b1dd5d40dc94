//! REST implementation of [`MessagingApi`].
//!
//! Endpoints, relative to the configured base URL:
//! - `GET  conversations`
//! - `GET  conversations/{id}/messages`
//! - `POST conversations/{id}/messages`
//! - `POST messages/{id}/read`
//! - `GET  inquiries/stats`

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use url::Url;

use super::{ApiError, ApiResult, MessagingApi, OutgoingMessage, SentMessage};
use crate::config::ApiSettings;
use crate::domain::{
    AttachmentRef, Conversation, ConversationId, InquiryDashboardSnapshot, Message, MessageId,
    UserRef,
};

/// Message as returned by the backend.
#[derive(Debug, Deserialize)]
struct WireMessage {
    id: MessageId,
    sender: UserRef,
    receiver: UserRef,
    content: String,
    #[serde(default)]
    attachment: Option<AttachmentRef>,
    #[serde(default)]
    is_read: bool,
    created_at: DateTime<Utc>,
    #[serde(default)]
    subject: Option<String>,
}

impl WireMessage {
    fn into_message(self, conversation_id: &ConversationId) -> Message {
        let mut message = Message::confirmed(
            self.id,
            conversation_id.clone(),
            self.sender,
            self.receiver,
            self.content,
            self.is_read,
            self.created_at,
        );
        message.attachment = self.attachment;
        message.subject = self.subject;
        message
    }
}

/// Messaging backend reached over HTTP.
pub struct HttpMessagingApi {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpMessagingApi {
    /// Creates a client for the configured endpoint.
    pub fn new(settings: &ApiSettings) -> ApiResult<Self> {
        let mut raw = settings.base_url.trim_end_matches('/').to_string();
        raw.push('/');
        let base_url = Url::parse(&raw)
            .map_err(|e| ApiError::Validation(format!("invalid base url {raw}: {e}")))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| ApiError::Network(format!("client setup: {e}")))?;

        Ok(Self { client, base_url })
    }

    /// Resolves an endpoint path against the base URL.
    fn endpoint(&self, path: &str) -> ApiResult<Url> {
        self.base_url
            .join(path)
            .map_err(|e| ApiError::Validation(format!("invalid endpoint {path}: {e}")))
    }

    async fn get<T: for<'de> Deserialize<'de>>(&self, path: &str) -> ApiResult<T> {
        let response = self
            .client
            .get(self.endpoint(path)?)
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        Self::handle_response(response).await
    }

    async fn post<T: for<'de> Deserialize<'de>, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> ApiResult<T> {
        let response = self
            .client
            .post(self.endpoint(path)?)
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .json(body)
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        Self::handle_response(response).await
    }

    async fn post_no_response(&self, path: &str) -> ApiResult<()> {
        let response = self
            .client
            .post(self.endpoint(path)?)
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::handle_error(response).await);
        }
        Ok(())
    }

    async fn handle_response<T: for<'de> Deserialize<'de>>(
        response: reqwest::Response,
    ) -> ApiResult<T> {
        if !response.status().is_success() {
            return Err(Self::handle_error(response).await);
        }

        response
            .json()
            .await
            .map_err(|e| ApiError::Decode(format!("parse response: {e}")))
    }

    async fn handle_error(response: reqwest::Response) -> ApiError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        error_for_status(status, body)
    }
}

/// Maps a non-success HTTP status to the engine's error taxonomy.
fn error_for_status(status: u16, body: String) -> ApiError {
    match status {
        404 => ApiError::NotFound(body),
        409 => ApiError::Conflict(body),
        400 | 422 => ApiError::Validation(body),
        _ => ApiError::Server {
            status,
            message: body,
        },
    }
}

#[async_trait]
impl MessagingApi for HttpMessagingApi {
    async fn fetch_conversations(&self) -> ApiResult<Vec<Conversation>> {
        self.get("conversations").await
    }

    async fn fetch_messages(&self, conversation_id: &ConversationId) -> ApiResult<Vec<Message>> {
        let wire: Vec<WireMessage> = self
            .get(&format!("conversations/{conversation_id}/messages"))
            .await?;
        Ok(wire
            .into_iter()
            .map(|m| m.into_message(conversation_id))
            .collect())
    }

    async fn send_message(&self, message: &OutgoingMessage) -> ApiResult<SentMessage> {
        let sent: SentMessage = self
            .post(
                &format!("conversations/{}/messages", message.conversation_id),
                message,
            )
            .await?;
        tracing::debug!(message_id = %sent.id, "Message accepted by backend");
        Ok(sent)
    }

    async fn mark_message_read(&self, message_id: &MessageId) -> ApiResult<()> {
        self.post_no_response(&format!("messages/{message_id}/read"))
            .await
    }

    async fn fetch_inquiry_stats(&self) -> ApiResult<InquiryDashboardSnapshot> {
        self.get("inquiries/stats").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(base: &str) -> HttpMessagingApi {
        HttpMessagingApi::new(&ApiSettings {
            base_url: base.to_string(),
            timeout_secs: 5,
        })
        .unwrap()
    }

    #[test]
    fn endpoint_keeps_base_path() {
        let api = api("https://example.com/api");
        assert_eq!(
            api.endpoint("conversations/7/messages").unwrap().as_str(),
            "https://example.com/api/conversations/7/messages"
        );
    }

    #[test]
    fn endpoint_tolerates_trailing_slash() {
        let api = api("https://example.com/api/");
        assert_eq!(
            api.endpoint("inquiries/stats").unwrap().as_str(),
            "https://example.com/api/inquiries/stats"
        );
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let result = HttpMessagingApi::new(&ApiSettings {
            base_url: "not a url".to_string(),
            timeout_secs: 5,
        });
        assert!(matches!(result, Err(ApiError::Validation(_))));
    }

    #[test]
    fn status_mapping() {
        assert!(matches!(
            error_for_status(404, String::new()),
            ApiError::NotFound(_)
        ));
        assert!(matches!(
            error_for_status(409, String::new()),
            ApiError::Conflict(_)
        ));
        assert!(matches!(
            error_for_status(422, String::new()),
            ApiError::Validation(_)
        ));
        assert!(matches!(
            error_for_status(500, String::new()),
            ApiError::Server { status: 500, .. }
        ));
    }

    #[test]
    fn wire_message_becomes_confirmed() {
        let json = r#"{
            "id": "m-9",
            "sender": {"id": "u-1", "first_name": "Ana", "last_name": "Lima", "email": "ana@example.com", "user_type": "buyer"},
            "receiver": {"id": "u-2", "first_name": "Ben", "last_name": "Ito", "email": "ben@example.com", "user_type": "seller"},
            "content": "Is it still available?",
            "created_at": "2024-05-01T10:00:00Z"
        }"#;
        let wire: WireMessage = serde_json::from_str(json).unwrap();
        let message = wire.into_message(&ConversationId::from("c-1"));

        assert_eq!(message.id(), Some(&MessageId::from("m-9")));
        assert_eq!(message.correlation_key.as_str(), "srv:m-9");
        assert!(!message.is_read);
        assert_eq!(message.conversation_id.as_str(), "c-1");
    }

    #[tokio::test]
    async fn unreachable_host_is_a_network_error() {
        let api = api("http://127.0.0.1:9");
        let result = api.fetch_conversations().await;
        assert!(matches!(result, Err(ApiError::Network(_))));
    }
}
