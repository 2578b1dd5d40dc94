//! Messaging backend collaborators.
//!
//! - [`MessagingApi`] - the async contract the engine consumes
//! - [`HttpMessagingApi`] - REST implementation over `reqwest`
//!
//! # Example
//!
//! ```ignore
//! use dealroom::providers::{HttpMessagingApi, MessagingApi};
//!
//! async fn count(api: &dyn MessagingApi) -> usize {
//!     api.fetch_conversations().await.map(|c| c.len()).unwrap_or(0)
//! }
//! ```

mod http;
mod traits;

pub use http::HttpMessagingApi;
#[cfg(test)]
pub use traits::MockMessagingApi;
pub use traits::{
    ApiError, ApiResult, MessagingApi, OutgoingAttachment, OutgoingMessage, SentMessage,
};
