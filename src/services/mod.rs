//! Business services layer.
//!
//! This module contains the engine that keeps conversations, messages, unread
//! counts and inquiry statistics consistent with the backend.
//!
//! # Architecture
//!
//! Services sit between the application layer and the backend client:
//!
//! ```text
//! Application Layer (Session)
//!          |
//!          v
//!    Services Layer  <-- You are here
//!          |
//!          v
//!    Providers (MessagingApi)
//! ```
//!
//! # Services Overview
//!
//! - [`ConversationStore`]: Owns conversations and the active conversation's messages
//! - [`MessageReconciler`]: Tracks optimistic sends until they are confirmed or fail
//! - [`UnreadCounter`]: Folds mark-read settlements into unread counts
//! - [`AttachmentValidator`]: Rejects attachments before any network call
//! - [`InquiryStatsService`]: Fetches dashboard snapshots, with [`InquiryStatsAggregator`] views

mod attachment_validator;
mod conversation_store;
mod inquiry_stats;
mod message_reconciler;
mod unread_counter;

pub use attachment_validator::{AttachmentCandidate, AttachmentError, AttachmentValidator};
pub use conversation_store::{
    ConversationStore, MarkAllReadReport, StoreError, StoreEvent, StoreResult,
};
pub use inquiry_stats::{
    conversion_rate_severity, response_rate_severity, response_time_severity,
    DistributionBucket, InquiryStatsAggregator, InquiryStatsService, Severity, StatsError,
    StatsResult,
};
pub use message_reconciler::{MessageReconciler, Resolution, SendOutcome};
pub use unread_counter::{ReadIntent, ReadSettlement, UnreadCounter};
