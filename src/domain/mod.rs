//! Domain layer types for the marketplace messaging engine.
//!
//! This module contains the core domain types used throughout the crate:
//! users, conversations, messages, and property inquiries.

mod conversation;
mod inquiry;
mod message;
mod types;
mod user;

pub use conversation::{sort_by_activity, Conversation};
pub use inquiry::{
    ActivityEvent, ActivityKind, InquiryDashboardSnapshot, InquiryOverview, InquiryPerformance,
    InquiryPriority, InquiryStatus, InquiryThread, PropertyRef,
};
pub use message::{AttachmentRef, Delivery, Message};
pub use types::{ConversationId, CorrelationKey, InquiryId, MessageId, PropertyId, UserId};
pub use user::{UserRef, UserType};
