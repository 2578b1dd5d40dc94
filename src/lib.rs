//! dealroom - Conversation and inquiry state engine for a property marketplace
//!
//! This crate keeps a client's view of buyer/seller/agent conversations
//! consistent with the backend: optimistic sends, unread counts, attachment
//! checks and the inquiry statistics dashboard.

pub mod app;
pub mod config;
pub mod domain;
pub mod providers;
pub mod services;

pub use app::Session;
