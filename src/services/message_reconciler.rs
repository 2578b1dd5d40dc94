//! Optimistic send reconciliation.
//!
//! The [`MessageReconciler`] owns the resident message list of the active
//! conversation. A send is a two-phase commit keyed by [`CorrelationKey`]:
//!
//! 1. [`MessageReconciler::begin_send`] appends a `Pending` entry at the tail
//!    and starts tracking its key.
//! 2. [`MessageReconciler::resolve`] applies the server outcome to that entry
//!    in place: `Confirmed` on success, `Failed` on error.
//!
//! The server id never takes part in matching. At most one entry carries a
//! given key, and confirmation always replaces and never appends.
//!
//! Local entries (pending or failed) of a conversation the user navigates away
//! from are parked and come back at the tail when it is selected again.

use std::collections::HashSet;

use chrono::Utc;

use crate::domain::{
    AttachmentRef, ConversationId, CorrelationKey, Delivery, Message, MessageId, UserRef,
};
use crate::providers::SentMessage;

/// Outcome of a send as reported by the backend.
#[derive(Debug, Clone, PartialEq)]
pub enum SendOutcome {
    /// The server accepted the message.
    Confirmed(SentMessage),
    /// The send failed with the given reason.
    Failed(String),
}

/// What [`MessageReconciler::resolve`] did.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// The entry was confirmed. It is either resident or parked in a
    /// conversation that is not active.
    Confirmed(Message),
    /// The entry was marked failed and kept as a visible marker.
    Failed(Message),
    /// The key is not tracked (cancelled, or never issued). Nothing changed.
    Discarded,
}

/// Holds the resident message list and tracks in-flight sends.
#[derive(Debug, Default)]
pub struct MessageReconciler {
    resident: Option<ConversationId>,
    entries: Vec<Message>,
    parked: Vec<Message>,
    in_flight: HashSet<CorrelationKey>,
}

impl MessageReconciler {
    /// Creates an empty reconciler with no resident conversation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the conversation whose messages are resident.
    pub fn resident_conversation(&self) -> Option<&ConversationId> {
        self.resident.as_ref()
    }

    /// Returns the resident messages in display order.
    pub fn messages(&self) -> &[Message] {
        &self.entries
    }

    /// Returns the resident messages for in-place read-state updates.
    pub(crate) fn messages_mut(&mut self) -> &mut [Message] {
        &mut self.entries
    }

    /// Returns the number of sends awaiting resolution.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Returns true if `key` is awaiting resolution.
    pub fn is_in_flight(&self, key: &CorrelationKey) -> bool {
        self.in_flight.contains(key)
    }

    /// Looks up a local or resident entry by key.
    pub fn find(&self, key: &CorrelationKey) -> Option<&Message> {
        self.entries
            .iter()
            .chain(self.parked.iter())
            .find(|m| &m.correlation_key == key)
    }

    /// Replaces the resident list with a freshly fetched one.
    ///
    /// Local entries of the outgoing conversation are parked. Parked entries
    /// of the incoming conversation are appended after the fetched messages.
    pub fn replace_resident(&mut self, conversation_id: ConversationId, fetched: Vec<Message>) {
        self.park_local_entries();

        let mut entries = fetched;
        let (returning, still_parked): (Vec<_>, Vec<_>) = std::mem::take(&mut self.parked)
            .into_iter()
            .partition(|m| m.conversation_id == conversation_id);
        self.parked = still_parked;
        entries.extend(returning);

        tracing::debug!(
            conversation_id = %conversation_id,
            count = entries.len(),
            "Resident messages replaced"
        );
        self.resident = Some(conversation_id);
        self.entries = entries;
    }

    /// Drops the resident list, parking any local entries.
    pub fn clear_resident(&mut self) {
        self.park_local_entries();
        self.entries.clear();
        self.resident = None;
    }

    /// Drops all state, including in-flight tracking.
    pub fn clear(&mut self) {
        self.resident = None;
        self.entries.clear();
        self.parked.clear();
        self.in_flight.clear();
    }

    /// Inserts an optimistic message and starts tracking it.
    ///
    /// The entry is appended to the tail of the resident list when
    /// `conversation_id` is resident, and parked otherwise.
    pub fn begin_send(
        &mut self,
        conversation_id: ConversationId,
        sender: UserRef,
        receiver: UserRef,
        content: String,
        attachment: Option<AttachmentRef>,
        subject: Option<String>,
    ) -> Message {
        let message = Message {
            correlation_key: CorrelationKey::generate(),
            conversation_id: conversation_id.clone(),
            sender,
            receiver,
            content,
            attachment,
            is_read: false,
            created_at: Utc::now(),
            delivery: Delivery::Pending,
            subject,
        };

        self.in_flight.insert(message.correlation_key.clone());
        if self.resident.as_ref() == Some(&conversation_id) {
            self.entries.push(message.clone());
        } else {
            self.parked.push(message.clone());
        }

        tracing::debug!(
            correlation_key = %message.correlation_key,
            conversation_id = %conversation_id,
            "Optimistic message inserted"
        );
        message
    }

    /// Applies the backend outcome of a tracked send.
    pub fn resolve(&mut self, key: &CorrelationKey, outcome: SendOutcome) -> Resolution {
        if !self.in_flight.remove(key) {
            tracing::warn!(correlation_key = %key, "Discarding resolution for untracked send");
            return Resolution::Discarded;
        }

        match outcome {
            SendOutcome::Confirmed(sent) => self.confirm(key, sent),
            SendOutcome::Failed(reason) => self.fail(key, reason),
        }
    }

    /// Cancels a pending send. Returns false if it already resolved.
    ///
    /// The entry is removed, and a late confirmation will be discarded.
    pub fn cancel(&mut self, key: &CorrelationKey) -> bool {
        if !self.in_flight.remove(key) {
            return false;
        }
        self.entries.retain(|m| &m.correlation_key != key);
        self.parked.retain(|m| &m.correlation_key != key);
        tracing::debug!(correlation_key = %key, "Pending send cancelled");
        true
    }

    /// Removes a failed entry, returning it so it can be resent.
    pub fn take_failed(&mut self, key: &CorrelationKey) -> Option<Message> {
        for list in [&mut self.entries, &mut self.parked] {
            if let Some(pos) = list
                .iter()
                .position(|m| &m.correlation_key == key && m.is_failed())
            {
                return Some(list.remove(pos));
            }
        }
        None
    }

    /// Removes a resident confirmed message the server no longer knows.
    pub fn remove_confirmed(&mut self, id: &MessageId) -> Option<Message> {
        let pos = self.entries.iter().position(|m| m.id() == Some(id))?;
        Some(self.entries.remove(pos))
    }

    fn confirm(&mut self, key: &CorrelationKey, sent: SentMessage) -> Resolution {
        let resident_pos = self.entries.iter().position(|m| &m.correlation_key == key);

        if let Some(pos) = resident_pos {
            // A refetch may have delivered the server copy before this confirmation.
            if let Some(existing) = self
                .entries
                .iter()
                .find(|m| m.id() == Some(&sent.id))
                .cloned()
            {
                self.entries.remove(pos);
                tracing::debug!(
                    correlation_key = %key,
                    message_id = %sent.id,
                    "Server copy already resident, dropped optimistic entry"
                );
                return Resolution::Confirmed(existing);
            }

            let entry = &mut self.entries[pos];
            entry.delivery = Delivery::Confirmed { id: sent.id };
            entry.created_at = sent.created_at;
            tracing::debug!(correlation_key = %key, "Message confirmed in place");
            return Resolution::Confirmed(entry.clone());
        }

        // Parked confirmations leave the local list: the next fetch of that
        // conversation includes the server copy.
        match self.parked.iter().position(|m| &m.correlation_key == key) {
            Some(pos) => {
                let mut message = self.parked.remove(pos);
                message.delivery = Delivery::Confirmed { id: sent.id };
                message.created_at = sent.created_at;
                tracing::debug!(correlation_key = %key, "Parked message confirmed");
                Resolution::Confirmed(message)
            }
            None => Resolution::Discarded,
        }
    }

    fn fail(&mut self, key: &CorrelationKey, reason: String) -> Resolution {
        let entry = self
            .entries
            .iter_mut()
            .chain(self.parked.iter_mut())
            .find(|m| &m.correlation_key == key);

        match entry {
            Some(message) => {
                message.delivery = Delivery::Failed { reason };
                tracing::debug!(correlation_key = %key, "Message marked failed");
                Resolution::Failed(message.clone())
            }
            None => Resolution::Discarded,
        }
    }

    fn park_local_entries(&mut self) {
        let local = self.entries.iter().filter(|m| !m.is_confirmed()).cloned();
        self.parked.extend(local);
    }
}
