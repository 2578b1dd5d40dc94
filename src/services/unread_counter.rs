//! Unread count bookkeeping.
//!
//! Counts change only by folding discrete settlement events into current
//! state: each confirmed mark-read flips one message and decrements its
//! conversation by one, if and only if that message was still unread and
//! authored by someone else. Because nothing is computed from a captured
//! earlier count, settlements commute and can arrive in any order.
//!
//! Conversations whose messages are not resident keep the ids last seen
//! unread, so a settlement against them is just as idempotent.

use std::collections::{HashMap, HashSet};

use crate::domain::{Conversation, ConversationId, Message, MessageId, UserId};

/// What to do with a mark-read request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadIntent {
    /// Call the backend.
    Issue,
    /// Already read, or authored by the current user. Nothing to do.
    AlreadyRead,
    /// An identical request is already in flight.
    InFlight,
    /// The message is not resident.
    NotResident,
}

/// Effect of a settled mark-read request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadSettlement {
    /// The message flipped to read and counts were updated.
    Applied,
    /// Confirmed, but the message was already read or no longer resident.
    Skipped,
    /// The backend refused. The message keeps its prior state.
    Failed,
}

/// Tracks unread counts for the signed-in user.
#[derive(Debug)]
pub struct UnreadCounter {
    current_user: UserId,
    in_flight: HashSet<MessageId>,
    detached: HashMap<ConversationId, HashSet<MessageId>>,
}

impl UnreadCounter {
    /// Creates a counter for `current_user`.
    pub fn new(current_user: UserId) -> Self {
        Self {
            current_user,
            in_flight: HashSet::new(),
            detached: HashMap::new(),
        }
    }

    /// Returns the signed-in user.
    pub fn current_user(&self) -> &UserId {
        &self.current_user
    }

    /// Counts messages from others that are still unread.
    pub fn count_unread(&self, messages: &[Message]) -> u32 {
        let count = messages
            .iter()
            .filter(|m| m.is_unread_for(&self.current_user))
            .count();
        u32::try_from(count).unwrap_or(u32::MAX)
    }

    /// Resets a conversation's count from its resident messages.
    pub fn recount(&mut self, conversation: &mut Conversation, messages: &[Message]) {
        self.detached.remove(&conversation.id);
        let count = self.count_unread(messages);
        if count != conversation.unread_count {
            tracing::debug!(
                conversation_id = %conversation.id,
                server = conversation.unread_count,
                resident = count,
                "Unread count reconciled from resident messages"
            );
        }
        conversation.unread_count = count;
    }

    /// Returns the ids of confirmed messages that count as unread.
    pub fn unread_subset(&self, messages: &[Message]) -> Vec<MessageId> {
        messages
            .iter()
            .filter(|m| m.is_unread_for(&self.current_user))
            .filter_map(|m| m.id().cloned())
            .collect()
    }

    /// Decides whether a mark-read request needs a backend call, and if so
    /// records it as in flight.
    pub fn begin(&mut self, messages: &[Message], id: &MessageId) -> ReadIntent {
        match messages.iter().find(|m| m.id() == Some(id)) {
            None => ReadIntent::NotResident,
            Some(m) if m.is_read || m.sender.id == self.current_user => ReadIntent::AlreadyRead,
            Some(_) if !self.in_flight.insert(id.clone()) => ReadIntent::InFlight,
            Some(_) => ReadIntent::Issue,
        }
    }

    /// Resets a non-resident conversation's count from a fetch of its
    /// messages, returning the ids that count as unread.
    pub fn reset_detached(
        &mut self,
        conversation: &mut Conversation,
        messages: &[Message],
    ) -> Vec<MessageId> {
        let unread = self.unread_subset(messages);
        conversation.unread_count = u32::try_from(unread.len()).unwrap_or(u32::MAX);
        self.detached
            .insert(conversation.id.clone(), unread.iter().cloned().collect());
        unread
    }

    /// Records a request against a conversation whose messages are not resident.
    ///
    /// Returns false if one is already in flight for this message.
    pub fn begin_detached(&mut self, id: &MessageId) -> bool {
        self.in_flight.insert(id.clone())
    }

    /// Folds a settled request for a resident message into the counts.
    pub fn settle(
        &mut self,
        id: &MessageId,
        confirmed: bool,
        messages: &mut [Message],
        conversation: Option<&mut Conversation>,
    ) -> ReadSettlement {
        self.in_flight.remove(id);
        if !confirmed {
            return ReadSettlement::Failed;
        }

        let Some(message) = messages.iter_mut().find(|m| m.id() == Some(id)) else {
            return ReadSettlement::Skipped;
        };
        if message.is_read {
            return ReadSettlement::Skipped;
        }

        message.is_read = true;
        if message.sender.id != self.current_user {
            if let Some(conversation) = conversation {
                conversation.unread_count = conversation.unread_count.saturating_sub(1);
            }
        }
        ReadSettlement::Applied
    }

    /// Folds a settled request for a non-resident message into the
    /// conversation's count.
    ///
    /// Only ids the latest [`Self::reset_detached`] saw unread are counted,
    /// each at most once.
    pub fn settle_detached(
        &mut self,
        id: &MessageId,
        confirmed: bool,
        conversation: Option<&mut Conversation>,
    ) -> ReadSettlement {
        self.in_flight.remove(id);
        if !confirmed {
            return ReadSettlement::Failed;
        }
        let Some(conversation) = conversation else {
            return ReadSettlement::Skipped;
        };
        let Some(unread) = self.detached.get_mut(&conversation.id) else {
            return ReadSettlement::Skipped;
        };
        if !unread.remove(id) {
            return ReadSettlement::Skipped;
        }
        conversation.unread_count = u32::try_from(unread.len()).unwrap_or(u32::MAX);
        ReadSettlement::Applied
    }

    /// Drops an in-flight request whose message is no longer resident.
    pub fn abandon(&mut self, id: &MessageId) {
        self.in_flight.remove(id);
    }

    /// Returns the global unread total across conversations.
    pub fn total(&self, conversations: &[Conversation]) -> u32 {
        conversations
            .iter()
            .fold(0u32, |acc, c| acc.saturating_add(c.unread_count))
    }

    /// Forgets in-flight requests and detached baselines.
    pub fn clear(&mut self) {
        self.in_flight.clear();
        self.detached.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ConversationId, UserRef, UserType};
    use chrono::Utc;

    fn user(id: &str) -> UserRef {
        UserRef {
            id: UserId::from(id),
            first_name: id.to_string(),
            last_name: String::new(),
            email: format!("{id}@example.com"),
            profile_picture: None,
            user_type: UserType::Buyer,
        }
    }

    fn message(id: &str, from: &str, is_read: bool) -> Message {
        let to = if from == "me" { "them" } else { "me" };
        Message::confirmed(
            MessageId::from(id),
            ConversationId::from("c-1"),
            user(from),
            user(to),
            "text",
            is_read,
            Utc::now(),
        )
    }

    fn conversation(unread: u32) -> Conversation {
        Conversation {
            id: ConversationId::from("c-1"),
            participants: vec![user("me"), user("them")],
            other_user: user("them"),
            last_message_content: String::new(),
            last_message_time: Utc::now(),
            unread_count: unread,
            updated_at: Utc::now(),
            subject: None,
        }
    }

    fn counter() -> UnreadCounter {
        UnreadCounter::new(UserId::from("me"))
    }

    fn three_unread() -> Vec<Message> {
        vec![
            message("1", "them", false),
            message("2", "them", false),
            message("3", "me", false),
            message("4", "them", true),
            message("5", "them", false),
        ]
    }

    #[test]
    fn counts_only_unread_from_others() {
        assert_eq!(counter().count_unread(&three_unread()), 3);
    }

    #[test]
    fn recount_overrides_server_value() {
        let mut conv = conversation(7);
        counter().recount(&mut conv, &three_unread());
        assert_eq!(conv.unread_count, 3);
    }

    #[test]
    fn unread_subset_skips_own_and_read() {
        let ids = counter().unread_subset(&three_unread());
        assert_eq!(
            ids,
            vec![
                MessageId::from("1"),
                MessageId::from("2"),
                MessageId::from("5")
            ]
        );
    }

    #[test]
    fn begin_classifies_requests() {
        let mut counter = counter();
        let messages = three_unread();

        assert_eq!(counter.begin(&messages, &MessageId::from("1")), ReadIntent::Issue);
        assert_eq!(counter.begin(&messages, &MessageId::from("1")), ReadIntent::InFlight);
        assert_eq!(
            counter.begin(&messages, &MessageId::from("4")),
            ReadIntent::AlreadyRead
        );
        assert_eq!(
            counter.begin(&messages, &MessageId::from("99")),
            ReadIntent::NotResident
        );
    }

    #[test]
    fn settle_is_idempotent() {
        let mut counter = counter();
        let mut messages = three_unread();
        let mut conv = conversation(3);
        let id = MessageId::from("1");

        let first = counter.settle(&id, true, &mut messages, Some(&mut conv));
        let second = counter.settle(&id, true, &mut messages, Some(&mut conv));

        assert_eq!(first, ReadSettlement::Applied);
        assert_eq!(second, ReadSettlement::Skipped);
        assert_eq!(conv.unread_count, 2);
        assert!(messages[0].is_read);
    }

    #[test]
    fn settlements_commute() {
        let ids = ["1", "2", "5"].map(MessageId::from);

        for order in [[0, 1, 2], [2, 1, 0], [1, 2, 0]] {
            let mut counter = counter();
            let mut messages = three_unread();
            let mut conv = conversation(3);
            for i in order {
                counter.settle(&ids[i], true, &mut messages, Some(&mut conv));
            }
            assert_eq!(conv.unread_count, 0);
            assert_eq!(counter.count_unread(&messages), 0);
        }
    }

    #[test]
    fn failed_settlement_leaves_state() {
        let mut counter = counter();
        let mut messages = three_unread();
        let mut conv = conversation(3);
        let id = MessageId::from("2");
        counter.begin(&messages, &id);

        let result = counter.settle(&id, false, &mut messages, Some(&mut conv));

        assert_eq!(result, ReadSettlement::Failed);
        assert_eq!(conv.unread_count, 3);
        assert!(!messages[1].is_read);
        assert_eq!(counter.begin(&messages, &id), ReadIntent::Issue);
    }

    #[test]
    fn own_message_flip_does_not_decrement() {
        let mut counter = counter();
        let mut messages = three_unread();
        let mut conv = conversation(3);

        let result = counter.settle(&MessageId::from("3"), true, &mut messages, Some(&mut conv));

        assert_eq!(result, ReadSettlement::Applied);
        assert_eq!(conv.unread_count, 3);
    }

    #[test]
    fn count_never_goes_negative() {
        let mut counter = counter();
        let mut messages = three_unread();
        let mut conv = conversation(0);

        counter.settle(&MessageId::from("1"), true, &mut messages, Some(&mut conv));
        assert_eq!(conv.unread_count, 0);

        counter.settle_detached(&MessageId::from("x"), true, Some(&mut conv));
        assert_eq!(conv.unread_count, 0);
    }

    #[test]
    fn own_unread_message_needs_no_request() {
        let mut counter = counter();
        let messages = three_unread();

        assert_eq!(
            counter.begin(&messages, &MessageId::from("3")),
            ReadIntent::AlreadyRead
        );
    }

    #[test]
    fn detached_settlement_decrements_summary() {
        let mut counter = counter();
        let mut conv = conversation(7);
        let unread = counter.reset_detached(&mut conv, &three_unread());
        assert_eq!(conv.unread_count, 3);
        assert_eq!(unread.len(), 3);

        let id = MessageId::from("1");
        assert!(counter.begin_detached(&id));
        assert!(!counter.begin_detached(&id));

        assert_eq!(
            counter.settle_detached(&id, true, Some(&mut conv)),
            ReadSettlement::Applied
        );
        assert_eq!(conv.unread_count, 2);
        assert_eq!(
            counter.settle_detached(&id, true, Some(&mut conv)),
            ReadSettlement::Skipped
        );
        assert_eq!(
            counter.settle_detached(&MessageId::from("2"), false, Some(&mut conv)),
            ReadSettlement::Failed
        );
        assert_eq!(conv.unread_count, 2);
    }

    #[test]
    fn detached_settlement_respects_newer_baseline() {
        let mut counter = counter();
        let mut conv = conversation(0);
        counter.reset_detached(&mut conv, &three_unread());
        counter.begin_detached(&MessageId::from("1"));
        counter.begin_detached(&MessageId::from("2"));

        // A second fetch already sees message 1 as read.
        let mut refetched = three_unread();
        refetched[0].is_read = true;
        counter.reset_detached(&mut conv, &refetched);
        assert_eq!(conv.unread_count, 2);

        counter.settle_detached(&MessageId::from("1"), true, Some(&mut conv));
        counter.settle_detached(&MessageId::from("2"), false, Some(&mut conv));

        assert_eq!(conv.unread_count, 2);
    }

    #[test]
    fn recount_drops_detached_baseline() {
        let mut counter = counter();
        let mut conv = conversation(0);
        counter.reset_detached(&mut conv, &three_unread());

        counter.recount(&mut conv, &three_unread());

        assert_eq!(
            counter.settle_detached(&MessageId::from("1"), true, Some(&mut conv)),
            ReadSettlement::Skipped
        );
        assert_eq!(conv.unread_count, 3);
    }

    #[test]
    fn total_sums_conversations() {
        let convs = vec![conversation(2), conversation(0), conversation(5)];
        assert_eq!(counter().total(&convs), 7);
    }
}
