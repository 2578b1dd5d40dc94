//! Conversation store: the engine's single entry point for conversations and
//! messages.
//!
//! The [`ConversationStore`] owns the conversation list, the active
//! conversation and its resident messages. It validates attachments, drives
//! the [`MessageReconciler`] for sends and the [`UnreadCounter`] for reads,
//! and publishes a [`StoreEvent`] after every state change.
//!
//! # Concurrency
//!
//! All methods take `&self`, so sends, reads and fetches can be in flight at
//! the same time. State lives behind a lock that is never held across a
//! backend call, so every state observable between suspension points is
//! complete and renderable. Interleaved completions are resolved by keyed
//! reconciliation, commutative read settlement and fetch epochs. Nothing
//! relies on blocking.
//!
//! # Example
//!
//! ```ignore
//! let store = ConversationStore::new(api, UserId::from("42"), AttachmentValidator::default(), 100);
//! store.load_conversations().await?;
//! store.select_conversation(&conversation_id).await?;
//! let message = store.send("Is the flat still available?", None).await?;
//! ```

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use futures::stream::{FuturesUnordered, StreamExt};
use thiserror::Error;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use super::attachment_validator::{AttachmentCandidate, AttachmentError, AttachmentValidator};
use super::message_reconciler::{MessageReconciler, Resolution, SendOutcome};
use super::unread_counter::{ReadIntent, ReadSettlement, UnreadCounter};
use crate::domain::{
    sort_by_activity, Conversation, ConversationId, CorrelationKey, Delivery, Message, MessageId,
    UserId,
};
use crate::providers::{ApiError, MessagingApi, OutgoingMessage};

/// Errors surfaced by store operations. None of them is fatal to the store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The attachment was rejected before any network call.
    #[error("attachment rejected: {0}")]
    Validation(#[from] AttachmentError),

    /// Transient transport failure. Prior state is intact and the call can be retried.
    #[error("network error: {0}")]
    Network(String),

    /// The backend refused or garbled the request.
    #[error("backend error: {0}")]
    Backend(String),

    /// The conversation or message no longer exists.
    #[error("not found: {0}")]
    NotFound(String),

    /// Reserved for push-based reconciliation.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A send was attempted with no conversation selected.
    #[error("no conversation is selected")]
    NoActiveConversation,

    /// The send was cancelled before it resolved.
    #[error("send was cancelled")]
    Cancelled,

    /// A later request of the same kind finished first and won.
    #[error("superseded by a newer request")]
    Superseded,

    /// Retry or dismiss was requested for a message that has not failed.
    #[error("message {0} is not a failed send")]
    NotFailed(String),
}

impl From<ApiError> for StoreError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Network(msg) => StoreError::Network(msg),
            ApiError::NotFound(msg) => StoreError::NotFound(msg),
            ApiError::Conflict(msg) => StoreError::Conflict(msg),
            other @ (ApiError::Validation(_) | ApiError::Server { .. } | ApiError::Decode(_)) => {
                StoreError::Backend(other.to_string())
            }
        }
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Change notifications for subscribers such as the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    /// The conversation list was replaced.
    ConversationsLoaded { count: usize },
    /// A conversation became active and its messages are resident.
    ConversationSelected(ConversationId),
    /// A conversation disappeared on the server and was dropped locally.
    ConversationRemoved(ConversationId),
    /// An optimistic message was inserted.
    MessagePending(CorrelationKey),
    /// A pending message was confirmed.
    MessageConfirmed {
        correlation_key: CorrelationKey,
        message_id: MessageId,
    },
    /// A pending message failed.
    MessageFailed {
        correlation_key: CorrelationKey,
        reason: String,
    },
    /// A pending send was cancelled, or a failed one dismissed.
    MessageRemoved(CorrelationKey),
    /// A conversation's unread count changed.
    UnreadChanged {
        conversation_id: ConversationId,
        unread_count: u32,
        total_unread: u32,
    },
    /// All session state was dropped.
    Cleared,
}

/// Outcome of [`ConversationStore::mark_all_read`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MarkAllReadReport {
    /// Mark-read intents the backend confirmed.
    pub confirmed: usize,
    /// Mark-read intents that failed. Those messages stay unread.
    pub failed: usize,
}

struct StoreState {
    conversations: Vec<Conversation>,
    selected: Option<ConversationId>,
    reconciler: MessageReconciler,
    counter: UnreadCounter,
    /// Request payloads of sends that are pending or failed, for retry.
    requests: HashMap<CorrelationKey, OutgoingMessage>,
    cancellations: HashMap<CorrelationKey, CancellationToken>,
    list_epoch: u64,
    selection_epoch: u64,
}

impl StoreState {
    fn conversation_mut(&mut self, id: &ConversationId) -> Option<&mut Conversation> {
        self.conversations.iter_mut().find(|c| &c.id == id)
    }

    fn total_unread(&self) -> u32 {
        self.counter.total(&self.conversations)
    }

    /// Recounts the active conversation from its resident messages.
    fn recount_selected(&mut self) -> Option<(ConversationId, u32)> {
        let StoreState {
            conversations,
            selected,
            reconciler,
            counter,
            ..
        } = &mut *self;
        let selected = selected.as_ref()?;
        let conversation = conversations.iter_mut().find(|c| &c.id == selected)?;
        counter.recount(conversation, reconciler.messages());
        Some((conversation.id.clone(), conversation.unread_count))
    }

    /// Drops a conversation the server no longer knows about.
    fn forget_conversation(&mut self, id: &ConversationId) {
        self.conversations.retain(|c| &c.id != id);
        if self.selected.as_ref() == Some(id) {
            self.selected = None;
            self.reconciler.clear_resident();
        }
    }
}

/// Session-scoped owner of conversation and message state.
pub struct ConversationStore {
    api: Arc<dyn MessagingApi>,
    validator: AttachmentValidator,
    state: RwLock<StoreState>,
    events: broadcast::Sender<StoreEvent>,
}

impl ConversationStore {
    /// Creates an empty store for `current_user`.
    pub fn new(
        api: Arc<dyn MessagingApi>,
        current_user: UserId,
        validator: AttachmentValidator,
        event_buffer: usize,
    ) -> Self {
        let (events, _) = broadcast::channel(event_buffer.max(1));
        Self {
            api,
            validator,
            state: RwLock::new(StoreState {
                conversations: Vec::new(),
                selected: None,
                reconciler: MessageReconciler::new(),
                counter: UnreadCounter::new(current_user),
                requests: HashMap::new(),
                cancellations: HashMap::new(),
                list_epoch: 0,
                selection_epoch: 0,
            }),
            events,
        }
    }

    /// Subscribes to change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    fn read(&self) -> RwLockReadGuard<'_, StoreState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: StoreEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn emit_unread(&self, state: &StoreState, conversation_id: ConversationId, unread_count: u32) {
        self.emit(StoreEvent::UnreadChanged {
            conversation_id,
            unread_count,
            total_unread: state.total_unread(),
        });
    }

    // ---------------------------------------------------------------------
    // Snapshots
    // ---------------------------------------------------------------------

    /// Returns the signed-in user.
    pub fn current_user(&self) -> UserId {
        self.read().counter.current_user().clone()
    }

    /// Returns the conversation list, most recent activity first.
    pub fn conversations(&self) -> Vec<Conversation> {
        self.read().conversations.clone()
    }

    /// Returns a single conversation.
    pub fn conversation(&self, id: &ConversationId) -> Option<Conversation> {
        self.read()
            .conversations
            .iter()
            .find(|c| &c.id == id)
            .cloned()
    }

    /// Returns the id of the active conversation.
    pub fn selected_conversation_id(&self) -> Option<ConversationId> {
        self.read().selected.clone()
    }

    /// Returns the active conversation.
    pub fn selected_conversation(&self) -> Option<Conversation> {
        let state = self.read();
        let id = state.selected.as_ref()?;
        state.conversations.iter().find(|c| &c.id == id).cloned()
    }

    /// Returns the resident messages of the active conversation.
    pub fn messages(&self) -> Vec<Message> {
        self.read().reconciler.messages().to_vec()
    }

    /// Looks up a local or resident message by correlation key.
    pub fn message(&self, key: &CorrelationKey) -> Option<Message> {
        self.read().reconciler.find(key).cloned()
    }

    /// Returns the unread total across all conversations.
    pub fn total_unread(&self) -> u32 {
        self.read().total_unread()
    }

    // ---------------------------------------------------------------------
    // Fetches
    // ---------------------------------------------------------------------

    /// Replaces the conversation list from the backend.
    ///
    /// The selection is kept if the conversation is still listed, and cleared
    /// otherwise. On failure the previous list and selection are untouched.
    pub async fn load_conversations(&self) -> StoreResult<usize> {
        let epoch = {
            let mut state = self.write();
            state.list_epoch += 1;
            state.list_epoch
        };

        let mut fetched = match self.api.fetch_conversations().await {
            Ok(conversations) => conversations,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load conversations");
                return Err(e.into());
            }
        };
        sort_by_activity(&mut fetched);

        let mut state = self.write();
        if state.list_epoch != epoch {
            tracing::debug!("Discarding superseded conversation list");
            return Err(StoreError::Superseded);
        }

        state.conversations = fetched;
        let still_listed = state
            .selected
            .as_ref()
            .is_some_and(|id| state.conversations.iter().any(|c| &c.id == id));
        if !still_listed && state.selected.take().is_some() {
            state.reconciler.clear_resident();
            tracing::debug!("Selected conversation no longer listed, selection cleared");
        }
        let recounted = state.recount_selected();

        let count = state.conversations.len();
        tracing::info!(count, "Conversations loaded");
        self.emit(StoreEvent::ConversationsLoaded { count });
        if let Some((id, unread)) = recounted {
            self.emit_unread(&state, id, unread);
        }
        Ok(count)
    }

    /// Makes a conversation active and loads its messages.
    ///
    /// The unread count is recomputed from the freshly loaded messages.
    /// On a network failure the previous selection stays in place. If the
    /// conversation is gone on the server it is removed locally.
    pub async fn select_conversation(&self, id: &ConversationId) -> StoreResult<()> {
        let epoch = {
            let mut state = self.write();
            if !state.conversations.iter().any(|c| &c.id == id) {
                return Err(StoreError::NotFound(format!("conversation {id}")));
            }
            state.selection_epoch += 1;
            state.selection_epoch
        };

        let fetched = match self.api.fetch_messages(id).await {
            Ok(messages) => messages,
            Err(ApiError::NotFound(msg)) => {
                tracing::warn!(conversation_id = %id, "Conversation vanished on the server");
                self.write().forget_conversation(id);
                self.emit(StoreEvent::ConversationRemoved(id.clone()));
                return Err(StoreError::NotFound(msg));
            }
            Err(e) => {
                tracing::warn!(conversation_id = %id, error = %e, "Failed to load messages");
                return Err(e.into());
            }
        };

        let mut state = self.write();
        if state.selection_epoch != epoch {
            tracing::debug!(conversation_id = %id, "Discarding superseded selection");
            return Err(StoreError::Superseded);
        }
        if !state.conversations.iter().any(|c| &c.id == id) {
            return Err(StoreError::NotFound(format!("conversation {id}")));
        }

        state.selected = Some(id.clone());
        state.reconciler.replace_resident(id.clone(), fetched);
        let recounted = state.recount_selected();

        tracing::info!(
            conversation_id = %id,
            messages = state.reconciler.messages().len(),
            "Conversation selected"
        );
        self.emit(StoreEvent::ConversationSelected(id.clone()));
        if let Some((id, unread)) = recounted {
            self.emit_unread(&state, id, unread);
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Sends
    // ---------------------------------------------------------------------

    /// Sends a message to the active conversation.
    ///
    /// The attachment is validated first. A rejection returns
    /// [`StoreError::Validation`] and changes nothing. Otherwise a pending
    /// message is visible in [`Self::messages`] before this future first
    /// suspends. On failure the message stays in the list as failed, and
    /// the error is returned.
    pub async fn send(
        &self,
        content: impl Into<String>,
        attachment: Option<AttachmentCandidate>,
    ) -> StoreResult<Message> {
        let attachment = match attachment {
            Some(candidate) => {
                let attachment = self.validator.validate(&candidate).map_err(|e| {
                    tracing::debug!(error = %e, "Attachment rejected");
                    e
                })?;
                Some((attachment, candidate))
            }
            None => None,
        };
        let content = content.into();

        let (key, request, token) = {
            let mut state = self.write();
            let conversation_id = state
                .selected
                .clone()
                .ok_or(StoreError::NoActiveConversation)?;
            let conversation = state
                .conversations
                .iter()
                .find(|c| c.id == conversation_id)
                .ok_or_else(|| StoreError::NotFound(format!("conversation {conversation_id}")))?;
            let current_user = state.counter.current_user();
            let sender = conversation
                .participants
                .iter()
                .find(|u| &u.id == current_user)
                .cloned()
                .ok_or_else(|| {
                    StoreError::NotFound(format!(
                        "user {current_user} in conversation {conversation_id}"
                    ))
                })?;
            let receiver = conversation.other_user.clone();
            let subject = conversation.subject.clone();

            let (reference, upload) = match attachment {
                Some((reference, candidate)) => {
                    let upload = candidate.into_outgoing(&reference);
                    (Some(reference), Some(upload))
                }
                None => (None, None),
            };
            let request = OutgoingMessage {
                conversation_id: conversation_id.clone(),
                content: content.clone(),
                subject: subject.clone(),
                attachment: upload,
            };
            let pending = state.reconciler.begin_send(
                conversation_id,
                sender,
                receiver,
                content,
                reference,
                subject,
            );
            let key = pending.correlation_key;
            let token = self.track(&mut state, key.clone(), request.clone());
            (key, request, token)
        };

        self.emit(StoreEvent::MessagePending(key.clone()));
        self.dispatch(key, request, token).await
    }

    /// Resends a failed message under a new correlation key.
    ///
    /// The failed marker is removed and a new pending entry is appended, so a
    /// message is never duplicated.
    pub async fn retry(&self, key: &CorrelationKey) -> StoreResult<Message> {
        let (new_key, request, token) = {
            let mut state = self.write();
            if !state.reconciler.find(key).is_some_and(Message::is_failed) {
                return Err(StoreError::NotFailed(key.to_string()));
            }
            let request = state
                .requests
                .remove(key)
                .ok_or_else(|| StoreError::NotFailed(key.to_string()))?;
            let failed = state
                .reconciler
                .take_failed(key)
                .ok_or_else(|| StoreError::NotFailed(key.to_string()))?;

            let pending = state.reconciler.begin_send(
                failed.conversation_id,
                failed.sender,
                failed.receiver,
                failed.content,
                failed.attachment,
                failed.subject,
            );
            let new_key = pending.correlation_key;
            let token = self.track(&mut state, new_key.clone(), request.clone());
            (new_key, request, token)
        };

        tracing::info!(previous = %key, correlation_key = %new_key, "Retrying failed send");
        self.emit(StoreEvent::MessageRemoved(key.clone()));
        self.emit(StoreEvent::MessagePending(new_key.clone()));
        self.dispatch(new_key, request, token).await
    }

    /// Cancels a pending send. Returns false if it already resolved.
    ///
    /// The entry is removed and the in-flight request is dropped. A
    /// confirmation that still arrives is discarded.
    pub fn cancel_send(&self, key: &CorrelationKey) -> bool {
        let mut state = self.write();
        if !state.reconciler.cancel(key) {
            return false;
        }
        state.requests.remove(key);
        if let Some(token) = state.cancellations.remove(key) {
            token.cancel();
        }
        tracing::info!(correlation_key = %key, "Send cancelled");
        self.emit(StoreEvent::MessageRemoved(key.clone()));
        true
    }

    /// Removes a failed message without resending it.
    pub fn dismiss_failed(&self, key: &CorrelationKey) -> StoreResult<()> {
        let mut state = self.write();
        state
            .reconciler
            .take_failed(key)
            .ok_or_else(|| StoreError::NotFailed(key.to_string()))?;
        state.requests.remove(key);
        self.emit(StoreEvent::MessageRemoved(key.clone()));
        Ok(())
    }

    fn track(
        &self,
        state: &mut StoreState,
        key: CorrelationKey,
        request: OutgoingMessage,
    ) -> CancellationToken {
        let token = CancellationToken::new();
        state.requests.insert(key.clone(), request);
        state.cancellations.insert(key, token.clone());
        token
    }

    async fn dispatch(
        &self,
        key: CorrelationKey,
        request: OutgoingMessage,
        token: CancellationToken,
    ) -> StoreResult<Message> {
        let result = tokio::select! {
            result = self.api.send_message(&request) => result,
            _ = token.cancelled() => {
                tracing::debug!(correlation_key = %key, "Send aborted");
                return Err(StoreError::Cancelled);
            }
        };

        let mut state = self.write();
        state.cancellations.remove(&key);
        let outcome = match &result {
            Ok(sent) => SendOutcome::Confirmed(sent.clone()),
            Err(e) => SendOutcome::Failed(e.to_string()),
        };

        match state.reconciler.resolve(&key, outcome) {
            Resolution::Confirmed(message) => {
                state.requests.remove(&key);
                if let Some(conversation) = state.conversation_mut(&message.conversation_id) {
                    conversation.record_activity(&message);
                }
                sort_by_activity(&mut state.conversations);

                if let Delivery::Confirmed { id } = &message.delivery {
                    tracing::info!(correlation_key = %key, message_id = %id, "Message sent");
                    self.emit(StoreEvent::MessageConfirmed {
                        correlation_key: key,
                        message_id: id.clone(),
                    });
                }
                Ok(message)
            }
            Resolution::Failed(message) => {
                if let Delivery::Failed { reason } = message.delivery {
                    tracing::warn!(correlation_key = %key, reason = %reason, "Message send failed");
                    self.emit(StoreEvent::MessageFailed {
                        correlation_key: key,
                        reason,
                    });
                }
                match result {
                    Err(e) => Err(e.into()),
                    Ok(_) => Err(StoreError::Cancelled),
                }
            }
            Resolution::Discarded => {
                state.requests.remove(&key);
                Err(StoreError::Cancelled)
            }
        }
    }

    // ---------------------------------------------------------------------
    // Reads
    // ---------------------------------------------------------------------

    /// Marks a resident message as read.
    ///
    /// Idempotent: already-read messages and duplicate in-flight requests are
    /// no-ops. The count is decremented only when the backend confirms.
    pub async fn mark_read(&self, message_id: &MessageId) -> StoreResult<()> {
        let intent = {
            let mut state = self.write();
            let StoreState {
                reconciler,
                counter,
                ..
            } = &mut *state;
            counter.begin(reconciler.messages(), message_id)
        };
        match intent {
            ReadIntent::Issue => {}
            ReadIntent::AlreadyRead | ReadIntent::InFlight => return Ok(()),
            ReadIntent::NotResident => {
                return Err(StoreError::NotFound(format!("message {message_id}")))
            }
        }

        let result = self.api.mark_message_read(message_id).await;

        let mut state = self.write();
        self.settle_resident(&mut state, message_id, result.is_ok());
        match result {
            Ok(()) => Ok(()),
            Err(ApiError::NotFound(msg)) => {
                tracing::warn!(message_id = %message_id, "Message vanished on the server");
                state.reconciler.remove_confirmed(message_id);
                if let Some((id, unread)) = state.recount_selected() {
                    self.emit_unread(&state, id, unread);
                }
                Err(StoreError::NotFound(msg))
            }
            Err(e) => {
                tracing::warn!(message_id = %message_id, error = %e, "Mark read failed");
                Err(e.into())
            }
        }
    }

    /// Marks every unread message of a conversation as read.
    ///
    /// Requests run concurrently and each decrement is applied as its
    /// confirmation arrives. Failed requests leave their message unread, so
    /// the final count equals the number of failures. For a conversation
    /// that is not active, its messages are fetched without changing the
    /// selection.
    pub async fn mark_all_read(
        &self,
        conversation_id: &ConversationId,
    ) -> StoreResult<MarkAllReadReport> {
        let resident = {
            let state = self.read();
            if !state.conversations.iter().any(|c| &c.id == conversation_id) {
                return Err(StoreError::NotFound(format!(
                    "conversation {conversation_id}"
                )));
            }
            state.reconciler.resident_conversation() == Some(conversation_id)
        };

        let report = if resident {
            self.mark_all_resident(conversation_id).await
        } else {
            self.mark_all_detached(conversation_id).await?
        };

        tracing::info!(
            conversation_id = %conversation_id,
            confirmed = report.confirmed,
            failed = report.failed,
            "Mark all read settled"
        );
        Ok(report)
    }

    async fn mark_all_resident(&self, conversation_id: &ConversationId) -> MarkAllReadReport {
        let ids: Vec<MessageId> = {
            let mut state = self.write();
            let StoreState {
                reconciler,
                counter,
                ..
            } = &mut *state;
            counter
                .unread_subset(reconciler.messages())
                .into_iter()
                .filter(|id| counter.begin(reconciler.messages(), id) == ReadIntent::Issue)
                .collect()
        };

        let api = &self.api;
        let mut requests: FuturesUnordered<_> = ids
            .into_iter()
            .map(|id| async move {
                let result = api.mark_message_read(&id).await;
                (id, result)
            })
            .collect();

        let mut report = MarkAllReadReport::default();
        while let Some((id, result)) = requests.next().await {
            let mut state = self.write();
            // A switch away mid-flight leaves the message to the next fetch.
            if state.reconciler.resident_conversation() != Some(conversation_id) {
                state.counter.abandon(&id);
            } else {
                self.settle_resident(&mut state, &id, result.is_ok());
            }
            match result {
                Ok(()) => report.confirmed += 1,
                Err(e) => {
                    tracing::warn!(message_id = %id, error = %e, "Mark read failed");
                    report.failed += 1;
                }
            }
        }
        report
    }

    async fn mark_all_detached(
        &self,
        conversation_id: &ConversationId,
    ) -> StoreResult<MarkAllReadReport> {
        let messages = match self.api.fetch_messages(conversation_id).await {
            Ok(messages) => messages,
            Err(ApiError::NotFound(msg)) => {
                self.write().forget_conversation(conversation_id);
                self.emit(StoreEvent::ConversationRemoved(conversation_id.clone()));
                return Err(StoreError::NotFound(msg));
            }
            Err(e) => return Err(e.into()),
        };

        let ids: Vec<MessageId> = {
            let mut state = self.write();
            let StoreState {
                conversations,
                reconciler,
                counter,
                ..
            } = &mut *state;
            let subset = if reconciler.resident_conversation() == Some(conversation_id) {
                // Selected while fetching: the resident copy is authoritative.
                counter.unread_subset(reconciler.messages())
            } else {
                match conversations.iter_mut().find(|c| &c.id == conversation_id) {
                    Some(conversation) => counter.reset_detached(conversation, &messages),
                    None => return Err(StoreError::NotFound(format!(
                        "conversation {conversation_id}"
                    ))),
                }
            };
            subset
                .into_iter()
                .filter(|id| counter.begin_detached(id))
                .collect()
        };

        let api = &self.api;
        let mut requests: FuturesUnordered<_> = ids
            .into_iter()
            .map(|id| async move {
                let result = api.mark_message_read(&id).await;
                (id, result)
            })
            .collect();

        let mut report = MarkAllReadReport::default();
        while let Some((id, result)) = requests.next().await {
            let mut state = self.write();
            // The conversation may have been selected while requests were out.
            if state.reconciler.resident_conversation() == Some(conversation_id) {
                self.settle_resident(&mut state, &id, result.is_ok());
            } else {
                let StoreState {
                    conversations,
                    counter,
                    ..
                } = &mut *state;
                let conversation = conversations.iter_mut().find(|c| &c.id == conversation_id);
                let settlement = counter.settle_detached(&id, result.is_ok(), conversation);
                let changed = state
                    .conversations
                    .iter()
                    .find(|c| &c.id == conversation_id)
                    .map(|c| c.unread_count);
                if let (ReadSettlement::Applied, Some(unread)) = (settlement, changed) {
                    self.emit_unread(&state, conversation_id.clone(), unread);
                }
            }
            match result {
                Ok(()) => report.confirmed += 1,
                Err(_) => report.failed += 1,
            }
        }
        Ok(report)
    }

    fn settle_resident(&self, state: &mut StoreState, message_id: &MessageId, confirmed: bool) {
        let StoreState {
            conversations,
            selected,
            reconciler,
            counter,
            ..
        } = &mut *state;
        let conversation = selected
            .as_ref()
            .and_then(|id| conversations.iter_mut().find(|c| &c.id == id));
        let settlement =
            counter.settle(message_id, confirmed, reconciler.messages_mut(), conversation);
        if settlement != ReadSettlement::Applied {
            return;
        }

        let changed = state
            .selected
            .as_ref()
            .and_then(|id| state.conversations.iter().find(|c| &c.id == id))
            .map(|c| (c.id.clone(), c.unread_count));
        if let Some((id, unread)) = changed {
            self.emit_unread(state, id, unread);
        }
    }

    // ---------------------------------------------------------------------
    // Lifecycle
    // ---------------------------------------------------------------------

    /// Drops all session state and aborts in-flight sends.
    ///
    /// Fetches still in flight are discarded when they complete.
    pub fn clear(&self) {
        let mut state = self.write();
        for (_, token) in state.cancellations.drain() {
            token.cancel();
        }
        state.requests.clear();
        state.conversations.clear();
        state.selected = None;
        state.reconciler.clear();
        state.counter.clear();
        state.list_epoch += 1;
        state.selection_epoch += 1;
        tracing::debug!("Conversation store cleared");
        self.emit(StoreEvent::Cleared);
    }
}
