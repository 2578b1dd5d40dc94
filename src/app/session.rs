//! Session wiring.
//!
//! A [`Session`] is the explicit owner of everything scoped to one signed-in
//! user: the conversation store and the inquiry stats service, both talking to
//! the same [`MessagingApi`]. Dropping or closing the session drops all
//! conversation state, so nothing leaks into the next sign-in.

use std::sync::Arc;

use crate::config::Settings;
use crate::domain::UserId;
use crate::providers::{ApiResult, HttpMessagingApi, MessagingApi};
use crate::services::{AttachmentValidator, ConversationStore, InquiryStatsService};

/// Services for one signed-in user.
pub struct Session {
    settings: Settings,
    store: Arc<ConversationStore>,
    stats: Arc<InquiryStatsService>,
}

impl Session {
    /// Builds a session over an existing backend client.
    pub fn new(settings: Settings, api: Arc<dyn MessagingApi>) -> Self {
        let store = ConversationStore::new(
            Arc::clone(&api),
            UserId::from(settings.session.current_user_id.as_str()),
            AttachmentValidator::new(&settings.attachments),
            settings.session.event_buffer,
        );
        let stats = InquiryStatsService::new(api);

        tracing::debug!(
            user_id = %settings.session.current_user_id,
            "Session created"
        );
        Self {
            settings,
            store: Arc::new(store),
            stats: Arc::new(stats),
        }
    }

    /// Builds a session talking to the configured HTTP backend.
    pub fn connect(settings: Settings) -> ApiResult<Self> {
        let api = HttpMessagingApi::new(&settings.api)?;
        Ok(Self::new(settings, Arc::new(api)))
    }

    /// Returns the settings the session was built with.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Returns the conversation store.
    pub fn store(&self) -> &Arc<ConversationStore> {
        &self.store
    }

    /// Returns the inquiry stats service.
    pub fn stats(&self) -> &Arc<InquiryStatsService> {
        &self.stats
    }

    /// Ends the session, dropping all conversation state.
    pub fn close(self) {
        self.store.clear();
        tracing::info!(
            user_id = %self.settings.session.current_user_id,
            "Session closed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionSettings;
    use crate::providers::MockMessagingApi;
    use crate::services::StoreEvent;

    fn settings() -> Settings {
        Settings {
            session: SessionSettings {
                current_user_id: "u-7".to_string(),
                event_buffer: 8,
            },
            ..Default::default()
        }
    }

    #[test]
    fn store_uses_configured_user() {
        let session = Session::new(settings(), Arc::new(MockMessagingApi::new()));
        assert_eq!(session.store().current_user().as_str(), "u-7");
        assert!(session.stats().snapshot().is_none());
    }

    #[test]
    fn close_clears_store() {
        let session = Session::new(settings(), Arc::new(MockMessagingApi::new()));
        let mut events = session.store().subscribe();

        session.close();

        assert_eq!(events.try_recv().unwrap(), StoreEvent::Cleared);
    }

    #[test]
    fn connect_rejects_bad_base_url() {
        let mut settings = settings();
        settings.api.base_url = "::".to_string();
        assert!(Session::connect(settings).is_err());
    }
}
