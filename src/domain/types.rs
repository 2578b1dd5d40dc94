//! Identifier newtypes for domain entities.
//!
//! Server-assigned ids and client-generated correlation keys are kept as
//! distinct types so one can never be passed where the other is expected.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl $name {
            /// Returns the id as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Unique identifier for a marketplace user.
    UserId
);

string_id!(
    /// Server-assigned identifier for a conversation.
    ConversationId
);

string_id!(
    /// Server-assigned identifier for a message.
    ///
    /// Only exists once the server has confirmed the message.
    MessageId
);

string_id!(
    /// Server-assigned identifier for a property inquiry.
    InquiryId
);

string_id!(
    /// Identifier of a property listing.
    PropertyId
);

/// Client-generated key matching an optimistic message to its resolution.
///
/// Assigned once when a send begins and never changed afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationKey(String);

impl CorrelationKey {
    const SERVER_PREFIX: &'static str = "srv:";

    /// Allocates a fresh key, unique within the session.
    pub fn generate() -> Self {
        Self(format!("local:{}", uuid::Uuid::new_v4()))
    }

    /// Derives the key for a message that arrived already confirmed.
    pub fn for_server_id(id: &MessageId) -> Self {
        Self(format!("{}{}", Self::SERVER_PREFIX, id))
    }

    /// Returns true if this key was derived from a server id rather than
    /// allocated by a local send.
    pub fn is_server_derived(&self) -> bool {
        self.0.starts_with(Self::SERVER_PREFIX)
    }

    /// Returns the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn conversation_id_display() {
        let id = ConversationId::from("conv-42");
        assert_eq!(id.to_string(), "conv-42");
    }

    #[test]
    fn message_id_equality() {
        let id1 = MessageId::from("m-1");
        let id2 = MessageId::from("m-1".to_string());
        assert_eq!(id1, id2);
    }

    #[test]
    fn generated_keys_are_unique() {
        let keys: HashSet<_> = (0..1000).map(|_| CorrelationKey::generate()).collect();
        assert_eq!(keys.len(), 1000);
    }

    #[test]
    fn server_derived_keys() {
        let key = CorrelationKey::for_server_id(&MessageId::from("77"));
        assert_eq!(key.as_str(), "srv:77");
        assert!(key.is_server_derived());
        assert!(!CorrelationKey::generate().is_server_derived());
    }

    #[test]
    fn ids_serialize_transparently() {
        let json = serde_json::to_string(&UserId::from("u-1")).unwrap();
        assert_eq!(json, "\"u-1\"");
    }
}
