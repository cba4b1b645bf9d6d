use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Role tag on a chat-history entry.
///
/// `System` entries are synthesized at prompt-assembly time and never
/// persisted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Ai,
    System,
}

impl MessageRole {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Ai => "ai",
            Self::System => "system",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "user" => Some(Self::User),
            "ai" => Some(Self::Ai),
            "system" => Some(Self::System),
            _ => None,
        }
    }
}

/// One persisted chat-history row, keyed by the external channel identity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredMessage {
    pub id: i64,
    pub user_key: String,
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// A role-tagged prompt entry handed to the completion provider.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self { role, content: content.into() }
    }
}

impl From<&StoredMessage> for ChatMessage {
    fn from(message: &StoredMessage) -> Self {
        Self { role: message.role, content: message.content.clone() }
    }
}
