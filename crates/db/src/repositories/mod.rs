use async_trait::async_trait;
use thiserror::Error;

use selma_core::{Language, MessageRole, StoredMessage, UserProfile};

pub mod memory;
pub mod message;
pub mod user;

pub use memory::{InMemoryMessageRepository, InMemoryUserRepository};
pub use message::SqlMessageRepository;
pub use user::SqlUserRepository;

/// Bounded suffix of per-user history handed to the prompt assembler.
pub const DEFAULT_HISTORY_WINDOW: u32 = 10;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

/// User-record operations, keyed by the external channel identity.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn exists(&self, channel_identity: &str) -> Result<bool, RepositoryError>;

    /// Insert-if-absent: a concurrent duplicate create is an idempotent
    /// success, not a constraint violation.
    async fn create(
        &self,
        channel_identity: &str,
        display_name: &str,
    ) -> Result<(), RepositoryError>;

    /// No-op when no row matches.
    async fn update_language(
        &self,
        channel_identity: &str,
        language: Language,
    ) -> Result<(), RepositoryError>;

    async fn profile(&self, channel_identity: &str)
        -> Result<Option<UserProfile>, RepositoryError>;
}

/// Append-only chat-history operations.
#[async_trait]
pub trait MessageRepository: Send + Sync {
    async fn record(
        &self,
        user_key: &str,
        role: MessageRole,
        content: &str,
    ) -> Result<(), RepositoryError>;

    /// Up to `limit` most recent messages for `user_key`, returned in
    /// chronological (oldest-first) order. Empty when no history exists.
    async fn recent_history(
        &self,
        user_key: &str,
        limit: u32,
    ) -> Result<Vec<StoredMessage>, RepositoryError>;
}
