use async_trait::async_trait;
use chrono::{DateTime, Utc};

use selma_core::{MessageRole, StoredMessage};

use super::{MessageRepository, RepositoryError};
use crate::DbPool;

pub struct SqlMessageRepository {
    pool: DbPool,
}

impl SqlMessageRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct MessageRow {
    id: i64,
    user_key: String,
    role: String,
    content: String,
    timestamp: DateTime<Utc>,
}

impl MessageRow {
    fn into_stored(self) -> Result<StoredMessage, RepositoryError> {
        let role = MessageRole::parse(&self.role).ok_or_else(|| {
            RepositoryError::Decode(format!(
                "message {} carries unknown role `{}`",
                self.id, self.role
            ))
        })?;

        Ok(StoredMessage {
            id: self.id,
            user_key: self.user_key,
            role,
            content: self.content,
            timestamp: self.timestamp,
        })
    }
}

#[async_trait]
impl MessageRepository for SqlMessageRepository {
    async fn record(
        &self,
        user_key: &str,
        role: MessageRole,
        content: &str,
    ) -> Result<(), RepositoryError> {
        sqlx::query("INSERT INTO messages (user_key, role, content, timestamp) VALUES (?, ?, ?, ?)")
            .bind(user_key)
            .bind(role.as_str())
            .bind(content)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn recent_history(
        &self,
        user_key: &str,
        limit: u32,
    ) -> Result<Vec<StoredMessage>, RepositoryError> {
        // The store retrieves newest-first; `id` breaks equal-timestamp ties
        // so the suffix is exact under rapid inserts.
        let mut rows = sqlx::query_as::<_, MessageRow>(
            "SELECT id, user_key, role, content, timestamp FROM messages
             WHERE user_key = ?
             ORDER BY timestamp DESC, id DESC
             LIMIT ?",
        )
        .bind(user_key)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.reverse();
        rows.into_iter().map(MessageRow::into_stored).collect()
    }
}
