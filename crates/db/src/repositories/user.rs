use async_trait::async_trait;
use sqlx::Row;

use selma_core::{Language, UserProfile};

use super::{RepositoryError, UserRepository};
use crate::DbPool;

pub struct SqlUserRepository {
    pool: DbPool,
}

impl SqlUserRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for SqlUserRepository {
    async fn exists(&self, channel_identity: &str) -> Result<bool, RepositoryError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM users WHERE channel_identity = ?",
        )
        .bind(channel_identity)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    async fn create(
        &self,
        channel_identity: &str,
        display_name: &str,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO users (channel_identity, display_name) VALUES (?, ?)
             ON CONFLICT (channel_identity) DO NOTHING",
        )
        .bind(channel_identity)
        .bind(display_name)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_language(
        &self,
        channel_identity: &str,
        language: Language,
    ) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE users SET language = ? WHERE channel_identity = ?")
            .bind(language.as_tag())
            .bind(channel_identity)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn profile(
        &self,
        channel_identity: &str,
    ) -> Result<Option<UserProfile>, RepositoryError> {
        let row =
            sqlx::query("SELECT display_name, language FROM users WHERE channel_identity = ?")
                .bind(channel_identity)
                .fetch_optional(&self.pool)
                .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let display_name = row.get::<String, _>("display_name");
        let raw_language = row.get::<String, _>("language");
        let language = Language::from_tag(&raw_language).ok_or_else(|| {
            RepositoryError::Decode(format!(
                "user `{channel_identity}` carries unknown language tag `{raw_language}`"
            ))
        })?;

        Ok(Some(UserProfile { display_name, language }))
    }
}
