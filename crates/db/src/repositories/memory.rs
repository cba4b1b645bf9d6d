use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use selma_core::{Language, MessageRole, StoredMessage, UserProfile};

use super::{MessageRepository, RepositoryError, UserRepository};

/// Store-free user repository for unit tests and wiring experiments.
#[derive(Default)]
pub struct InMemoryUserRepository {
    users: RwLock<HashMap<String, UserProfile>>,
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn exists(&self, channel_identity: &str) -> Result<bool, RepositoryError> {
        Ok(self.users.read().await.contains_key(channel_identity))
    }

    async fn create(
        &self,
        channel_identity: &str,
        display_name: &str,
    ) -> Result<(), RepositoryError> {
        self.users.write().await.entry(channel_identity.to_string()).or_insert(UserProfile {
            display_name: display_name.to_string(),
            language: Language::default(),
        });
        Ok(())
    }

    async fn update_language(
        &self,
        channel_identity: &str,
        language: Language,
    ) -> Result<(), RepositoryError> {
        if let Some(profile) = self.users.write().await.get_mut(channel_identity) {
            profile.language = language;
        }
        Ok(())
    }

    async fn profile(
        &self,
        channel_identity: &str,
    ) -> Result<Option<UserProfile>, RepositoryError> {
        Ok(self.users.read().await.get(channel_identity).cloned())
    }
}

#[derive(Default)]
struct MessageLog {
    next_id: i64,
    rows: Vec<StoredMessage>,
}

/// Append-only in-memory history keeping insertion order as chronology.
#[derive(Default)]
pub struct InMemoryMessageRepository {
    log: RwLock<MessageLog>,
}

#[async_trait]
impl MessageRepository for InMemoryMessageRepository {
    async fn record(
        &self,
        user_key: &str,
        role: MessageRole,
        content: &str,
    ) -> Result<(), RepositoryError> {
        let mut log = self.log.write().await;
        log.next_id += 1;
        let id = log.next_id;
        log.rows.push(StoredMessage {
            id,
            user_key: user_key.to_string(),
            role,
            content: content.to_string(),
            timestamp: Utc::now(),
        });
        Ok(())
    }

    async fn recent_history(
        &self,
        user_key: &str,
        limit: u32,
    ) -> Result<Vec<StoredMessage>, RepositoryError> {
        let log = self.log.read().await;
        let matching: Vec<StoredMessage> =
            log.rows.iter().filter(|row| row.user_key == user_key).cloned().collect();
        let skip = matching.len().saturating_sub(limit as usize);
        Ok(matching.into_iter().skip(skip).collect())
    }
}

#[cfg(test)]
mod tests {
    use selma_core::{Language, MessageRole};

    use super::{InMemoryMessageRepository, InMemoryUserRepository};
    use crate::repositories::{MessageRepository, UserRepository};

    #[tokio::test]
    async fn in_memory_user_repo_create_is_idempotent() {
        let repo = InMemoryUserRepository::default();

        repo.create("whatsapp:+1555", "").await.expect("first create");
        repo.update_language("whatsapp:+1555", Language::Ru).await.expect("update language");
        repo.create("whatsapp:+1555", "someone else").await.expect("duplicate create");

        let profile = repo.profile("whatsapp:+1555").await.expect("profile").expect("present");
        assert_eq!(profile.display_name, "");
        assert_eq!(profile.language, Language::Ru);
    }

    #[tokio::test]
    async fn in_memory_language_update_without_user_is_a_noop() {
        let repo = InMemoryUserRepository::default();
        repo.update_language("whatsapp:+1777", Language::Ru).await.expect("update");
        assert!(!repo.exists("whatsapp:+1777").await.expect("exists"));
    }

    #[tokio::test]
    async fn in_memory_history_keeps_bounded_chronological_suffix() {
        let repo = InMemoryMessageRepository::default();
        for index in 1..=4 {
            repo.record("whatsapp:+1555", MessageRole::User, &format!("m{index}"))
                .await
                .expect("record");
        }
        repo.record("whatsapp:+1999", MessageRole::User, "other user").await.expect("record");

        let history = repo.recent_history("whatsapp:+1555", 3).await.expect("history");
        let contents: Vec<&str> = history.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["m2", "m3", "m4"]);
    }
}
