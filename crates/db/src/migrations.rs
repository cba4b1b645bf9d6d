use sqlx::migrate::{MigrateError, Migrator};

use crate::DbPool;

pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

/// Idempotent schema setup: applied migrations are skipped, so this is safe
/// to call on every process start.
pub async fn run_pending(pool: &DbPool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}

#[cfg(test)]
mod tests {
    use sqlx::Row;

    use super::run_pending;
    use crate::{connect_with_settings, migrations::MIGRATOR};

    const MANAGED_SCHEMA_OBJECTS: &[&str] =
        &["users", "messages", "idx_messages_user_key_timestamp"];

    async fn table_count(pool: &sqlx::SqlitePool, name: &str) -> i64 {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM sqlite_master WHERE type IN ('table', 'index') AND name = ?",
        )
        .bind(name)
        .fetch_one(pool)
        .await
        .expect("schema object lookup")
    }

    #[tokio::test]
    async fn migrations_create_conversation_tables() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        for object in MANAGED_SCHEMA_OBJECTS {
            assert_eq!(table_count(&pool, object).await, 1, "missing schema object `{object}`");
        }
    }

    #[tokio::test]
    async fn schema_setup_is_idempotent() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("first migration pass");
        run_pending(&pool).await.expect("second migration pass should be a no-op");

        for object in MANAGED_SCHEMA_OBJECTS {
            assert_eq!(table_count(&pool, object).await, 1);
        }
    }

    #[tokio::test]
    async fn migrations_are_reversible() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        MIGRATOR.undo(&pool, 0).await.expect("undo migrations");

        for object in MANAGED_SCHEMA_OBJECTS {
            assert_eq!(table_count(&pool, object).await, 0, "`{object}` should be dropped");
        }
    }

    #[tokio::test]
    async fn up_down_up_preserves_schema_signature() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        let initial = schema_signature(&pool).await;
        assert_eq!(initial.len(), MANAGED_SCHEMA_OBJECTS.len());

        MIGRATOR.undo(&pool, 0).await.expect("undo migrations");
        run_pending(&pool).await.expect("re-run migrations");

        assert_eq!(schema_signature(&pool).await, initial);
    }

    async fn schema_signature(pool: &sqlx::SqlitePool) -> Vec<(String, String, String)> {
        let mut signature: Vec<(String, String, String)> = sqlx::query(
            "SELECT type, name, IFNULL(sql, '') AS sql
             FROM sqlite_master
             WHERE type IN ('table', 'index')",
        )
        .fetch_all(pool)
        .await
        .expect("load schema objects")
        .into_iter()
        .filter_map(|row| {
            let name = row.get::<String, _>("name");
            if MANAGED_SCHEMA_OBJECTS.contains(&name.as_str()) {
                Some((row.get::<String, _>("type"), name, row.get::<String, _>("sql")))
            } else {
                None
            }
        })
        .collect();
        signature.sort();
        signature
    }
}
