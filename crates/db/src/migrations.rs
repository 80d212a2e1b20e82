use sqlx::migrate::{MigrateError, Migrator};

use crate::DbPool;

pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

pub async fn run_pending(pool: &DbPool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}

#[cfg(test)]
mod tests {
    use sqlx::Row;

    use super::{run_pending, MIGRATOR};
    use crate::{connect_with_settings, DbPool};

    async fn object_count(pool: &DbPool, kind: &str, name: &str) -> i64 {
        sqlx::query("SELECT COUNT(*) AS count FROM sqlite_master WHERE type = ? AND name = ?")
            .bind(kind)
            .bind(name)
            .fetch_one(pool)
            .await
            .expect("inspect schema")
            .get::<i64, _>("count")
    }

    #[tokio::test]
    async fn migrations_create_query_history() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        assert_eq!(object_count(&pool, "table", "query_history").await, 1);
        assert_eq!(object_count(&pool, "index", "idx_query_history_client_recorded").await, 1);
    }

    #[tokio::test]
    async fn migrations_are_reversible_and_rerunnable() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        MIGRATOR.undo(&pool, 0).await.expect("undo migrations");
        assert_eq!(object_count(&pool, "table", "query_history").await, 0);

        run_pending(&pool).await.expect("re-run migrations");
        assert_eq!(object_count(&pool, "table", "query_history").await, 1);
    }
}
