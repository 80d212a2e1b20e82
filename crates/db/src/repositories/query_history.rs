use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use cloudscope_core::audit::{QueryAuditEntry, QueryAuditLog};
use cloudscope_core::errors::AuditError;
use sqlx::{sqlite::SqliteRow, Row};

use super::RepositoryError;
use crate::DbPool;

/// Upper bound on rows returned by [`SqlQueryAuditLog::list_recent`].
pub const MAX_HISTORY_LIMIT: u32 = 50;

/// Append-only `query_history` table.
pub struct SqlQueryAuditLog {
    pool: DbPool,
}

impl SqlQueryAuditLog {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, entry: &QueryAuditEntry) -> Result<(), RepositoryError> {
        let metadata_json = serde_json::to_string(&entry.metadata)
            .map_err(|error| RepositoryError::Decode(error.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO query_history (id, client_id, query, response, metadata_json, recorded_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&entry.entry_id)
        .bind(&entry.client_id)
        .bind(&entry.query)
        .bind(&entry.response)
        .bind(metadata_json)
        .bind(format_timestamp(entry.recorded_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Newest entries for one client first; `limit` is clamped to `1..=50`.
    pub async fn list_recent(
        &self,
        client_id: &str,
        limit: u32,
    ) -> Result<Vec<QueryAuditEntry>, RepositoryError> {
        let limit = limit.clamp(1, MAX_HISTORY_LIMIT);
        let rows = sqlx::query(
            r#"
            SELECT id, client_id, query, response, metadata_json, recorded_at
            FROM query_history
            WHERE client_id = ?
            ORDER BY recorded_at DESC, rowid DESC
            LIMIT ?
            "#,
        )
        .bind(client_id)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(entry_from_row).collect()
    }
}

#[async_trait]
impl QueryAuditLog for SqlQueryAuditLog {
    async fn append(&self, entry: QueryAuditEntry) -> Result<(), AuditError> {
        self.insert(&entry).await.map_err(AuditError::from)
    }
}

/// Fixed-width UTC so text ordering matches time ordering.
fn format_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn entry_from_row(row: &SqliteRow) -> Result<QueryAuditEntry, RepositoryError> {
    let metadata_json: String = row.try_get("metadata_json")?;
    let recorded_at: String = row.try_get("recorded_at")?;
    let metadata: BTreeMap<String, String> = serde_json::from_str(&metadata_json)
        .map_err(|error| RepositoryError::Decode(format!("invalid `metadata_json`: {error}")))?;

    Ok(QueryAuditEntry {
        entry_id: row.try_get("id")?,
        client_id: row.try_get("client_id")?,
        query: row.try_get("query")?,
        response: row.try_get("response")?,
        metadata,
        recorded_at: parse_timestamp("recorded_at", recorded_at)?,
    })
}

fn parse_timestamp(column: &str, value: String) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(&value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("invalid timestamp in `{column}`: {e}")))
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use cloudscope_core::audit::{QueryAuditEntry, QueryAuditLog, METADATA_DOMAINS};

    use super::SqlQueryAuditLog;
    use crate::{connect_with_settings, migrations, DbPool};

    async fn setup_pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    fn entry(client: &str, query: &str, minute: u32) -> QueryAuditEntry {
        let mut entry = QueryAuditEntry::new(client, query, format!("answer to {query}"))
            .with_metadata(METADATA_DOMAINS, "cost");
        entry.recorded_at =
            Utc.with_ymd_and_hms(2025, 6, 15, 12, minute, 0).single().expect("timestamp");
        entry
    }

    #[tokio::test]
    async fn appended_entries_come_back_newest_first_per_client() {
        let pool = setup_pool().await;
        let log = SqlQueryAuditLog::new(pool.clone());

        log.append(entry("acme", "first", 1)).await.expect("append");
        log.append(entry("acme", "third", 3)).await.expect("append");
        log.append(entry("acme", "second", 2)).await.expect("append");
        log.append(entry("globex", "other", 4)).await.expect("append");

        let recent = log.list_recent("acme", 2).await.expect("list");

        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].query, "third");
        assert_eq!(recent[1].query, "second");
        assert_eq!(recent[0].response, "answer to third");
        assert_eq!(recent[0].metadata.get(METADATA_DOMAINS).map(String::as_str), Some("cost"));

        pool.close().await;
    }

    #[tokio::test]
    async fn stored_entry_round_trips() {
        let pool = setup_pool().await;
        let log = SqlQueryAuditLog::new(pool.clone());
        let original = entry("acme", "what is our compute cost", 5);

        log.append(original.clone()).await.expect("append");
        let stored = log.list_recent("acme", 10).await.expect("list");

        assert_eq!(stored, vec![original]);
        pool.close().await;
    }

    #[tokio::test]
    async fn limit_is_clamped_to_at_least_one() {
        let pool = setup_pool().await;
        let log = SqlQueryAuditLog::new(pool.clone());
        log.append(entry("acme", "a", 1)).await.expect("append");
        log.append(entry("acme", "b", 2)).await.expect("append");

        assert_eq!(log.list_recent("acme", 0).await.expect("list").len(), 1);
        assert!(log.list_recent("nobody", 50).await.expect("list").is_empty());

        pool.close().await;
    }

    #[tokio::test]
    async fn duplicate_entry_id_is_a_storage_error() {
        let pool = setup_pool().await;
        let log = SqlQueryAuditLog::new(pool.clone());
        let first = entry("acme", "a", 1);

        log.append(first.clone()).await.expect("append");
        let error = log.append(first).await.expect_err("duplicate id");

        assert!(error.to_string().contains("audit storage failure"));
        pool.close().await;
    }
}
