use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AuditError;

pub const METADATA_DOMAINS: &str = "domains";
pub const METADATA_COLLECTED: &str = "collected";
pub const METADATA_BACKEND_ERROR: &str = "backend_error";
pub const METADATA_CORRELATION_ID: &str = "correlation_id";

/// One answered query, as written to the audit trail.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryAuditEntry {
    pub entry_id: String,
    pub client_id: String,
    pub query: String,
    pub response: String,
    pub metadata: BTreeMap<String, String>,
    pub recorded_at: DateTime<Utc>,
}

impl QueryAuditEntry {
    pub fn new(
        client_id: impl Into<String>,
        query: impl Into<String>,
        response: impl Into<String>,
    ) -> Self {
        Self {
            entry_id: Uuid::new_v4().to_string(),
            client_id: client_id.into(),
            query: query.into(),
            response: response.into(),
            metadata: BTreeMap::new(),
            recorded_at: Utc::now(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Append-only store for answered queries.
#[async_trait]
pub trait QueryAuditLog: Send + Sync {
    async fn append(&self, entry: QueryAuditEntry) -> Result<(), AuditError>;
}

#[derive(Clone, Default)]
pub struct InMemoryQueryAuditLog {
    entries: Arc<Mutex<Vec<QueryAuditEntry>>>,
}

impl InMemoryQueryAuditLog {
    pub fn entries(&self) -> Vec<QueryAuditEntry> {
        match self.entries.lock() {
            Ok(entries) => entries.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl QueryAuditLog for InMemoryQueryAuditLog {
    async fn append(&self, entry: QueryAuditEntry) -> Result<(), AuditError> {
        match self.entries.lock() {
            Ok(mut entries) => entries.push(entry),
            Err(poisoned) => poisoned.into_inner().push(entry),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::audit::{
        InMemoryQueryAuditLog, QueryAuditEntry, QueryAuditLog, METADATA_COLLECTED,
        METADATA_DOMAINS,
    };

    #[tokio::test]
    async fn in_memory_log_records_entries_with_metadata() {
        let log = InMemoryQueryAuditLog::default();
        log.append(
            QueryAuditEntry::new("acme", "how many buckets?", "You have 3 buckets.")
                .with_metadata(METADATA_DOMAINS, "storage")
                .with_metadata(METADATA_COLLECTED, "storage"),
        )
        .await
        .expect("append");

        let entries = log.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].client_id, "acme");
        assert_eq!(entries[0].metadata.get(METADATA_DOMAINS).map(String::as_str), Some("storage"));
        assert!(!entries[0].entry_id.is_empty());
    }
}
