use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::resource::{
    ComputeInstance, DatabaseInstance, LoadBalancer, ResourceKind, ResourceRecord, StorageBucket,
};

/// Result of scanning one resource kind. An empty `Scanned` and a `Failed`
/// are different answers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum KindOutcome<T> {
    Scanned { items: Vec<T> },
    Failed { error: String },
}

impl<T> KindOutcome<T> {
    pub fn from_result<E: std::fmt::Display>(result: Result<Vec<T>, E>) -> Self {
        match result {
            Ok(items) => Self::Scanned { items },
            Err(error) => Self::Failed { error: error.to_string() },
        }
    }

    pub fn items(&self) -> Option<&[T]> {
        match self {
            Self::Scanned { items } => Some(items),
            Self::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Scanned { .. } => None,
            Self::Failed { error } => Some(error),
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// Items when scanned, an empty list when failed.
    pub fn into_items(self) -> Vec<T> {
        match self {
            Self::Scanned { items } => items,
            Self::Failed { .. } => Vec::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InventorySnapshot {
    pub captured_at: DateTime<Utc>,
    pub compute: KindOutcome<ComputeInstance>,
    pub storage: KindOutcome<StorageBucket>,
    pub database: KindOutcome<DatabaseInstance>,
    pub load_balancers: KindOutcome<LoadBalancer>,
}

impl InventorySnapshot {
    pub fn failures(&self) -> Vec<(ResourceKind, &str)> {
        [
            (ResourceKind::Compute, self.compute.error()),
            (ResourceKind::Storage, self.storage.error()),
            (ResourceKind::Database, self.database.error()),
            (ResourceKind::LoadBalancer, self.load_balancers.error()),
        ]
        .into_iter()
        .filter_map(|(kind, error)| error.map(|error| (kind, error)))
        .collect()
    }

    pub fn resource_count(&self) -> usize {
        self.compute.items().map_or(0, <[_]>::len)
            + self.storage.items().map_or(0, <[_]>::len)
            + self.database.items().map_or(0, <[_]>::len)
            + self.load_balancers.items().map_or(0, <[_]>::len)
    }

    /// Every successfully scanned record, kinds in a fixed order.
    pub fn records(&self) -> Vec<ResourceRecord> {
        let mut records = Vec::with_capacity(self.resource_count());
        records.extend(self.compute.items().unwrap_or_default().iter().cloned().map(Into::into));
        records.extend(self.storage.items().unwrap_or_default().iter().cloned().map(Into::into));
        records.extend(self.database.items().unwrap_or_default().iter().cloned().map(Into::into));
        records.extend(
            self.load_balancers.items().unwrap_or_default().iter().cloned().map(Into::into),
        );
        records
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{InventorySnapshot, KindOutcome};
    use crate::domain::resource::{ResourceKind, StorageBucket, Tags};

    fn bucket(name: &str) -> StorageBucket {
        StorageBucket {
            name: name.to_owned(),
            creation_date: None,
            region: Some("us-east-1".to_owned()),
            versioning: false,
            website_enabled: false,
            tags: Tags::new(),
        }
    }

    #[test]
    fn empty_and_failed_outcomes_serialize_differently() {
        let empty: KindOutcome<StorageBucket> = KindOutcome::Scanned { items: vec![] };
        let failed: KindOutcome<StorageBucket> =
            KindOutcome::Failed { error: "access denied".to_owned() };

        let empty_json = serde_json::to_value(&empty).expect("serialize");
        let failed_json = serde_json::to_value(&failed).expect("serialize");

        assert_eq!(empty_json["status"], "scanned");
        assert_eq!(failed_json["status"], "failed");
        assert_eq!(failed_json["error"], "access denied");
        assert_ne!(empty_json, failed_json);
    }

    #[test]
    fn failures_lists_only_failed_kinds() {
        let snapshot = InventorySnapshot {
            captured_at: Utc::now(),
            compute: KindOutcome::Scanned { items: vec![] },
            storage: KindOutcome::Failed { error: "throttled".to_owned() },
            database: KindOutcome::Scanned { items: vec![] },
            load_balancers: KindOutcome::Scanned { items: vec![] },
        };

        assert_eq!(snapshot.failures(), vec![(ResourceKind::Storage, "throttled")]);
        assert_eq!(snapshot.resource_count(), 0);
    }

    #[test]
    fn records_flatten_scanned_kinds() {
        let snapshot = InventorySnapshot {
            captured_at: Utc::now(),
            compute: KindOutcome::Failed { error: "boom".to_owned() },
            storage: KindOutcome::Scanned { items: vec![bucket("a"), bucket("b")] },
            database: KindOutcome::Scanned { items: vec![] },
            load_balancers: KindOutcome::Scanned { items: vec![] },
        };

        let records = snapshot.records();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|record| record.kind() == ResourceKind::Storage));
        assert_eq!(records[0].id(), "a");
    }
}
