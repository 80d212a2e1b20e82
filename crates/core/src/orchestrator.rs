use chrono::Utc;
use tracing::{info, warn};

use crate::domain::snapshot::{InventorySnapshot, KindOutcome};
use crate::metrics::MetricReducer;
use crate::provider::ProviderSet;
use crate::scanner::{
    ComputeScanner, DatabaseScanner, LoadBalancerScanner, ResourceScanner, StorageScanner,
};

/// Runs every resource scanner concurrently and merges the results.
#[derive(Clone)]
pub struct ScanOrchestrator {
    compute: ComputeScanner,
    storage: StorageScanner,
    database: DatabaseScanner,
    load_balancers: LoadBalancerScanner,
}

impl ScanOrchestrator {
    pub fn new(providers: &ProviderSet) -> Self {
        Self {
            compute: ComputeScanner::new(providers.compute.clone()),
            storage: StorageScanner::new(providers.storage.clone()),
            database: DatabaseScanner::new(
                providers.database.clone(),
                MetricReducer::new(providers.metrics.clone()),
            ),
            load_balancers: LoadBalancerScanner::new(providers.load_balancer.clone()),
        }
    }

    pub fn compute(&self) -> &ComputeScanner {
        &self.compute
    }

    pub fn storage(&self) -> &StorageScanner {
        &self.storage
    }

    pub fn database(&self) -> &DatabaseScanner {
        &self.database
    }

    pub fn load_balancers(&self) -> &LoadBalancerScanner {
        &self.load_balancers
    }

    /// Every scanner runs to completion; a failed kind is recorded in the
    /// snapshot and never cancels the others.
    pub async fn scan_all(&self) -> InventorySnapshot {
        let captured_at = Utc::now();

        let (compute, storage, database, load_balancers) = tokio::join!(
            self.compute.scan(),
            self.storage.scan(),
            self.database.scan(),
            self.load_balancers.scan(),
        );

        let snapshot = InventorySnapshot {
            captured_at,
            compute: KindOutcome::from_result(compute),
            storage: KindOutcome::from_result(storage),
            database: KindOutcome::from_result(database),
            load_balancers: KindOutcome::from_result(load_balancers),
        };

        let failures = snapshot.failures();
        if failures.is_empty() {
            info!(
                event_name = "scan.snapshot.completed",
                resources = snapshot.resource_count(),
                "inventory snapshot completed"
            );
        } else {
            let failed_kinds =
                failures.iter().map(|(kind, _)| kind.as_str()).collect::<Vec<_>>().join(",");
            warn!(
                event_name = "scan.snapshot.partial",
                resources = snapshot.resource_count(),
                failed_kinds = %failed_kinds,
                "inventory snapshot completed with failed kinds"
            );
        }

        snapshot
    }
}
