pub mod compute;
pub mod database;
pub mod load_balancer;
pub mod storage;

use std::time::Instant;

use async_trait::async_trait;
use tracing::{error, info};

pub use compute::ComputeScanner;
pub use database::DatabaseScanner;
pub use load_balancer::LoadBalancerScanner;
pub use storage::StorageScanner;

use crate::domain::resource::ResourceKind;
use crate::errors::{ProviderError, ScanError};

/// Concurrent per-item lookups in flight for one scan.
pub const ENRICHMENT_CONCURRENCY: usize = 16;

/// Lists every resource of one kind.
///
/// A scan fails only when the listing itself fails; per-item lookups that
/// fail leave their fields at defaults.
#[async_trait]
pub trait ResourceScanner: Send + Sync {
    type Record: Send;

    fn kind(&self) -> ResourceKind;

    async fn scan(&self) -> Result<Vec<Self::Record>, ScanError>;
}

pub(crate) fn scan_started(kind: ResourceKind) -> Instant {
    info!(event_name = "scan.started", kind = %kind, "resource scan started");
    Instant::now()
}

pub(crate) fn scan_finished<T>(
    kind: ResourceKind,
    started: Instant,
    result: Result<Vec<T>, ProviderError>,
) -> Result<Vec<T>, ScanError> {
    let elapsed_ms = started.elapsed().as_millis() as u64;
    match result {
        Ok(records) => {
            info!(
                event_name = "scan.completed",
                kind = %kind,
                count = records.len(),
                elapsed_ms,
                "resource scan completed"
            );
            Ok(records)
        }
        Err(source) => {
            error!(
                event_name = "scan.failed",
                kind = %kind,
                elapsed_ms,
                error = %source,
                "resource listing failed"
            );
            Err(ScanError::ListingFailed { kind, source })
        }
    }
}

/// Collapse a failed lookup to `fallback`, logging it.
pub(crate) fn or_default<T>(
    result: Result<T, ProviderError>,
    fallback: T,
    kind: ResourceKind,
    item: &str,
    lookup: &'static str,
) -> T {
    match result {
        Ok(value) => value,
        Err(error) => {
            tracing::warn!(
                event_name = "scan.enrichment.failed",
                kind = %kind,
                item,
                lookup,
                error = %error,
                "per-item lookup failed; keeping default"
            );
            fallback
        }
    }
}
