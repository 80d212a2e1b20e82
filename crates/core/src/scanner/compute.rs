use std::sync::Arc;

use async_trait::async_trait;

use super::{scan_finished, scan_started, ResourceScanner};
use crate::domain::resource::{ComputeInstance, ResourceKind};
use crate::errors::ScanError;
use crate::pagination::collect_pages;
use crate::provider::ComputeApi;

#[derive(Clone)]
pub struct ComputeScanner {
    api: Arc<dyn ComputeApi>,
}

impl ComputeScanner {
    pub fn new(api: Arc<dyn ComputeApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl ResourceScanner for ComputeScanner {
    type Record = ComputeInstance;

    fn kind(&self) -> ResourceKind {
        ResourceKind::Compute
    }

    async fn scan(&self) -> Result<Vec<ComputeInstance>, ScanError> {
        let started = scan_started(self.kind());
        let result = collect_pages("compute", |token| self.api.list_instances(token)).await;
        scan_finished(self.kind(), started, result)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::ComputeScanner;
    use crate::domain::resource::ResourceKind;
    use crate::errors::{ProviderErrorKind, ScanError};
    use crate::provider::memory::{compute_instance, ops, InMemoryCloud};
    use crate::provider::Page;
    use crate::scanner::ResourceScanner;

    #[tokio::test]
    async fn returns_every_instance_across_pages_in_order() {
        let cloud = Arc::new(InMemoryCloud::new().with_compute_pages(vec![
            Page::with_token(
                vec![compute_instance("i-1", "running"), compute_instance("i-2", "stopped")],
                "p2",
            ),
            Page::with_token(vec![compute_instance("i-3", "running")], ""),
            Page::last(vec![compute_instance("i-4", "running"), compute_instance("i-5", "pending")]),
        ]));
        let scanner = ComputeScanner::new(cloud.clone());

        let instances = scanner.scan().await.expect("scan");

        let ids: Vec<_> = instances.iter().map(|instance| instance.id.as_str()).collect();
        assert_eq!(ids, ["i-1", "i-2", "i-3", "i-4", "i-5"]);
        assert_eq!(cloud.calls(ops::DESCRIBE_INSTANCES), 3);
    }

    #[tokio::test]
    async fn listing_failure_is_a_typed_error_not_a_partial_list() {
        let cloud = Arc::new(
            InMemoryCloud::new()
                .with_instances(vec![compute_instance("i-1", "running")])
                .failing(ops::DESCRIBE_INSTANCES, ProviderErrorKind::Unauthorized),
        );

        let result = ComputeScanner::new(cloud).scan().await;

        assert!(matches!(
            result,
            Err(ScanError::ListingFailed { kind: ResourceKind::Compute, ref source })
                if source.kind == ProviderErrorKind::Unauthorized
        ));
    }
}
