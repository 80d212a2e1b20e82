use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};

use super::{or_default, scan_finished, scan_started, ResourceScanner, ENRICHMENT_CONCURRENCY};
use crate::domain::resource::{LoadBalancer, ResourceKind, Tags};
use crate::errors::ScanError;
use crate::pagination::collect_pages;
use crate::provider::LoadBalancerApi;

#[derive(Clone)]
pub struct LoadBalancerScanner {
    api: Arc<dyn LoadBalancerApi>,
}

impl LoadBalancerScanner {
    pub fn new(api: Arc<dyn LoadBalancerApi>) -> Self {
        Self { api }
    }

    async fn with_tags(&self, mut balancer: LoadBalancer) -> LoadBalancer {
        let tags = self.api.load_balancer_tags(&balancer.arn).await;
        balancer.tags = or_default(tags, Tags::new(), self.kind(), &balancer.name, "tags");
        balancer
    }
}

#[async_trait]
impl ResourceScanner for LoadBalancerScanner {
    type Record = LoadBalancer;

    fn kind(&self) -> ResourceKind {
        ResourceKind::LoadBalancer
    }

    async fn scan(&self) -> Result<Vec<LoadBalancer>, ScanError> {
        let started = scan_started(self.kind());
        let listed =
            collect_pages("load_balancer", |token| self.api.list_load_balancers(token)).await;
        let result = match listed {
            Ok(balancers) => Ok(stream::iter(balancers)
                .map(|balancer| self.with_tags(balancer))
                .buffered(ENRICHMENT_CONCURRENCY)
                .collect::<Vec<_>>()
                .await),
            Err(error) => Err(error),
        };
        scan_finished(self.kind(), started, result)
    }
}
