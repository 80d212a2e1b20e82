use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};

use super::{scan_finished, scan_started, ResourceScanner, ENRICHMENT_CONCURRENCY};
use crate::domain::resource::{DatabaseInstance, ResourceKind};
use crate::errors::ScanError;
use crate::metrics::MetricReducer;
use crate::pagination::collect_pages;
use crate::provider::DatabaseApi;

/// Lists database instances and attaches their recent operational metrics.
#[derive(Clone)]
pub struct DatabaseScanner {
    api: Arc<dyn DatabaseApi>,
    metrics: MetricReducer,
}

impl DatabaseScanner {
    pub fn new(api: Arc<dyn DatabaseApi>, metrics: MetricReducer) -> Self {
        Self { api, metrics }
    }

    async fn with_metrics(&self, mut instance: DatabaseInstance) -> DatabaseInstance {
        instance.metrics = self.metrics.database_metrics(&instance.identifier).await;
        instance
    }
}

#[async_trait]
impl ResourceScanner for DatabaseScanner {
    type Record = DatabaseInstance;

    fn kind(&self) -> ResourceKind {
        ResourceKind::Database
    }

    async fn scan(&self) -> Result<Vec<DatabaseInstance>, ScanError> {
        let started = scan_started(self.kind());
        let listed = collect_pages("database", |token| self.api.list_databases(token)).await;
        let result = match listed {
            Ok(instances) => Ok(stream::iter(instances)
                .map(|instance| self.with_metrics(instance))
                .buffered(ENRICHMENT_CONCURRENCY)
                .collect::<Vec<_>>()
                .await),
            Err(error) => Err(error),
        };
        scan_finished(self.kind(), started, result)
    }
}
