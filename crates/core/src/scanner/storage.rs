use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};

use super::{or_default, scan_finished, scan_started, ResourceScanner, ENRICHMENT_CONCURRENCY};
use crate::domain::resource::{BucketSummary, ResourceKind, StorageBucket, Tags};
use crate::errors::ScanError;
use crate::pagination::collect_pages;
use crate::provider::StorageApi;

/// Region reported for buckets whose location constraint is empty.
pub const DEFAULT_BUCKET_REGION: &str = "us-east-1";

#[derive(Clone)]
pub struct StorageScanner {
    api: Arc<dyn StorageApi>,
}

impl StorageScanner {
    pub fn new(api: Arc<dyn StorageApi>) -> Self {
        Self { api }
    }

    /// Location is resolved first so the remaining lookups can target the
    /// bucket's home region.
    async fn enrich(&self, summary: BucketSummary) -> StorageBucket {
        let name = summary.name.clone();
        let kind = ResourceKind::Storage;

        let location = self.api.bucket_location(&name).await;
        let location = location.map(|raw| Some(normalize_location(raw)));
        let region = or_default(location, None, kind, &name, "location");

        let home = region.as_deref();
        let (versioning, website, tags) = tokio::join!(
            self.api.bucket_versioning(&name, home),
            self.api.bucket_website(&name, home),
            self.api.bucket_tags(&name, home),
        );

        StorageBucket {
            region,
            versioning: or_default(versioning, false, kind, &name, "versioning"),
            website_enabled: or_default(website, false, kind, &name, "website"),
            tags: or_default(tags, Tags::new(), kind, &name, "tags"),
            ..StorageBucket::from_summary(summary)
        }
    }
}

fn normalize_location(raw: Option<String>) -> String {
    match raw.as_deref().map(str::trim) {
        None | Some("") => DEFAULT_BUCKET_REGION.to_owned(),
        // Legacy constraint still returned for old Ireland buckets.
        Some("EU") => "eu-west-1".to_owned(),
        Some(region) => region.to_owned(),
    }
}

#[async_trait]
impl ResourceScanner for StorageScanner {
    type Record = StorageBucket;

    fn kind(&self) -> ResourceKind {
        ResourceKind::Storage
    }

    async fn scan(&self) -> Result<Vec<StorageBucket>, ScanError> {
        let started = scan_started(self.kind());
        let listed = collect_pages("storage", |token| self.api.list_buckets(token)).await;
        let result = match listed {
            Ok(summaries) => Ok(stream::iter(summaries)
                .map(|summary| self.enrich(summary))
                .buffered(ENRICHMENT_CONCURRENCY)
                .collect::<Vec<_>>()
                .await),
            Err(error) => Err(error),
        };
        scan_finished(self.kind(), started, result)
    }
}
