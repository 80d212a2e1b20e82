//! Interfaces to the cloud resource, metrics and cost APIs.
//!
//! Every listing operation is paginated with an opaque continuation token.
//! Implementations live in `cloudscope-aws`; [`memory::InMemoryCloud`] is a
//! scriptable fake used by tests.

pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::cost::{CostService, DateRange};
use crate::domain::metric::{Datapoint, MetricWindow, Statistic};
use crate::domain::resource::{BucketSummary, ComputeInstance, DatabaseInstance, LoadBalancer, Tags};
use crate::errors::ProviderError;

/// One page of a listing. `next_token: None` is the only end-of-listing signal.
#[derive(Clone, Debug, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_token: Option<String>,
}

impl<T> Page<T> {
    pub fn last(items: Vec<T>) -> Self {
        Self { items, next_token: None }
    }

    pub fn with_token(items: Vec<T>, next_token: impl Into<String>) -> Self {
        Self { items, next_token: Some(next_token.into()) }
    }
}

#[async_trait]
pub trait ComputeApi: Send + Sync {
    async fn list_instances(
        &self,
        token: Option<String>,
    ) -> Result<Page<ComputeInstance>, ProviderError>;
}

#[async_trait]
pub trait StorageApi: Send + Sync {
    async fn list_buckets(&self, token: Option<String>)
        -> Result<Page<BucketSummary>, ProviderError>;

    /// Raw location constraint. `None` or an empty string means the default region.
    async fn bucket_location(&self, bucket: &str) -> Result<Option<String>, ProviderError>;

    // The lookups below go to `region` when given. S3 answers with a redirect
    // rather than data for buckets outside the client's own region.

    async fn bucket_versioning(
        &self,
        bucket: &str,
        region: Option<&str>,
    ) -> Result<bool, ProviderError>;

    async fn bucket_website(&self, bucket: &str, region: Option<&str>)
        -> Result<bool, ProviderError>;

    async fn bucket_tags(&self, bucket: &str, region: Option<&str>) -> Result<Tags, ProviderError>;
}

#[async_trait]
pub trait DatabaseApi: Send + Sync {
    async fn list_databases(
        &self,
        token: Option<String>,
    ) -> Result<Page<DatabaseInstance>, ProviderError>;
}

#[async_trait]
pub trait LoadBalancerApi: Send + Sync {
    async fn list_load_balancers(
        &self,
        token: Option<String>,
    ) -> Result<Page<LoadBalancer>, ProviderError>;

    async fn load_balancer_tags(&self, arn: &str) -> Result<Tags, ProviderError>;
}

#[derive(Clone, Debug, PartialEq)]
pub struct MetricQuery {
    pub namespace: String,
    pub metric_name: String,
    pub dimension_name: String,
    pub dimension_value: String,
    pub window: MetricWindow,
    pub statistic: Statistic,
}

#[async_trait]
pub trait MetricsApi: Send + Sync {
    async fn datapoints(&self, query: &MetricQuery) -> Result<Vec<Datapoint>, ProviderError>;
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostQuery {
    pub range: DateRange,
    pub service: Option<CostService>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostAmount {
    pub amount: Decimal,
    pub unit: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostGroup {
    pub keys: Vec<String>,
    pub amount: CostAmount,
}

/// A monthly result as reported by the cost API, before aggregation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawCostPeriod {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub total: Option<CostAmount>,
    pub groups: Vec<CostGroup>,
}

#[async_trait]
pub trait CostApi: Send + Sync {
    async fn monthly_costs(
        &self,
        query: &CostQuery,
        token: Option<String>,
    ) -> Result<Page<RawCostPeriod>, ProviderError>;
}

/// Explicitly constructed provider clients shared by scanners and fetchers.
#[derive(Clone)]
pub struct ProviderSet {
    pub compute: Arc<dyn ComputeApi>,
    pub storage: Arc<dyn StorageApi>,
    pub database: Arc<dyn DatabaseApi>,
    pub load_balancer: Arc<dyn LoadBalancerApi>,
    pub metrics: Arc<dyn MetricsApi>,
    pub cost: Arc<dyn CostApi>,
}

impl ProviderSet {
    /// Use one value that implements every interface.
    pub fn from_shared<P>(provider: Arc<P>) -> Self
    where
        P: ComputeApi + StorageApi + DatabaseApi + LoadBalancerApi + MetricsApi + CostApi + 'static,
    {
        Self {
            compute: provider.clone(),
            storage: provider.clone(),
            database: provider.clone(),
            load_balancer: provider.clone(),
            metrics: provider.clone(),
            cost: provider,
        }
    }
}
