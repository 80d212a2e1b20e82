use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;

use super::{
    ComputeApi, CostAmount, CostApi, CostGroup, CostQuery, DatabaseApi, LoadBalancerApi,
    MetricQuery, MetricsApi, Page, RawCostPeriod, StorageApi,
};
use crate::domain::metric::Datapoint;
use crate::domain::resource::{
    BucketSummary, ComputeInstance, DatabaseInstance, Endpoint, LoadBalancer, LoadBalancerType,
    Tags,
};
use crate::errors::{ProviderError, ProviderErrorKind};

/// Operation names recorded by [`InMemoryCloud::calls`].
pub mod ops {
    pub const DESCRIBE_INSTANCES: &str = "DescribeInstances";
    pub const LIST_BUCKETS: &str = "ListBuckets";
    pub const GET_BUCKET_LOCATION: &str = "GetBucketLocation";
    pub const GET_BUCKET_VERSIONING: &str = "GetBucketVersioning";
    pub const GET_BUCKET_WEBSITE: &str = "GetBucketWebsite";
    pub const GET_BUCKET_TAGGING: &str = "GetBucketTagging";
    pub const DESCRIBE_DB_INSTANCES: &str = "DescribeDBInstances";
    pub const DESCRIBE_LOAD_BALANCERS: &str = "DescribeLoadBalancers";
    pub const DESCRIBE_TAGS: &str = "DescribeTags";
    pub const GET_METRIC_STATISTICS: &str = "GetMetricStatistics";
    pub const GET_COST_AND_USAGE: &str = "GetCostAndUsage";
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BucketLookup {
    Location,
    Versioning,
    Website,
    Tags,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BucketDetails {
    pub location: Option<String>,
    pub versioning: bool,
    pub website: bool,
    pub tags: Tags,
}

/// Scriptable stand-in for every provider interface.
///
/// Listings are served from scripted pages: a request with no token gets the
/// first page, and a request carrying token `t` gets the page after the last
/// one served, provided that page handed out `t`. Otherwise it gets the page
/// after the first one whose `next_token` was `t`. Failures can be injected
/// per operation or per item, and every call is counted.
#[derive(Default)]
pub struct InMemoryCloud {
    compute_pages: Vec<Page<ComputeInstance>>,
    bucket_pages: Vec<Page<BucketSummary>>,
    database_pages: Vec<Page<DatabaseInstance>>,
    load_balancer_pages: Vec<Page<LoadBalancer>>,
    cost_pages: Vec<Page<RawCostPeriod>>,
    operation_failures: HashMap<&'static str, ProviderError>,
    bucket_details: HashMap<String, BucketDetails>,
    bucket_failures: HashSet<(String, BucketLookup)>,
    load_balancer_tags: HashMap<String, Tags>,
    load_balancer_tag_failures: HashSet<String>,
    datapoints: HashMap<(String, String), Vec<Datapoint>>,
    metric_failures: HashSet<(String, String)>,
    calls: Mutex<BTreeMap<&'static str, usize>>,
    served: Mutex<HashMap<&'static str, usize>>,
    bucket_lookups: Mutex<Vec<(String, BucketLookup, Option<String>)>>,
    cost_queries: Mutex<Vec<CostQuery>>,
}

impl InMemoryCloud {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_compute_pages(mut self, pages: Vec<Page<ComputeInstance>>) -> Self {
        self.compute_pages = pages;
        self
    }

    pub fn with_instances(self, instances: Vec<ComputeInstance>) -> Self {
        self.with_compute_pages(vec![Page::last(instances)])
    }

    pub fn with_bucket_pages(mut self, pages: Vec<Page<BucketSummary>>) -> Self {
        self.bucket_pages = pages;
        self
    }

    pub fn with_buckets(self, names: &[&str]) -> Self {
        let summaries = names
            .iter()
            .map(|name| BucketSummary { name: (*name).to_owned(), creation_date: None })
            .collect();
        self.with_bucket_pages(vec![Page::last(summaries)])
    }

    pub fn with_bucket_details(mut self, bucket: &str, details: BucketDetails) -> Self {
        self.bucket_details.insert(bucket.to_owned(), details);
        self
    }

    pub fn failing_bucket_lookup(mut self, bucket: &str, lookup: BucketLookup) -> Self {
        self.bucket_failures.insert((bucket.to_owned(), lookup));
        self
    }

    pub fn with_database_pages(mut self, pages: Vec<Page<DatabaseInstance>>) -> Self {
        self.database_pages = pages;
        self
    }

    pub fn with_databases(self, databases: Vec<DatabaseInstance>) -> Self {
        self.with_database_pages(vec![Page::last(databases)])
    }

    pub fn with_load_balancer_pages(mut self, pages: Vec<Page<LoadBalancer>>) -> Self {
        self.load_balancer_pages = pages;
        self
    }

    pub fn with_load_balancers(self, balancers: Vec<LoadBalancer>) -> Self {
        self.with_load_balancer_pages(vec![Page::last(balancers)])
    }

    pub fn with_load_balancer_tags(mut self, arn: &str, tags: Tags) -> Self {
        self.load_balancer_tags.insert(arn.to_owned(), tags);
        self
    }

    pub fn failing_load_balancer_tags(mut self, arn: &str) -> Self {
        self.load_balancer_tag_failures.insert(arn.to_owned());
        self
    }

    pub fn with_datapoints(mut self, entity: &str, metric: &str, points: Vec<Datapoint>) -> Self {
        self.datapoints.insert((entity.to_owned(), metric.to_owned()), points);
        self
    }

    pub fn failing_metric(mut self, entity: &str, metric: &str) -> Self {
        self.metric_failures.insert((entity.to_owned(), metric.to_owned()));
        self
    }

    pub fn with_cost_pages(mut self, pages: Vec<Page<RawCostPeriod>>) -> Self {
        self.cost_pages = pages;
        self
    }

    pub fn with_cost_periods(self, periods: Vec<RawCostPeriod>) -> Self {
        self.with_cost_pages(vec![Page::last(periods)])
    }

    /// Make every call to `operation` fail with `kind`.
    pub fn failing(mut self, operation: &'static str, kind: ProviderErrorKind) -> Self {
        let error = ProviderError::new("memory", operation, kind, "injected failure");
        self.operation_failures.insert(operation, error);
        self
    }

    pub fn calls(&self, operation: &str) -> usize {
        let calls = match self.calls.lock() {
            Ok(calls) => calls,
            Err(poisoned) => poisoned.into_inner(),
        };
        calls.get(operation).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        let calls = match self.calls.lock() {
            Ok(calls) => calls,
            Err(poisoned) => poisoned.into_inner(),
        };
        calls.values().sum()
    }

    pub fn cost_queries(&self) -> Vec<CostQuery> {
        match self.cost_queries.lock() {
            Ok(queries) => queries.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Metadata lookups made for `bucket`, in call order, with the region
    /// each one was sent to.
    pub fn bucket_lookup_regions(&self, bucket: &str) -> Vec<(BucketLookup, Option<String>)> {
        let lookups = match self.bucket_lookups.lock() {
            Ok(lookups) => lookups,
            Err(poisoned) => poisoned.into_inner(),
        };
        lookups
            .iter()
            .filter(|(name, _, _)| name == bucket)
            .map(|(_, lookup, region)| (*lookup, region.clone()))
            .collect()
    }

    fn record_bucket_lookup(
        &self,
        operation: &'static str,
        bucket: &str,
        lookup: BucketLookup,
        region: Option<&str>,
    ) -> Result<(), ProviderError> {
        {
            let mut lookups = match self.bucket_lookups.lock() {
                Ok(lookups) => lookups,
                Err(poisoned) => poisoned.into_inner(),
            };
            lookups.push((bucket.to_owned(), lookup, region.map(str::to_owned)));
        }
        self.record(operation)?;
        if self.bucket_failures.contains(&(bucket.to_owned(), lookup)) {
            return Err(lookup_failure(operation, bucket));
        }
        Ok(())
    }

    fn serve_page<T: Clone>(
        &self,
        operation: &'static str,
        pages: &[Page<T>],
        token: Option<&str>,
    ) -> Result<Page<T>, ProviderError> {
        let mut served = match self.served.lock() {
            Ok(served) => served,
            Err(poisoned) => poisoned.into_inner(),
        };
        let index = match token {
            None => 0,
            Some(token) => {
                let handed_out = |position: &usize| {
                    pages
                        .get(*position)
                        .is_some_and(|page| page.next_token.as_deref() == Some(token))
                };
                let previous = served.get(operation).copied().filter(handed_out).or_else(|| {
                    pages.iter().position(|page| page.next_token.as_deref() == Some(token))
                });
                match previous {
                    Some(position) => position + 1,
                    None => {
                        return Err(ProviderError::new(
                            "memory",
                            operation,
                            ProviderErrorKind::InvalidRequest,
                            format!("unknown continuation token `{token}`"),
                        ))
                    }
                }
            }
        };
        served.insert(operation, index);
        Ok(pages.get(index).cloned().unwrap_or_else(|| Page::last(Vec::new())))
    }

    fn record(&self, operation: &'static str) -> Result<(), ProviderError> {
        {
            let mut calls = match self.calls.lock() {
                Ok(calls) => calls,
                Err(poisoned) => poisoned.into_inner(),
            };
            *calls.entry(operation).or_insert(0) += 1;
        }
        match self.operation_failures.get(operation) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

fn lookup_failure(operation: &'static str, item: &str) -> ProviderError {
    ProviderError::new(
        "memory",
        operation,
        ProviderErrorKind::Other,
        format!("injected failure for `{item}`"),
    )
}

#[async_trait]
impl ComputeApi for InMemoryCloud {
    async fn list_instances(
        &self,
        token: Option<String>,
    ) -> Result<Page<ComputeInstance>, ProviderError> {
        self.record(ops::DESCRIBE_INSTANCES)?;
        self.serve_page(ops::DESCRIBE_INSTANCES, &self.compute_pages, token.as_deref())
    }
}

#[async_trait]
impl StorageApi for InMemoryCloud {
    async fn list_buckets(
        &self,
        token: Option<String>,
    ) -> Result<Page<BucketSummary>, ProviderError> {
        self.record(ops::LIST_BUCKETS)?;
        self.serve_page(ops::LIST_BUCKETS, &self.bucket_pages, token.as_deref())
    }

    async fn bucket_location(&self, bucket: &str) -> Result<Option<String>, ProviderError> {
        self.record_bucket_lookup(ops::GET_BUCKET_LOCATION, bucket, BucketLookup::Location, None)?;
        Ok(self.bucket_details.get(bucket).and_then(|details| details.location.clone()))
    }

    async fn bucket_versioning(
        &self,
        bucket: &str,
        region: Option<&str>,
    ) -> Result<bool, ProviderError> {
        let operation = ops::GET_BUCKET_VERSIONING;
        self.record_bucket_lookup(operation, bucket, BucketLookup::Versioning, region)?;
        Ok(self.bucket_details.get(bucket).is_some_and(|details| details.versioning))
    }

    async fn bucket_website(
        &self,
        bucket: &str,
        region: Option<&str>,
    ) -> Result<bool, ProviderError> {
        self.record_bucket_lookup(ops::GET_BUCKET_WEBSITE, bucket, BucketLookup::Website, region)?;
        Ok(self.bucket_details.get(bucket).is_some_and(|details| details.website))
    }

    async fn bucket_tags(&self, bucket: &str, region: Option<&str>) -> Result<Tags, ProviderError> {
        self.record_bucket_lookup(ops::GET_BUCKET_TAGGING, bucket, BucketLookup::Tags, region)?;
        Ok(self.bucket_details.get(bucket).map(|details| details.tags.clone()).unwrap_or_default())
    }
}

#[async_trait]
impl DatabaseApi for InMemoryCloud {
    async fn list_databases(
        &self,
        token: Option<String>,
    ) -> Result<Page<DatabaseInstance>, ProviderError> {
        self.record(ops::DESCRIBE_DB_INSTANCES)?;
        self.serve_page(ops::DESCRIBE_DB_INSTANCES, &self.database_pages, token.as_deref())
    }
}

#[async_trait]
impl LoadBalancerApi for InMemoryCloud {
    async fn list_load_balancers(
        &self,
        token: Option<String>,
    ) -> Result<Page<LoadBalancer>, ProviderError> {
        self.record(ops::DESCRIBE_LOAD_BALANCERS)?;
        self.serve_page(ops::DESCRIBE_LOAD_BALANCERS, &self.load_balancer_pages, token.as_deref())
    }

    async fn load_balancer_tags(&self, arn: &str) -> Result<Tags, ProviderError> {
        self.record(ops::DESCRIBE_TAGS)?;
        if self.load_balancer_tag_failures.contains(arn) {
            return Err(lookup_failure(ops::DESCRIBE_TAGS, arn));
        }
        Ok(self.load_balancer_tags.get(arn).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl MetricsApi for InMemoryCloud {
    async fn datapoints(&self, query: &MetricQuery) -> Result<Vec<Datapoint>, ProviderError> {
        self.record(ops::GET_METRIC_STATISTICS)?;
        let key = (query.dimension_value.clone(), query.metric_name.clone());
        if self.metric_failures.contains(&key) {
            return Err(lookup_failure(ops::GET_METRIC_STATISTICS, &query.metric_name));
        }
        Ok(self.datapoints.get(&key).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl CostApi for InMemoryCloud {
    async fn monthly_costs(
        &self,
        query: &CostQuery,
        token: Option<String>,
    ) -> Result<Page<RawCostPeriod>, ProviderError> {
        {
            let mut queries = match self.cost_queries.lock() {
                Ok(queries) => queries,
                Err(poisoned) => poisoned.into_inner(),
            };
            queries.push(query.clone());
        }
        self.record(ops::GET_COST_AND_USAGE)?;
        self.serve_page(ops::GET_COST_AND_USAGE, &self.cost_pages, token.as_deref())
    }
}

pub fn compute_instance(id: &str, state: &str) -> ComputeInstance {
    ComputeInstance {
        id: id.to_owned(),
        name: id.to_owned(),
        instance_type: "t3.micro".to_owned(),
        state: state.to_owned(),
        availability_zone: Some("us-east-1a".to_owned()),
        region: Some("us-east-1".to_owned()),
        private_ip: Some("10.0.0.10".to_owned()),
        public_ip: None,
        launch_time: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).single(),
        platform: "linux".to_owned(),
        root_device_type: Some("ebs".to_owned()),
        vpc_id: Some("vpc-1".to_owned()),
        subnet_id: Some("subnet-1".to_owned()),
        tags: Tags::new(),
    }
}

pub fn database_instance(identifier: &str) -> DatabaseInstance {
    DatabaseInstance {
        identifier: identifier.to_owned(),
        engine: "postgres".to_owned(),
        engine_version: Some("15.4".to_owned()),
        instance_class: "db.t3.medium".to_owned(),
        status: "available".to_owned(),
        multi_az: false,
        storage_type: Some("gp3".to_owned()),
        allocated_storage_gb: Some(20),
        endpoint: Some(Endpoint {
            address: format!("{identifier}.abc.us-east-1.rds.amazonaws.com"),
            port: Some(5432),
        }),
        availability_zone: Some("us-east-1b".to_owned()),
        publicly_accessible: false,
        storage_encrypted: true,
        tags: Tags::new(),
        metrics: Vec::new(),
    }
}

pub fn load_balancer(name: &str, lb_type: LoadBalancerType) -> LoadBalancer {
    LoadBalancer {
        name: name.to_owned(),
        arn: format!(
            "arn:aws:elasticloadbalancing:us-east-1:123456789012:loadbalancer/app/{name}/1"
        ),
        dns_name: Some(format!("{name}.elb.amazonaws.com")),
        lb_type,
        scheme: Some("internet-facing".to_owned()),
        vpc_id: Some("vpc-1".to_owned()),
        state: Some("active".to_owned()),
        created_time: None,
        availability_zones: vec!["us-east-1a".to_owned(), "us-east-1b".to_owned()],
        tags: Tags::new(),
    }
}

/// A monthly period with an optional grand total and any group subtotals, in USD.
pub fn cost_period(
    start: NaiveDate,
    end: NaiveDate,
    total: Option<Decimal>,
    groups: &[Decimal],
) -> RawCostPeriod {
    RawCostPeriod {
        start,
        end,
        total: total.map(|amount| CostAmount { amount, unit: "USD".to_owned() }),
        groups: groups
            .iter()
            .enumerate()
            .map(|(index, amount)| CostGroup {
                keys: vec![format!("group-{index}")],
                amount: CostAmount { amount: *amount, unit: "USD".to_owned() },
            })
            .collect(),
    }
}
