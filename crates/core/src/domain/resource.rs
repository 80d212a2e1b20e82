use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::metric::MetricSample;

pub type Tags = BTreeMap<String, String>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Compute,
    Storage,
    Database,
    LoadBalancer,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 4] =
        [Self::Compute, Self::Storage, Self::Database, Self::LoadBalancer];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Compute => "compute",
            Self::Storage => "storage",
            Self::Database => "database",
            Self::LoadBalancer => "load_balancer",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ComputeInstance {
    pub id: String,
    pub name: String,
    pub instance_type: String,
    pub state: String,
    pub availability_zone: Option<String>,
    pub region: Option<String>,
    pub private_ip: Option<String>,
    pub public_ip: Option<String>,
    pub launch_time: Option<DateTime<Utc>>,
    pub platform: String,
    pub root_device_type: Option<String>,
    pub vpc_id: Option<String>,
    pub subnet_id: Option<String>,
    pub tags: Tags,
}

impl ComputeInstance {
    pub fn is_running(&self) -> bool {
        self.state.eq_ignore_ascii_case("running")
    }
}

/// Listing-level view of a bucket before per-item enrichment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketSummary {
    pub name: String,
    pub creation_date: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageBucket {
    pub name: String,
    pub creation_date: Option<DateTime<Utc>>,
    pub region: Option<String>,
    pub versioning: bool,
    pub website_enabled: bool,
    pub tags: Tags,
}

impl StorageBucket {
    pub fn from_summary(summary: BucketSummary) -> Self {
        Self {
            name: summary.name,
            creation_date: summary.creation_date,
            region: None,
            versioning: false,
            website_enabled: false,
            tags: Tags::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub address: String,
    pub port: Option<i32>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DatabaseInstance {
    pub identifier: String,
    pub engine: String,
    pub engine_version: Option<String>,
    pub instance_class: String,
    pub status: String,
    pub multi_az: bool,
    pub storage_type: Option<String>,
    pub allocated_storage_gb: Option<i32>,
    pub endpoint: Option<Endpoint>,
    pub availability_zone: Option<String>,
    pub publicly_accessible: bool,
    pub storage_encrypted: bool,
    pub tags: Tags,
    #[serde(default)]
    pub metrics: Vec<MetricSample>,
}

impl DatabaseInstance {
    pub fn region(&self) -> Option<String> {
        self.availability_zone.as_deref().and_then(region_from_zone)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadBalancerType {
    Application,
    Network,
    Gateway,
    Other,
}

impl LoadBalancerType {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "application" => Self::Application,
            "network" => Self::Network,
            "gateway" => Self::Gateway,
            _ => Self::Other,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Application => "Application Load Balancer",
            Self::Network => "Network Load Balancer",
            Self::Gateway => "Gateway Load Balancer",
            Self::Other => "Load Balancer",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadBalancer {
    pub name: String,
    pub arn: String,
    pub dns_name: Option<String>,
    pub lb_type: LoadBalancerType,
    pub scheme: Option<String>,
    pub vpc_id: Option<String>,
    pub state: Option<String>,
    pub created_time: Option<DateTime<Utc>>,
    pub availability_zones: Vec<String>,
    pub tags: Tags,
}

/// One scanned resource of any supported kind.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResourceRecord {
    Compute(ComputeInstance),
    Storage(StorageBucket),
    Database(DatabaseInstance),
    LoadBalancer(LoadBalancer),
}

impl ResourceRecord {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Compute(_) => ResourceKind::Compute,
            Self::Storage(_) => ResourceKind::Storage,
            Self::Database(_) => ResourceKind::Database,
            Self::LoadBalancer(_) => ResourceKind::LoadBalancer,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::Compute(instance) => &instance.id,
            Self::Storage(bucket) => &bucket.name,
            Self::Database(database) => &database.identifier,
            Self::LoadBalancer(balancer) => &balancer.arn,
        }
    }

    pub fn state(&self) -> Option<&str> {
        match self {
            Self::Compute(instance) => Some(&instance.state),
            Self::Storage(_) => None,
            Self::Database(database) => Some(&database.status),
            Self::LoadBalancer(balancer) => balancer.state.as_deref(),
        }
    }

    pub fn region(&self) -> Option<String> {
        match self {
            Self::Compute(instance) => instance.region.clone(),
            Self::Storage(bucket) => bucket.region.clone(),
            Self::Database(database) => database.region(),
            Self::LoadBalancer(balancer) => {
                balancer.availability_zones.first().and_then(|zone| region_from_zone(zone))
            }
        }
    }

    pub fn tags(&self) -> &Tags {
        match self {
            Self::Compute(instance) => &instance.tags,
            Self::Storage(bucket) => &bucket.tags,
            Self::Database(database) => &database.tags,
            Self::LoadBalancer(balancer) => &balancer.tags,
        }
    }
}

impl From<ComputeInstance> for ResourceRecord {
    fn from(value: ComputeInstance) -> Self {
        Self::Compute(value)
    }
}

impl From<StorageBucket> for ResourceRecord {
    fn from(value: StorageBucket) -> Self {
        Self::Storage(value)
    }
}

impl From<DatabaseInstance> for ResourceRecord {
    fn from(value: DatabaseInstance) -> Self {
        Self::Database(value)
    }
}

impl From<LoadBalancer> for ResourceRecord {
    fn from(value: LoadBalancer) -> Self {
        Self::LoadBalancer(value)
    }
}

/// `us-east-1a` -> `us-east-1`. Zones without a trailing letter are returned unchanged.
pub fn region_from_zone(zone: &str) -> Option<String> {
    let zone = zone.trim();
    if zone.is_empty() {
        return None;
    }
    let trimmed = zone.trim_end_matches(|c: char| c.is_ascii_alphabetic());
    if trimmed.is_empty() {
        return Some(zone.to_string());
    }
    Some(trimmed.to_string())
}

/// The value of the `Name` tag, or `fallback` when the tag is missing or blank.
pub fn name_from_tags(tags: &Tags, fallback: &str) -> String {
    tags.get("Name")
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .unwrap_or(fallback)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::{name_from_tags, region_from_zone, LoadBalancerType, Tags};

    #[test]
    fn region_is_derived_from_availability_zone() {
        assert_eq!(region_from_zone("us-east-1a").as_deref(), Some("us-east-1"));
        assert_eq!(region_from_zone("sa-east-1c").as_deref(), Some("sa-east-1"));
        assert_eq!(region_from_zone("").as_deref(), None);
    }

    #[test]
    fn name_tag_falls_back_to_identifier() {
        let mut tags = Tags::new();
        assert_eq!(name_from_tags(&tags, "i-123"), "i-123");

        tags.insert("Name".to_string(), "  ".to_string());
        assert_eq!(name_from_tags(&tags, "i-123"), "i-123");

        tags.insert("Name".to_string(), "web-1".to_string());
        assert_eq!(name_from_tags(&tags, "i-123"), "web-1");
    }

    #[test]
    fn load_balancer_type_distinguishes_alb_and_nlb() {
        assert_eq!(LoadBalancerType::parse("application"), LoadBalancerType::Application);
        assert_eq!(LoadBalancerType::parse("NETWORK"), LoadBalancerType::Network);
        assert_eq!(LoadBalancerType::parse("classic"), LoadBalancerType::Other);
        assert_eq!(LoadBalancerType::Network.display_name(), "Network Load Balancer");
    }
}
