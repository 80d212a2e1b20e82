//! AWS implementations of the cloudscope provider interfaces.

mod cloudwatch;
mod cost_explorer;
mod ec2;
mod elb;
mod error;
mod rds;
mod s3;

use std::sync::Arc;
use std::time::Duration;

use aws_config::retry::RetryConfig;
use aws_config::timeout::TimeoutConfig;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_cloudwatch::primitives::DateTime as SmithyDateTime;
use chrono::{DateTime, Utc};
use cloudscope_core::config::AwsConfig;
use cloudscope_core::provider::ProviderSet;
use tracing::info;

/// Cost Explorer is served from a single global endpoint in this region.
pub const COST_EXPLORER_REGION: &str = "us-east-1";

/// One client per AWS service, built once at startup and shared.
#[derive(Clone, Debug)]
pub struct AwsCloud {
    region: String,
    ec2: aws_sdk_ec2::Client,
    s3: aws_sdk_s3::Client,
    rds: aws_sdk_rds::Client,
    elb: aws_sdk_elasticloadbalancingv2::Client,
    cloudwatch: aws_sdk_cloudwatch::Client,
    cost: aws_sdk_costexplorer::Client,
}

impl AwsCloud {
    pub async fn connect(config: &AwsConfig) -> Self {
        let sdk_config = load_sdk_config(config).await;
        info!(
            event_name = "system.bootstrap.aws_clients",
            region = %config.region,
            profile = config.profile.as_deref().unwrap_or("default"),
            max_attempts = config.max_attempts,
            "aws clients configured"
        );
        Self::from_sdk_config(&sdk_config)
    }

    pub fn from_sdk_config(sdk_config: &SdkConfig) -> Self {
        let cost_config = aws_sdk_costexplorer::config::Builder::from(sdk_config)
            .region(Region::new(COST_EXPLORER_REGION))
            .build();

        Self {
            region: sdk_config.region().map(|region| region.to_string()).unwrap_or_default(),
            ec2: aws_sdk_ec2::Client::new(sdk_config),
            s3: aws_sdk_s3::Client::new(sdk_config),
            rds: aws_sdk_rds::Client::new(sdk_config),
            elb: aws_sdk_elasticloadbalancingv2::Client::new(sdk_config),
            cloudwatch: aws_sdk_cloudwatch::Client::new(sdk_config),
            cost: aws_sdk_costexplorer::Client::from_conf(cost_config),
        }
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn into_provider_set(self) -> ProviderSet {
        ProviderSet::from_shared(Arc::new(self))
    }
}

/// Shared SDK configuration with the standard retry mode and an operation timeout.
pub async fn load_sdk_config(config: &AwsConfig) -> SdkConfig {
    let retry = RetryConfig::standard().with_max_attempts(config.max_attempts);
    let timeouts = TimeoutConfig::builder()
        .operation_timeout(Duration::from_secs(config.operation_timeout_secs))
        .build();

    let mut loader = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(config.region.clone()))
        .retry_config(retry)
        .timeout_config(timeouts);
    if let Some(profile) = &config.profile {
        loader = loader.profile_name(profile);
    }
    loader.load().await
}

pub(crate) fn to_chrono(value: &SmithyDateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(value.secs(), value.subsec_nanos())
}

pub(crate) fn to_smithy(value: DateTime<Utc>) -> SmithyDateTime {
    SmithyDateTime::from_secs(value.timestamp())
}
