use async_trait::async_trait;
use aws_sdk_elasticloadbalancingv2::types::LoadBalancer as SdkLoadBalancer;
use cloudscope_core::domain::resource::{LoadBalancer, LoadBalancerType, Tags};
use cloudscope_core::errors::ProviderError;
use cloudscope_core::provider::{LoadBalancerApi, Page};

use crate::error::provider_error;
use crate::{to_chrono, AwsCloud};

#[async_trait]
impl LoadBalancerApi for AwsCloud {
    async fn list_load_balancers(
        &self,
        token: Option<String>,
    ) -> Result<Page<LoadBalancer>, ProviderError> {
        let response = self
            .elb
            .describe_load_balancers()
            .set_marker(token)
            .send()
            .await
            .map_err(|error| provider_error("elbv2", "DescribeLoadBalancers", error))?;

        let items = response.load_balancers().iter().filter_map(load_balancer_record).collect();
        Ok(Page { items, next_token: response.next_marker().map(str::to_owned) })
    }

    async fn load_balancer_tags(&self, arn: &str) -> Result<Tags, ProviderError> {
        let response = self
            .elb
            .describe_tags()
            .resource_arns(arn)
            .send()
            .await
            .map_err(|error| provider_error("elbv2", "DescribeTags", error))?;

        Ok(response
            .tag_descriptions()
            .iter()
            .filter(|description| description.resource_arn() == Some(arn))
            .flat_map(|description| description.tags())
            .map(|tag| (tag.key().to_owned(), tag.value().unwrap_or_default().to_owned()))
            .collect())
    }
}

pub(crate) fn load_balancer_record(balancer: &SdkLoadBalancer) -> Option<LoadBalancer> {
    Some(LoadBalancer {
        name: balancer.load_balancer_name()?.to_owned(),
        arn: balancer.load_balancer_arn()?.to_owned(),
        dns_name: balancer.dns_name().map(str::to_owned),
        lb_type: balancer
            .r#type()
            .map(|value| LoadBalancerType::parse(value.as_str()))
            .unwrap_or(LoadBalancerType::Other),
        scheme: balancer.scheme().map(|scheme| scheme.as_str().to_owned()),
        vpc_id: balancer.vpc_id().map(str::to_owned),
        state: balancer
            .state()
            .and_then(|state| state.code())
            .map(|code| code.as_str().to_owned()),
        created_time: balancer.created_time().and_then(to_chrono),
        availability_zones: balancer
            .availability_zones()
            .iter()
            .filter_map(|zone| zone.zone_name().map(str::to_owned))
            .collect(),
        tags: Tags::new(),
    })
}
