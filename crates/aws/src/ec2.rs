use async_trait::async_trait;
use aws_sdk_ec2::types::{Instance, Tag};
use cloudscope_core::domain::resource::{name_from_tags, region_from_zone, ComputeInstance, Tags};
use cloudscope_core::errors::ProviderError;
use cloudscope_core::provider::{ComputeApi, Page};

use crate::error::provider_error;
use crate::{to_chrono, AwsCloud};

#[async_trait]
impl ComputeApi for AwsCloud {
    async fn list_instances(
        &self,
        token: Option<String>,
    ) -> Result<Page<ComputeInstance>, ProviderError> {
        let response = self
            .ec2
            .describe_instances()
            .set_next_token(token)
            .send()
            .await
            .map_err(|error| provider_error("ec2", "DescribeInstances", error))?;

        let items = response
            .reservations()
            .iter()
            .flat_map(|reservation| reservation.instances())
            .filter_map(instance_record)
            .collect();

        Ok(Page { items, next_token: response.next_token().map(str::to_owned) })
    }
}

fn tags_to_map(tags: &[Tag]) -> Tags {
    tags.iter()
        .filter_map(|tag| Some((tag.key()?.to_owned(), tag.value()?.to_owned())))
        .collect()
}

pub(crate) fn instance_record(instance: &Instance) -> Option<ComputeInstance> {
    let id = instance.instance_id()?.to_owned();
    let tags = tags_to_map(instance.tags());
    let availability_zone =
        instance.placement().and_then(|placement| placement.availability_zone()).map(str::to_owned);

    Some(ComputeInstance {
        name: name_from_tags(&tags, &id),
        instance_type: instance
            .instance_type()
            .map(|value| value.as_str().to_owned())
            .unwrap_or_default(),
        state: instance
            .state()
            .and_then(|state| state.name())
            .map(|name| name.as_str().to_owned())
            .unwrap_or_else(|| "unknown".to_owned()),
        region: availability_zone.as_deref().and_then(region_from_zone),
        availability_zone,
        private_ip: instance.private_ip_address().map(str::to_owned),
        public_ip: instance.public_ip_address().map(str::to_owned),
        launch_time: instance.launch_time().and_then(to_chrono),
        platform: instance
            .platform()
            .map(|platform| platform.as_str().to_ascii_lowercase())
            .unwrap_or_else(|| "linux".to_owned()),
        root_device_type: instance.root_device_type().map(|value| value.as_str().to_owned()),
        vpc_id: instance.vpc_id().map(str::to_owned),
        subnet_id: instance.subnet_id().map(str::to_owned),
        tags,
        id,
    })
}

#[cfg(test)]
mod tests {
    use aws_sdk_ec2::types::{
        Instance, InstanceState, InstanceStateName, InstanceType, Placement, PlatformValues, Tag,
    };

    use super::instance_record;

    #[test]
    fn instance_maps_name_tag_zone_and_default_platform() {
        let instance = Instance::builder()
            .instance_id("i-0abc")
            .instance_type(InstanceType::T3Micro)
            .state(InstanceState::builder().name(InstanceStateName::Running).build())
            .placement(Placement::builder().availability_zone("us-east-1c").build())
            .private_ip_address("10.0.1.5")
            .tags(Tag::builder().key("Name").value("api-server").build())
            .tags(Tag::builder().key("env").value("prod").build())
            .build();

        let record = instance_record(&instance).expect("record");

        assert_eq!(record.id, "i-0abc");
        assert_eq!(record.name, "api-server");
        assert_eq!(record.instance_type, "t3.micro");
        assert_eq!(record.state, "running");
        assert_eq!(record.region.as_deref(), Some("us-east-1"));
        assert_eq!(record.platform, "linux");
        assert_eq!(record.tags.get("env").map(String::as_str), Some("prod"));
        assert!(record.is_running());
    }

    #[test]
    fn windows_platform_and_missing_name_fall_back() {
        let instance = Instance::builder()
            .instance_id("i-0def")
            .platform(PlatformValues::Windows)
            .build();

        let record = instance_record(&instance).expect("record");

        assert_eq!(record.name, "i-0def");
        assert_eq!(record.platform, "windows");
        assert_eq!(record.state, "unknown");
        assert_eq!(record.region, None);
    }

    #[test]
    fn instance_without_id_is_skipped() {
        assert!(instance_record(&Instance::builder().build()).is_none());
    }
}
