use async_trait::async_trait;
use aws_sdk_rds::types::DbInstance;
use cloudscope_core::domain::resource::{DatabaseInstance, Endpoint, Tags};
use cloudscope_core::errors::ProviderError;
use cloudscope_core::provider::{DatabaseApi, Page};

use crate::error::provider_error;
use crate::AwsCloud;

#[async_trait]
impl DatabaseApi for AwsCloud {
    async fn list_databases(
        &self,
        token: Option<String>,
    ) -> Result<Page<DatabaseInstance>, ProviderError> {
        let response = self
            .rds
            .describe_db_instances()
            .set_marker(token)
            .send()
            .await
            .map_err(|error| provider_error("rds", "DescribeDBInstances", error))?;

        let items = response.db_instances().iter().filter_map(database_record).collect();
        Ok(Page { items, next_token: response.marker().map(str::to_owned) })
    }
}

pub(crate) fn database_record(instance: &DbInstance) -> Option<DatabaseInstance> {
    let identifier = instance.db_instance_identifier()?.to_owned();
    let tags: Tags = instance
        .tag_list()
        .iter()
        .filter_map(|tag| Some((tag.key()?.to_owned(), tag.value()?.to_owned())))
        .collect();

    Some(DatabaseInstance {
        identifier,
        engine: instance.engine().unwrap_or_default().to_owned(),
        engine_version: instance.engine_version().map(str::to_owned),
        instance_class: instance.db_instance_class().unwrap_or_default().to_owned(),
        status: instance.db_instance_status().unwrap_or("unknown").to_owned(),
        multi_az: instance.multi_az().unwrap_or(false),
        storage_type: instance.storage_type().map(str::to_owned),
        allocated_storage_gb: instance.allocated_storage(),
        endpoint: instance.endpoint().and_then(|endpoint| {
            Some(Endpoint { address: endpoint.address()?.to_owned(), port: endpoint.port() })
        }),
        availability_zone: instance.availability_zone().map(str::to_owned),
        publicly_accessible: instance.publicly_accessible().unwrap_or(false),
        storage_encrypted: instance.storage_encrypted().unwrap_or(false),
        tags,
        metrics: Vec::new(),
    })
}
