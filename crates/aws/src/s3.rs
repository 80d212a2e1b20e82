use async_trait::async_trait;
use aws_sdk_s3::config::{Builder as S3ConfigBuilder, Region};
use aws_sdk_s3::types::{Bucket, BucketVersioningStatus, Tag};
use cloudscope_core::domain::resource::{BucketSummary, Tags};
use cloudscope_core::errors::ProviderError;
use cloudscope_core::provider::{Page, StorageApi};

use crate::error::{error_code, provider_error};
use crate::{to_chrono, AwsCloud};

const LIST_PAGE_SIZE: i32 = 1000;

#[async_trait]
impl StorageApi for AwsCloud {
    async fn list_buckets(
        &self,
        token: Option<String>,
    ) -> Result<Page<BucketSummary>, ProviderError> {
        let response = self
            .s3
            .list_buckets()
            .max_buckets(LIST_PAGE_SIZE)
            .set_continuation_token(token)
            .send()
            .await
            .map_err(|error| provider_error("s3", "ListBuckets", error))?;

        let items = response.buckets().iter().filter_map(bucket_summary).collect();
        Ok(Page { items, next_token: response.continuation_token().map(str::to_owned) })
    }

    async fn bucket_location(&self, bucket: &str) -> Result<Option<String>, ProviderError> {
        let response = self
            .s3
            .get_bucket_location()
            .bucket(bucket)
            .send()
            .await
            .map_err(|error| provider_error("s3", "GetBucketLocation", error))?;
        Ok(response.location_constraint().map(|location| location.as_str().to_owned()))
    }

    async fn bucket_versioning(
        &self,
        bucket: &str,
        region: Option<&str>,
    ) -> Result<bool, ProviderError> {
        let request = self.s3.get_bucket_versioning().bucket(bucket);
        let response = match home_region_override(&self.region, region) {
            Some(config) => request.customize().config_override(config).send().await,
            None => request.send().await,
        }
        .map_err(|error| provider_error("s3", "GetBucketVersioning", error))?;
        Ok(matches!(response.status(), Some(BucketVersioningStatus::Enabled)))
    }

    async fn bucket_website(
        &self,
        bucket: &str,
        region: Option<&str>,
    ) -> Result<bool, ProviderError> {
        let request = self.s3.get_bucket_website().bucket(bucket);
        let response = match home_region_override(&self.region, region) {
            Some(config) => request.customize().config_override(config).send().await,
            None => request.send().await,
        };
        match response {
            Ok(_) => Ok(true),
            Err(error) if error_code(&error) == Some("NoSuchWebsiteConfiguration") => Ok(false),
            Err(error) => Err(provider_error("s3", "GetBucketWebsite", error)),
        }
    }

    async fn bucket_tags(
        &self,
        bucket: &str,
        region: Option<&str>,
    ) -> Result<Tags, ProviderError> {
        let request = self.s3.get_bucket_tagging().bucket(bucket);
        let response = match home_region_override(&self.region, region) {
            Some(config) => request.customize().config_override(config).send().await,
            None => request.send().await,
        };
        match response {
            Ok(response) => Ok(tags_to_map(response.tag_set())),
            Err(error) if error_code(&error) == Some("NoSuchTagSet") => Ok(Tags::new()),
            Err(error) => Err(provider_error("s3", "GetBucketTagging", error)),
        }
    }
}

/// The S3 client does not follow cross-region redirects, so lookups for a
/// bucket homed elsewhere are re-signed for that region.
fn home_region_override(
    client_region: &str,
    bucket_region: Option<&str>,
) -> Option<S3ConfigBuilder> {
    bucket_region
        .filter(|region| *region != client_region)
        .map(|region| S3ConfigBuilder::default().region(Region::new(region.to_owned())))
}

fn bucket_summary(bucket: &Bucket) -> Option<BucketSummary> {
    Some(BucketSummary {
        name: bucket.name()?.to_owned(),
        creation_date: bucket.creation_date().and_then(to_chrono),
    })
}

fn tags_to_map(tags: &[Tag]) -> Tags {
    tags.iter().map(|tag| (tag.key().to_owned(), tag.value().to_owned())).collect()
}
