use async_trait::async_trait;
use aws_sdk_cloudwatch::types::{Datapoint as SdkDatapoint, Dimension, Statistic as SdkStatistic};
use cloudscope_core::domain::metric::{Datapoint, Statistic};
use cloudscope_core::errors::ProviderError;
use cloudscope_core::provider::{MetricQuery, MetricsApi};

use crate::error::provider_error;
use crate::{to_chrono, to_smithy, AwsCloud};

#[async_trait]
impl MetricsApi for AwsCloud {
    async fn datapoints(&self, query: &MetricQuery) -> Result<Vec<Datapoint>, ProviderError> {
        let dimension = Dimension::builder()
            .name(&query.dimension_name)
            .value(&query.dimension_value)
            .build();

        let response = self
            .cloudwatch
            .get_metric_statistics()
            .namespace(&query.namespace)
            .metric_name(&query.metric_name)
            .dimensions(dimension)
            .start_time(to_smithy(query.window.start))
            .end_time(to_smithy(query.window.end))
            .period(query.window.period_secs)
            .statistics(sdk_statistic(query.statistic))
            .send()
            .await
            .map_err(|error| provider_error("cloudwatch", "GetMetricStatistics", error))?;

        Ok(response
            .datapoints()
            .iter()
            .filter_map(|point| datapoint(point, query.statistic))
            .collect())
    }
}

fn sdk_statistic(statistic: Statistic) -> SdkStatistic {
    match statistic {
        Statistic::Average => SdkStatistic::Average,
        Statistic::Maximum => SdkStatistic::Maximum,
        Statistic::Minimum => SdkStatistic::Minimum,
        Statistic::Sum => SdkStatistic::Sum,
        Statistic::SampleCount => SdkStatistic::SampleCount,
    }
}

/// Points without a timestamp or without the requested statistic are dropped.
fn datapoint(point: &SdkDatapoint, statistic: Statistic) -> Option<Datapoint> {
    let value = match statistic {
        Statistic::Average => point.average(),
        Statistic::Maximum => point.maximum(),
        Statistic::Minimum => point.minimum(),
        Statistic::Sum => point.sum(),
        Statistic::SampleCount => point.sample_count(),
    }?;

    Some(Datapoint {
        timestamp: point.timestamp().and_then(to_chrono)?,
        value,
        unit: point.unit().map(|unit| unit.as_str().to_owned()),
    })
}
