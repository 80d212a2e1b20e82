use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use tracing::warn;

use crate::domain::metric::{Datapoint, MetricSample, MetricWindow, Statistic};
use crate::errors::ProviderError;
use crate::provider::{MetricQuery, MetricsApi};

pub const RDS_NAMESPACE: &str = "AWS/RDS";
pub const RDS_DIMENSION: &str = "DBInstanceIdentifier";

/// Metrics attached to every database record.
pub const DATABASE_METRICS: [&str; 5] =
    ["CPUUtilization", "FreeableMemory", "ReadIOPS", "WriteIOPS", "DatabaseConnections"];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MetricTarget {
    pub namespace: String,
    pub dimension_name: String,
    pub dimension_value: String,
}

impl MetricTarget {
    pub fn database(identifier: &str) -> Self {
        Self {
            namespace: RDS_NAMESPACE.to_owned(),
            dimension_name: RDS_DIMENSION.to_owned(),
            dimension_value: identifier.to_owned(),
        }
    }
}

/// Reduces a metric's datapoints over the trailing hour to the newest one.
#[derive(Clone)]
pub struct MetricReducer {
    api: Arc<dyn MetricsApi>,
}

impl MetricReducer {
    pub fn new(api: Arc<dyn MetricsApi>) -> Self {
        Self { api }
    }

    pub async fn latest(
        &self,
        target: &MetricTarget,
        metric_name: &str,
        statistic: Statistic,
    ) -> Result<MetricSample, ProviderError> {
        self.latest_in(target, metric_name, statistic, MetricWindow::last_hour(Utc::now())).await
    }

    async fn latest_in(
        &self,
        target: &MetricTarget,
        metric_name: &str,
        statistic: Statistic,
        window: MetricWindow,
    ) -> Result<MetricSample, ProviderError> {
        let query = MetricQuery {
            namespace: target.namespace.clone(),
            metric_name: metric_name.to_owned(),
            dimension_name: target.dimension_name.clone(),
            dimension_value: target.dimension_value.clone(),
            window,
            statistic,
        };

        let points = self.api.datapoints(&query).await?;
        Ok(match newest(points) {
            Some(point) => MetricSample::observed(metric_name, statistic, window, point),
            None => MetricSample::no_data(metric_name, statistic, window),
        })
    }

    /// Fetch several metrics for one target at once, over one shared window. A
    /// failed metric becomes a sample carrying the error; the others are
    /// unaffected.
    pub async fn sample_all(
        &self,
        target: &MetricTarget,
        metric_names: &[&str],
        statistic: Statistic,
    ) -> Vec<MetricSample> {
        let window = MetricWindow::last_hour(Utc::now());
        let fetches = metric_names.iter().map(|name| async move {
            match self.latest_in(target, name, statistic, window).await {
                Ok(sample) => sample,
                Err(error) => {
                    warn!(
                        event_name = "metrics.fetch.failed",
                        metric = *name,
                        entity = %target.dimension_value,
                        error = %error,
                        "metric fetch failed"
                    );
                    MetricSample::failed(*name, statistic, window, error.to_string())
                }
            }
        });
        join_all(fetches).await
    }

    pub async fn database_metrics(&self, identifier: &str) -> Vec<MetricSample> {
        self.sample_all(&MetricTarget::database(identifier), &DATABASE_METRICS, Statistic::Average)
            .await
    }
}

/// The datapoint with the greatest timestamp. Values are never averaged.
pub fn newest(points: Vec<Datapoint>) -> Option<Datapoint> {
    points.into_iter().max_by_key(|point| point.timestamp)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, Utc};

    use super::{newest, MetricReducer, MetricTarget, DATABASE_METRICS};
    use crate::domain::metric::{Datapoint, Statistic};
    use crate::provider::memory::{ops, InMemoryCloud};

    fn point(minutes_ago: i64, value: f64) -> Datapoint {
        Datapoint {
            timestamp: Utc::now() - Duration::minutes(minutes_ago),
            value,
            unit: Some("Percent".to_owned()),
        }
    }

    #[test]
    fn newest_picks_latest_timestamp_regardless_of_order() {
        let picked = newest(vec![point(20, 1.0), point(5, 3.0), point(50, 9.0)]).expect("point");
        assert_eq!(picked.value, 3.0);
        assert_eq!(newest(Vec::new()), None);
    }

    #[tokio::test]
    async fn empty_window_yields_absent_value() {
        let reducer = MetricReducer::new(Arc::new(InMemoryCloud::new()));
        let sample = reducer
            .latest(&MetricTarget::database("db-1"), "CPUUtilization", Statistic::Average)
            .await
            .expect("sample");

        assert_eq!(sample.value, None);
        assert!(!sample.is_failed());
        assert_eq!(sample.window.period_secs, 300);
        assert_eq!((sample.window.end - sample.window.start).num_seconds(), 3_600);
    }

    #[tokio::test]
    async fn one_failing_metric_does_not_abort_siblings() {
        let cloud = Arc::new(
            InMemoryCloud::new()
                .with_datapoints("db-1", "CPUUtilization", vec![point(10, 12.5), point(3, 40.0)])
                .with_datapoints("db-1", "DatabaseConnections", vec![point(4, 7.0)])
                .failing_metric("db-1", "FreeableMemory"),
        );
        let reducer = MetricReducer::new(cloud.clone());

        let samples = reducer.database_metrics("db-1").await;

        assert_eq!(samples.len(), DATABASE_METRICS.len());
        assert_eq!(cloud.calls(ops::GET_METRIC_STATISTICS), DATABASE_METRICS.len());
        let by_name = |name: &str| samples.iter().find(|s| s.name == name).expect("sample");
        assert_eq!(by_name("CPUUtilization").value, Some(40.0));
        assert_eq!(by_name("CPUUtilization").unit.as_deref(), Some("Percent"));
        assert!(by_name("FreeableMemory").is_failed());
        assert_eq!(by_name("FreeableMemory").value, None);
        assert_eq!(by_name("ReadIOPS").value, None);
        assert!(!by_name("ReadIOPS").is_failed());
        assert_eq!(by_name("DatabaseConnections").value, Some(7.0));
        let window = by_name("CPUUtilization").window;
        assert!(samples.iter().all(|sample| sample.window == window));
    }
}
