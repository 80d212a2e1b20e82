use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Aggregation applied to raw datapoints inside one period.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Statistic {
    Average,
    Maximum,
    Minimum,
    Sum,
    SampleCount,
}

impl Statistic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Average => "Average",
            Self::Maximum => "Maximum",
            Self::Minimum => "Minimum",
            Self::Sum => "Sum",
            Self::SampleCount => "SampleCount",
        }
    }
}

impl fmt::Display for Statistic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observation window a sample was reduced from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub period_secs: i32,
}

impl MetricWindow {
    pub const DEFAULT_SPAN_SECS: i64 = 3_600;
    pub const DEFAULT_PERIOD_SECS: i32 = 300;

    /// The trailing hour ending at `now`, at five minute resolution.
    pub fn last_hour(now: DateTime<Utc>) -> Self {
        Self {
            start: now - Duration::seconds(Self::DEFAULT_SPAN_SECS),
            end: now,
            period_secs: Self::DEFAULT_PERIOD_SECS,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Datapoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
    pub unit: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub name: String,
    pub value: Option<f64>,
    pub unit: Option<String>,
    pub observed_at: Option<DateTime<Utc>>,
    pub window: MetricWindow,
    pub statistic: Statistic,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MetricSample {
    pub fn observed(
        name: impl Into<String>,
        statistic: Statistic,
        window: MetricWindow,
        point: Datapoint,
    ) -> Self {
        Self {
            name: name.into(),
            value: Some(point.value),
            unit: point.unit,
            observed_at: Some(point.timestamp),
            window,
            statistic,
            error: None,
        }
    }

    pub fn no_data(name: impl Into<String>, statistic: Statistic, window: MetricWindow) -> Self {
        Self {
            name: name.into(),
            value: None,
            unit: None,
            observed_at: None,
            window,
            statistic,
            error: None,
        }
    }

    pub fn failed(
        name: impl Into<String>,
        statistic: Statistic,
        window: MetricWindow,
        error: impl Into<String>,
    ) -> Self {
        Self { error: Some(error.into()), ..Self::no_data(name, statistic, window) }
    }

    pub fn has_value(&self) -> bool {
        self.value.is_some()
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}
