use std::collections::HashMap;
use std::str::FromStr;

use async_trait::async_trait;
use aws_sdk_costexplorer::types::{
    DateInterval, Dimension, DimensionValues, Expression, Granularity, MetricValue, ResultByTime,
};
use chrono::NaiveDate;
use cloudscope_core::domain::cost::CostService;
use cloudscope_core::errors::{ProviderError, ProviderErrorKind};
use cloudscope_core::provider::{CostAmount, CostApi, CostGroup, CostQuery, Page, RawCostPeriod};
use rust_decimal::Decimal;
use tracing::warn;

use crate::error::provider_error;
use crate::AwsCloud;

pub const COST_METRIC: &str = "UnblendedCost";
const DATE_FORMAT: &str = "%Y-%m-%d";

#[async_trait]
impl CostApi for AwsCloud {
    async fn monthly_costs(
        &self,
        query: &CostQuery,
        token: Option<String>,
    ) -> Result<Page<RawCostPeriod>, ProviderError> {
        let interval = DateInterval::builder()
            .start(query.range.start.format(DATE_FORMAT).to_string())
            .end(query.range.end.format(DATE_FORMAT).to_string())
            .build()
            .map_err(|error| {
                ProviderError::new(
                    "ce",
                    "GetCostAndUsage",
                    ProviderErrorKind::InvalidRequest,
                    error.to_string(),
                )
            })?;

        let response = self
            .cost
            .get_cost_and_usage()
            .time_period(interval)
            .granularity(Granularity::Monthly)
            .metrics(COST_METRIC)
            .set_filter(query.service.map(service_filter))
            .set_next_page_token(token)
            .send()
            .await
            .map_err(|error| provider_error("ce", "GetCostAndUsage", error))?;

        let items = response.results_by_time().iter().filter_map(raw_period).collect();
        Ok(Page { items, next_token: response.next_page_token().map(str::to_owned) })
    }
}

fn service_filter(service: CostService) -> Expression {
    Expression::builder()
        .dimensions(
            DimensionValues::builder()
                .key(Dimension::Service)
                .values(service.billing_name())
                .build(),
        )
        .build()
}

fn raw_period(result: &ResultByTime) -> Option<RawCostPeriod> {
    let interval = result.time_period()?;
    let start = NaiveDate::parse_from_str(interval.start(), DATE_FORMAT).ok()?;
    let end = NaiveDate::parse_from_str(interval.end(), DATE_FORMAT).ok()?;

    let groups = result
        .groups()
        .iter()
        .filter_map(|group| {
            let amount = group.metrics().and_then(cost_amount)?;
            Some(CostGroup { keys: group.keys().to_vec(), amount })
        })
        .collect();

    Some(RawCostPeriod { start, end, total: result.total().and_then(cost_amount), groups })
}

fn cost_amount(metrics: &HashMap<String, MetricValue>) -> Option<CostAmount> {
    let value = metrics.get(COST_METRIC)?;
    let raw = value.amount()?;
    match Decimal::from_str(raw) {
        Ok(amount) => Some(CostAmount { amount, unit: value.unit().unwrap_or("USD").to_owned() }),
        Err(error) => {
            warn!(
                event_name = "cost.amount.unparseable",
                amount = raw,
                error = %error,
                "ignoring unparseable cost amount"
            );
            None
        }
    }
}
