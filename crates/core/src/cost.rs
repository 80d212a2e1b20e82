use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::domain::cost::{add_months, CostPeriod, CostService, DateRange};
use crate::errors::{CostError, ProviderError, ProviderErrorKind};
use crate::pagination::collect_pages;
use crate::provider::{CostAmount, CostApi, CostQuery, RawCostPeriod};

/// Months of cost history the cost API can serve.
pub const RETENTION_MONTHS: i32 = 14;
pub const DEFAULT_UNIT: &str = "USD";

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostRequest {
    pub service: Option<CostService>,
    pub range: Option<DateRange>,
}

impl CostRequest {
    pub fn all_services() -> Self {
        Self::default()
    }

    pub fn for_service(service: CostService) -> Self {
        Self { service: Some(service), range: None }
    }

    pub fn with_range(mut self, range: DateRange) -> Self {
        self.range = Some(range);
        self
    }
}

/// Earliest start date the cost API accepts relative to `today`: the first of
/// the month fourteen months back.
pub fn retention_start(today: NaiveDate) -> Option<NaiveDate> {
    add_months(today, -RETENTION_MONTHS)
}

/// Fetches monthly cost aggregates.
#[derive(Clone)]
pub struct CostFetcher {
    api: Arc<dyn CostApi>,
}

impl CostFetcher {
    pub fn new(api: Arc<dyn CostApi>) -> Self {
        Self { api }
    }

    pub async fn fetch(&self, request: &CostRequest) -> Result<Vec<CostPeriod>, CostError> {
        self.fetch_at(request, Utc::now().date_naive()).await
    }

    /// Same as [`fetch`](Self::fetch) with the retention window anchored at `today`.
    pub async fn fetch_at(
        &self,
        request: &CostRequest,
        today: NaiveDate,
    ) -> Result<Vec<CostPeriod>, CostError> {
        let query = resolve_query(request, today)?;
        let service = query.service.map(|service| service.as_str()).unwrap_or("all");

        let raw = collect_pages("cost", |token| self.api.monthly_costs(&query, token))
            .await
            .map_err(|source| {
                error!(
                    event_name = "cost.fetch.failed",
                    service,
                    error = %source,
                    "cost fetch failed"
                );
                CostError::Provider(source)
            })?;

        let periods: Vec<CostPeriod> = raw.into_iter().map(aggregate_period).collect();
        info!(
            event_name = "cost.fetch.completed",
            service,
            start = %query.range.start,
            end = %query.range.end,
            periods = periods.len(),
            "cost periods fetched"
        );
        Ok(periods)
    }
}

/// Validate and default a request. Runs before any network call.
pub fn resolve_query(request: &CostRequest, today: NaiveDate) -> Result<CostQuery, CostError> {
    let range = match request.range {
        Some(range) => range,
        None => DateRange::previous_month(today).ok_or_else(|| date_overflow(today))?,
    };

    if range.start >= range.end {
        return Err(CostError::InvalidRange { start: range.start, end: range.end });
    }

    let earliest = retention_start(today).ok_or_else(|| date_overflow(today))?;
    if range.start < earliest {
        info!(
            event_name = "cost.fetch.rejected",
            start = %range.start,
            earliest = %earliest,
            "cost range outside retention window"
        );
        return Err(CostError::OutOfRetention { start: range.start, earliest });
    }

    Ok(CostQuery { range, service: request.service })
}

fn date_overflow(today: NaiveDate) -> CostError {
    CostError::Provider(ProviderError::new(
        "cost",
        "resolve_range",
        ProviderErrorKind::InvalidRequest,
        format!("could not derive month boundaries from {today}"),
    ))
}

/// Report the grand total when present; otherwise the first group subtotal;
/// otherwise zero.
pub fn aggregate_period(raw: RawCostPeriod) -> CostPeriod {
    let CostAmount { amount, unit } = raw
        .total
        .or_else(|| raw.groups.into_iter().next().map(|group| group.amount))
        .unwrap_or_else(|| CostAmount { amount: Decimal::ZERO, unit: DEFAULT_UNIT.to_owned() });

    CostPeriod { start: raw.start, end: raw.end, amount, unit }
}
