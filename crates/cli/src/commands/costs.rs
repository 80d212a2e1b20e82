use chrono::{Datelike, NaiveDate, Utc};
use cloudscope_core::config::LoadOptions;
use cloudscope_core::cost::{CostFetcher, CostRequest};
use cloudscope_core::domain::cost::{CostPeriod, CostService, DateRange};
use cloudscope_core::provider::ProviderSet;
use serde::Serialize;

use crate::commands::{
    aws_providers, build_runtime, load_config, CommandResult, EXIT_INVALID_REQUEST,
};

const COMMAND: &str = "costs";

#[derive(Debug, Serialize)]
struct CostReport<'a> {
    service: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    range: Option<DateRange>,
    periods: Vec<CostPeriod>,
}

pub fn run(
    options: &LoadOptions,
    service: Option<&str>,
    range: Option<(NaiveDate, NaiveDate)>,
) -> CommandResult {
    let request = match request_from_args(service, range) {
        Ok(request) => request,
        Err(result) => return result,
    };
    let config = match load_config(COMMAND, options) {
        Ok(config) => config,
        Err(result) => return result,
    };
    let runtime = match build_runtime(COMMAND) {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    runtime.block_on(async {
        let providers = aws_providers(&config).await;
        execute_at(&providers, &request, Utc::now().date_naive()).await
    })
}

pub fn request_from_args(
    service: Option<&str>,
    range: Option<(NaiveDate, NaiveDate)>,
) -> Result<CostRequest, CommandResult> {
    let mut request = match service {
        None => CostRequest::all_services(),
        Some(raw) => match CostService::parse(raw) {
            Some(service) => CostRequest::for_service(service),
            None => {
                return Err(CommandResult::failure(
                    COMMAND,
                    "invalid_request",
                    format!("unknown service `{raw}` (expected compute|storage|database)"),
                    EXIT_INVALID_REQUEST,
                ));
            }
        },
    };
    if let Some((start, end)) = range {
        if start.day() != 1 || end.day() != 1 {
            return Err(CommandResult::failure(
                COMMAND,
                "invalid_request",
                format!("--start and --end must be month starts (got {start} and {end})"),
                EXIT_INVALID_REQUEST,
            ));
        }
        request = request.with_range(DateRange::new(start, end));
    }
    Ok(request)
}

/// Range errors are rejected locally and map to a distinct exit code from
/// provider failures.
pub async fn execute_at(
    providers: &ProviderSet,
    request: &CostRequest,
    today: NaiveDate,
) -> CommandResult {
    let fetcher = CostFetcher::new(providers.cost.clone());
    match fetcher.fetch_at(request, today).await {
        Ok(periods) => {
            let report = CostReport {
                service: request.service.map_or("all", |service| service.as_str()),
                range: request.range,
                periods,
            };
            CommandResult::json(COMMAND, &report, 0)
        }
        Err(error) => CommandResult::from_application_error(COMMAND, error.into()),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::NaiveDate;
    use cloudscope_core::domain::cost::{CostService, DateRange};
    use cloudscope_core::errors::ProviderErrorKind;
    use cloudscope_core::provider::memory::{cost_period, ops, InMemoryCloud};
    use cloudscope_core::provider::ProviderSet;
    use rust_decimal::Decimal;
    use serde_json::Value;

    use super::{execute_at, request_from_args};
    use crate::commands::{EXIT_CLOUD_PROVIDER, EXIT_INVALID_REQUEST};

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("date")
    }

    fn today() -> NaiveDate {
        date(2025, 6, 15)
    }

    fn cloud() -> InMemoryCloud {
        InMemoryCloud::new().with_cost_periods(vec![cost_period(
            date(2025, 5, 1),
            date(2025, 6, 1),
            Some(Decimal::new(10_000, 2)),
            &[],
        )])
    }

    fn payload(output: &str) -> Value {
        serde_json::from_str(output).expect("command output should be valid JSON")
    }

    #[tokio::test]
    async fn service_filter_reaches_the_provider() {
        let cloud = Arc::new(cloud());
        let request = request_from_args(Some("ec2"), None).expect("request");

        let result = execute_at(&ProviderSet::from_shared(cloud.clone()), &request, today()).await;

        assert_eq!(result.exit_code, 0);
        let report = payload(&result.output);
        assert_eq!(report["service"], "compute");
        assert_eq!(report["periods"][0]["amount"], "100.00");
        assert_eq!(cloud.cost_queries()[0].service, Some(CostService::Compute));
    }

    #[tokio::test]
    async fn out_of_retention_range_is_rejected_before_any_call() {
        let cloud = Arc::new(cloud());
        let request =
            request_from_args(None, Some((date(2023, 1, 1), date(2023, 2, 1)))).expect("request");

        let result = execute_at(&ProviderSet::from_shared(cloud.clone()), &request, today()).await;

        assert_eq!(result.exit_code, EXIT_INVALID_REQUEST);
        assert_eq!(payload(&result.output)["error_class"], "invalid_request");
        assert_eq!(cloud.calls(ops::GET_COST_AND_USAGE), 0);
    }

    #[tokio::test]
    async fn provider_failure_maps_to_its_own_exit_code() {
        let cloud = cloud().failing(ops::GET_COST_AND_USAGE, ProviderErrorKind::Throttled);
        let request = request_from_args(None, None).expect("request");

        let providers = ProviderSet::from_shared(Arc::new(cloud));

        let result = execute_at(&providers, &request, today()).await;

        assert_eq!(result.exit_code, EXIT_CLOUD_PROVIDER);
        let outcome = payload(&result.output);
        assert_eq!(outcome["error_class"], "cloud_provider");
        let message = outcome["message"].as_str().expect("message");
        assert!(message.starts_with("The service is temporarily unavailable"));
        assert!(message.contains("correlation id"));
    }

    #[test]
    fn range_bounds_must_fall_on_month_starts() {
        let result = request_from_args(None, Some((date(2025, 1, 15), date(2025, 3, 1))))
            .expect_err("rejected");
        assert_eq!(result.exit_code, EXIT_INVALID_REQUEST);
        assert_eq!(payload(&result.output)["error_class"], "invalid_request");

        assert!(request_from_args(None, Some((date(2025, 1, 1), date(2025, 2, 28)))).is_err());

        let request = request_from_args(Some("rds"), Some((date(2025, 1, 1), date(2025, 3, 1))))
            .expect("aligned range");
        assert_eq!(request.range, Some(DateRange::new(date(2025, 1, 1), date(2025, 3, 1))));
        assert_eq!(request.service, Some(CostService::Database));
    }

    #[test]
    fn unknown_service_is_an_invalid_request() {
        let result = request_from_args(Some("lambda"), None).expect_err("rejected");

        assert_eq!(result.exit_code, EXIT_INVALID_REQUEST);
        assert!(payload(&result.output)["message"].as_str().is_some_and(|m| m.contains("lambda")));
    }
}
