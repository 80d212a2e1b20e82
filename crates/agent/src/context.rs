use chrono::{NaiveDate, Utc};
use cloudscope_core::cost::{CostFetcher, CostRequest};
use cloudscope_core::domain::cost::{CostPeriod, CostService, DateRange};
use cloudscope_core::domain::resource::{
    ComputeInstance, DatabaseInstance, LoadBalancer, StorageBucket,
};
use cloudscope_core::domain::snapshot::KindOutcome;
use cloudscope_core::orchestrator::ScanOrchestrator;
use cloudscope_core::provider::ProviderSet;
use cloudscope_core::scanner::ResourceScanner;
use serde::Serialize;
use tracing::info;

use crate::classifier::{Classification, Domain};

/// Monthly costs for one service filter, or why they could not be fetched.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CostSection {
    /// `all` when no service filter applies.
    pub service: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requested_range: Option<DateRange>,
    pub result: KindOutcome<CostPeriod>,
}

/// Data collected for one query. Sections for domains the query did not ask
/// about stay `None` and are left out of the serialized form.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct QueryContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub costs: Option<CostSection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_costs: Option<CostSection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compute: Option<KindOutcome<ComputeInstance>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage: Option<KindOutcome<StorageBucket>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<KindOutcome<DatabaseInstance>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load_balancers: Option<KindOutcome<LoadBalancer>>,
}

impl QueryContext {
    /// Names of the sections present, in serialization order.
    pub fn collected(&self) -> Vec<&'static str> {
        [
            ("costs", self.costs.is_some()),
            ("database_costs", self.database_costs.is_some()),
            ("compute", self.compute.is_some()),
            ("storage", self.storage.is_some()),
            ("database", self.database.is_some()),
            ("load_balancers", self.load_balancers.is_some()),
        ]
        .into_iter()
        .filter_map(|(name, present)| present.then_some(name))
        .collect()
    }

    /// Sections that were requested but came back as errors.
    pub fn failures(&self) -> Vec<(&'static str, &str)> {
        [
            ("costs", self.costs.as_ref().and_then(|section| section.result.error())),
            (
                "database_costs",
                self.database_costs.as_ref().and_then(|section| section.result.error()),
            ),
            ("compute", self.compute.as_ref().and_then(KindOutcome::error)),
            ("storage", self.storage.as_ref().and_then(KindOutcome::error)),
            ("database", self.database.as_ref().and_then(KindOutcome::error)),
            ("load_balancers", self.load_balancers.as_ref().and_then(KindOutcome::error)),
        ]
        .into_iter()
        .filter_map(|(name, error)| error.map(|error| (name, error)))
        .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.collected().is_empty()
    }
}

/// Fetches exactly the data a classified query needs.
#[derive(Clone)]
pub struct ContextAssembler {
    scans: ScanOrchestrator,
    costs: CostFetcher,
}

impl ContextAssembler {
    pub fn new(providers: &ProviderSet) -> Self {
        Self {
            scans: ScanOrchestrator::new(providers),
            costs: CostFetcher::new(providers.cost.clone()),
        }
    }

    pub async fn assemble(&self, classification: &Classification) -> QueryContext {
        self.assemble_at(classification, Utc::now().date_naive()).await
    }

    /// Cost retention is checked against `today`.
    pub async fn assemble_at(
        &self,
        classification: &Classification,
        today: NaiveDate,
    ) -> QueryContext {
        let cost_request = classification.cost_request();
        let (cost, mut context) = tokio::join!(
            self.cost_section(cost_request, today),
            self.inventory(classification),
        );

        if let Some((service, section)) = cost {
            match service {
                Some(CostService::Database) => context.database_costs = Some(section),
                _ => context.costs = Some(section),
            }
        }

        let collected = context.collected().join(",");
        let failed = context.failures().len();
        info!(
            event_name = "context.assembled",
            domains = %classification.domain_names(),
            collected = %collected,
            failed,
            "query context assembled"
        );
        context
    }

    async fn cost_section(
        &self,
        request: Option<CostRequest>,
        today: NaiveDate,
    ) -> Option<(Option<CostService>, CostSection)> {
        let request = request?;
        let result = self.costs.fetch_at(&request, today).await;
        let section = CostSection {
            service: request.service.map_or("all", |service| service.as_str()).to_owned(),
            requested_range: request.range,
            result: KindOutcome::from_result(result),
        };
        Some((request.service, section))
    }

    /// The full orchestrator runs only when every inventory domain is selected.
    async fn inventory(&self, classification: &Classification) -> QueryContext {
        if classification.selects_all_inventory() {
            let snapshot = self.scans.scan_all().await;
            return QueryContext {
                compute: Some(snapshot.compute),
                storage: Some(snapshot.storage),
                database: Some(snapshot.database),
                load_balancers: Some(snapshot.load_balancers),
                ..QueryContext::default()
            };
        }

        let (compute, storage, database, load_balancers) = tokio::join!(
            scan_if(self.scans.compute(), classification.includes(Domain::Compute)),
            scan_if(self.scans.storage(), classification.includes(Domain::Storage)),
            scan_if(self.scans.database(), classification.includes(Domain::Database)),
            scan_if(self.scans.load_balancers(), classification.includes(Domain::LoadBalancer)),
        );
        QueryContext { compute, storage, database, load_balancers, ..QueryContext::default() }
    }
}

async fn scan_if<S: ResourceScanner>(
    scanner: &S,
    selected: bool,
) -> Option<KindOutcome<S::Record>> {
    if !selected {
        return None;
    }
    Some(KindOutcome::from_result(scanner.scan().await))
}
