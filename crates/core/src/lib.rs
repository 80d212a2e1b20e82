pub mod audit;
pub mod config;
pub mod cost;
pub mod domain;
pub mod errors;
pub mod metrics;
pub mod orchestrator;
pub mod pagination;
pub mod provider;
pub mod retry;
pub mod scanner;

pub use audit::{InMemoryQueryAuditLog, QueryAuditEntry, QueryAuditLog};
pub use cost::{CostFetcher, CostRequest};
pub use domain::cost::{CostPeriod, CostService, DateRange};
pub use domain::metric::{MetricSample, Statistic};
pub use domain::resource::{
    ComputeInstance, DatabaseInstance, LoadBalancer, LoadBalancerType, ResourceKind,
    ResourceRecord, StorageBucket,
};
pub use domain::snapshot::{InventorySnapshot, KindOutcome};
pub use errors::{
    ApplicationError, AuditError, CostError, InterfaceError, ProviderError, ProviderErrorKind,
    ScanError,
};
pub use metrics::MetricReducer;
pub use orchestrator::ScanOrchestrator;
pub use provider::ProviderSet;
pub use retry::RetryPolicy;
pub use scanner::{
    ComputeScanner, DatabaseScanner, LoadBalancerScanner, ResourceScanner, StorageScanner,
};
