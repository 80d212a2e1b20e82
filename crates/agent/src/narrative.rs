use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use cloudscope_core::domain::cost::CostPeriod;
use cloudscope_core::domain::resource::{
    ComputeInstance, DatabaseInstance, LoadBalancer, StorageBucket,
};
use cloudscope_core::domain::snapshot::KindOutcome;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info};

use crate::context::{CostSection, QueryContext};
use crate::llm::{CompletionRequest, LlmClient, LlmError};
use crate::prompt::{PromptError, PromptRenderer};

pub const DEFAULT_MAX_TOKENS: u32 = 1000;
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Normalized inventory returned next to the answer text.
///
/// Compute, storage and database are always present, empty when not queried
/// or not collected. Costs and load balancers appear only when queried.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct StructuredInventory {
    pub compute: Vec<ComputeInstance>,
    pub storage: Vec<StorageBucket>,
    pub database: Vec<DatabaseInstance>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub costs: Option<Vec<CostPeriod>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_costs: Option<Vec<CostPeriod>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load_balancers: Option<Vec<LoadBalancer>>,
    /// Section name to error for sections that were queried but failed.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub errors: BTreeMap<String, String>,
}

impl StructuredInventory {
    pub fn from_context(context: QueryContext) -> Self {
        let errors = context
            .failures()
            .into_iter()
            .map(|(section, error)| (section.to_owned(), error.to_owned()))
            .collect();

        Self {
            compute: context.compute.map(KindOutcome::into_items).unwrap_or_default(),
            storage: context.storage.map(KindOutcome::into_items).unwrap_or_default(),
            database: context.database.map(KindOutcome::into_items).unwrap_or_default(),
            costs: context.costs.map(cost_items),
            database_costs: context.database_costs.map(cost_items),
            load_balancers: context.load_balancers.map(KindOutcome::into_items),
            errors,
        }
    }
}

fn cost_items(section: CostSection) -> Vec<CostPeriod> {
    section.result.into_items()
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Narrative {
    pub answer: String,
    pub inventory: StructuredInventory,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend_error: Option<String>,
}

#[derive(Debug, Error)]
enum NarrativeError {
    #[error(transparent)]
    Prompt(#[from] PromptError),
    #[error(transparent)]
    Backend(#[from] LlmError),
}

/// Turns a query context into prose through the generative backend.
pub struct NarrativeResponder {
    llm: Arc<dyn LlmClient>,
    prompts: PromptRenderer,
    max_tokens: u32,
    temperature: f32,
}

impl NarrativeResponder {
    pub fn new(llm: Arc<dyn LlmClient>, prompts: PromptRenderer) -> Self {
        Self { llm, prompts, max_tokens: DEFAULT_MAX_TOKENS, temperature: DEFAULT_TEMPERATURE }
    }

    pub fn with_limits(mut self, max_tokens: u32, temperature: f32) -> Self {
        self.max_tokens = max_tokens;
        self.temperature = temperature;
        self
    }

    pub async fn respond(&self, question: &str, context: QueryContext) -> Narrative {
        self.respond_at(question, context, Utc::now().date_naive()).await
    }

    /// Never fails: a backend error becomes an apology that carries the detail.
    pub async fn respond_at(
        &self,
        question: &str,
        context: QueryContext,
        today: NaiveDate,
    ) -> Narrative {
        let outcome = self.complete(question, &context, today).await;
        let inventory = StructuredInventory::from_context(context);

        match outcome {
            Ok(answer) => {
                info!(
                    event_name = "narrative.completed",
                    backend = self.llm.name(),
                    answer_chars = answer.chars().count(),
                    "narrative answer produced"
                );
                Narrative { answer, inventory, backend_error: None }
            }
            Err(failure) => {
                let detail = failure.to_string();
                error!(
                    event_name = "narrative.backend_failed",
                    backend = self.llm.name(),
                    error = %detail,
                    "generative backend failed"
                );
                Narrative { answer: apology(&detail), inventory, backend_error: Some(detail) }
            }
        }
    }

    async fn complete(
        &self,
        question: &str,
        context: &QueryContext,
        today: NaiveDate,
    ) -> Result<String, NarrativeError> {
        let messages = self.prompts.render(question, context, today)?;
        let request = CompletionRequest {
            messages,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };
        Ok(self.llm.complete(&request).await?)
    }
}

fn apology(detail: &str) -> String {
    format!("Sorry, an error occurred while processing your question: {detail}")
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::NaiveDate;
    use cloudscope_core::domain::cost::CostPeriod;
    use cloudscope_core::domain::resource::LoadBalancerType;
    use cloudscope_core::domain::snapshot::KindOutcome;
    use cloudscope_core::provider::memory::{compute_instance, load_balancer};
    use rust_decimal::Decimal;
    use serde_json::Value;

    use super::{NarrativeResponder, StructuredInventory};
    use crate::context::{CostSection, QueryContext};
    use crate::llm::{ChatRole, ScriptedLlm};
    use crate::prompt::PromptRenderer;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 15).expect("date")
    }

    fn responder(llm: Arc<ScriptedLlm>) -> NarrativeResponder {
        NarrativeResponder::new(llm, PromptRenderer::new().expect("templates"))
    }

    fn object_keys(value: &Value) -> Vec<String> {
        value.as_object().map(|map| map.keys().cloned().collect()).unwrap_or_default()
    }

    #[test]
    fn inventory_always_carries_compute_storage_and_database() {
        let inventory = StructuredInventory::from_context(QueryContext::default());
        let value = serde_json::to_value(&inventory).expect("serialize");

        let mut keys = object_keys(&value);
        keys.sort();
        assert_eq!(keys, ["compute", "database", "storage"]);
        assert_eq!(value["compute"], Value::Array(Vec::new()));
    }

    #[test]
    fn queried_optional_sections_appear_even_when_failed() {
        let context = QueryContext {
            costs: Some(CostSection {
                service: "all".to_owned(),
                requested_range: None,
                result: KindOutcome::<CostPeriod>::Failed { error: "throttled".to_owned() },
            }),
            load_balancers: Some(KindOutcome::Scanned {
                items: vec![load_balancer("edge", LoadBalancerType::Network)],
            }),
            ..QueryContext::default()
        };

        let inventory = StructuredInventory::from_context(context);

        assert_eq!(inventory.costs.as_deref(), Some(&[][..]));
        assert_eq!(inventory.load_balancers.as_ref().map(Vec::len), Some(1));
        assert!(inventory.database_costs.is_none());
        assert_eq!(inventory.errors.get("costs").map(String::as_str), Some("throttled"));
    }

    #[tokio::test]
    async fn successful_backend_reply_becomes_the_answer() {
        let llm = Arc::new(ScriptedLlm::replying("You run one t3.micro instance."));
        let context = QueryContext {
            compute: Some(KindOutcome::Scanned { items: vec![compute_instance("i-1", "running")] }),
            ..QueryContext::default()
        };

        let narrative = responder(llm.clone())
            .with_limits(256, 0.2)
            .respond_at("what runs?", context, today())
            .await;

        assert_eq!(narrative.answer, "You run one t3.micro instance.");
        assert!(narrative.backend_error.is_none());
        assert_eq!(narrative.inventory.compute.len(), 1);

        let requests = llm.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].max_tokens, 256);
        assert_eq!(requests[0].messages[0].role, ChatRole::System);
        assert!(requests[0].messages[1].content.contains("i-1"));
    }

    #[tokio::test]
    async fn backend_failure_becomes_an_apology_with_detail() {
        let llm = Arc::new(ScriptedLlm::failing("connection reset"));
        let context = QueryContext {
            costs: Some(CostSection {
                service: "compute".to_owned(),
                requested_range: None,
                result: KindOutcome::Scanned {
                    items: vec![CostPeriod {
                        start: NaiveDate::from_ymd_opt(2025, 5, 1).expect("date"),
                        end: NaiveDate::from_ymd_opt(2025, 6, 1).expect("date"),
                        amount: Decimal::new(4_200, 2),
                        unit: "USD".to_owned(),
                    }],
                },
            }),
            ..QueryContext::default()
        };

        let narrative = responder(llm).respond_at("compute cost?", context, today()).await;

        assert!(narrative.answer.starts_with("Sorry, an error occurred"));
        assert!(narrative.answer.contains("connection reset"));
        assert!(narrative.backend_error.as_deref().is_some_and(|e| e.contains("connection reset")));
        assert_eq!(narrative.inventory.costs.as_ref().map(Vec::len), Some(1));
    }
}
