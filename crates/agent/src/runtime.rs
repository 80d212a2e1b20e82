use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use cloudscope_core::audit::{
    QueryAuditEntry, QueryAuditLog, METADATA_BACKEND_ERROR, METADATA_COLLECTED,
    METADATA_CORRELATION_ID, METADATA_DOMAINS,
};
use cloudscope_core::provider::ProviderSet;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::classifier::QueryClassifier;
use crate::context::ContextAssembler;
use crate::llm::LlmClient;
use crate::narrative::{NarrativeResponder, StructuredInventory};
use crate::prompt::{PromptError, PromptRenderer};

/// Result of answering one free-text question.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Answer {
    pub answer: String,
    pub inventory: StructuredInventory,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

struct AuditSink {
    log: Arc<dyn QueryAuditLog>,
    client_id: String,
}

/// Classify, collect, narrate, audit.
pub struct AgentRuntime {
    classifier: QueryClassifier,
    assembler: ContextAssembler,
    responder: NarrativeResponder,
    audit: Option<AuditSink>,
}

impl AgentRuntime {
    pub fn new(providers: &ProviderSet, llm: Arc<dyn LlmClient>) -> Result<Self, PromptError> {
        Ok(Self {
            classifier: QueryClassifier::new(),
            assembler: ContextAssembler::new(providers),
            responder: NarrativeResponder::new(llm, PromptRenderer::new()?),
            audit: None,
        })
    }

    pub fn with_limits(mut self, max_tokens: u32, temperature: f32) -> Self {
        self.responder = self.responder.with_limits(max_tokens, temperature);
        self
    }

    pub fn with_audit(mut self, log: Arc<dyn QueryAuditLog>, client_id: impl Into<String>) -> Self {
        self.audit = Some(AuditSink { log, client_id: client_id.into() });
        self
    }

    pub async fn answer(&self, query: &str) -> Answer {
        self.answer_at(query, Utc::now().date_naive()).await
    }

    /// Month names and the cost retention window resolve against `today`.
    pub async fn answer_at(&self, query: &str, today: NaiveDate) -> Answer {
        let correlation_id = Uuid::new_v4().to_string();
        info!(
            event_name = "agent.query.received",
            correlation_id = %correlation_id,
            query_chars = query.chars().count(),
            "answering query"
        );

        let classification = self.classifier.classify_at(query, today);
        let context = self.assembler.assemble_at(&classification, today).await;
        let collected = context.collected().join(",");
        let narrative = self.responder.respond_at(query, context, today).await;

        if let Some(sink) = &self.audit {
            let mut entry = QueryAuditEntry::new(&sink.client_id, query, &narrative.answer)
                .with_metadata(METADATA_DOMAINS, classification.domain_names())
                .with_metadata(METADATA_COLLECTED, collected)
                .with_metadata(METADATA_CORRELATION_ID, &correlation_id);
            if let Some(detail) = &narrative.backend_error {
                entry = entry.with_metadata(METADATA_BACKEND_ERROR, detail);
            }
            if let Err(error) = sink.log.append(entry).await {
                warn!(
                    event_name = "audit.append_failed",
                    correlation_id = %correlation_id,
                    error = %error,
                    "could not record query audit entry"
                );
            }
        }

        Answer {
            answer: narrative.answer,
            inventory: narrative.inventory,
            error: narrative.backend_error,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::NaiveDate;
    use cloudscope_core::audit::{
        InMemoryQueryAuditLog, QueryAuditEntry, QueryAuditLog, METADATA_BACKEND_ERROR,
        METADATA_COLLECTED, METADATA_DOMAINS,
    };
    use cloudscope_core::domain::cost::{CostService, DateRange};
    use cloudscope_core::errors::AuditError;
    use cloudscope_core::provider::memory::{
        compute_instance, cost_period, ops, InMemoryCloud,
    };
    use cloudscope_core::provider::ProviderSet;
    use rust_decimal::Decimal;
    use serde_json::Value;

    use super::AgentRuntime;
    use crate::llm::ScriptedLlm;

    struct BrokenAuditLog;

    #[async_trait]
    impl QueryAuditLog for BrokenAuditLog {
        async fn append(&self, _entry: QueryAuditEntry) -> Result<(), AuditError> {
            Err(AuditError::Storage("disk full".to_owned()))
        }
    }

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("date")
    }

    fn today() -> NaiveDate {
        date(2025, 6, 15)
    }

    fn cloud() -> Arc<InMemoryCloud> {
        Arc::new(
            InMemoryCloud::new()
                .with_instances(vec![compute_instance("i-1", "running")])
                .with_buckets(&["logs"])
                .with_cost_periods(vec![cost_period(
                    date(2025, 5, 1),
                    date(2025, 6, 1),
                    Some(Decimal::new(10_000, 2)),
                    &[Decimal::new(4_000, 2)],
                )]),
        )
    }

    #[tokio::test]
    async fn compute_cost_question_end_to_end() {
        let cloud = cloud();
        let llm = Arc::new(ScriptedLlm::replying("Compute cost $100.00 last month."));
        let audit = Arc::new(InMemoryQueryAuditLog::default());
        let runtime = AgentRuntime::new(&ProviderSet::from_shared(cloud.clone()), llm)
            .expect("runtime")
            .with_audit(audit.clone(), "acme");

        let answer = runtime.answer_at("what is our compute cost", today()).await;

        let queries = cloud.cost_queries();
        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0].service, Some(CostService::Compute));
        assert_eq!(queries[0].range, DateRange::new(date(2025, 5, 1), date(2025, 6, 1)));
        assert_eq!(cloud.calls(ops::DESCRIBE_INSTANCES), 0);
        assert_eq!(cloud.calls(ops::LIST_BUCKETS), 0);

        assert_eq!(answer.answer, "Compute cost $100.00 last month.");
        let costs = answer.inventory.costs.as_ref().expect("costs");
        assert_eq!(costs.len(), 1);
        assert_eq!(costs[0].amount, Decimal::new(10_000, 2));
        assert!(answer.inventory.compute.is_empty());
        assert!(answer.inventory.storage.is_empty());
        assert!(answer.inventory.database.is_empty());
        assert!(answer.inventory.load_balancers.is_none());
        assert!(answer.inventory.database_costs.is_none());

        let value = serde_json::to_value(&answer).expect("serialize");
        assert!(value["inventory"].get("costs").is_some());
        assert!(value["inventory"].get("load_balancers").is_none());
        assert!(value.get("error").is_none());

        let entries = audit.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].client_id, "acme");
        assert_eq!(entries[0].response, "Compute cost $100.00 last month.");
        assert_eq!(entries[0].metadata.get(METADATA_DOMAINS).map(String::as_str), Some("cost"));
        assert_eq!(entries[0].metadata.get(METADATA_COLLECTED).map(String::as_str), Some("costs"));
    }

    #[tokio::test]
    async fn backend_failure_is_answered_and_audited() {
        let llm = Arc::new(ScriptedLlm::failing("upstream timeout"));
        let audit = Arc::new(InMemoryQueryAuditLog::default());
        let runtime = AgentRuntime::new(&ProviderSet::from_shared(cloud()), llm)
            .expect("runtime")
            .with_audit(audit.clone(), "acme");

        let answer = runtime.answer_at("list ec2 instances", today()).await;

        assert!(answer.answer.contains("upstream timeout"));
        assert_eq!(answer.inventory.compute.len(), 1);
        assert!(answer.error.is_some());

        let entries = audit.entries();
        let backend_error = entries[0].metadata.get(METADATA_BACKEND_ERROR);
        assert!(backend_error.is_some_and(|detail| detail.contains("upstream timeout")));
    }

    #[tokio::test]
    async fn audit_failure_does_not_change_the_answer() {
        let llm = Arc::new(ScriptedLlm::replying("One bucket."));
        let runtime = AgentRuntime::new(&ProviderSet::from_shared(cloud()), llm)
            .expect("runtime")
            .with_audit(Arc::new(BrokenAuditLog), "acme");

        let answer = runtime.answer_at("s3 buckets", today()).await;

        assert_eq!(answer.answer, "One bucket.");
        assert_eq!(answer.inventory.storage.len(), 1);
        assert!(answer.error.is_none());
    }

    #[tokio::test]
    async fn storage_question_keeps_unqueried_sequences_empty() {
        let llm = Arc::new(ScriptedLlm::replying("ok"));
        let runtime =
            AgentRuntime::new(&ProviderSet::from_shared(cloud()), llm).expect("runtime");

        let answer = runtime.answer_at("which buckets do we have?", today()).await;
        let value = serde_json::to_value(&answer.inventory).expect("serialize");

        assert_eq!(value["storage"].as_array().map(Vec::len), Some(1));
        assert_eq!(value["compute"], Value::Array(Vec::new()));
        assert_eq!(value["database"], Value::Array(Vec::new()));
        assert!(value.get("costs").is_none());
    }
}
