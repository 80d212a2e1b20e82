use chrono::NaiveDate;
use serde::Serialize;
use tera::{Context, Tera};
use thiserror::Error;

use crate::context::QueryContext;
use crate::llm::ChatMessage;

const SYSTEM_TEMPLATE: &str = "system.md.tera";
const USER_TEMPLATE: &str = "user.md.tera";

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("prompt template error: {0}")]
    Template(#[from] tera::Error),
    #[error("could not serialize query context: {0}")]
    Context(#[from] serde_json::Error),
}

#[derive(Serialize)]
struct FailureView<'a> {
    section: &'a str,
    error: &'a str,
}

/// Renders the chat messages sent to the generative backend.
pub struct PromptRenderer {
    tera: Tera,
}

impl PromptRenderer {
    pub fn new() -> Result<Self, PromptError> {
        let mut tera = Tera::default();
        tera.add_raw_templates(vec![
            (SYSTEM_TEMPLATE, include_str!("../templates/system.md.tera")),
            (USER_TEMPLATE, include_str!("../templates/user.md.tera")),
        ])?;
        Ok(Self { tera })
    }

    pub fn render(
        &self,
        question: &str,
        context: &QueryContext,
        today: NaiveDate,
    ) -> Result<Vec<ChatMessage>, PromptError> {
        let failures: Vec<FailureView<'_>> = context
            .failures()
            .into_iter()
            .map(|(section, error)| FailureView { section, error })
            .collect();

        let mut values = Context::new();
        values.insert("today", &today.to_string());
        values.insert("collected", &context.collected());
        values.insert("failures", &failures);
        values.insert("context_json", &serde_json::to_string_pretty(context)?);
        values.insert("question", question.trim());

        Ok(vec![
            ChatMessage::system(self.tera.render(SYSTEM_TEMPLATE, &values)?),
            ChatMessage::user(self.tera.render(USER_TEMPLATE, &values)?),
        ])
    }
}
