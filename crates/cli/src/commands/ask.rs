use std::sync::Arc;

use anyhow::Context;
use cloudscope_agent::{client_from_config, AgentRuntime, Answer};
use cloudscope_core::audit::QueryAuditLog;
use cloudscope_core::config::{AppConfig, LoadOptions};
use cloudscope_db::{connect, migrations, SqlQueryAuditLog};
use tracing::warn;

use crate::commands::{
    aws_providers, build_runtime, load_config, CommandResult, EXIT_BACKEND, EXIT_CONFIG,
    EXIT_RUNTIME,
};

const COMMAND: &str = "ask";

pub fn run(options: &LoadOptions, query: &str, json_output: bool) -> CommandResult {
    let config = match load_config(COMMAND, options) {
        Ok(config) => config,
        Err(result) => return result,
    };
    let runtime = match build_runtime(COMMAND) {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    runtime.block_on(async {
        let llm = match client_from_config(&config.llm) {
            Ok(llm) => llm,
            Err(error) => {
                return CommandResult::failure(
                    COMMAND,
                    "backend_configuration",
                    error.to_string(),
                    EXIT_CONFIG,
                );
            }
        };

        let providers = aws_providers(&config).await;
        let agent = match AgentRuntime::new(&providers, llm) {
            Ok(agent) => agent.with_limits(config.llm.max_tokens, config.llm.temperature),
            Err(error) => {
                return CommandResult::failure(
                    COMMAND,
                    "prompt_templates",
                    error.to_string(),
                    EXIT_RUNTIME,
                );
            }
        };
        let agent = match open_audit_log(&config).await {
            Some(log) => agent.with_audit(log, config.audit.client_id.clone()),
            None => agent,
        };

        render(&agent.answer(query).await, json_output)
    })
}

/// The answer is always printed; a backend failure only changes the exit code.
pub fn render(answer: &Answer, json_output: bool) -> CommandResult {
    let exit_code = if answer.error.is_some() { EXIT_BACKEND } else { 0 };
    if json_output {
        return CommandResult::json(COMMAND, answer, exit_code);
    }
    CommandResult { exit_code, output: answer.answer.clone() }
}

async fn open_audit_log(config: &AppConfig) -> Option<Arc<dyn QueryAuditLog>> {
    if !config.audit.enabled {
        return None;
    }

    match connect_audit_log(config).await {
        Ok(log) => Some(Arc::new(log)),
        Err(error) => {
            warn!(
                event_name = "audit.unavailable",
                error = %format!("{error:#}"),
                "query audit trail disabled for this run"
            );
            None
        }
    }
}

async fn connect_audit_log(config: &AppConfig) -> anyhow::Result<SqlQueryAuditLog> {
    let pool = connect(&config.database).await.context("connecting to the audit database")?;
    migrations::run_pending(&pool).await.context("migrating the audit database")?;
    Ok(SqlQueryAuditLog::new(pool))
}
