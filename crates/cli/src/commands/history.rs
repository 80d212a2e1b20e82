use cloudscope_core::config::LoadOptions;
use cloudscope_db::{connect, migrations, DbPool, SqlQueryAuditLog};

use crate::commands::{build_runtime, load_config, CommandResult, EXIT_DATABASE, EXIT_MIGRATION};

const COMMAND: &str = "history";

pub fn run(options: &LoadOptions, client_id: Option<&str>, limit: u32) -> CommandResult {
    let config = match load_config(COMMAND, options) {
        Ok(config) => config,
        Err(result) => return result,
    };
    let runtime = match build_runtime(COMMAND) {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };
    let client_id = client_id.unwrap_or(&config.audit.client_id);

    runtime.block_on(async {
        let pool = match connect(&config.database).await {
            Ok(pool) => pool,
            Err(error) => {
                return CommandResult::failure(
                    COMMAND,
                    "db_connectivity",
                    error.to_string(),
                    EXIT_DATABASE,
                );
            }
        };
        let result = execute(&pool, client_id, limit).await;
        pool.close().await;
        result
    })
}

/// Newest first, at most 50 entries.
pub async fn execute(pool: &DbPool, client_id: &str, limit: u32) -> CommandResult {
    if let Err(error) = migrations::run_pending(pool).await {
        return CommandResult::failure(COMMAND, "migration", error.to_string(), EXIT_MIGRATION);
    }

    match SqlQueryAuditLog::new(pool.clone()).list_recent(client_id, limit).await {
        Ok(entries) => CommandResult::json(COMMAND, &entries, 0),
        Err(error) => {
            CommandResult::failure(COMMAND, "db_query", error.to_string(), EXIT_DATABASE)
        }
    }
}

#[cfg(test)]
mod tests {
    use cloudscope_core::audit::QueryAuditEntry;
    use cloudscope_db::{connect_with_settings, migrations, SqlQueryAuditLog};
    use serde_json::Value;

    use super::execute;

    #[tokio::test]
    async fn lists_one_clients_entries_newest_first() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("pool");
        migrations::run_pending(&pool).await.expect("migrations");
        let log = SqlQueryAuditLog::new(pool.clone());
        log.insert(&QueryAuditEntry::new("acme", "first question", "first answer"))
            .await
            .expect("insert");
        log.insert(&QueryAuditEntry::new("acme", "second question", "second answer"))
            .await
            .expect("insert");
        log.insert(&QueryAuditEntry::new("globex", "other", "other")).await.expect("insert");

        let result = execute(&pool, "acme", 10).await;

        assert_eq!(result.exit_code, 0);
        let entries: Value = serde_json::from_str(&result.output).expect("json");
        let queries: Vec<&str> = entries
            .as_array()
            .expect("array")
            .iter()
            .filter_map(|entry| entry["query"].as_str())
            .collect();
        assert_eq!(queries, ["second question", "first question"]);
    }

    #[tokio::test]
    async fn unknown_client_yields_an_empty_list() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("pool");

        let result = execute(&pool, "nobody", 5).await;

        assert_eq!(result.exit_code, 0);
        assert_eq!(result.output, "[]");
    }
}
