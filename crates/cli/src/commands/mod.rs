pub mod ask;
pub mod config;
pub mod costs;
pub mod doctor;
pub mod history;
pub mod migrate;
pub mod scan;

use cloudscope_aws::AwsCloud;
use cloudscope_core::config::{AppConfig, LoadOptions};
use cloudscope_core::errors::{ApplicationError, InterfaceError};
use cloudscope_core::provider::ProviderSet;
use serde::Serialize;
use tokio::runtime::Runtime;
use uuid::Uuid;

pub const EXIT_CHECKS_FAILED: u8 = 1;
pub const EXIT_CONFIG: u8 = 2;
pub const EXIT_RUNTIME: u8 = 3;
pub const EXIT_DATABASE: u8 = 4;
pub const EXIT_MIGRATION: u8 = 5;
pub const EXIT_CLOUD_PROVIDER: u8 = 6;
pub const EXIT_BACKEND: u8 = 7;
pub const EXIT_INVALID_REQUEST: u8 = 8;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
        };
        Self { exit_code, output: serialize_payload(payload) }
    }

    /// Maps an application failure onto its exit code. The message carries the
    /// user-safe text plus a correlation id that is also logged with the cause.
    pub fn from_application_error(command: &str, error: ApplicationError) -> Self {
        let (error_class, exit_code) = match &error {
            ApplicationError::Cost(cost) if cost.is_rejected_request() => {
                ("invalid_request", EXIT_INVALID_REQUEST)
            }
            ApplicationError::Scan(_) | ApplicationError::Cost(_) => {
                ("cloud_provider", EXIT_CLOUD_PROVIDER)
            }
            ApplicationError::Backend(_) => ("backend", EXIT_BACKEND),
            ApplicationError::Persistence(_) => ("db_query", EXIT_DATABASE),
            ApplicationError::Configuration(_) => ("config_validation", EXIT_CONFIG),
        };
        let interface = error.into_interface(Uuid::new_v4().to_string());
        tracing::warn!(
            event_name = "cli.command.failed",
            command,
            correlation_id = interface.correlation_id(),
            error = %interface,
            "command failed"
        );

        let message = match &interface {
            InterfaceError::BadRequest { message, .. } => message.clone(),
            other => {
                format!("{} (correlation id {})", other.user_message(), other.correlation_id())
            }
        };
        Self::failure(command, error_class, message, exit_code)
    }

    /// Pretty JSON of a command's data payload.
    pub fn json<T: Serialize>(command: &str, value: &T, exit_code: u8) -> Self {
        match serde_json::to_string_pretty(value) {
            Ok(output) => Self { exit_code, output },
            Err(error) => Self::failure(
                command,
                "serialization",
                format!("could not serialize output: {error}"),
                EXIT_RUNTIME,
            ),
        }
    }
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

/// Load and validate configuration, then install logging from it.
pub(crate) fn load_config(command: &str, options: &LoadOptions) -> Result<AppConfig, CommandResult> {
    let config = AppConfig::load(options.clone()).map_err(|error| {
        CommandResult::failure(
            command,
            "config_validation",
            format!("configuration issue: {error}"),
            EXIT_CONFIG,
        )
    })?;
    crate::logging::init(&config.logging);
    Ok(config)
}

pub(crate) fn build_runtime(command: &str) -> Result<Runtime, CommandResult> {
    tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(|error| {
        CommandResult::failure(
            command,
            "runtime_init",
            format!("failed to initialize async runtime: {error}"),
            EXIT_RUNTIME,
        )
    })
}

pub(crate) async fn aws_providers(config: &AppConfig) -> ProviderSet {
    AwsCloud::connect(&config.aws).await.into_provider_set()
}
