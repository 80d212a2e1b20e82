use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use cloudscope_core::config::{AppConfig, LoadOptions, LogFormat, DEFAULT_CONFIG_FILE};
use secrecy::{ExposeSecret, SecretString};
use toml::Value;

use crate::commands::{load_config, CommandResult};

const COMMAND: &str = "config";

struct Field {
    key: &'static str,
    value: String,
    env_keys: &'static [&'static str],
}

impl Field {
    fn new(key: &'static str, value: impl Into<String>, env_keys: &'static [&'static str]) -> Self {
        Self { key, value: value.into(), env_keys }
    }
}

pub fn run(options: &LoadOptions) -> CommandResult {
    let config = match load_config(COMMAND, options) {
        Ok(config) => config,
        Err(result) => return result,
    };

    let config_file_path = detect_config_path(options.config_path.as_deref());
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in fields(&config) {
        let source = field_source(
            field.key,
            field.env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(field.key, &field.value, source));
    }

    CommandResult { exit_code: 0, output: lines.join("\n") }
}

fn fields(config: &AppConfig) -> Vec<Field> {
    vec![
        Field::new("aws.region", &config.aws.region, &["CLOUDSCOPE_AWS_REGION", "AWS_REGION"]),
        Field::new(
            "aws.profile",
            config.aws.profile.as_deref().unwrap_or("<unset>"),
            &["CLOUDSCOPE_AWS_PROFILE"],
        ),
        Field::new(
            "aws.max_attempts",
            config.aws.max_attempts.to_string(),
            &["CLOUDSCOPE_AWS_MAX_ATTEMPTS"],
        ),
        Field::new(
            "aws.operation_timeout_secs",
            config.aws.operation_timeout_secs.to_string(),
            &["CLOUDSCOPE_AWS_OPERATION_TIMEOUT_SECS"],
        ),
        Field::new("llm.provider", config.llm.provider.as_str(), &["CLOUDSCOPE_LLM_PROVIDER"]),
        Field::new("llm.model", &config.llm.model, &["CLOUDSCOPE_LLM_MODEL"]),
        Field::new(
            "llm.base_url",
            config.llm.base_url.as_deref().unwrap_or("<unset>"),
            &["CLOUDSCOPE_LLM_BASE_URL"],
        ),
        Field::new(
            "llm.api_key",
            redact_key(config.llm.api_key.as_ref()),
            &["CLOUDSCOPE_LLM_API_KEY", "OPENAI_API_KEY"],
        ),
        Field::new(
            "llm.timeout_secs",
            config.llm.timeout_secs.to_string(),
            &["CLOUDSCOPE_LLM_TIMEOUT_SECS"],
        ),
        Field::new(
            "llm.max_retries",
            config.llm.max_retries.to_string(),
            &["CLOUDSCOPE_LLM_MAX_RETRIES"],
        ),
        Field::new(
            "llm.max_tokens",
            config.llm.max_tokens.to_string(),
            &["CLOUDSCOPE_LLM_MAX_TOKENS"],
        ),
        Field::new(
            "llm.temperature",
            config.llm.temperature.to_string(),
            &["CLOUDSCOPE_LLM_TEMPERATURE"],
        ),
        Field::new("database.url", &config.database.url, &["CLOUDSCOPE_DATABASE_URL"]),
        Field::new(
            "database.max_connections",
            config.database.max_connections.to_string(),
            &["CLOUDSCOPE_DATABASE_MAX_CONNECTIONS"],
        ),
        Field::new(
            "database.timeout_secs",
            config.database.timeout_secs.to_string(),
            &["CLOUDSCOPE_DATABASE_TIMEOUT_SECS"],
        ),
        Field::new(
            "audit.enabled",
            config.audit.enabled.to_string(),
            &["CLOUDSCOPE_AUDIT_ENABLED"],
        ),
        Field::new("audit.client_id", &config.audit.client_id, &["CLOUDSCOPE_AUDIT_CLIENT_ID"]),
        Field::new(
            "logging.level",
            &config.logging.level,
            &["CLOUDSCOPE_LOGGING_LEVEL", "CLOUDSCOPE_LOG_LEVEL"],
        ),
        Field::new(
            "logging.format",
            format_name(config.logging.format),
            &["CLOUDSCOPE_LOGGING_FORMAT", "CLOUDSCOPE_LOG_FORMAT"],
        ),
    ]
}

fn detect_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return path.exists().then(|| path.to_path_buf());
    }

    [PathBuf::from(DEFAULT_CONFIG_FILE), PathBuf::from("config").join(DEFAULT_CONFIG_FILE)]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn format_name(format: LogFormat) -> &'static str {
    match format {
        LogFormat::Compact => "compact",
        LogFormat::Pretty => "pretty",
        LogFormat::Json => "json",
    }
}

/// Keeps a key's vendor prefix (`sk-`) and hides the rest.
fn redact_key(key: Option<&SecretString>) -> String {
    let Some(key) = key else {
        return "<unset>".to_string();
    };
    let trimmed = key.expose_secret().trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        return format!("{prefix}-***");
    }

    "<redacted>".to_string()
}
