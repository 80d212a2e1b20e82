use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const ENV_PREFIX: &str = "CLOUDSCOPE_";
pub const DEFAULT_CONFIG_FILE: &str = "cloudscope.toml";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub aws: AwsConfig,
    pub llm: LlmConfig,
    pub database: DatabaseConfig,
    pub audit: AuditConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct AwsConfig {
    pub region: String,
    pub profile: Option<String>,
    pub max_attempts: u32,
    pub operation_timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct AuditConfig {
    pub enabled: bool,
    pub client_id: String,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    #[serde(rename = "openai")]
    OpenAi,
    Anthropic,
    Ollama,
}

impl LlmProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::Ollama => "ollama",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub aws_region: Option<String>,
    pub aws_profile: Option<String>,
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub llm_provider: Option<LlmProvider>,
    pub llm_model: Option<String>,
    pub audit_client_id: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            aws: AwsConfig {
                region: "us-east-1".to_string(),
                profile: None,
                max_attempts: 3,
                operation_timeout_secs: 30,
            },
            llm: LlmConfig {
                provider: LlmProvider::OpenAi,
                api_key: None,
                base_url: None,
                model: "gpt-3.5-turbo".to_string(),
                timeout_secs: 60,
                max_retries: 2,
                max_tokens: 1000,
                temperature: 0.7,
            },
            database: DatabaseConfig {
                url: "sqlite://cloudscope.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            audit: AuditConfig { enabled: true, client_id: "default".to_string() },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "anthropic" => Ok(Self::Anthropic),
            "ollama" => Ok(Self::Ollama),
            other => Err(ConfigError::Validation(format!(
                "unsupported llm provider `{other}` (expected openai|anthropic|ollama)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(aws) = patch.aws {
            if let Some(region) = aws.region {
                self.aws.region = region;
            }
            if let Some(profile) = aws.profile {
                self.aws.profile = Some(profile);
            }
            if let Some(max_attempts) = aws.max_attempts {
                self.aws.max_attempts = max_attempts;
            }
            if let Some(operation_timeout_secs) = aws.operation_timeout_secs {
                self.aws.operation_timeout_secs = operation_timeout_secs;
            }
        }

        if let Some(llm) = patch.llm {
            if let Some(provider) = llm.provider {
                self.llm.provider = provider;
            }
            if let Some(llm_api_key_value) = llm.api_key {
                self.llm.api_key = Some(secret_value(llm_api_key_value));
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = Some(base_url);
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
            if let Some(max_retries) = llm.max_retries {
                self.llm.max_retries = max_retries;
            }
            if let Some(max_tokens) = llm.max_tokens {
                self.llm.max_tokens = max_tokens;
            }
            if let Some(temperature) = llm.temperature {
                self.llm.temperature = temperature;
            }
        }

        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(audit) = patch.audit {
            if let Some(enabled) = audit.enabled {
                self.audit.enabled = enabled;
            }
            if let Some(client_id) = audit.client_id {
                self.audit.client_id = client_id;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        let region = read_env("CLOUDSCOPE_AWS_REGION").or_else(|| read_env("AWS_REGION"));
        if let Some(value) = region {
            self.aws.region = value;
        }
        if let Some(value) = read_env("CLOUDSCOPE_AWS_PROFILE") {
            self.aws.profile = Some(value);
        }
        if let Some(value) = read_env("CLOUDSCOPE_AWS_MAX_ATTEMPTS") {
            self.aws.max_attempts = parse_u32("CLOUDSCOPE_AWS_MAX_ATTEMPTS", &value)?;
        }
        if let Some(value) = read_env("CLOUDSCOPE_AWS_OPERATION_TIMEOUT_SECS") {
            self.aws.operation_timeout_secs =
                parse_u64("CLOUDSCOPE_AWS_OPERATION_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("CLOUDSCOPE_LLM_PROVIDER") {
            self.llm.provider = value.parse()?;
        }
        let api_key = read_env("CLOUDSCOPE_LLM_API_KEY").or_else(|| read_env("OPENAI_API_KEY"));
        if let Some(value) = api_key {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("CLOUDSCOPE_LLM_BASE_URL") {
            self.llm.base_url = Some(value);
        }
        if let Some(value) = read_env("CLOUDSCOPE_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("CLOUDSCOPE_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("CLOUDSCOPE_LLM_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("CLOUDSCOPE_LLM_MAX_RETRIES") {
            self.llm.max_retries = parse_u32("CLOUDSCOPE_LLM_MAX_RETRIES", &value)?;
        }
        if let Some(value) = read_env("CLOUDSCOPE_LLM_MAX_TOKENS") {
            self.llm.max_tokens = parse_u32("CLOUDSCOPE_LLM_MAX_TOKENS", &value)?;
        }
        if let Some(value) = read_env("CLOUDSCOPE_LLM_TEMPERATURE") {
            self.llm.temperature = parse_f32("CLOUDSCOPE_LLM_TEMPERATURE", &value)?;
        }

        if let Some(value) = read_env("CLOUDSCOPE_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("CLOUDSCOPE_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_u32("CLOUDSCOPE_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("CLOUDSCOPE_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("CLOUDSCOPE_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("CLOUDSCOPE_AUDIT_ENABLED") {
            self.audit.enabled = parse_bool("CLOUDSCOPE_AUDIT_ENABLED", &value)?;
        }
        if let Some(value) = read_env("CLOUDSCOPE_AUDIT_CLIENT_ID") {
            self.audit.client_id = value;
        }

        let log_level =
            read_env("CLOUDSCOPE_LOGGING_LEVEL").or_else(|| read_env("CLOUDSCOPE_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("CLOUDSCOPE_LOGGING_FORMAT").or_else(|| read_env("CLOUDSCOPE_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(aws_region) = overrides.aws_region {
            self.aws.region = aws_region;
        }
        if let Some(aws_profile) = overrides.aws_profile {
            self.aws.profile = Some(aws_profile);
        }
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(llm_provider) = overrides.llm_provider {
            self.llm.provider = llm_provider;
        }
        if let Some(llm_model) = overrides.llm_model {
            self.llm.model = llm_model;
        }
        if let Some(client_id) = overrides.audit_client_id {
            self.audit.client_id = client_id;
        }
    }

    /// Structural checks only. Backend credentials are checked by
    /// [`LlmConfig::require_credentials`] when a backend client is built, so
    /// inventory-only commands work without them.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_aws(&self.aws)?;
        validate_llm(&self.llm)?;
        validate_database(&self.database)?;
        validate_audit(&self.audit)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

impl LlmConfig {
    pub fn require_credentials(&self) -> Result<(), ConfigError> {
        match self.provider {
            LlmProvider::OpenAi | LlmProvider::Anthropic => {
                let missing = self
                    .api_key
                    .as_ref()
                    .map(|value| value.expose_secret().trim().is_empty())
                    .unwrap_or(true);
                if missing {
                    return Err(ConfigError::Validation(format!(
                        "llm.api_key is required for the {} provider (set CLOUDSCOPE_LLM_API_KEY)",
                        self.provider.as_str()
                    )));
                }
            }
            LlmProvider::Ollama => {
                let missing =
                    self.base_url.as_ref().map(|value| value.trim().is_empty()).unwrap_or(true);
                if missing {
                    return Err(ConfigError::Validation(
                        "llm.base_url is required for ollama provider".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from(DEFAULT_CONFIG_FILE), PathBuf::from("config").join(DEFAULT_CONFIG_FILE)]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_aws(aws: &AwsConfig) -> Result<(), ConfigError> {
    let region = aws.region.trim();
    let well_formed = !region.is_empty()
        && region.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if !well_formed {
        return Err(ConfigError::Validation(format!(
            "aws.region `{}` is not a valid region name (for example `us-east-1`)",
            aws.region
        )));
    }

    if aws.max_attempts == 0 || aws.max_attempts > 10 {
        return Err(ConfigError::Validation("aws.max_attempts must be in range 1..=10".to_string()));
    }

    if aws.operation_timeout_secs == 0 || aws.operation_timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "aws.operation_timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if llm.model.trim().is_empty() {
        return Err(ConfigError::Validation("llm.model must not be empty".to_string()));
    }

    if llm.max_tokens == 0 {
        return Err(ConfigError::Validation(
            "llm.max_tokens must be greater than zero".to_string(),
        ));
    }

    if !(0.0..=2.0).contains(&llm.temperature) {
        return Err(ConfigError::Validation(
            "llm.temperature must be in range 0.0..=2.0".to_string(),
        ));
    }

    if let Some(base_url) = &llm.base_url {
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ConfigError::Validation(
                "llm.base_url must start with http:// or https://".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_audit(audit: &AuditConfig) -> Result<(), ConfigError> {
    if audit.client_id.trim().is_empty() {
        return Err(ConfigError::Validation("audit.client_id must not be empty".to_string()));
    }
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn invalid_override(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() }
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.trim().parse::<u32>().map_err(|_| invalid_override(key, value))
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse::<u64>().map_err(|_| invalid_override(key, value))
}

fn parse_f32(key: &str, value: &str) -> Result<f32, ConfigError> {
    value.trim().parse::<f32>().map_err(|_| invalid_override(key, value))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.trim().parse::<bool>().map_err(|_| invalid_override(key, value))
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    aws: Option<AwsPatch>,
    llm: Option<LlmPatch>,
    database: Option<DatabasePatch>,
    audit: Option<AuditPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct AwsPatch {
    region: Option<String>,
    profile: Option<String>,
    max_attempts: Option<u32>,
    operation_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    provider: Option<LlmProvider>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct AuditPatch {
    enabled: Option<bool>,
    client_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LlmProvider, LoadOptions, LogFormat};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_CLOUDSCOPE_LLM_KEY", "sk-from-env");
        env::set_var("TEST_CLOUDSCOPE_REGION", "sa-east-1");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("cloudscope.toml");
            fs::write(
                &path,
                r#"
[aws]
region = "${TEST_CLOUDSCOPE_REGION}"

[llm]
api_key = "${TEST_CLOUDSCOPE_LLM_KEY}"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.aws.region == "sa-east-1", "region should be interpolated from env")?;
            ensure(
                config.llm.api_key.as_ref().map(|key| key.expose_secret() == "sk-from-env")
                    == Some(true),
                "api key should be interpolated from env",
            )?;
            Ok(())
        })();

        clear_vars(&["TEST_CLOUDSCOPE_LLM_KEY", "TEST_CLOUDSCOPE_REGION"]);
        result
    }

    #[test]
    fn defaults_match_backend_expectations() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let config = AppConfig::load(LoadOptions::default())
            .map_err(|err| format!("config load failed: {err}"))?;

        ensure(config.llm.provider == LlmProvider::OpenAi, "default provider should be openai")?;
        ensure(config.llm.model == "gpt-3.5-turbo", "default model should be gpt-3.5-turbo")?;
        ensure(config.llm.max_tokens == 1000, "default max tokens should be 1000")?;
        ensure((config.llm.temperature - 0.7).abs() < f32::EPSILON, "default temperature 0.7")?;
        ensure(config.aws.max_attempts == 3, "default aws attempts should be 3")?;
        ensure(config.audit.enabled, "audit should be enabled by default")?;
        ensure(config.audit.client_id == "default", "default audit client id")?;
        Ok(())
    }

    #[test]
    fn logging_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("CLOUDSCOPE_LOG_LEVEL", "warn");
        env::set_var("CLOUDSCOPE_LOG_FORMAT", "pretty");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "warn", "warning log level should be set from env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Pretty),
                "pretty logging format should be set from env var",
            )?;
            Ok(())
        })();

        clear_vars(&["CLOUDSCOPE_LOG_LEVEL", "CLOUDSCOPE_LOG_FORMAT"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("CLOUDSCOPE_DATABASE_URL", "sqlite://from-env.db");
        env::set_var("CLOUDSCOPE_AWS_REGION", "eu-west-1");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("cloudscope.toml");
            fs::write(
                &path,
                r#"
[aws]
region = "us-west-2"
max_attempts = 5

[database]
url = "sqlite://from-file.db"

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    database_url: Some("sqlite://from-override.db".to_string()),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.database.url == "sqlite://from-override.db",
                "override database url should win",
            )?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(config.aws.region == "eu-west-1", "env region should win over file")?;
            ensure(config.aws.max_attempts == 5, "file value should win over default")?;
            Ok(())
        })();

        clear_vars(&["CLOUDSCOPE_DATABASE_URL", "CLOUDSCOPE_AWS_REGION"]);
        result
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("CLOUDSCOPE_LLM_TEMPERATURE", "3.5");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("llm.temperature")
            );
            ensure(has_message, "validation failure should mention llm.temperature")
        })();

        clear_vars(&["CLOUDSCOPE_LLM_TEMPERATURE"]);
        result
    }

    #[test]
    fn malformed_numeric_override_is_rejected() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("CLOUDSCOPE_AWS_MAX_ATTEMPTS", "lots");

        let result = (|| -> Result<(), String> {
            let error = AppConfig::load(LoadOptions::default()).err();
            ensure(
                matches!(
                    error,
                    Some(ConfigError::InvalidEnvOverride { ref key, .. })
                        if key == "CLOUDSCOPE_AWS_MAX_ATTEMPTS"
                ),
                "invalid override should name the variable",
            )
        })();

        clear_vars(&["CLOUDSCOPE_AWS_MAX_ATTEMPTS"]);
        result
    }

    #[test]
    fn credentials_are_checked_separately_from_structure() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(&["CLOUDSCOPE_LLM_API_KEY", "OPENAI_API_KEY", "CLOUDSCOPE_LLM_PROVIDER"]);

        let config = AppConfig::load(LoadOptions::default())
            .map_err(|err| format!("config load failed: {err}"))?;
        let error = config.llm.require_credentials().err();
        ensure(
            matches!(error, Some(ConfigError::Validation(ref message)) if message.contains("llm.api_key")),
            "missing api key should be reported when credentials are required",
        )
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("CLOUDSCOPE_LLM_API_KEY", "sk-secret-value");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(!debug.contains("sk-secret-value"), "debug output should not contain api key")?;
            ensure(config.llm.require_credentials().is_ok(), "api key should satisfy credentials")?;
            ensure(
                matches!(config.logging.format, LogFormat::Compact),
                "default logging format should be compact",
            )?;
            Ok(())
        })();

        clear_vars(&["CLOUDSCOPE_LLM_API_KEY"]);
        result
    }
}
