use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;

/// Effective process configuration, loaded once at startup and treated as
/// immutable for the process lifetime. Components receive the sections they
/// need by reference; nothing reads the environment after load.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub twilio: TwilioConfig,
    pub llm: LlmConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct TwilioConfig {
    pub account_sid: String,
    pub auth_token: SecretString,
    /// Outbound sender address, e.g. `whatsapp:+14155238886`.
    pub sender_address: String,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub api_key: SecretString,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

/// Programmatic overrides, applied last (after file and environment).
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub twilio_account_sid: Option<String>,
    pub twilio_auth_token: Option<String>,
    pub twilio_sender_address: Option<String>,
    pub llm_api_key: Option<String>,
    pub llm_base_url: Option<String>,
    pub llm_model: Option<String>,
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
            database: DatabaseConfig {
                url: "sqlite://selma.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            twilio: TwilioConfig {
                account_sid: String::new(),
                auth_token: String::new().into(),
                sender_address: String::new(),
            },
            llm: LlmConfig {
                api_key: String::new().into(),
                base_url: "https://api.openai.com/v1".to_string(),
                model: "gpt-3.5-turbo".to_string(),
                max_tokens: 500,
                temperature: 0.7,
                timeout_secs: 30,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 5000,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
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
    /// Loads defaults, then the config file (if any), then `SELMA_*`
    /// environment variables, then programmatic overrides, and validates the
    /// result. Any failure here must keep the process from starting.
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("selma.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
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

        if let Some(twilio) = patch.twilio {
            if let Some(account_sid) = twilio.account_sid {
                self.twilio.account_sid = account_sid;
            }
            if let Some(auth_token) = twilio.auth_token {
                self.twilio.auth_token = auth_token.into();
            }
            if let Some(sender_address) = twilio.sender_address {
                self.twilio.sender_address = sender_address;
            }
        }

        if let Some(llm) = patch.llm {
            if let Some(api_key) = llm.api_key {
                self.llm.api_key = api_key.into();
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = base_url;
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(max_tokens) = llm.max_tokens {
                self.llm.max_tokens = max_tokens;
            }
            if let Some(temperature) = llm.temperature {
                self.llm.temperature = temperature;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
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
        if let Some(value) = read_env("SELMA_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("SELMA_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_u32("SELMA_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("SELMA_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("SELMA_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("SELMA_TWILIO_ACCOUNT_SID") {
            self.twilio.account_sid = value;
        }
        if let Some(value) = read_env("SELMA_TWILIO_AUTH_TOKEN") {
            self.twilio.auth_token = value.into();
        }
        if let Some(value) = read_env("SELMA_TWILIO_SENDER_ADDRESS") {
            self.twilio.sender_address = value;
        }

        if let Some(value) = read_env("SELMA_LLM_API_KEY") {
            self.llm.api_key = value.into();
        }
        if let Some(value) = read_env("SELMA_LLM_BASE_URL") {
            self.llm.base_url = value;
        }
        if let Some(value) = read_env("SELMA_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("SELMA_LLM_MAX_TOKENS") {
            self.llm.max_tokens = parse_u32("SELMA_LLM_MAX_TOKENS", &value)?;
        }
        if let Some(value) = read_env("SELMA_LLM_TEMPERATURE") {
            self.llm.temperature = parse_f32("SELMA_LLM_TEMPERATURE", &value)?;
        }
        if let Some(value) = read_env("SELMA_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("SELMA_LLM_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("SELMA_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("SELMA_SERVER_PORT") {
            self.server.port = parse_u16("SELMA_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("SELMA_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("SELMA_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level = read_env("SELMA_LOGGING_LEVEL").or_else(|| read_env("SELMA_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format = read_env("SELMA_LOGGING_FORMAT").or_else(|| read_env("SELMA_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(account_sid) = overrides.twilio_account_sid {
            self.twilio.account_sid = account_sid;
        }
        if let Some(auth_token) = overrides.twilio_auth_token {
            self.twilio.auth_token = auth_token.into();
        }
        if let Some(sender_address) = overrides.twilio_sender_address {
            self.twilio.sender_address = sender_address;
        }
        if let Some(api_key) = overrides.llm_api_key {
            self.llm.api_key = api_key.into();
        }
        if let Some(base_url) = overrides.llm_base_url {
            self.llm.base_url = base_url;
        }
        if let Some(model) = overrides.llm_model {
            self.llm.model = model;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_twilio(&self.twilio)?;
        validate_llm(&self.llm)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("selma.toml"), PathBuf::from("config/selma.toml")]
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

fn validate_twilio(twilio: &TwilioConfig) -> Result<(), ConfigError> {
    if twilio.account_sid.is_empty() {
        return Err(ConfigError::Validation(
            "twilio.account_sid is required. Find it on the Twilio console dashboard".to_string(),
        ));
    }
    if !twilio.account_sid.starts_with("AC") {
        return Err(ConfigError::Validation(
            "twilio.account_sid must start with `AC` (the console's Account SID, not an API key)"
                .to_string(),
        ));
    }

    if twilio.auth_token.expose_secret().is_empty() {
        return Err(ConfigError::Validation(
            "twilio.auth_token is required. Find it on the Twilio console dashboard".to_string(),
        ));
    }

    if twilio.sender_address.is_empty() {
        return Err(ConfigError::Validation(
            "twilio.sender_address is required, e.g. `whatsapp:+14155238886`".to_string(),
        ));
    }
    if !twilio.sender_address.starts_with("whatsapp:") {
        return Err(ConfigError::Validation(
            "twilio.sender_address must use the `whatsapp:` prefix".to_string(),
        ));
    }

    Ok(())
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.api_key.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation("llm.api_key is required".to_string()));
    }

    if !llm.base_url.starts_with("http://") && !llm.base_url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "llm.base_url must start with http:// or https://".to_string(),
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

    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.bind_address.trim().is_empty() {
        return Err(ConfigError::Validation(
            "server.bind_address must not be empty".to_string(),
        ));
    }

    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
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

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_f32(key: &str, value: &str) -> Result<f32, ConfigError> {
    value.parse::<f32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    twilio: Option<TwilioPatch>,
    llm: Option<LlmPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct TwilioPatch {
    account_sid: Option<String>,
    auth_token: Option<String>,
    sender_address: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
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

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    const REQUIRED_VARS: &[(&str, &str)] = &[
        ("SELMA_TWILIO_ACCOUNT_SID", "ACtest0000000000000000000000000000"),
        ("SELMA_TWILIO_AUTH_TOKEN", "token-test"),
        ("SELMA_TWILIO_SENDER_ADDRESS", "whatsapp:+14155238886"),
        ("SELMA_LLM_API_KEY", "sk-test"),
    ];

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn set_required_vars() {
        for (key, value) in REQUIRED_VARS {
            env::set_var(key, value);
        }
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn clear_required_vars() {
        for (key, _) in REQUIRED_VARS {
            env::remove_var(key);
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
        set_required_vars();

        env::set_var("TEST_TWILIO_TOKEN", "token-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("selma.toml");
            fs::write(
                &path,
                r#"
[twilio]
auth_token = "${TEST_TWILIO_TOKEN}"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            // SELMA_TWILIO_AUTH_TOKEN still wins over the file layer; drop it
            // to observe the interpolated file value.
            ensure(
                config.twilio.auth_token.expose_secret() == "token-test",
                "env auth token should win over file",
            )?;

            env::remove_var("SELMA_TWILIO_AUTH_TOKEN");
            let config = AppConfig::load(LoadOptions {
                config_path: Some(dir.path().join("selma.toml")),
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;
            ensure(
                config.twilio.auth_token.expose_secret() == "token-from-env",
                "auth token should be interpolated from environment",
            )?;
            Ok(())
        })();

        clear_vars(&["TEST_TWILIO_TOKEN"]);
        clear_required_vars();
        result
    }

    #[test]
    fn logging_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        set_required_vars();

        env::set_var("SELMA_LOG_LEVEL", "warn");
        env::set_var("SELMA_LOG_FORMAT", "pretty");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "warn", "warn log level should be set from env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Pretty),
                "pretty logging format should be set from env var",
            )?;
            Ok(())
        })();

        clear_vars(&["SELMA_LOG_LEVEL", "SELMA_LOG_FORMAT"]);
        clear_required_vars();
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        set_required_vars();

        env::set_var("SELMA_DATABASE_URL", "sqlite://from-env.db");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("selma.toml");
            fs::write(
                &path,
                r#"
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
            Ok(())
        })();

        clear_vars(&["SELMA_DATABASE_URL"]);
        clear_required_vars();
        result
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        set_required_vars();

        env::set_var("SELMA_TWILIO_ACCOUNT_SID", "not-a-sid");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("twilio.account_sid")
            );
            ensure(has_message, "validation failure should mention twilio.account_sid")
        })();

        clear_required_vars();
        result
    }

    #[test]
    fn missing_credentials_keep_process_from_starting() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_required_vars();

        let error = match AppConfig::load(LoadOptions::default()) {
            Ok(_) => return Err("expected failure without credentials".to_string()),
            Err(error) => error,
        };
        ensure(
            matches!(error, ConfigError::Validation(_)),
            "missing credentials should fail validation",
        )
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        set_required_vars();

        env::set_var("SELMA_TWILIO_AUTH_TOKEN", "twilio-secret-value");
        env::set_var("SELMA_LLM_API_KEY", "sk-secret-value");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(
                !debug.contains("twilio-secret-value"),
                "debug output should not contain the auth token",
            )?;
            ensure(
                !debug.contains("sk-secret-value"),
                "debug output should not contain the api key",
            )?;
            Ok(())
        })();

        clear_required_vars();
        result
    }
}
