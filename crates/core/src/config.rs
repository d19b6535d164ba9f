use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub ledger: LedgerConfig,
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
pub struct LedgerConfig {
    /// Standardized accounting currency every settlement entry is
    /// denominated in, regardless of sale currency.
    pub currency: String,
    /// Built-in markup applied when no pricing rule matches.
    pub default_markup_percent: Decimal,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub api_port: u16,
    pub health_check_port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

impl FromStr for LogFormat {
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

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub ledger_currency: Option<String>,
    pub default_markup_percent: Option<Decimal>,
    pub log_level: Option<String>,
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
                url: "sqlite://stayledger.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            ledger: LedgerConfig {
                currency: "EUR".to_string(),
                default_markup_percent: Decimal::new(10, 0),
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                api_port: 8090,
                health_check_port: 8091,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    ledger: Option<LedgerPatch>,
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
struct LedgerPatch {
    currency: Option<String>,
    default_markup_percent: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    api_port: Option<u16>,
    health_check_port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch)?;
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("stayledger.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) -> Result<(), ConfigError> {
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

        if let Some(ledger) = patch.ledger {
            if let Some(currency) = ledger.currency {
                self.ledger.currency = currency;
            }
            if let Some(markup) = ledger.default_markup_percent {
                self.ledger.default_markup_percent =
                    parse_decimal("ledger.default_markup_percent", &markup)?;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(api_port) = server.api_port {
                self.server.api_port = api_port;
            }
            if let Some(health_check_port) = server.health_check_port {
                self.server.health_check_port = health_check_port;
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

        Ok(())
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("STAYLEDGER_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("STAYLEDGER_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_u32("STAYLEDGER_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("STAYLEDGER_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("STAYLEDGER_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("STAYLEDGER_LEDGER_CURRENCY") {
            self.ledger.currency = value;
        }
        if let Some(value) = read_env("STAYLEDGER_LEDGER_DEFAULT_MARKUP_PERCENT") {
            self.ledger.default_markup_percent =
                Decimal::from_str(value.trim()).map_err(|_| ConfigError::InvalidEnvOverride {
                    key: "STAYLEDGER_LEDGER_DEFAULT_MARKUP_PERCENT".to_string(),
                    value,
                })?;
        }

        if let Some(value) = read_env("STAYLEDGER_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("STAYLEDGER_SERVER_API_PORT") {
            self.server.api_port = parse_u16("STAYLEDGER_SERVER_API_PORT", &value)?;
        }
        if let Some(value) = read_env("STAYLEDGER_SERVER_HEALTH_CHECK_PORT") {
            self.server.health_check_port =
                parse_u16("STAYLEDGER_SERVER_HEALTH_CHECK_PORT", &value)?;
        }
        if let Some(value) = read_env("STAYLEDGER_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("STAYLEDGER_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level =
            read_env("STAYLEDGER_LOGGING_LEVEL").or_else(|| read_env("STAYLEDGER_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("STAYLEDGER_LOGGING_FORMAT").or_else(|| read_env("STAYLEDGER_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(ledger_currency) = overrides.ledger_currency {
            self.ledger.currency = ledger_currency;
        }
        if let Some(default_markup_percent) = overrides.default_markup_percent {
            self.ledger.default_markup_percent = default_markup_percent;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_ledger(&self.ledger)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("stayledger.toml"), PathBuf::from("config/stayledger.toml")]
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

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_decimal(key: &str, value: &str) -> Result<Decimal, ConfigError> {
    Decimal::from_str(value.trim()).map_err(|_| {
        ConfigError::Validation(format!("{key} `{value}` is not a valid decimal number"))
    })
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

fn validate_ledger(ledger: &LedgerConfig) -> Result<(), ConfigError> {
    let currency = ledger.currency.trim();
    if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_uppercase()) {
        return Err(ConfigError::Validation(format!(
            "ledger.currency `{currency}` must be a three-letter uppercase code"
        )));
    }

    if ledger.default_markup_percent < Decimal::ZERO
        || ledger.default_markup_percent > Decimal::new(1000, 0)
    {
        return Err(ConfigError::Validation(format!(
            "ledger.default_markup_percent `{}` must be within 0..=1000",
            ledger.default_markup_percent
        )));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.bind_address.trim().is_empty() {
        return Err(ConfigError::Validation("server.bind_address must not be empty".to_string()));
    }

    if server.api_port == 0 || server.health_check_port == 0 {
        return Err(ConfigError::Validation(
            "server ports must be greater than zero".to_string(),
        ));
    }

    if server.api_port == server.health_check_port {
        return Err(ConfigError::Validation(
            "server.api_port and server.health_check_port must differ".to_string(),
        ));
    }

    if server.graceful_shutdown_secs > 120 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be at most 120".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    const LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];
    let level = logging.level.trim().to_ascii_lowercase();
    if !LEVELS.contains(&level.as_str()) {
        return Err(ConfigError::Validation(format!(
            "logging.level `{}` must be one of trace|debug|info|warn|error",
            logging.level
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use rust_decimal::Decimal;

    use super::{AppConfig, ConfigOverrides, LoadOptions, LogFormat};

    fn load_with_file(contents: &str) -> Result<AppConfig, super::ConfigError> {
        let mut file = tempfile::NamedTempFile::new().expect("create temp config");
        file.write_all(contents.as_bytes()).expect("write temp config");
        AppConfig::load(LoadOptions {
            config_path: Some(file.path().to_path_buf()),
            require_file: true,
            overrides: ConfigOverrides::default(),
        })
    }

    #[test]
    fn defaults_validate() {
        AppConfig::default().validate().expect("defaults should be valid");
    }

    #[test]
    fn file_patch_overlays_defaults() {
        let config = load_with_file(
            r#"
            [ledger]
            currency = "USD"
            default_markup_percent = "12.5"

            [logging]
            level = "debug"
            format = "json"
            "#,
        )
        .expect("load config");

        assert_eq!(config.ledger.currency, "USD");
        assert_eq!(config.ledger.default_markup_percent, Decimal::new(125, 1));
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.database.max_connections, 5, "unpatched sections keep defaults");
    }

    #[test]
    fn missing_required_file_is_an_error() {
        let result = AppConfig::load(LoadOptions {
            config_path: Some("does-not-exist.toml".into()),
            require_file: true,
            overrides: ConfigOverrides::default(),
        });
        assert!(matches!(result, Err(super::ConfigError::MissingConfigFile(_))));
    }

    #[test]
    fn invalid_ledger_currency_fails_validation() {
        let result = load_with_file(
            r#"
            [ledger]
            currency = "euros"
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn out_of_range_markup_fails_validation() {
        let result = load_with_file(
            r#"
            [ledger]
            default_markup_percent = "-5"
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn programmatic_overrides_take_precedence_over_file() {
        let mut file = tempfile::NamedTempFile::new().expect("create temp config");
        file.write_all(b"[database]\nurl = \"sqlite://from-file.db\"\n")
            .expect("write temp config");

        let config = AppConfig::load(LoadOptions {
            config_path: Some(file.path().to_path_buf()),
            require_file: true,
            overrides: ConfigOverrides {
                database_url: Some("sqlite::memory:".to_string()),
                ..ConfigOverrides::default()
            },
        })
        .expect("load config");

        assert_eq!(config.database.url, "sqlite::memory:");
    }

    #[test]
    fn colliding_server_ports_fail_validation() {
        let result = load_with_file(
            r#"
            [server]
            api_port = 9000
            health_check_port = 9000
            "#,
        );
        assert!(result.is_err());
    }
}
