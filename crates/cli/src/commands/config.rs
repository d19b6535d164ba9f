use serde::Serialize;
use stayledger_core::config::{AppConfig, LoadOptions, LogFormat};

#[derive(Debug, Serialize)]
struct EffectiveConfig {
    database: DatabaseView,
    ledger: LedgerView,
    server: ServerView,
    logging: LoggingView,
}

#[derive(Debug, Serialize)]
struct DatabaseView {
    url: String,
    max_connections: u32,
    timeout_secs: u64,
}

#[derive(Debug, Serialize)]
struct LedgerView {
    currency: String,
    default_markup_percent: String,
}

#[derive(Debug, Serialize)]
struct ServerView {
    bind_address: String,
    api_port: u16,
    health_check_port: u16,
    graceful_shutdown_secs: u64,
}

#[derive(Debug, Serialize)]
struct LoggingView {
    level: String,
    format: &'static str,
}

pub fn run() -> String {
    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            let view = EffectiveConfig {
                database: DatabaseView {
                    url: config.database.url,
                    max_connections: config.database.max_connections,
                    timeout_secs: config.database.timeout_secs,
                },
                ledger: LedgerView {
                    currency: config.ledger.currency,
                    default_markup_percent: config.ledger.default_markup_percent.to_string(),
                },
                server: ServerView {
                    bind_address: config.server.bind_address,
                    api_port: config.server.api_port,
                    health_check_port: config.server.health_check_port,
                    graceful_shutdown_secs: config.server.graceful_shutdown_secs,
                },
                logging: LoggingView {
                    level: config.logging.level,
                    format: match config.logging.format {
                        LogFormat::Compact => "compact",
                        LogFormat::Pretty => "pretty",
                        LogFormat::Json => "json",
                    },
                },
            };
            serde_json::to_string_pretty(&view)
                .unwrap_or_else(|error| format!("config serialization failed: {error}"))
        }
        Err(error) => format!("configuration issue: {error}"),
    }
}
