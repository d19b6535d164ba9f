use std::sync::Arc;

use stayledger_core::audit::TracingAuditSink;
use stayledger_core::config::{AppConfig, ConfigError, LoadOptions};
use stayledger_core::errors::DomainError;
use stayledger_db::{
    connect_with_settings, migrations, ConfirmationService, DbPool, LedgerSettings, RuleCatalog,
};
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub confirmation: Arc<ConfirmationService>,
    pub catalog: Arc<RuleCatalog>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("ledger settings invalid: {0}")]
    LedgerSettings(#[source] DomainError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    let settings =
        LedgerSettings::from_config(&config.ledger).map_err(BootstrapError::LedgerSettings)?;

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        ledger_currency = %settings.currency,
        "database migrations applied"
    );

    let audit = Arc::new(TracingAuditSink);
    let confirmation =
        Arc::new(ConfirmationService::new(db_pool.clone(), settings, audit.clone()));
    let catalog = Arc::new(RuleCatalog::new(db_pool.clone(), audit));

    Ok(Application { config, db_pool, confirmation, catalog })
}

#[cfg(test)]
mod tests {
    use stayledger_core::config::{ConfigOverrides, LoadOptions};

    use crate::bootstrap::bootstrap;

    fn memory_options() -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some("sqlite::memory:?cache=shared".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[tokio::test]
    async fn bootstrap_prepares_schema_and_services() {
        let app = bootstrap(memory_options()).await.expect("bootstrap should succeed");

        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN \
             ('pricing_rules', 'fx_rates', 'fx_snapshots', 'settlement_entries', 'pricing_traces')",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("count baseline tables");
        assert_eq!(table_count, 5, "bootstrap should create the settlement-core schema");

        assert_eq!(app.confirmation.ledger_currency().as_str(), "EUR");

        app.db_pool.close().await;
    }

    #[tokio::test]
    async fn bootstrap_rejects_invalid_ledger_currency() {
        let result = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some("sqlite::memory:".to_string()),
                ledger_currency: Some("euros".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .await;

        let message = result.err().expect("invalid currency must fail").to_string();
        assert!(message.contains("ledger.currency"));
    }
}
