mod api;
mod bootstrap;
mod health;

use anyhow::Result;
use stayledger_core::config::{AppConfig, LoadOptions};
use tracing::info;

fn init_logging(config: &AppConfig) {
    use stayledger_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Load config and initialize logging before any other operations
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;

    health::spawn(
        &app.config.server.bind_address,
        app.config.server.health_check_port,
        app.db_pool.clone(),
    )
    .await?;

    let state =
        api::AppState { confirmation: app.confirmation.clone(), catalog: app.catalog.clone() };
    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.api_port);
    let listener = tokio::net::TcpListener::bind(&address).await?;

    info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        bind_address = %address,
        ledger_currency = %app.confirmation.ledger_currency(),
        "settlement api listening"
    );

    axum::serve(listener, api::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        return;
    }
    info!(
        event_name = "system.server.shutdown",
        correlation_id = "shutdown",
        "shutdown signal received, draining in-flight requests"
    );
}
