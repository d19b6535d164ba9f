use crate::commands::CommandResult;
use stayledger_core::config::{AppConfig, LoadOptions};
use stayledger_db::{connect_with_settings, migrations, SeedDataset, SEED_TENANT_ID};

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "seed",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "seed",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let result = runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;

        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;

        let seeded = SeedDataset::apply(&pool)
            .await
            .map_err(|error| ("seed_execution", error.to_string(), 5u8))?;

        let verification = SeedDataset::verify(&pool)
            .await
            .map_err(|error| ("seed_verification", error.to_string(), 6u8))?;

        let run_result = if verification.complete {
            Ok(seeded)
        } else {
            Err((
                "seed_verification",
                format!(
                    "fixtures incomplete for tenant {SEED_TENANT_ID}: {} rules, {} fx rates present",
                    verification.rules_present, verification.fx_rates_present
                ),
                6u8,
            ))
        };

        pool.close().await;
        run_result
    });

    match result {
        Ok(seeded) => CommandResult::success(
            "seed",
            format!(
                "fixtures ready for tenant {SEED_TENANT_ID}: {} new pricing rules, {} new fx rates",
                seeded.rules_seeded, seeded.fx_rates_seeded
            ),
        ),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("seed", error_class, message, exit_code)
        }
    }
}
