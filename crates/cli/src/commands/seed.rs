use crate::commands::{exit, load_config, runtime, CommandResult};
use quotedesk_core::config::LoadOptions;
use quotedesk_db::{connect_with_settings, migrations, DemoCatalog};

pub fn run(options: LoadOptions) -> CommandResult {
    let config = match load_config("seed", options) {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match runtime("seed") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = connect_with_settings(
            &config.catalog.database_url,
            config.catalog.max_connections,
            config.catalog.timeout_secs,
        )
        .await
        .map_err(|error| ("db_connectivity", error.to_string(), exit::CATALOG))?;

        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), exit::EXECUTION))?;

        let seeded = DemoCatalog::load(&pool)
            .await
            .map_err(|error| ("seed_execution", error.to_string(), exit::EXECUTION))?;

        let verification = DemoCatalog::verify(&pool)
            .await
            .map_err(|error| ("seed_verification", error.to_string(), exit::VERIFICATION))?;

        pool.close().await;

        let outcome: Result<_, (&'static str, String, u8)> = if verification.all_present {
            Ok(seeded)
        } else {
            let message = verification_failure_message(&verification.checks);
            Err(("seed_verification", message, exit::VERIFICATION))
        };
        outcome
    });

    match result {
        Ok(seeded) => CommandResult::success(
            "seed",
            format!(
                "demo catalog loaded: {} products, {} discount tiers",
                seeded.products_seeded, seeded.discounts_seeded
            ),
        ),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("seed", error_class, message, exit_code)
        }
    }
}

fn verification_failure_message(checks: &[(&str, bool)]) -> String {
    let failed_checks =
        checks.iter().filter_map(|(check, passed)| (!passed).then_some(*check)).collect::<Vec<_>>();
    if failed_checks.is_empty() {
        "Some seed data failed to load".to_string()
    } else {
        format!("Seed verification failed for rows: {}", failed_checks.join(", "))
    }
}
