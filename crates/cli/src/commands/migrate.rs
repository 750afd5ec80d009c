use crate::commands::{exit, load_config, runtime, CommandResult};
use quotedesk_core::config::LoadOptions;
use quotedesk_db::{connect_with_settings, migrations};

pub fn run(options: LoadOptions) -> CommandResult {
    let config = match load_config("migrate", options) {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match runtime("migrate") {
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
        pool.close().await;
        Ok::<(), (&'static str, String, u8)>(())
    });

    match result {
        Ok(()) => CommandResult::success("migrate", "applied pending catalog migrations"),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("migrate", error_class, message, exit_code)
        }
    }
}
