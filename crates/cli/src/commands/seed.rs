use haggle_core::config::{AppConfig, LoadOptions};
use haggle_db::{connect_with_settings, migrations, seed_demo};

use crate::commands::{block_on, CommandResult};

pub fn run() -> CommandResult {
    run_with_options(LoadOptions::default())
}

pub fn run_with_options(options: LoadOptions) -> CommandResult {
    let config = match AppConfig::load(options) {
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

    let result = match block_on("seed", async {
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
        let summary =
            seed_demo(&pool).await.map_err(|error| ("seed", error.to_string(), 6u8))?;
        pool.close().await;
        Ok::<_, (&'static str, String, u8)>(summary)
    }) {
        Ok(outcome) => outcome,
        Err(failure) => return failure,
    };

    match result {
        Ok(summary) => CommandResult::success(
            "seed",
            format!(
                "seeded {} products, {} variants, {} services, {} packages, {} conversations",
                summary.products,
                summary.variants,
                summary.services,
                summary.packages,
                summary.conversations
            ),
        ),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("seed", error_class, message, exit_code)
        }
    }
}
