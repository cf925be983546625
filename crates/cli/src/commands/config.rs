use serde::Serialize;

use haggle_core::config::{AppConfig, LoadOptions, LogFormat};

use crate::commands::CommandResult;

#[derive(Debug, Serialize)]
struct EffectiveConfig {
    database_url: String,
    database_max_connections: u32,
    database_timeout_secs: u64,
    server_bind_address: String,
    server_api_port: u16,
    server_health_check_port: u16,
    logging_level: String,
    logging_format: &'static str,
}

pub fn run() -> CommandResult {
    run_with_options(LoadOptions::default())
}

pub fn run_with_options(options: LoadOptions) -> CommandResult {
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "config",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let effective = EffectiveConfig {
        database_url: config.database.url.clone(),
        database_max_connections: config.database.max_connections,
        database_timeout_secs: config.database.timeout_secs,
        server_bind_address: config.server.bind_address.clone(),
        server_api_port: config.server.api_port,
        server_health_check_port: config.server.health_check_port,
        logging_level: config.logging.level.clone(),
        logging_format: match config.logging.format {
            LogFormat::Compact => "compact",
            LogFormat::Pretty => "pretty",
            LogFormat::Json => "json",
        },
    };

    match serde_json::to_string_pretty(&effective) {
        Ok(output) => CommandResult { exit_code: 0, output },
        Err(error) => CommandResult::failure("config", "serialization", error.to_string(), 3),
    }
}
