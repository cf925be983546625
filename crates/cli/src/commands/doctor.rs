use serde::Serialize;

use haggle_core::config::{AppConfig, LoadOptions};
use haggle_db::connect_with_settings;

use crate::commands::{block_on, CommandResult};

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: &'static str,
    detail: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    command: &'static str,
    status: &'static str,
    checks: Vec<DoctorCheck>,
}

pub fn run(json: bool) -> CommandResult {
    run_with_options(LoadOptions::default(), json)
}

pub fn run_with_options(options: LoadOptions, json: bool) -> CommandResult {
    let mut checks = Vec::new();

    let config = match AppConfig::load(options) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config",
                status: "ok",
                detail: format!("database.url = {}", config.database.url),
            });
            Some(config)
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config",
                status: "error",
                detail: error.to_string(),
            });
            None
        }
    };

    if let Some(config) = &config {
        let database_check = match block_on("doctor", async {
            let pool = connect_with_settings(
                &config.database.url,
                config.database.max_connections,
                config.database.timeout_secs,
            )
            .await?;
            let probe = sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(&pool).await;
            pool.close().await;
            probe.map(|_| ())
        }) {
            Ok(Ok(())) => DoctorCheck {
                name: "database",
                status: "ok",
                detail: "connection and probe query succeeded".to_string(),
            },
            Ok(Err(error)) => DoctorCheck {
                name: "database",
                status: "error",
                detail: error.to_string(),
            },
            Err(failure) => return failure,
        };
        checks.push(database_check);
    }

    let healthy = checks.iter().all(|check| check.status == "ok");
    let report = DoctorReport {
        command: "doctor",
        status: if healthy { "ok" } else { "error" },
        checks,
    };

    let output = if json {
        serde_json::to_string(&report).unwrap_or_else(|error| error.to_string())
    } else {
        let mut lines = vec![format!("doctor: {}", report.status)];
        for check in &report.checks {
            lines.push(format!("  {:<10} {:<6} {}", check.name, check.status, check.detail));
        }
        lines.join("\n")
    };

    CommandResult { exit_code: if healthy { 0 } else { 4 }, output }
}
