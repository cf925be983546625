//! End-to-end checks for the operator commands against an in-memory database.

use haggle_core::config::{ConfigOverrides, LoadOptions};
use haggle_cli::commands::{config, doctor, migrate, seed};

fn memory_options() -> LoadOptions {
    LoadOptions {
        overrides: ConfigOverrides {
            database_url: Some("sqlite::memory:".to_string()),
            ..ConfigOverrides::default()
        },
        ..LoadOptions::default()
    }
}

#[test]
fn migrate_succeeds_against_an_in_memory_database() {
    let result = migrate::run_with_options(memory_options());

    assert_eq!(result.exit_code, 0, "output: {}", result.output);
    assert!(result.output.contains("\"status\":\"ok\""));
    assert!(result.output.contains("applied pending migrations"));
}

#[test]
fn seed_reports_the_fixture_counts() {
    let result = seed::run_with_options(memory_options());

    assert_eq!(result.exit_code, 0, "output: {}", result.output);
    assert!(result.output.contains("2 conversations"));
}

#[test]
fn doctor_passes_config_and_database_checks() {
    let result = doctor::run_with_options(memory_options(), true);

    assert_eq!(result.exit_code, 0, "output: {}", result.output);
    assert!(result.output.contains("\"status\":\"ok\""));
    assert!(result.output.contains("\"database\""));
}

#[test]
fn config_prints_effective_values() {
    let result = config::run_with_options(memory_options());

    assert_eq!(result.exit_code, 0, "output: {}", result.output);
    assert!(result.output.contains("\"database_url\": \"sqlite::memory:\""));
}
