use std::env;
use std::sync::{Mutex, OnceLock};

use pricerun_cli::commands::{doctor, migrate, seed};
use serde_json::Value;
use tempfile::TempDir;

#[test]
fn migrate_returns_success_with_valid_env() {
    with_env(&[("PRICERUN_DATABASE_URL", "sqlite::memory:")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 0, "expected successful migrate run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
    });
}

#[test]
fn migrate_returns_config_failure_for_wrong_engine() {
    with_env(&[("PRICERUN_DATABASE_URL", "postgres://wrong-engine")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn seed_returns_deterministic_request_summary() {
    with_env(&[("PRICERUN_DATABASE_URL", "sqlite::memory:")], || {
        let result = seed::run();
        assert_eq!(result.exit_code, 0, "expected deterministic seed success");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "seed");
        assert_eq!(payload["status"], "ok");

        let message = payload["message"].as_str().unwrap_or("");
        assert!(message.contains(
            "  - acme-industrial: req-acme-boiler-001 (Boiler house retrofit, phase 1)"
        ));
        assert!(message.contains(
            "  - borealis-energy: req-borealis-pipeline-001 (Compressor station tie-in)"
        ));
    });
}

#[test]
fn seed_is_idempotent_across_runs() {
    let dir = TempDir::new().expect("temp dir");
    let url = file_db_url(&dir, "seed.db");

    with_env(&[("PRICERUN_DATABASE_URL", url.as_str())], || {
        let first = seed::run();
        assert_eq!(first.exit_code, 0, "expected first seed invocation success");
        let first_payload = parse_payload(&first.output);

        let second = seed::run();
        assert_eq!(second.exit_code, 0, "expected second seed invocation success");
        let second_payload = parse_payload(&second.output);

        assert_eq!(first_payload["message"], second_payload["message"]);
    });
}

#[test]
fn doctor_flags_an_unmigrated_database() {
    with_env(&[("PRICERUN_DATABASE_URL", "sqlite::memory:")], || {
        let output = doctor::run(true);
        let payload: Value = serde_json::from_str(&output).expect("doctor json");

        assert_eq!(payload["overall_status"], "fail");
        let checks = payload["checks"].as_array().expect("checks array");
        assert_eq!(checks.len(), 3);
        let schema = checks
            .iter()
            .find(|check| check["name"] == "schema_readiness")
            .expect("schema check present");
        assert_eq!(schema["status"], "fail");
    });
}

#[test]
fn doctor_passes_against_a_migrated_database() {
    let dir = TempDir::new().expect("temp dir");
    let url = file_db_url(&dir, "doctor.db");

    with_env(&[("PRICERUN_DATABASE_URL", url.as_str())], || {
        let migrated = migrate::run();
        assert_eq!(migrated.exit_code, 0, "migrate should succeed before doctor");

        let output = doctor::run(true);
        let payload: Value = serde_json::from_str(&output).expect("doctor json");

        assert_eq!(payload["overall_status"], "pass");
        assert!(payload["checks"]
            .as_array()
            .expect("checks array")
            .iter()
            .all(|check| check["status"] == "pass"));
    });
}

#[test]
fn doctor_skips_database_checks_when_config_fails() {
    with_env(&[("PRICERUN_DATABASE_URL", "postgres://wrong-engine")], || {
        let output = doctor::run(true);
        let payload: Value = serde_json::from_str(&output).expect("doctor json");

        assert_eq!(payload["overall_status"], "fail");
        let checks = payload["checks"].as_array().expect("checks array");
        assert_eq!(checks[0]["name"], "config_validation");
        assert_eq!(checks[0]["status"], "fail");
        assert!(checks[1..].iter().all(|check| check["status"] == "skipped"));
    });
}

fn file_db_url(dir: &TempDir, file_name: &str) -> String {
    format!("sqlite://{}?mode=rwc", dir.path().join(file_name).display())
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "PRICERUN_DATABASE_URL",
        "PRICERUN_DATABASE_MAX_CONNECTIONS",
        "PRICERUN_DATABASE_TIMEOUT_SECS",
        "PRICERUN_SERVER_BIND_ADDRESS",
        "PRICERUN_SERVER_PORT",
        "PRICERUN_SERVER_GRACEFUL_SHUTDOWN_SECS",
        "PRICERUN_TENANCY_CACHE_TTL_SECS",
        "PRICERUN_TENANCY_CACHE_CAPACITY",
        "PRICERUN_LOGGING_LEVEL",
        "PRICERUN_LOGGING_FORMAT",
        "PRICERUN_LOG_LEVEL",
        "PRICERUN_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
