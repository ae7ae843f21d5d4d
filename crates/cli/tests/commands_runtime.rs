use std::env;
use std::fs;
use std::sync::{Mutex, OnceLock};

use ebert_cli::commands::{config, init};
use serde_json::Value;
use tempfile::TempDir;

#[test]
fn init_creates_schema_without_discord_credentials() {
    let dir = TempDir::new().expect("temp dir");
    let db_path = dir.path().join("ebert.db");
    let url = format!("sqlite://{}", db_path.display());

    with_env(&[("EBERT_DATABASE_URL", &url)], || {
        let result = init::run(None);
        assert_eq!(result.exit_code, 0, "unexpected output: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "init");
        assert_eq!(payload["status"], "ok");
        assert!(db_path.exists(), "sqlite file should be created");

        let again = init::run(None);
        assert_eq!(again.exit_code, 0, "init should be repeatable");
    });
}

#[test]
fn init_resolves_relative_database_path_against_config_file() {
    let dir = TempDir::new().expect("temp dir");
    let config_path = dir.path().join("ebert.toml");
    fs::write(&config_path, "[database]\nurl = \"sqlite://movies.db\"\n").expect("config");

    with_env(&[], || {
        let result = init::run(Some(&config_path));
        assert_eq!(result.exit_code, 0, "unexpected output: {}", result.output);
        assert!(dir.path().join("movies.db").exists());
    });
}

#[test]
fn init_reports_a_missing_explicit_config_file() {
    let dir = TempDir::new().expect("temp dir");
    let missing = dir.path().join("nope.toml");

    with_env(&[], || {
        let result = init::run(Some(&missing));
        assert_eq!(result.exit_code, 2);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn init_rejects_non_sqlite_urls() {
    with_env(&[("EBERT_DATABASE_URL", "postgres://localhost/ebert")], || {
        let result = init::run(None);
        assert_eq!(result.exit_code, 2);
        assert_eq!(parse_payload(&result.output)["error_class"], "config_validation");
    });
}

#[test]
fn config_attributes_sources_and_redacts_secrets() {
    let dir = TempDir::new().expect("temp dir");
    let config_path = dir.path().join("ebert.toml");
    fs::write(
        &config_path,
        "[discord]\ntoken = \"super-secret-bot-token-9876\"\napplication_id = \"42\"\n",
    )
    .expect("config");

    with_env(&[("EBERT_TMDB_API_KEY", "tmdb-secret-key-1234")], || {
        let result = config::run(Some(&config_path));
        assert_eq!(result.exit_code, 0, "unexpected output: {}", result.output);

        let file_source = format!("file ({})", config_path.display());
        assert!(result
            .output
            .contains(&format!("- discord.token = ***9876 (source: {file_source})")));
        assert!(result
            .output
            .contains(&format!("- discord.application_id = 42 (source: {file_source})")));
        assert!(result
            .output
            .contains("- tmdb.api_key = ***1234 (source: env (EBERT_TMDB_API_KEY))"));
        assert!(result.output.contains("- server.port = 8080 (source: default)"));
        assert!(!result.output.contains("super-secret"));
        assert!(!result.output.contains("tmdb-secret"));
    });
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "EBERT_DATABASE_URL",
        "EBERT_DATABASE_MAX_CONNECTIONS",
        "EBERT_DATABASE_TIMEOUT_SECS",
        "EBERT_DISCORD_TOKEN",
        "EBERT_DISCORD_APPLICATION_ID",
        "EBERT_DISCORD_PUBLIC_KEY",
        "EBERT_DISCORD_GUILD_ID",
        "EBERT_TMDB_API_KEY",
        "EBERT_TMDB_BASE_URL",
        "EBERT_TMDB_TIMEOUT_SECS",
        "EBERT_SERVER_BIND_ADDRESS",
        "EBERT_SERVER_PORT",
        "EBERT_SERVER_GRACEFUL_SHUTDOWN_SECS",
        "EBERT_LOGGING_LEVEL",
        "EBERT_LOGGING_FORMAT",
        "EBERT_LOG_LEVEL",
        "EBERT_LOG_FORMAT",
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
