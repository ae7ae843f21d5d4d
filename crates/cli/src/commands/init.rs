use std::path::Path;

use crate::commands::{CommandResult, Failure};
use ebert_core::config::{AppConfig, LoadOptions, ValidationScope};
use ebert_db::{connect_with_settings, migrations};

const COMMAND: &str = "init";

/// Creates the database file when missing and applies pending migrations.
/// Only the `[database]` and `[logging]` sections need to be valid.
pub fn run(config_path: Option<&Path>) -> CommandResult {
    let options = LoadOptions {
        config_path: config_path.map(Path::to_path_buf),
        require_file: config_path.is_some(),
        scope: ValidationScope::DatabaseOnly,
        ..LoadOptions::default()
    };
    CommandResult::status(COMMAND, prepare(options))
}

fn prepare(options: LoadOptions) -> Result<String, (Failure, String)> {
    let config = AppConfig::load(options)
        .map_err(|error| (Failure::ConfigValidation, format!("configuration issue: {error}")))?;

    let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(
        |error| (Failure::RuntimeInit, format!("failed to initialize async runtime: {error}")),
    )?;

    runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| (Failure::DbConnectivity, error.to_string()))?;
        migrations::run_pending(&pool)
            .await
            .map_err(|error| (Failure::Migration, error.to_string()))?;
        pool.close().await;
        Ok(format!("database ready at {}", config.database.url))
    })
}
