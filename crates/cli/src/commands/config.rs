use std::env;
use std::fs;
use std::path::Path;

use ebert_core::config::{resolve_config_path, AppConfig, LoadOptions, ValidationScope};
use secrecy::{ExposeSecret, SecretString};
use toml::Value;

use crate::commands::{CommandResult, Failure};

/// Lists every effective setting with the layer it came from. Secrets are
/// reduced to their last four characters.
pub fn run(config_path: Option<&Path>) -> CommandResult {
    let options = LoadOptions {
        config_path: config_path.map(Path::to_path_buf),
        require_file: config_path.is_some(),
        scope: ValidationScope::DatabaseOnly,
        ..LoadOptions::default()
    };
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::text_failure(
                Failure::ConfigValidation,
                format!("config validation failed: {error}"),
            );
        }
    };

    let file_path = resolve_config_path(config_path);
    let file_doc = file_path.as_deref().and_then(load_config_file_doc);
    let source = |key: &str, env_key: &str| {
        field_source(key, env_key, file_doc.as_ref(), file_path.as_deref())
    };

    let settings: Vec<(&str, String, &str)> = vec![
        ("database.url", config.database.url.clone(), "EBERT_DATABASE_URL"),
        (
            "database.max_connections",
            config.database.max_connections.to_string(),
            "EBERT_DATABASE_MAX_CONNECTIONS",
        ),
        (
            "database.timeout_secs",
            config.database.timeout_secs.to_string(),
            "EBERT_DATABASE_TIMEOUT_SECS",
        ),
        ("discord.token", redact_secret(&config.discord.token), "EBERT_DISCORD_TOKEN"),
        (
            "discord.application_id",
            or_unset(&config.discord.application_id),
            "EBERT_DISCORD_APPLICATION_ID",
        ),
        ("discord.public_key", or_unset(&config.discord.public_key), "EBERT_DISCORD_PUBLIC_KEY"),
        (
            "discord.guild_id",
            or_unset(config.discord.guild_id.as_deref().unwrap_or_default()),
            "EBERT_DISCORD_GUILD_ID",
        ),
        ("tmdb.api_key", redact_secret(&config.tmdb.api_key), "EBERT_TMDB_API_KEY"),
        ("tmdb.base_url", config.tmdb.base_url.clone(), "EBERT_TMDB_BASE_URL"),
        ("tmdb.timeout_secs", config.tmdb.timeout_secs.to_string(), "EBERT_TMDB_TIMEOUT_SECS"),
        ("server.bind_address", config.server.bind_address.clone(), "EBERT_SERVER_BIND_ADDRESS"),
        ("server.port", config.server.port.to_string(), "EBERT_SERVER_PORT"),
        (
            "server.graceful_shutdown_secs",
            config.server.graceful_shutdown_secs.to_string(),
            "EBERT_SERVER_GRACEFUL_SHUTDOWN_SECS",
        ),
        ("logging.level", config.logging.level.clone(), "EBERT_LOGGING_LEVEL"),
        ("logging.format", format!("{:?}", config.logging.format), "EBERT_LOGGING_FORMAT"),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    lines.extend(
        settings
            .into_iter()
            .map(|(key, value, env_key)| render_line(key, &value, source(key, env_key))),
    );

    CommandResult::text(lines.join("\n"))
}

fn load_config_file_doc(path: &Path) -> Option<Value> {
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: &str,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if env::var_os(env_key).is_some() {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn or_unset(value: &str) -> String {
    if value.trim().is_empty() {
        "<unset>".to_string()
    } else {
        value.to_string()
    }
}

fn redact_secret(secret: &SecretString) -> String {
    let trimmed = secret.expose_secret().trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    let chars: Vec<char> = trimmed.chars().collect();
    if chars.len() <= 8 {
        return "<redacted>".to_string();
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("***{tail}")
}
