use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use ebert_core::catalog::CatalogError;
use ebert_core::config::AppConfig;
use ebert_core::domain::chat::GuildId;
use ebert_db::{connect_with_settings, migrations, DbPool, SqlPollStore};
use ebert_discord::{
    ChatPlatform, CommandRouter, DiscordRestClient, InteractionDispatcher, PlatformError,
    SignatureError, SignatureVerifier,
};
use ebert_tmdb::TmdbClient;
use thiserror::Error;
use tracing::{info, warn};

use crate::health;
use crate::interactions::{self, InteractionState};
use crate::service::MovieNightService;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub dispatcher: InteractionDispatcher<MovieNightService>,
    pub verifier: Arc<SignatureVerifier>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("catalog client could not be built: {0}")]
    Catalog(#[source] CatalogError),
    #[error("discord client could not be built: {0}")]
    Discord(#[source] PlatformError),
    #[error("discord.public_key is unusable: {0}")]
    PublicKey(#[source] SignatureError),
}

impl Application {
    pub fn router(&self) -> Router {
        interactions::router(InteractionState {
            dispatcher: self.dispatcher.clone(),
            verifier: Arc::clone(&self.verifier),
        })
        .merge(health::router(self.db_pool.clone()))
    }

    /// Waits up to `graceful_shutdown_secs` for spawned follow-ups to finish.
    pub async fn drain(&self) {
        let limit = Duration::from_secs(self.config.server.graceful_shutdown_secs);
        if tokio::time::timeout(limit, self.dispatcher.drain()).await.is_err() {
            warn!(
                event_name = "system.shutdown.drain_timeout",
                correlation_id = "shutdown",
                "follow-ups were still running at shutdown"
            );
        }
    }
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let verifier =
        SignatureVerifier::from_hex(&config.discord.public_key).map_err(BootstrapError::PublicKey)?;
    let catalog = TmdbClient::from_config(&config.tmdb).map_err(BootstrapError::Catalog)?;
    let platform: Arc<dyn ChatPlatform> =
        Arc::new(DiscordRestClient::from_config(&config.discord).map_err(BootstrapError::Discord)?);

    let service = MovieNightService::new(
        Arc::new(SqlPollStore::new(db_pool.clone())),
        Arc::new(catalog),
        Arc::clone(&platform),
        config.discord.guild_id.clone().map(GuildId),
    );
    let dispatcher = InteractionDispatcher::new(Arc::new(CommandRouter::new(service)), platform);

    info!(
        event_name = "system.bootstrap.ready",
        correlation_id = "bootstrap",
        application_id = %config.discord.application_id,
        "interaction handler ready"
    );

    Ok(Application { config, db_pool, dispatcher, verifier: Arc::new(verifier) })
}
