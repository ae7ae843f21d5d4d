use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::Mutex;
use tracing::{error, info};

use ebert_core::catalog::{CatalogEntry, MovieCatalog, SuggestionQuery};
use ebert_core::domain::chat::{GuildId, MessageLocation};
use ebert_core::domain::movie::{Movie, MovieLookup, NewMovie};
use ebert_core::domain::poll::Poll;
use ebert_core::errors::{ApplicationError, LookupTarget, PollError};
use ebert_core::polls::{self, announcement, render, GuildEmojis};
use ebert_db::{PollStore, RepositoryError};
use ebert_discord::{ChannelInfo, ChatPlatform, CommandEnvelope, PlatformError, PollCommandService};

pub const POLL_STARTED: &str = "Poll Started";
pub const POLL_FINISHED: &str = "Poll Finished";
pub const POLL_UPDATED: &str = "Poll Updated";

/// Runs the movie-night commands against the store, the catalog and Discord.
///
/// Every command holds `writer` from its first store read until its last
/// store write, so commands never interleave. The lock also guards the
/// reaction picker's RNG.
pub struct MovieNightService {
    store: Arc<dyn PollStore>,
    catalog: Arc<dyn MovieCatalog>,
    platform: Arc<dyn ChatPlatform>,
    default_guild: Option<GuildId>,
    writer: Mutex<StdRng>,
}

impl MovieNightService {
    pub fn new(
        store: Arc<dyn PollStore>,
        catalog: Arc<dyn MovieCatalog>,
        platform: Arc<dyn ChatPlatform>,
        default_guild: Option<GuildId>,
    ) -> Self {
        Self {
            store,
            catalog,
            platform,
            default_guild,
            writer: Mutex::new(StdRng::from_entropy()),
        }
    }

    #[cfg(test)]
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.writer = Mutex::new(rng);
        self
    }

    async fn open_poll(&self) -> Result<Poll, ApplicationError> {
        self.store.find_open().await.map_err(persistence)?.ok_or(PollError::NotOpen.into())
    }

    /// Confirms the status message still exists and returns its channel.
    async fn locate(&self, location: &MessageLocation) -> Result<ChannelInfo, ApplicationError> {
        let channel = self
            .platform
            .fetch_channel(&location.channel_id)
            .await
            .map_err(|error| lookup_failure(error, LookupTarget::Channel))?;
        self.platform
            .fetch_message(location)
            .await
            .map_err(|error| lookup_failure(error, LookupTarget::Message))?;
        Ok(channel)
    }

    async fn reaction_pool(&self, channel: &ChannelInfo) -> Result<GuildEmojis, ApplicationError> {
        match channel.guild_id.as_ref().or(self.default_guild.as_ref()) {
            Some(guild_id) => {
                let emojis = self.platform.guild_emojis(guild_id).await.map_err(integration)?;
                Ok(GuildEmojis::new(emojis))
            }
            None => Ok(GuildEmojis::default()),
        }
    }

    /// The stored movie for `entry`, creating or adopting a row as needed.
    async fn movie_for(
        &self,
        entry: &CatalogEntry,
        title: String,
    ) -> Result<Movie, ApplicationError> {
        let by_id = MovieLookup::ByExternalId(entry.id);
        if let Some(movie) = self.store.find_movie(&by_id).await.map_err(persistence)? {
            return Ok(movie);
        }

        let by_title = MovieLookup::ByTitle(title.clone());
        let title = match self.store.find_movie(&by_title).await.map_err(persistence)? {
            Some(legacy) if legacy.external_id.is_none() => {
                let adopted = Movie { external_id: Some(entry.id), ..legacy };
                self.store.update_movie(&adopted).await.map_err(persistence)?;
                info!(
                    event_name = "movie.adopted",
                    movie_id = adopted.id.0,
                    external_id = entry.id.0,
                    "attached catalog id to stored movie"
                );
                return Ok(adopted);
            }
            Some(_) => self.free_title(&title, entry).await?,
            None => title,
        };

        self.store
            .create_movie(NewMovie { title, external_id: Some(entry.id) })
            .await
            .map_err(persistence)
    }

    /// First of `Title (Year)` and `Title (catalog id)` no stored movie uses.
    async fn free_title(
        &self,
        title: &str,
        entry: &CatalogEntry,
    ) -> Result<String, ApplicationError> {
        let dated = entry.release_year().map(|year| format!("{title} ({year})"));
        let candidates = dated.into_iter().chain([format!("{title} ({})", entry.id.0)]);
        for candidate in candidates {
            let lookup = MovieLookup::ByTitle(candidate.clone());
            if self.store.find_movie(&lookup).await.map_err(persistence)?.is_none() {
                return Ok(candidate);
            }
        }
        Err(ApplicationError::Persistence(format!("every stored name for `{title}` is taken")))
    }

    /// Persists after Discord has already been changed; failures are only logged.
    async fn commit(
        &self,
        poll: &Poll,
        envelope: &CommandEnvelope,
    ) -> Result<(), ApplicationError> {
        self.store.save(poll).await.map_err(|error| {
            error!(
                event_name = "poll.commit_failed",
                correlation_id = %envelope.interaction_id,
                poll_id = poll.id.map(|id| id.0),
                error = %error,
                "poll changed in discord but could not be saved"
            );
            persistence(error)
        })
    }
}

fn persistence(error: RepositoryError) -> ApplicationError {
    ApplicationError::Persistence(error.to_string())
}

fn integration(error: impl std::fmt::Display) -> ApplicationError {
    ApplicationError::Integration(error.to_string())
}

fn lookup_failure(error: PlatformError, target: LookupTarget) -> ApplicationError {
    match error {
        PlatformError::NotFound => PollError::ExternalLookupFailed(target).into(),
        other => integration(other),
    }
}

#[async_trait]
impl PollCommandService for MovieNightService {
    async fn start_poll(&self, envelope: &CommandEnvelope) -> Result<String, ApplicationError> {
        let _writer = self.writer.lock().await;

        let current = self.store.find_open().await.map_err(persistence)?;
        let poll = polls::start(current.as_ref(), Utc::now())?;

        let body = render(&poll, &GuildEmojis::default());
        let location =
            self.platform.send_message(&envelope.channel_id, &body).await.map_err(integration)?;
        self.platform.pin_message(&location).await.map_err(integration)?;
        let poll = poll.pinned_at(location);

        let poll_id = match self.store.create(&poll).await {
            Ok(id) => id,
            Err(RepositoryError::OpenPollExists) => return Err(PollError::AlreadyOpen.into()),
            Err(error) => {
                error!(
                    event_name = "poll.commit_failed",
                    correlation_id = %envelope.interaction_id,
                    error = %error,
                    "poll message posted but poll could not be saved"
                );
                return Err(persistence(error));
            }
        };

        info!(
            event_name = "poll.started",
            correlation_id = %envelope.interaction_id,
            poll_id = poll_id.0,
            channel_id = %envelope.channel_id,
            "movie poll started"
        );
        Ok(POLL_STARTED.to_owned())
    }

    async fn end_poll(
        &self,
        winner: &str,
        envelope: &CommandEnvelope,
    ) -> Result<String, ApplicationError> {
        let _writer = self.writer.lock().await;

        let poll = self.open_poll().await?;
        let closed = polls::close(&poll, winner, Utc::now())?;
        let location = poll
            .location
            .clone()
            .ok_or_else(|| ApplicationError::Persistence("open poll has no message".to_owned()))?;
        self.locate(&location).await?;

        let body = render(&closed, &GuildEmojis::default());
        self.platform.edit_message(&location, &body).await.map_err(integration)?;
        self.platform.unpin_message(&location).await.map_err(integration)?;
        self.commit(&closed, envelope).await?;

        info!(
            event_name = "poll.finished",
            correlation_id = %envelope.interaction_id,
            poll_id = closed.id.map(|id| id.0),
            winner = %winner,
            "movie poll finished"
        );
        Ok(POLL_FINISHED.to_owned())
    }

    async fn suggest_movie(
        &self,
        title: &str,
        year: Option<&str>,
        envelope: &CommandEnvelope,
    ) -> Result<String, ApplicationError> {
        let query = SuggestionQuery::parse(title, year)?;
        let mut rng = self.writer.lock().await;

        let poll = self.open_poll().await?;
        let results = self.catalog.search(&query.title).await.map_err(integration)?;
        // Catalog rejections are reported before the status message is looked up.
        polls::select_candidate(&poll, &query, &results)?;

        let location = poll
            .location
            .clone()
            .ok_or_else(|| ApplicationError::Persistence("open poll has no message".to_owned()))?;
        let channel = self.locate(&location).await?;
        let emojis = self.reaction_pool(&channel).await?;
        let plan = polls::suggest(&poll, &query, &results, emojis.names(), &mut *rng)?;
        let emoji = emojis
            .get(&plan.react)
            .cloned()
            .ok_or_else(|| integration(format!("emoji `{}` disappeared", plan.react)))?;

        let movie = self.movie_for(&plan.entry, plan.title).await?;
        let updated = polls::add_option(&poll, &plan.react, movie.clone())?;

        self.platform
            .edit_message(&location, &render(&updated, &emojis))
            .await
            .map_err(integration)?;
        self.platform.add_reaction(&location, &emoji).await.map_err(integration)?;
        self.platform
            .send_message(&channel.id, &announcement(&movie, &envelope.user_id))
            .await
            .map_err(integration)?;
        self.commit(&updated, envelope).await?;

        info!(
            event_name = "poll.suggested",
            correlation_id = %envelope.interaction_id,
            poll_id = updated.id.map(|id| id.0),
            movie_id = movie.id.0,
            react = %plan.react,
            "movie added to poll"
        );
        Ok(POLL_UPDATED.to_owned())
    }
}
