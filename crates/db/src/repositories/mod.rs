use async_trait::async_trait;
use thiserror::Error;

use ebert_core::domain::movie::{Movie, MovieId, MovieLookup, NewMovie};
use ebert_core::domain::poll::{Poll, PollId};

pub mod memory;
pub mod poll;

pub use memory::InMemoryPollStore;
pub use poll::SqlPollStore;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("an open poll already exists")]
    OpenPollExists,
    #[error("invalid poll: {0}")]
    Invalid(String),
}

/// Durable storage for polls, their options and the movies they reference.
#[async_trait]
pub trait PollStore: Send + Sync {
    async fn find_open(&self) -> Result<Option<Poll>, RepositoryError>;

    /// Inserts an open poll and returns its id. Fails with
    /// [`RepositoryError::OpenPollExists`] when another poll is still open.
    async fn create(&self, poll: &Poll) -> Result<PollId, RepositoryError>;

    /// Overwrites the stored poll row and its full option list.
    async fn save(&self, poll: &Poll) -> Result<(), RepositoryError>;

    async fn find_movie(&self, lookup: &MovieLookup) -> Result<Option<Movie>, RepositoryError>;

    async fn create_movie(&self, movie: NewMovie) -> Result<Movie, RepositoryError>;

    /// Attaches a catalog id to a movie stored without one.
    async fn update_movie(&self, movie: &Movie) -> Result<(), RepositoryError>;

    async fn find_by_id(&self, id: PollId) -> Result<Option<Poll>, RepositoryError>;

    /// Ids of every poll, open or closed, that lists `movie_id` as an option.
    async fn polls_mentioning(&self, movie_id: MovieId) -> Result<Vec<PollId>, RepositoryError>;
}

pub(crate) fn check_invariants(poll: &Poll) -> Result<(), RepositoryError> {
    if poll.location.is_none() {
        return Err(RepositoryError::Invalid(
            "poll has no status message location".to_string(),
        ));
    }
    if poll.open != poll.winner.is_none() {
        return Err(RepositoryError::Invalid(
            "a poll has a winner exactly when it is closed".to_string(),
        ));
    }
    Ok(())
}
