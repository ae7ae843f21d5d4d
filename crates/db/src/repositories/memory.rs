use std::collections::{BTreeMap, HashSet};

use tokio::sync::RwLock;

use ebert_core::domain::movie::{Movie, MovieId, MovieLookup, NewMovie};
use ebert_core::domain::poll::{Poll, PollId};

use super::{check_invariants, PollStore, RepositoryError};

#[derive(Default)]
struct MemoryState {
    polls: BTreeMap<i64, Poll>,
    movies: BTreeMap<i64, Movie>,
    next_poll_id: i64,
    next_movie_id: i64,
}

impl MemoryState {
    /// Replaces option snapshots with the current movie rows, as a join would.
    fn hydrate(&self, poll: &Poll) -> Poll {
        let mut poll = poll.clone();
        for option in &mut poll.options {
            if let Some(movie) = self.movies.get(&option.movie.id.0) {
                option.movie = movie.clone();
            }
        }
        poll
    }

    fn check_options(&self, poll: &Poll) -> Result<(), RepositoryError> {
        let mut reacts = HashSet::new();
        let mut movies = HashSet::new();
        for option in &poll.options {
            if !self.movies.contains_key(&option.movie.id.0) {
                return Err(RepositoryError::Invalid(format!(
                    "movie {} does not exist",
                    option.movie.id.0
                )));
            }
            if !reacts.insert(option.react.as_str()) || !movies.insert(option.movie.id) {
                return Err(RepositoryError::Invalid(
                    "poll options must have distinct reactions and movies".to_string(),
                ));
            }
        }
        Ok(())
    }

    fn open_poll_other_than(&self, id: Option<i64>) -> bool {
        self.polls.iter().any(|(poll_id, poll)| poll.open && Some(*poll_id) != id)
    }
}

/// Process-local [`PollStore`] with the same invariants as the sqlite store.
#[derive(Default)]
pub struct InMemoryPollStore {
    state: RwLock<MemoryState>,
}

#[async_trait::async_trait]
impl PollStore for InMemoryPollStore {
    async fn find_open(&self) -> Result<Option<Poll>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.polls.values().find(|poll| poll.open).map(|poll| state.hydrate(poll)))
    }

    async fn create(&self, poll: &Poll) -> Result<PollId, RepositoryError> {
        check_invariants(poll)?;
        if !poll.open {
            return Err(RepositoryError::Invalid("only open polls can be created".to_string()));
        }

        let mut state = self.state.write().await;
        if state.open_poll_other_than(None) {
            return Err(RepositoryError::OpenPollExists);
        }
        state.check_options(poll)?;

        state.next_poll_id += 1;
        let id = PollId(state.next_poll_id);
        state.polls.insert(id.0, poll.clone().with_id(id));
        Ok(id)
    }

    async fn save(&self, poll: &Poll) -> Result<(), RepositoryError> {
        check_invariants(poll)?;
        let Some(PollId(id)) = poll.id else {
            return Err(RepositoryError::Invalid("poll has not been created yet".to_string()));
        };

        let mut state = self.state.write().await;
        if !state.polls.contains_key(&id) {
            return Err(RepositoryError::Invalid(format!("poll {id} does not exist")));
        }
        if poll.open && state.open_poll_other_than(Some(id)) {
            return Err(RepositoryError::OpenPollExists);
        }
        state.check_options(poll)?;

        state.polls.insert(id, poll.clone());
        Ok(())
    }

    async fn find_movie(&self, lookup: &MovieLookup) -> Result<Option<Movie>, RepositoryError> {
        let state = self.state.read().await;
        let found = state.movies.values().find(|movie| match lookup {
            MovieLookup::ByExternalId(external_id) => movie.external_id == Some(*external_id),
            MovieLookup::ByTitle(title) => movie.title == *title,
        });
        Ok(found.cloned())
    }

    async fn create_movie(&self, movie: NewMovie) -> Result<Movie, RepositoryError> {
        let mut state = self.state.write().await;
        let clash = state.movies.values().any(|existing| {
            existing.title == movie.title
                || (movie.external_id.is_some() && existing.external_id == movie.external_id)
        });
        if clash {
            return Err(RepositoryError::Invalid(format!(
                "movie `{}` already exists",
                movie.title
            )));
        }

        state.next_movie_id += 1;
        let created = Movie {
            id: MovieId(state.next_movie_id),
            title: movie.title,
            external_id: movie.external_id,
        };
        state.movies.insert(created.id.0, created.clone());
        Ok(created)
    }

    async fn update_movie(&self, movie: &Movie) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        match state.movies.get_mut(&movie.id.0) {
            Some(existing) => {
                *existing = movie.clone();
                Ok(())
            }
            None => Err(RepositoryError::Invalid(format!("movie {} does not exist", movie.id.0))),
        }
    }

    async fn find_by_id(&self, id: PollId) -> Result<Option<Poll>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.polls.get(&id.0).map(|poll| state.hydrate(poll)))
    }

    async fn polls_mentioning(&self, movie_id: MovieId) -> Result<Vec<PollId>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state
            .polls
            .iter()
            .filter(|(_, poll)| poll.contains_movie(movie_id))
            .map(|(id, _)| PollId(*id))
            .collect())
    }
}
