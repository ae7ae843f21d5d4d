use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::chat::MessageLocation;
use crate::domain::movie::{ExternalId, Movie, MovieId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PollId(pub i64);

/// Lifecycle of a stored poll. "No open poll" is the absence of an open row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PollState {
    Open,
    Closed,
}

/// One candidate of a poll: the reaction users click and the movie it stands for.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollOption {
    pub react: String,
    pub movie: Movie,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Poll {
    /// `None` until the poll has been stored.
    pub id: Option<PollId>,
    pub open: bool,
    /// `None` until the status message has been posted.
    pub location: Option<MessageLocation>,
    /// Insertion ordered.
    pub options: Vec<PollOption>,
    pub winner: Option<MovieId>,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl Poll {
    pub fn new_open(created_at: DateTime<Utc>) -> Self {
        Self {
            id: None,
            open: true,
            location: None,
            options: Vec::new(),
            winner: None,
            created_at,
            closed_at: None,
        }
    }

    pub fn state(&self) -> PollState {
        if self.open {
            PollState::Open
        } else {
            PollState::Closed
        }
    }

    pub fn pinned_at(mut self, location: MessageLocation) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with_id(mut self, id: PollId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn uses_reaction(&self, react: &str) -> bool {
        self.options.iter().any(|option| option.react == react)
    }

    pub fn contains_external_id(&self, external_id: ExternalId) -> bool {
        self.options.iter().any(|option| option.movie.external_id == Some(external_id))
    }

    pub fn contains_movie(&self, movie_id: MovieId) -> bool {
        self.options.iter().any(|option| option.movie.id == movie_id)
    }

    pub fn used_reactions(&self) -> impl Iterator<Item = &str> {
        self.options.iter().map(|option| option.react.as_str())
    }

    pub fn winning_movie(&self) -> Option<&Movie> {
        let winner = self.winner?;
        self.options.iter().map(|option| &option.movie).find(|movie| movie.id == winner)
    }
}
