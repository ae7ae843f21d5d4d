use serde::{Deserialize, Serialize};

pub const TMDB_MOVIE_BASE_URL: &str = "https://www.themoviedb.org/movie";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MovieId(pub i64);

/// TMDB identifier of a movie.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExternalId(pub i64);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Movie {
    pub id: MovieId,
    pub title: String,
    pub external_id: Option<ExternalId>,
}

impl Movie {
    pub fn catalog_url(&self) -> Option<String> {
        self.external_id.map(|ExternalId(id)| format!("{TMDB_MOVIE_BASE_URL}/{id}"))
    }
}

/// A movie row that has not been persisted yet.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMovie {
    pub title: String,
    pub external_id: Option<ExternalId>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MovieLookup {
    ByExternalId(ExternalId),
    ByTitle(String),
}
