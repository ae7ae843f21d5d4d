//! Movie catalog lookup seam and the title/year matching rules applied to
//! catalog search results.

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::movie::ExternalId;
use crate::errors::PollError;

/// One search hit from the catalog.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: ExternalId,
    pub title: Option<String>,
    pub original_title: Option<String>,
    /// ISO-8601 date (`YYYY-MM-DD`); the catalog sends an empty string for unknown dates.
    pub release_date: Option<String>,
}

impl CatalogEntry {
    pub fn release_year(&self) -> Option<i32> {
        let raw = self.release_date.as_deref()?.trim();
        NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok().map(|date| date.year())
    }

    pub fn matches_title(&self, query: &str) -> bool {
        let query = query.trim().to_lowercase();
        [self.title.as_deref(), self.original_title.as_deref()]
            .into_iter()
            .flatten()
            .any(|title| title.trim().to_lowercase() == query)
    }

    /// Title under which the movie is stored: the primary title, else the
    /// original title, else what the user typed.
    pub fn display_title(&self, query: &str) -> String {
        self.title
            .as_deref()
            .filter(|title| !title.trim().is_empty())
            .or(self.original_title.as_deref().filter(|title| !title.trim().is_empty()))
            .unwrap_or(query)
            .to_owned()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SuggestionQuery {
    pub title: String,
    pub year: Option<i32>,
}

impl SuggestionQuery {
    /// Builds a query from raw command input. An empty year means "any year".
    pub fn parse(title: &str, year: Option<&str>) -> Result<Self, PollError> {
        let year = match year.map(str::trim).filter(|value| !value.is_empty()) {
            None => None,
            Some(raw) => match raw.parse::<i32>() {
                Ok(parsed) if (1..=9999).contains(&parsed) => Some(parsed),
                _ => return Err(PollError::InvalidInput { value: raw.to_owned() }),
            },
        };

        Ok(Self { title: title.trim().to_owned(), year })
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("catalog request failed: {0}")]
    Request(String),
    #[error("catalog returned status {0}")]
    Status(u16),
    #[error("catalog response could not be decoded: {0}")]
    Decode(String),
}

#[async_trait]
pub trait MovieCatalog: Send + Sync {
    async fn search(&self, title: &str) -> Result<Vec<CatalogEntry>, CatalogError>;
}

/// Entries whose primary or original title equals the query (case-insensitive),
/// restricted to the query's release year when one is given.
pub fn matching_entries<'a>(
    entries: &'a [CatalogEntry],
    query: &SuggestionQuery,
) -> Vec<&'a CatalogEntry> {
    entries
        .iter()
        .filter(|entry| entry.matches_title(&query.title))
        .filter(|entry| match query.year {
            Some(year) => entry.release_year() == Some(year),
            None => true,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{matching_entries, CatalogEntry, SuggestionQuery};
    use crate::domain::movie::ExternalId;
    use crate::errors::PollError;

    fn entry(id: i64, title: &str, original: &str, date: &str) -> CatalogEntry {
        CatalogEntry {
            id: ExternalId(id),
            title: Some(title.to_owned()),
            original_title: Some(original.to_owned()),
            release_date: Some(date.to_owned()),
        }
    }

    #[test]
    fn matches_primary_or_original_title_ignoring_case() {
        let entries = vec![
            entry(1, "Spirited Away", "千と千尋の神隠し", "2001-07-20"),
            entry(2, "Amélie", "Le Fabuleux Destin d'Amélie Poulain", "2001-04-25"),
            entry(3, "Spirited Away: Behind the Scenes", "", "2002-01-01"),
        ];

        let query = SuggestionQuery::parse("spirited away", None).expect("query");
        let found = matching_entries(&entries, &query);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, ExternalId(1));

        let query = SuggestionQuery::parse("le fabuleux destin d'amélie poulain", None)
            .expect("query");
        let found = matching_entries(&entries, &query);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, ExternalId(2));
    }

    #[test]
    fn year_filter_drops_entries_without_a_parseable_date() {
        let entries = vec![
            entry(438631, "Dune", "Dune", "2021-09-15"),
            entry(841, "Dune", "Dune", "1984-12-14"),
            entry(9999, "Dune", "Dune", ""),
        ];

        let any_year = SuggestionQuery::parse("Dune", None).expect("query");
        assert_eq!(matching_entries(&entries, &any_year).len(), 3);

        let eighty_four = SuggestionQuery::parse("Dune", Some("1984")).expect("query");
        let found = matching_entries(&entries, &eighty_four);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, ExternalId(841));
    }

    #[test]
    fn parse_rejects_malformed_years() {
        assert_eq!(
            SuggestionQuery::parse("Jaws", Some("nineteen")),
            Err(PollError::InvalidInput { value: "nineteen".to_owned() })
        );
        assert!(SuggestionQuery::parse("Jaws", Some("0")).is_err());
        assert_eq!(SuggestionQuery::parse("Jaws", Some("  ")).expect("blank").year, None);
        assert_eq!(SuggestionQuery::parse(" Jaws ", Some("1975")).expect("year").year, Some(1975));
    }

    #[test]
    fn display_title_falls_back_to_original_then_query() {
        let mut hit = entry(5, "", "Nosferatu", "1922-03-04");
        assert_eq!(hit.display_title("nosferatu"), "Nosferatu");

        hit.original_title = None;
        assert_eq!(hit.display_title("nosferatu"), "nosferatu");
    }
}
