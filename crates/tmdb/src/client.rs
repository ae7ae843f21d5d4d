use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{debug, warn};

use ebert_core::catalog::{CatalogEntry, CatalogError, MovieCatalog};
use ebert_core::config::TmdbConfig;
use ebert_core::domain::movie::ExternalId;

const SEARCH_PATH: &str = "3/search/movie";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    id: i64,
    title: Option<String>,
    original_title: Option<String>,
    release_date: Option<String>,
}

impl From<SearchHit> for CatalogEntry {
    fn from(hit: SearchHit) -> Self {
        Self {
            id: ExternalId(hit.id),
            title: hit.title,
            original_title: hit.original_title,
            release_date: hit.release_date.filter(|date| !date.trim().is_empty()),
        }
    }
}

/// Catalog client for `GET /3/search/movie`, authenticated with a v3 API key.
#[derive(Clone, Debug)]
pub struct TmdbClient {
    http: Client,
    base_url: Url,
    api_key: SecretString,
}

impl TmdbClient {
    pub fn new(
        base_url: &str,
        api_key: SecretString,
        timeout: Duration,
    ) -> Result<Self, CatalogError> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("ebert/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|error| CatalogError::Request(error.to_string()))?;
        let base_url = parse_base_url(base_url)?;

        Ok(Self { http, base_url, api_key })
    }

    pub fn from_config(config: &TmdbConfig) -> Result<Self, CatalogError> {
        Self::new(
            &config.base_url,
            config.api_key.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    fn search_url(&self, title: &str) -> Result<Url, CatalogError> {
        let mut url = self
            .base_url
            .join(SEARCH_PATH)
            .map_err(|error| CatalogError::Request(error.to_string()))?;
        url.query_pairs_mut()
            .append_pair("api_key", self.api_key.expose_secret())
            .append_pair("query", title)
            .append_pair("include_adult", "false");
        Ok(url)
    }
}

/// Ensures the base ends with `/` so `join` appends instead of replacing the last segment.
fn parse_base_url(raw: &str) -> Result<Url, CatalogError> {
    let normalized = format!("{}/", raw.trim().trim_end_matches('/'));
    Url::parse(&normalized).map_err(|error| CatalogError::Request(format!("bad base url: {error}")))
}

fn decode_search(body: &str) -> Result<Vec<CatalogEntry>, CatalogError> {
    let response: SearchResponse =
        serde_json::from_str(body).map_err(|error| CatalogError::Decode(error.to_string()))?;
    Ok(response.results.into_iter().map(CatalogEntry::from).collect())
}

#[async_trait]
impl MovieCatalog for TmdbClient {
    async fn search(&self, title: &str) -> Result<Vec<CatalogEntry>, CatalogError> {
        let url = self.search_url(title)?;
        let response = self.http.get(url).send().await.map_err(|error| {
            // The URL carries the api key.
            let error = error.without_url();
            warn!(
                event_name = "tmdb.search.request_failed",
                error = %error,
                "tmdb search request failed"
            );
            CatalogError::Request(error.to_string())
        })?;

        let status = response.status();
        if status != StatusCode::OK {
            warn!(
                event_name = "tmdb.search.status",
                status = status.as_u16(),
                "tmdb search returned an error status"
            );
            return Err(CatalogError::Status(status.as_u16()));
        }

        let body = response.text().await.map_err(|error| CatalogError::Decode(error.to_string()))?;
        let entries = decode_search(&body)?;
        debug!(
            event_name = "tmdb.search.completed",
            query = %title,
            results = entries.len(),
            "tmdb search completed"
        );
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use ebert_core::catalog::CatalogError;
    use ebert_core::domain::movie::ExternalId;

    use super::{decode_search, parse_base_url, TmdbClient};

    const DUNE_RESPONSE: &str = r#"{
        "page": 1,
        "results": [
            {"id": 438631, "title": "Dune", "original_title": "Dune", "release_date": "2021-09-15", "popularity": 120.5},
            {"id": 841, "title": "Dune", "original_title": "Dune", "release_date": "1984-12-14"},
            {"id": 1, "title": "Dune Drifter", "release_date": ""}
        ],
        "total_pages": 1,
        "total_results": 3
    }"#;

    #[test]
    fn search_response_maps_to_catalog_entries() {
        let entries = decode_search(DUNE_RESPONSE).expect("decode");

        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].id, ExternalId(438631));
        assert_eq!(entries[1].release_year(), Some(1984));
        assert_eq!(entries[2].original_title, None);
        assert_eq!(entries[2].release_date, None, "empty dates are treated as unknown");
    }

    #[test]
    fn missing_results_decode_as_empty() {
        assert!(decode_search(r#"{"page": 1}"#).expect("decode").is_empty());
        assert!(matches!(decode_search("not json"), Err(CatalogError::Decode(_))));
    }

    #[test]
    fn search_url_encodes_query_and_key() {
        let client = TmdbClient::new(
            "https://api.themoviedb.org",
            "secret-key".to_string().into(),
            Duration::from_secs(5),
        )
        .expect("client");

        let url = client.search_url("Amélie & friends").expect("url");

        assert_eq!(url.path(), "/3/search/movie");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("api_key".to_string(), "secret-key".to_string())));
        assert!(pairs.contains(&("query".to_string(), "Amélie & friends".to_string())));
    }

    #[test]
    fn base_url_keeps_path_prefix() {
        let base = parse_base_url("http://127.0.0.1:9000/tmdb/").expect("url");
        assert_eq!(base.join("3/search/movie").expect("join").path(), "/tmdb/3/search/movie");
        assert!(parse_base_url("not a url").is_err());
    }
}
