use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use super::http::{CatalogHttp, FetchRequest, RetryPolicy, with_retry};
use super::{TitleCatalog, TitleKind, null_as_empty};
use crate::error::RecommendError;

/// Movie or TV show as returned by TMDB search and discover.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TmdbItem {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub overview: Option<String>,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub first_air_date: Option<String>,
    #[serde(default)]
    pub vote_average: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct TmdbPage {
    #[serde(default, deserialize_with = "null_as_empty")]
    results: Vec<TmdbItem>,
}

pub struct TmdbCatalog {
    http: CatalogHttp,
    api_key: Option<String>,
    base_url: String,
    retry: RetryPolicy,
}

impl TmdbCatalog {
    pub fn new(http: CatalogHttp, api_key: Option<String>, base_url: impl Into<String>) -> Self {
        Self {
            http,
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            retry: RetryPolicy::default(),
        }
    }

    fn api_key(&self) -> Result<&str, RecommendError> {
        self.api_key
            .as_deref()
            .ok_or_else(|| RecommendError::Credential("TMDB_API_KEY is not configured".into()))
    }

    pub fn search_url(&self, api_key: &str, kind: TitleKind, query: &str) -> String {
        format!(
            "{}/search/{}?api_key={}&query={}&include_adult=false&page=1",
            self.base_url,
            kind.path(),
            urlencoding::encode(api_key),
            urlencoding::encode(query)
        )
    }

    pub fn discover_url(&self, api_key: &str, kind: TitleKind, genre_ids: &[u32]) -> String {
        let genres = genre_ids
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(",");
        format!(
            "{}/discover/{}?api_key={}&with_genres={}&sort_by=popularity.desc&include_adult=false&page=1",
            self.base_url,
            kind.path(),
            urlencoding::encode(api_key),
            urlencoding::encode(&genres)
        )
    }

    async fn fetch_page(&self, url: String) -> Result<Vec<TmdbItem>, RecommendError> {
        let payload: Value = with_retry(self.retry, || self.http.fetch(FetchRequest::get(&url)))
            .await
            .map_err(|e| e.into_recommend_error("movie/TV catalog"))?;

        let page: TmdbPage = serde_json::from_value(payload).map_err(|e| RecommendError::Network {
            status: None,
            message: format!("movie/TV catalog: unexpected response: {e}"),
        })?;
        Ok(page.results)
    }
}

#[async_trait]
impl TitleCatalog for TmdbCatalog {
    async fn search(&self, kind: TitleKind, query: &str) -> Result<Vec<TmdbItem>, RecommendError> {
        let url = self.search_url(self.api_key()?, kind, query);
        let items = self.fetch_page(url).await?;
        info!(kind = kind.path(), %query, results = items.len(), "title search finished");
        Ok(items)
    }

    async fn discover(
        &self,
        kind: TitleKind,
        genre_ids: &[u32],
    ) -> Result<Vec<TmdbItem>, RecommendError> {
        let url = self.discover_url(self.api_key()?, kind, genre_ids);
        let items = self.fetch_page(url).await?;
        info!(kind = kind.path(), ?genre_ids, results = items.len(), "title discovery finished");
        Ok(items)
    }
}
