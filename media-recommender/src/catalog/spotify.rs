use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{TrackCatalog, null_as_empty};
use super::http::{Auth, CatalogHttp, FetchRequest};
use crate::credentials::CredentialCache;
use crate::error::RecommendError;
use crate::normalize::MAX_TRACK_RESULTS;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpotifyArtist {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpotifyImage {
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpotifyAlbum {
    #[serde(default)]
    pub name: Option<String>,
    /// Largest first.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub images: Vec<SpotifyImage>,
    #[serde(default)]
    pub release_date: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpotifyExternalUrls {
    #[serde(default)]
    pub spotify: Option<String>,
}

/// Track as returned by the search endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpotifyTrack {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub artists: Vec<SpotifyArtist>,
    #[serde(default)]
    pub album: Option<SpotifyAlbum>,
    #[serde(default)]
    pub popularity: Option<f64>,
    #[serde(default)]
    pub external_urls: Option<SpotifyExternalUrls>,
}

#[derive(Debug, Default, Deserialize)]
struct TrackPage {
    #[serde(default, deserialize_with = "null_as_empty")]
    items: Vec<SpotifyTrack>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    tracks: Option<TrackPage>,
}

/// Track search authenticated with a cached bearer token. Failures are not
/// retried.
pub struct SpotifyCatalog {
    http: CatalogHttp,
    credentials: Arc<CredentialCache>,
    api_base: String,
}

impl SpotifyCatalog {
    pub fn new(
        http: CatalogHttp,
        credentials: Arc<CredentialCache>,
        api_base: impl Into<String>,
    ) -> Self {
        Self {
            http,
            credentials,
            api_base: api_base.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn search_url(&self, query: &str) -> String {
        format!(
            "{}/search?q={}&type=track&limit={}",
            self.api_base,
            urlencoding::encode(query),
            MAX_TRACK_RESULTS
        )
    }
}

#[async_trait]
impl TrackCatalog for SpotifyCatalog {
    async fn search_tracks(&self, query: &str) -> Result<Vec<SpotifyTrack>, RecommendError> {
        let token = self.credentials.get_token().await?;

        let request = FetchRequest::get(self.search_url(query)).auth(Auth::Bearer(token));
        let payload = self
            .http
            .fetch(request)
            .await
            .map_err(|e| e.into_recommend_error("music catalog"))?;

        let response: SearchResponse =
            serde_json::from_value(payload).map_err(|e| RecommendError::Network {
                status: None,
                message: format!("music catalog: unexpected response: {e}"),
            })?;
        let tracks = response.tracks.unwrap_or_default().items;

        info!(%query, results = tracks.len(), "track search finished");
        Ok(tracks)
    }
}
