pub mod genres;
pub mod http;
pub mod spotify;
pub mod tmdb;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::RecommendError;
use crate::models::Medium;

pub use http::{CatalogHttp, FetchError, FetchRequest, RetryPolicy};
pub use spotify::{SpotifyCatalog, SpotifyTrack};
pub use tmdb::{TmdbCatalog, TmdbItem};

/// Reads an explicit `null` list as empty.
pub(crate) fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<Vec<T>>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// Media served by the movie/TV provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TitleKind {
    Movie,
    Tv,
}

impl TitleKind {
    pub fn from_medium(medium: Medium) -> Option<Self> {
        match medium {
            Medium::Movie => Some(TitleKind::Movie),
            Medium::Tv => Some(TitleKind::Tv),
            Medium::Song => None,
        }
    }

    pub fn medium(&self) -> Medium {
        match self {
            TitleKind::Movie => Medium::Movie,
            TitleKind::Tv => Medium::Tv,
        }
    }

    /// Path segment used by the provider's endpoints.
    pub fn path(&self) -> &'static str {
        match self {
            TitleKind::Movie => "movie",
            TitleKind::Tv => "tv",
        }
    }
}

/// Movie/TV search and genre discovery.
#[async_trait]
pub trait TitleCatalog: Send + Sync {
    async fn search(&self, kind: TitleKind, query: &str) -> Result<Vec<TmdbItem>, RecommendError>;

    async fn discover(
        &self,
        kind: TitleKind,
        genre_ids: &[u32],
    ) -> Result<Vec<TmdbItem>, RecommendError>;
}

/// Music track search.
#[async_trait]
pub trait TrackCatalog: Send + Sync {
    async fn search_tracks(&self, query: &str) -> Result<Vec<SpotifyTrack>, RecommendError>;
}
