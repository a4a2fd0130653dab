use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::RecommendError;

/// Content category a request is classified into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Medium {
    Movie,
    Tv,
    Song,
}

impl Medium {
    pub fn as_str(&self) -> &'static str {
        match self {
            Medium::Movie => "movie",
            Medium::Tv => "tv",
            Medium::Song => "song",
        }
    }
}

impl fmt::Display for Medium {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Medium {
    type Err = RecommendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "movie" => Ok(Medium::Movie),
            "tv" => Ok(Medium::Tv),
            "song" => Ok(Medium::Song),
            other => Err(RecommendError::Validation(format!(
                "Unknown medium '{other}', expected movie, tv or song"
            ))),
        }
    }
}

/// A validated inbound request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecommendationRequest {
    pub raw_text: String,
    pub forced_medium: Option<Medium>,
}

impl RecommendationRequest {
    /// Rejects blank input before anything else runs.
    pub fn new(raw_text: &str, forced_medium: Option<Medium>) -> Result<Self, RecommendError> {
        let raw_text = raw_text.trim();
        if raw_text.is_empty() {
            return Err(RecommendError::Validation("No input provided".to_string()));
        }
        Ok(Self {
            raw_text: raw_text.to_string(),
            forced_medium,
        })
    }
}

/// Structured reading of a free-text request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intent {
    pub medium: Medium,
    /// One or two keyword or genre strings.
    pub search_terms: Vec<String>,
    /// True when `search_terms` are genre names.
    pub is_genre: bool,
}

impl Intent {
    /// The intent used whenever the completion output cannot be understood.
    pub fn fallback(raw_text: &str) -> Self {
        Self {
            medium: Medium::Movie,
            search_terms: vec![raw_text.to_string()],
            is_genre: false,
        }
    }

    /// Query text handed to a catalog, bounded to [`MAX_QUERY_TOKENS`] words.
    pub fn catalog_query(&self) -> String {
        truncate_query(&self.search_terms.join(" "), MAX_QUERY_TOKENS)
    }
}

/// Catalog providers reject long free-text queries.
pub const MAX_QUERY_TOKENS: usize = 4;

pub fn truncate_query(text: &str, max_tokens: usize) -> String {
    text.split_whitespace()
        .take(max_tokens)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Uniform output item, whatever the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub id: Option<String>,
    pub title: String,
    pub overview: Option<String>,
    pub artist: Option<String>,
    pub image_url: Option<String>,
    pub release_date: Option<String>,
    pub score: Option<f64>,
    pub external_url: Option<String>,
}

/// Inbound body of `POST /recommend`.
#[derive(Debug, Default, Deserialize)]
pub struct RecommendBody {
    #[serde(default)]
    pub input: Option<String>,
    #[serde(default)]
    pub medium: Option<String>,
}

/// Successful response with at least one recommendation.
#[derive(Debug, Serialize, Deserialize)]
pub struct RecommendResponse {
    pub medium: Medium,
    pub search_terms: Vec<String>,
    pub recommendations: Vec<Recommendation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history_id: Option<Uuid>,
}

/// Inbound body of `POST /feedback`.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedbackRequest {
    pub history_id: Uuid,
    pub picked_title: String,
    #[serde(default)]
    pub picked_id: Option<String>,
    #[serde(default)]
    pub picked_medium: Option<Medium>,
}

/// One served request, as kept by the history store.
///
/// The `picked_*` fields stay empty until a feedback call fills them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub medium: Medium,
    pub query: String,
    pub picked_title: Option<String>,
    pub picked_id: Option<String>,
    pub picked_medium: Option<Medium>,
    pub timestamp: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn new(medium: Medium, query: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            medium,
            query: query.into(),
            picked_title: None,
            picked_id: None,
            picked_medium: None,
            timestamp: Utc::now(),
        }
    }

    pub fn has_feedback(&self) -> bool {
        self.picked_title.is_some()
    }
}
