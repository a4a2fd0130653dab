use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rig::{client::CompletionClient, completion::Prompt, providers::openrouter};
use serde::Deserialize;
use tracing::{info, warn};

use crate::config::{ClassifierVariant, LlmConfig};
use crate::error::RecommendError;
use crate::models::{Intent, Medium, RecommendationRequest};

/// Most search terms kept from a completion.
pub const MAX_SEARCH_TERMS: usize = 2;

const KEYWORDS_PROMPT: &str = r#"You classify requests for entertainment recommendations.

Decide whether the user wants a MOVIE, a TV show or a SONG, and extract at most two short search keywords.

Respond with ONLY this JSON and nothing else:
{
  "medium": "movie" | "tv" | "song",
  "search_terms": ["keyword", "keyword"]
}

Rules:
- Use "movie" when the medium is ambiguous.
- Each keyword is one to three words: a genre, mood, title, artist or theme.
- Do not wrap the JSON in markdown.
"#;

const GENRES_PROMPT: &str = r#"You classify requests for entertainment recommendations.

Decide whether the user wants a MOVIE, a TV show or a SONG, and name at most two genres that match the request.

Respond with ONLY this JSON and nothing else:
{
  "medium": "movie" | "tv" | "song",
  "genres": ["Genre", "Genre"]
}

Rules:
- Use "movie" when the medium is ambiguous.
- Prefer standard genre names: Action, Adventure, Animation, Comedy, Crime, Documentary, Drama, Family, Fantasy, History, Horror, Music, Mystery, Romance, Science Fiction, Thriller, War, Western.
- For songs, use music genres such as pop, rock, jazz or hip hop.
- Do not wrap the JSON in markdown.
"#;

impl ClassifierVariant {
    pub fn instructions(&self) -> &'static str {
        match self {
            ClassifierVariant::Keywords => KEYWORDS_PROMPT,
            ClassifierVariant::Genres => GENRES_PROMPT,
        }
    }
}

/// A text-completion endpoint.
#[async_trait]
pub trait CompletionModel: Send + Sync {
    async fn complete(&self, instructions: &str, input: &str) -> anyhow::Result<String>;
}

/// OpenRouter-backed completion through rig.
pub struct RigCompletion {
    config: LlmConfig,
}

impl RigCompletion {
    pub fn new(config: LlmConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl CompletionModel for RigCompletion {
    async fn complete(&self, instructions: &str, input: &str) -> anyhow::Result<String> {
        let client = openrouter::Client::new(&self.config.api_key);
        let agent = client
            .agent(&self.config.model)
            .preamble(instructions)
            .max_tokens(self.config.max_tokens)
            .build();
        let response = agent.prompt(input).await?;
        Ok(response)
    }
}

#[derive(Debug, Deserialize)]
struct CompletionPayload {
    medium: String,
    #[serde(default)]
    search_terms: Vec<String>,
    #[serde(default)]
    genres: Vec<String>,
}

/// The completion output, either understood or kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawIntent {
    Parsed {
        medium: Medium,
        terms: Vec<String>,
        is_genre: bool,
    },
    Unparseable(String),
}

impl RawIntent {
    /// Reads a completion body. Code fences and text around the JSON object
    /// are tolerated; an unknown medium makes the output unparseable.
    pub fn parse(text: &str) -> Self {
        let Some(json) = extract_object(text) else {
            return RawIntent::Unparseable(text.to_string());
        };
        let Ok(payload) = serde_json::from_str::<CompletionPayload>(json) else {
            return RawIntent::Unparseable(text.to_string());
        };
        let Ok(medium) = payload.medium.parse::<Medium>() else {
            return RawIntent::Unparseable(text.to_string());
        };

        let genres = clean_terms(payload.genres);
        if !genres.is_empty() {
            return RawIntent::Parsed {
                medium,
                terms: genres,
                is_genre: true,
            };
        }
        RawIntent::Parsed {
            medium,
            terms: clean_terms(payload.search_terms),
            is_genre: false,
        }
    }

    /// Turns the reading into an [`Intent`]. Unparseable output, or parsed
    /// output without any term, falls back to searching the raw text as a movie.
    pub fn into_intent(self, raw_text: &str, forced_medium: Option<Medium>) -> Intent {
        let mut intent = match self {
            RawIntent::Parsed {
                medium,
                terms,
                is_genre,
            } if !terms.is_empty() => Intent {
                medium,
                search_terms: terms,
                is_genre,
            },
            RawIntent::Parsed { medium, .. } => Intent {
                medium,
                ..Intent::fallback(raw_text)
            },
            RawIntent::Unparseable(original) => {
                warn!(completion = %original, "classifier output not understood, using default intent");
                Intent::fallback(raw_text)
            }
        };
        if let Some(medium) = forced_medium {
            intent.medium = medium;
        }
        intent
    }
}

fn extract_object(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    let trimmed = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    let trimmed = trimmed.strip_suffix("```").unwrap_or(trimmed).trim();

    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    (start < end).then(|| &trimmed[start..=end])
}

fn clean_terms(terms: Vec<String>) -> Vec<String> {
    terms
        .into_iter()
        .map(|term| term.trim().to_string())
        .filter(|term| !term.is_empty())
        .take(MAX_SEARCH_TERMS)
        .collect()
}

/// Sends a request to the completion endpoint and reads back an [`Intent`].
pub struct IntentClassifier {
    model: Arc<dyn CompletionModel>,
    variant: ClassifierVariant,
    timeout: Duration,
}

impl IntentClassifier {
    pub fn new(model: Arc<dyn CompletionModel>, variant: ClassifierVariant, timeout: Duration) -> Self {
        Self {
            model,
            variant,
            timeout,
        }
    }

    pub fn variant(&self) -> ClassifierVariant {
        self.variant
    }

    /// One round trip, no retry. Only a failed call is an error; output
    /// that cannot be read yields the default intent.
    pub async fn classify(&self, request: &RecommendationRequest) -> Result<Intent, RecommendError> {
        let call = self
            .model
            .complete(self.variant.instructions(), &request.raw_text);
        let completion = tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| RecommendError::Timeout("completion endpoint".to_string()))?
            .map_err(|e| RecommendError::Classification(e.to_string()))?;

        let intent = RawIntent::parse(&completion)
            .into_intent(&request.raw_text, request.forced_medium);

        info!(
            medium = %intent.medium,
            search_terms = ?intent.search_terms,
            is_genre = intent.is_genre,
            forced = request.forced_medium.is_some(),
            "request classified"
        );
        Ok(intent)
    }
}
