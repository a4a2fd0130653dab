use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context as _, anyhow};

/// Instruction template used by the intent classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClassifierVariant {
    /// Ask for up to two short keyword strings.
    #[default]
    Keywords,
    /// Ask for genre names, later mapped to catalog genre ids.
    Genres,
}

impl FromStr for ClassifierVariant {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "keywords" => Ok(ClassifierVariant::Keywords),
            "genres" => Ok(ClassifierVariant::Genres),
            other => Err(anyhow!("unknown classifier variant '{other}'")),
        }
    }
}

/// How a genre-based movie/TV intent is sent to the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GenrePolicy {
    /// Use the genre-filtered discovery endpoint.
    #[default]
    Discover,
    /// Send the genre names through plain text search.
    Search,
}

impl FromStr for GenrePolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "discover" => Ok(GenrePolicy::Discover),
            "search" => Ok(GenrePolicy::Search),
            other => Err(anyhow!("unknown genre policy '{other}'")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: String,
    pub model: String,
    pub max_tokens: u64,
}

#[derive(Debug, Clone)]
pub struct TmdbConfig {
    pub api_key: Option<String>,
    pub base_url: String,
}

#[derive(Debug, Clone)]
pub struct SpotifyConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub api_base: String,
    pub token_url: String,
}

/// Service configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub tmdb: TmdbConfig,
    pub spotify: SpotifyConfig,
    pub classifier_variant: ClassifierVariant,
    pub genre_policy: GenrePolicy,
    pub http_timeout: Duration,
    pub port: u16,
    pub database_url: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_key = get("OPENROUTER_API_KEY").ok_or_else(|| anyhow!("OPENROUTER_API_KEY not set"))?;

        Ok(Self {
            llm: LlmConfig {
                api_key,
                model: get("LLM_MODEL").unwrap_or_else(|| "openai/gpt-4o-mini".to_string()),
                max_tokens: parse_or(get("CLASSIFIER_MAX_TOKENS"), "CLASSIFIER_MAX_TOKENS", 150)?,
            },
            tmdb: TmdbConfig {
                api_key: get("TMDB_API_KEY"),
                base_url: get("TMDB_BASE_URL")
                    .unwrap_or_else(|| "https://api.themoviedb.org/3".to_string()),
            },
            spotify: SpotifyConfig {
                client_id: get("SPOTIFY_CLIENT_ID"),
                client_secret: get("SPOTIFY_CLIENT_SECRET"),
                api_base: get("SPOTIFY_API_BASE")
                    .unwrap_or_else(|| "https://api.spotify.com/v1".to_string()),
                token_url: get("SPOTIFY_TOKEN_URL")
                    .unwrap_or_else(|| "https://accounts.spotify.com/api/token".to_string()),
            },
            classifier_variant: parse_or(
                get("CLASSIFIER_VARIANT"),
                "CLASSIFIER_VARIANT",
                ClassifierVariant::default(),
            )?,
            genre_policy: parse_or(get("GENRE_POLICY"), "GENRE_POLICY", GenrePolicy::default())?,
            http_timeout: Duration::from_secs(parse_or(
                get("HTTP_TIMEOUT_SECS"),
                "HTTP_TIMEOUT_SECS",
                10,
            )?),
            port: parse_or(get("PORT"), "PORT", 3000)?,
            database_url: get("DATABASE_URL"),
        })
    }
}

fn parse_or<T>(value: Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow!("{e}"))
            .with_context(|| format!("invalid value for {key}: '{raw}'")),
        None => Ok(default),
    }
}
