//! Outbound HTTP shared by every catalog provider: one bounded request, and
//! the retry policy used for the movie/TV provider.

use std::future::Future;
use std::time::Duration;

use reqwest::Method;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::RecommendError;

#[derive(Debug, Clone)]
pub enum Auth {
    Basic { user: String, password: String },
    Bearer(String),
}

#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub method: Method,
    pub url: String,
    pub auth: Option<Auth>,
    /// Url-encoded form fields, sent as the request body.
    pub form: Option<Vec<(String, String)>>,
}

impl FetchRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            url: url.into(),
            auth: None,
            form: None,
        }
    }

    pub fn post_form(url: impl Into<String>, fields: Vec<(String, String)>) -> Self {
        Self {
            method: Method::POST,
            url: url.into(),
            auth: None,
            form: Some(fields),
        }
    }

    pub fn auth(mut self, auth: Auth) -> Self {
        self.auth = Some(auth);
        self
    }
}

/// Why a single outbound call failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("connection reset: {0}")]
    ConnectionReset(String),
    #[error("upstream returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("request timed out")]
    Timeout,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("invalid response body: {0}")]
    Decode(String),
}

impl FetchError {
    pub fn is_connection_reset(&self) -> bool {
        matches!(self, FetchError::ConnectionReset(_))
    }

    pub fn into_recommend_error(self, target: &str) -> RecommendError {
        match self {
            FetchError::Timeout => RecommendError::Timeout(target.to_string()),
            FetchError::Status { status, message } => RecommendError::Network {
                status: Some(status),
                message: format!("{target}: {message}"),
            },
            other => RecommendError::Network {
                status: None,
                message: format!("{target}: {other}"),
            },
        }
    }
}

/// Retry only on connection reset, a fixed number of extra attempts with a
/// fixed pause between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            delay: Duration::from_millis(1500),
        }
    }
}

/// Runs `operation`, repeating it on connection reset as the policy allows.
/// Any other error, or the last reset, is returned as is.
pub async fn with_retry<T, F, Fut>(policy: RetryPolicy, mut operation: F) -> Result<T, FetchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_connection_reset() && attempt < policy.max_retries => {
                attempt += 1;
                warn!(
                    attempt,
                    max_retries = policy.max_retries,
                    error = %err,
                    "connection reset, retrying"
                );
                tokio::time::sleep(policy.delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Thin wrapper around a `reqwest::Client` with a per-call timeout.
#[derive(Clone)]
pub struct CatalogHttp {
    client: reqwest::Client,
}

impl CatalogHttp {
    pub fn new(timeout: Duration) -> Result<Self, RecommendError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RecommendError::Internal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// One attempt; non-2xx statuses become [`FetchError::Status`].
    pub async fn fetch(&self, request: FetchRequest) -> Result<Value, FetchError> {
        debug!(method = %request.method, url = %redact(&request.url), "outbound request");

        let mut builder = self.client.request(request.method, &request.url);
        builder = match request.auth {
            Some(Auth::Basic { user, password }) => builder.basic_auth(user, Some(password)),
            Some(Auth::Bearer(token)) => builder.bearer_auth(token),
            None => builder,
        };
        if let Some(fields) = &request.form {
            builder = builder.form(fields);
        }

        let response = builder.send().await.map_err(classify)?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(FetchError::Status {
                status: status.as_u16(),
                message,
            });
        }

        response.json::<Value>().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout
            } else {
                FetchError::Decode(e.without_url().to_string())
            }
        })
    }
}

/// The url is stripped from the message: it may carry an api key, and the
/// message can end up in a response body.
fn classify(err: reqwest::Error) -> FetchError {
    let err = err.without_url();
    if err.is_timeout() {
        FetchError::Timeout
    } else if is_connection_reset(&err) {
        FetchError::ConnectionReset(err.to_string())
    } else {
        FetchError::Transport(err.to_string())
    }
}

/// Walks the source chain looking for an I/O reset.
fn is_connection_reset(err: &(dyn std::error::Error + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(io) = e.downcast_ref::<std::io::Error>() {
            if io.kind() == std::io::ErrorKind::ConnectionReset {
                return true;
            }
        }
        let text = e.to_string().to_ascii_lowercase();
        if text.contains("connection reset") || text.contains("econnreset") {
            return true;
        }
        current = e.source();
    }
    false
}

/// Hides api keys before urls reach the logs.
fn redact(url: &str) -> String {
    match url.split_once('?') {
        Some((path, query)) => {
            let query = query
                .split('&')
                .map(|pair| {
                    if pair.starts_with("api_key=") {
                        "api_key=***"
                    } else {
                        pair
                    }
                })
                .collect::<Vec<_>>()
                .join("&");
            format!("{path}?{query}")
        }
        None => url.to_string(),
    }
}
