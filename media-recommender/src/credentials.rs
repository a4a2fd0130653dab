use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::catalog::http::{Auth, CatalogHttp, FetchRequest};
use crate::error::RecommendError;

/// A token is treated as expired this long before its stated expiry.
pub const EXPIRY_SKEW: Duration = Duration::from_secs(60);

/// Lifetime assumed when the auth endpoint does not report one.
pub const DEFAULT_LIFETIME_SECS: u64 = 3600;

/// Reported lifetimes are capped at one day.
pub const MAX_LIFETIME_SECS: u64 = 86_400;

#[derive(Clone)]
pub struct ClientSecrets {
    pub client_id: String,
    pub client_secret: String,
}

impl ClientSecrets {
    /// Both values are required; either one missing means no secrets.
    pub fn from_parts(client_id: Option<String>, client_secret: Option<String>) -> Option<Self> {
        Some(Self {
            client_id: client_id?,
            client_secret: client_secret?,
        })
    }
}

impl std::fmt::Debug for ClientSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSecrets")
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

/// What the auth endpoint hands back.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

/// Client-credential token exchange against a provider's auth endpoint.
#[async_trait]
pub trait TokenExchange: Send + Sync {
    async fn exchange(&self, secrets: &ClientSecrets) -> Result<TokenGrant, RecommendError>;
}

/// Form POST with basic auth and `grant_type=client_credentials`.
pub struct ClientCredentialsExchange {
    http: CatalogHttp,
    token_url: String,
}

impl ClientCredentialsExchange {
    pub fn new(http: CatalogHttp, token_url: impl Into<String>) -> Self {
        Self {
            http,
            token_url: token_url.into(),
        }
    }
}

#[async_trait]
impl TokenExchange for ClientCredentialsExchange {
    async fn exchange(&self, secrets: &ClientSecrets) -> Result<TokenGrant, RecommendError> {
        let request = FetchRequest::post_form(
            &self.token_url,
            vec![("grant_type".to_string(), "client_credentials".to_string())],
        )
        .auth(Auth::Basic {
            user: secrets.client_id.clone(),
            password: secrets.client_secret.clone(),
        });

        let payload = self
            .http
            .fetch(request)
            .await
            .map_err(|e| e.into_recommend_error("token exchange"))?;

        serde_json::from_value(payload).map_err(|e| RecommendError::Network {
            status: None,
            message: format!("token exchange: unexpected response: {e}"),
        })
    }
}

#[derive(Debug, Clone)]
struct Credential {
    token: String,
    expires_at: Instant,
}

impl Credential {
    fn is_usable(&self, now: Instant) -> bool {
        now + EXPIRY_SKEW < self.expires_at
    }
}

/// Holds the current bearer token and refreshes it on demand.
///
/// Readers that find a usable token only take the read lock. Refreshes are
/// serialized by `refresh`, so concurrent callers that all see a stale token
/// end up sharing a single exchange.
pub struct CredentialCache {
    secrets: Option<ClientSecrets>,
    exchange: Arc<dyn TokenExchange>,
    current: RwLock<Option<Credential>>,
    refresh: Mutex<()>,
}

impl CredentialCache {
    pub fn new(secrets: Option<ClientSecrets>, exchange: Arc<dyn TokenExchange>) -> Self {
        Self {
            secrets,
            exchange,
            current: RwLock::new(None),
            refresh: Mutex::new(()),
        }
    }

    pub async fn get_token(&self) -> Result<String, RecommendError> {
        let secrets = self.secrets.as_ref().ok_or_else(|| {
            RecommendError::Credential("music provider client id/secret are not configured".into())
        })?;

        if let Some(token) = self.cached().await {
            return Ok(token);
        }

        let _guard = self.refresh.lock().await;

        // Another caller may have refreshed while we waited.
        if let Some(token) = self.cached().await {
            debug!("token refreshed by a concurrent caller");
            return Ok(token);
        }

        let grant = self.exchange.exchange(secrets).await?;
        let lifetime = grant
            .expires_in
            .unwrap_or(DEFAULT_LIFETIME_SECS)
            .min(MAX_LIFETIME_SECS);
        let credential = Credential {
            token: grant.access_token,
            expires_at: Instant::now() + Duration::from_secs(lifetime),
        };
        let token = credential.token.clone();
        *self.current.write().await = Some(credential);

        info!(lifetime_secs = lifetime, "music provider token refreshed");
        Ok(token)
    }

    async fn cached(&self) -> Option<String> {
        let current = self.current.read().await;
        current
            .as_ref()
            .filter(|credential| credential.is_usable(Instant::now()))
            .map(|credential| credential.token.clone())
    }
}
