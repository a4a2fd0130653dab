use std::any::Any;
use std::sync::Arc;

use axum::{
    Router,
    extract::{
        Query, Request, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::{HeaderMap, HeaderValue, Method, StatusCode},
    middleware::{Next, from_fn},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::{Value, json};
use tower_http::{catch_panic::CatchPanicLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::{Instrument, error, info, warn};
use uuid::Uuid;

use crate::catalog::{CatalogHttp, SpotifyCatalog, TitleCatalog, TmdbCatalog, TrackCatalog};
use crate::classifier::{CompletionModel, IntentClassifier, RigCompletion};
use crate::config::AppConfig;
use crate::credentials::{ClientCredentialsExchange, ClientSecrets, CredentialCache};
use crate::error::{RecommendError, RecommendResult};
use crate::history::{HistoryStore, InMemoryHistoryStore, PostgresHistoryStore};
use crate::models::{
    FeedbackRequest, HistoryEntry, Medium, RecommendBody, RecommendResponse,
    RecommendationRequest,
};
use crate::workflow::{Recommender, Stage, build_recommendation_workflow};

/// Out-of-band medium hint, used when the body carries none.
pub const MEDIUM_HEADER: &str = "x-medium";
pub const CORRELATION_HEADER: &str = "x-correlation-id";

const DEFAULT_HISTORY_LIMIT: usize = 20;
const MAX_HISTORY_LIMIT: usize = 100;

#[derive(Clone)]
pub struct AppState {
    pub recommender: Recommender,
    pub history: Arc<dyn HistoryStore>,
}

impl AppState {
    /// Wires the pipeline from its collaborators.
    pub fn new(
        classifier: Arc<IntentClassifier>,
        titles: Arc<dyn TitleCatalog>,
        tracks: Arc<dyn TrackCatalog>,
        history: Arc<dyn HistoryStore>,
        genre_policy: crate::config::GenrePolicy,
    ) -> Self {
        let graph = build_recommendation_workflow(classifier, titles, tracks, genre_policy);
        Self {
            recommender: Recommender::new(Arc::new(graph)),
            history,
        }
    }
}

pub async fn create_app(config: &AppConfig) -> RecommendResult<Router> {
    let app_state = create_app_state(config).await?;
    Ok(build_router(app_state))
}

async fn create_app_state(config: &AppConfig) -> RecommendResult<AppState> {
    let http = CatalogHttp::new(config.http_timeout)?;

    let model: Arc<dyn CompletionModel> = Arc::new(RigCompletion::new(config.llm.clone()));
    let classifier = Arc::new(IntentClassifier::new(
        model,
        config.classifier_variant,
        config.http_timeout,
    ));

    let titles: Arc<dyn TitleCatalog> = Arc::new(TmdbCatalog::new(
        http.clone(),
        config.tmdb.api_key.clone(),
        &config.tmdb.base_url,
    ));

    let secrets = ClientSecrets::from_parts(
        config.spotify.client_id.clone(),
        config.spotify.client_secret.clone(),
    );
    if secrets.is_none() {
        warn!("SPOTIFY_CLIENT_ID / SPOTIFY_CLIENT_SECRET not set, song requests will fail");
    }
    let exchange = Arc::new(ClientCredentialsExchange::new(
        http.clone(),
        &config.spotify.token_url,
    ));
    let credentials = Arc::new(CredentialCache::new(secrets, exchange));
    let tracks: Arc<dyn TrackCatalog> = Arc::new(SpotifyCatalog::new(
        http,
        credentials,
        &config.spotify.api_base,
    ));

    let history = create_history_store(config).await;

    info!(
        classifier_variant = ?config.classifier_variant,
        genre_policy = ?config.genre_policy,
        "Recommendation pipeline configured"
    );

    Ok(AppState::new(
        classifier,
        titles,
        tracks,
        history,
        config.genre_policy,
    ))
}

async fn create_history_store(config: &AppConfig) -> Arc<dyn HistoryStore> {
    let Some(database_url) = &config.database_url else {
        info!("Using in-memory history store (set DATABASE_URL to use PostgreSQL)");
        return Arc::new(InMemoryHistoryStore::new());
    };

    match PostgresHistoryStore::connect(database_url).await {
        Ok(store) => {
            info!("Using PostgreSQL history store");
            Arc::new(store)
        }
        Err(e) => {
            error!(
                "Failed to connect to PostgreSQL: {}. Falling back to in-memory history.",
                e
            );
            Arc::new(InMemoryHistoryStore::new())
        }
    }
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/recommend", post(recommend).options(preflight))
        .route("/feedback", post(provide_feedback).options(preflight))
        .route("/history", get(list_history))
        .layer(from_fn(correlation_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(from_fn(preflight_no_content))
        .layer(CatchPanicLayer::custom(panic_response))
        .with_state(app_state)
}

/// Adds a correlation id header and wraps the request in a span carrying it.
async fn correlation_id_middleware(mut request: Request, next: Next) -> Response {
    let correlation_id = Uuid::new_v4().to_string();

    if let Ok(value) = HeaderValue::from_str(&correlation_id) {
        request.headers_mut().insert(CORRELATION_HEADER, value);
    }

    let span = tracing::info_span!("http_request", correlation_id = %correlation_id);
    next.run(request).instrument(span).await
}

/// The CORS layer answers OPTIONS itself with 200; callers expect 204.
async fn preflight_no_content(request: Request, next: Next) -> Response {
    let is_options = request.method() == Method::OPTIONS;
    let mut response = next.run(request).await;
    if is_options && response.status().is_success() {
        *response.status_mut() = StatusCode::NO_CONTENT;
    }
    response
}

fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let details = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    error!(%details, "handler panicked");

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "Internal server error", "details": details })),
    )
        .into_response()
}

async fn root() -> Json<Value> {
    Json(json!({
        "service": "Media Recommendation Service",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Classifies free-text requests and recommends movies, TV shows or songs",
        "endpoints": {
            "POST /recommend": "Recommend titles or tracks for { input, medium? }",
            "POST /feedback": "Record which recommendation was picked",
            "GET /history": "Most recent requests",
            "GET /health": "Health check"
        }
    }))
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn preflight() -> StatusCode {
    StatusCode::NO_CONTENT
}

fn invalid_body(rejection: JsonRejection) -> RecommendError {
    RecommendError::Validation(format!("Invalid request body: {}", rejection.body_text()))
}

/// Body field wins over the header; a blank hint means no hint.
fn medium_hint(body: Option<String>, headers: &HeaderMap) -> RecommendResult<Option<Medium>> {
    body.or_else(|| {
        headers
            .get(MEDIUM_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    })
    .filter(|hint| !hint.trim().is_empty())
    .map(|hint| hint.parse::<Medium>())
    .transpose()
}

async fn recommend(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<RecommendBody>, JsonRejection>,
) -> RecommendResult<Response> {
    let Json(body) = body.map_err(invalid_body)?;

    let forced_medium = medium_hint(body.medium, &headers)?;
    let request = RecommendationRequest::new(body.input.as_deref().unwrap_or_default(), forced_medium)?;
    let raw_text = request.raw_text.clone();

    let outcome = state.recommender.recommend(request).await?;

    let history_id = match state.history.record(outcome.medium(), &raw_text).await {
        Ok(entry) => Some(entry.id),
        Err(e) => {
            warn!(error = %e, "Failed to record history, responding anyway");
            None
        }
    };

    info!(
        stage = %Stage::Responded,
        medium = %outcome.medium(),
        results = outcome.recommendations.len(),
        "Responding"
    );

    if outcome.recommendations.is_empty() {
        return Ok(Json(json!({ "message": "No results found" })).into_response());
    }

    Ok(Json(RecommendResponse {
        medium: outcome.intent.medium,
        search_terms: outcome.intent.search_terms,
        recommendations: outcome.recommendations,
        history_id,
    })
    .into_response())
}

async fn provide_feedback(
    State(state): State<AppState>,
    body: Result<Json<FeedbackRequest>, JsonRejection>,
) -> RecommendResult<Json<HistoryEntry>> {
    let Json(feedback) = body.map_err(invalid_body)?;
    if feedback.picked_title.trim().is_empty() {
        return Err(RecommendError::Validation("picked_title cannot be empty".into()));
    }

    info!(history_id = %feedback.history_id, "Recording feedback");
    let entry = state.history.apply_feedback(&feedback).await?;
    Ok(Json(entry))
}

#[derive(Debug, Deserialize)]
struct HistoryParams {
    limit: Option<usize>,
}

async fn list_history(
    State(state): State<AppState>,
    params: Result<Query<HistoryParams>, QueryRejection>,
) -> RecommendResult<Json<Vec<HistoryEntry>>> {
    let Query(params) = params.map_err(|rejection| {
        RecommendError::Validation(format!("Invalid query string: {}", rejection.body_text()))
    })?;
    let limit = params
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT);
    Ok(Json(state.history.recent(limit).await?))
}
