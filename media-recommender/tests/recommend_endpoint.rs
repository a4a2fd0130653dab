use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode},
};
use serde_json::{Value, json};
use tower::ServiceExt;

use media_recommender::catalog::{
    CatalogHttp, SpotifyCatalog, SpotifyTrack, TitleCatalog, TitleKind, TmdbItem, TrackCatalog,
};
use media_recommender::classifier::{CompletionModel, IntentClassifier};
use media_recommender::config::{ClassifierVariant, GenrePolicy};
use media_recommender::credentials::{ClientSecrets, CredentialCache, TokenExchange, TokenGrant};
use media_recommender::history::InMemoryHistoryStore;
use media_recommender::{AppState, RecommendError, build_router};

struct StubCompletion {
    reply: String,
    calls: AtomicUsize,
}

#[async_trait]
impl CompletionModel for StubCompletion {
    async fn complete(&self, _instructions: &str, _input: &str) -> anyhow::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.reply.clone())
    }
}

/// Never answers within the classifier timeout.
struct StalledCompletion;

#[async_trait]
impl CompletionModel for StalledCompletion {
    async fn complete(&self, _instructions: &str, _input: &str) -> anyhow::Result<String> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(r#"{"medium":"movie","search_terms":["late"]}"#.to_string())
    }
}

#[derive(Default)]
struct StubTitles {
    items: Vec<TmdbItem>,
    queries: Mutex<Vec<String>>,
}

#[async_trait]
impl TitleCatalog for StubTitles {
    async fn search(&self, kind: TitleKind, query: &str) -> Result<Vec<TmdbItem>, RecommendError> {
        self.queries
            .lock()
            .unwrap()
            .push(format!("{}:{query}", kind.path()));
        Ok(self.items.clone())
    }

    async fn discover(
        &self,
        kind: TitleKind,
        genre_ids: &[u32],
    ) -> Result<Vec<TmdbItem>, RecommendError> {
        self.queries
            .lock()
            .unwrap()
            .push(format!("{}:discover:{genre_ids:?}", kind.path()));
        Ok(self.items.clone())
    }
}

#[derive(Default)]
struct StubTracks {
    calls: AtomicUsize,
}

#[async_trait]
impl TrackCatalog for StubTracks {
    async fn search_tracks(&self, _query: &str) -> Result<Vec<SpotifyTrack>, RecommendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Vec::new())
    }
}

#[derive(Default)]
struct CountingExchange {
    calls: AtomicUsize,
}

#[async_trait]
impl TokenExchange for CountingExchange {
    async fn exchange(&self, _secrets: &ClientSecrets) -> Result<TokenGrant, RecommendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(TokenGrant {
            access_token: "unused".to_string(),
            expires_in: Some(3600),
        })
    }
}

struct Harness {
    router: Router,
    completion: Arc<StubCompletion>,
    titles: Arc<StubTitles>,
    tracks: Arc<StubTracks>,
}

fn harness(reply: &str, items: Vec<TmdbItem>) -> Harness {
    let completion = Arc::new(StubCompletion {
        reply: reply.to_string(),
        calls: AtomicUsize::new(0),
    });
    let titles = Arc::new(StubTitles {
        items,
        ..Default::default()
    });
    let tracks = Arc::new(StubTracks::default());
    let router = router_with(
        completion.clone(),
        Duration::from_secs(5),
        titles.clone(),
        tracks.clone(),
    );
    Harness {
        router,
        completion,
        titles,
        tracks,
    }
}

fn router_with(
    completion: Arc<dyn CompletionModel>,
    classifier_timeout: Duration,
    titles: Arc<dyn TitleCatalog>,
    tracks: Arc<dyn TrackCatalog>,
) -> Router {
    let classifier = Arc::new(IntentClassifier::new(
        completion,
        ClassifierVariant::Keywords,
        classifier_timeout,
    ));
    let state = AppState::new(
        classifier,
        titles,
        tracks,
        Arc::new(InMemoryHistoryStore::new()),
        GenrePolicy::Discover,
    );
    build_router(state)
}

fn movie(id: u64, title: &str) -> TmdbItem {
    TmdbItem {
        id: Some(id),
        title: Some(title.to_string()),
        overview: Some(format!("{title} overview")),
        poster_path: Some(format!("/{id}.jpg")),
        release_date: Some("2010-07-16".to_string()),
        vote_average: Some(8.1),
        ..Default::default()
    }
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, bytes.to_vec())
}

async fn send_json(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let (status, bytes) = send(router, request).await;
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn classified_movie_request_returns_normalized_items() {
    let h = harness(
        r#"{"medium":"movie","search_terms":["comedy","action"]}"#,
        vec![movie(1, "Rush Hour"), movie(2, "Hot Fuzz")],
    );

    let (status, body) = send_json(
        &h.router,
        post_json("/recommend", json!({ "input": "a funny action movie" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["medium"], "movie");
    assert_eq!(body["search_terms"], json!(["comedy", "action"]));
    let items = body["recommendations"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["title"], "Rush Hour");
    assert_eq!(
        items[0]["image_url"],
        "https://image.tmdb.org/t/p/w500/1.jpg"
    );
    assert!(body["history_id"].is_string());
    assert_eq!(
        h.titles.queries.lock().unwrap().as_slice(),
        ["movie:comedy action"]
    );
}

#[tokio::test]
async fn empty_input_is_rejected_without_outbound_calls() {
    let h = harness(r#"{"medium":"movie","search_terms":["x"]}"#, vec![movie(1, "X")]);

    let (status, body) =
        send_json(&h.router, post_json("/recommend", json!({ "input": "" }))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "No input provided" }));
    assert_eq!(h.completion.calls.load(Ordering::SeqCst), 0);
    assert!(h.titles.queries.lock().unwrap().is_empty());
    assert_eq!(h.tracks.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn malformed_completion_searches_raw_text_as_movie() {
    let h = harness("I think they'd enjoy a comedy!", vec![movie(7, "Heat")]);

    let (status, body) = send_json(
        &h.router,
        post_json("/recommend", json!({ "input": "something for tonight" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["medium"], "movie");
    assert_eq!(body["search_terms"], json!(["something for tonight"]));
    assert_eq!(
        h.titles.queries.lock().unwrap().as_slice(),
        ["movie:something for tonight"]
    );
}

#[tokio::test]
async fn empty_catalog_result_reports_no_results() {
    let h = harness(r#"{"medium":"tv","search_terms":["obscure"]}"#, Vec::new());

    let (status, body) = send_json(
        &h.router,
        post_json("/recommend", json!({ "input": "an obscure show" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "message": "No results found" }));
    assert_eq!(h.titles.queries.lock().unwrap().as_slice(), ["tv:obscure"]);
}

#[tokio::test]
async fn song_without_secrets_is_a_credential_error() {
    let completion = Arc::new(StubCompletion {
        reply: r#"{"medium":"song","search_terms":["jazz"]}"#.to_string(),
        calls: AtomicUsize::new(0),
    });
    let exchange = Arc::new(CountingExchange::default());
    let credentials = Arc::new(CredentialCache::new(None, exchange.clone()));
    let http = CatalogHttp::new(Duration::from_secs(1)).unwrap();
    let tracks = Arc::new(SpotifyCatalog::new(http, credentials, "http://127.0.0.1:9"));
    let router = router_with(
        completion,
        Duration::from_secs(5),
        Arc::new(StubTitles::default()),
        tracks,
    );

    let (status, body) = send_json(
        &router,
        post_json("/recommend", json!({ "input": "some smooth jazz" })),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "CredentialError");
    assert_eq!(exchange.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn medium_header_forces_the_medium() {
    let h = harness(r#"{"medium":"movie","search_terms":["space"]}"#, vec![movie(3, "Cosmos")]);

    let request = Request::builder()
        .method(Method::POST)
        .uri("/recommend")
        .header("content-type", "application/json")
        .header("x-medium", "tv")
        .body(Body::from(json!({ "input": "space documentaries" }).to_string()))
        .unwrap();
    let (status, body) = send_json(&h.router, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["medium"], "tv");
    assert_eq!(h.titles.queries.lock().unwrap().as_slice(), ["tv:space"]);
}

#[tokio::test]
async fn unknown_medium_hint_is_rejected() {
    let h = harness(r#"{"medium":"movie","search_terms":["x"]}"#, Vec::new());

    let (status, _) = send_json(
        &h.router,
        post_json("/recommend", json!({ "input": "anything", "medium": "podcast" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(h.completion.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn malformed_json_is_a_bad_request() {
    let h = harness(r#"{"medium":"movie","search_terms":["x"]}"#, Vec::new());

    let request = Request::builder()
        .method(Method::POST)
        .uri("/recommend")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = send_json(&h.router, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().starts_with("Invalid request body"));
}

#[tokio::test]
async fn options_is_no_content_and_get_is_not_allowed() {
    let h = harness(r#"{"medium":"movie","search_terms":["x"]}"#, Vec::new());

    let options = Request::builder()
        .method(Method::OPTIONS)
        .uri("/recommend")
        .body(Body::empty())
        .unwrap();
    let (status, bytes) = send(&h.router, options).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(bytes.is_empty());

    let get = Request::builder()
        .method(Method::GET)
        .uri("/recommend")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&h.router, get).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(h.completion.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn feedback_is_recorded_once_and_listed_in_history() {
    let h = harness(
        r#"{"medium":"movie","search_terms":["heist"]}"#,
        vec![movie(11, "Inside Man")],
    );

    let (_, body) = send_json(
        &h.router,
        post_json("/recommend", json!({ "input": "a clever heist" })),
    )
    .await;
    let history_id = body["history_id"].as_str().unwrap().to_string();

    let feedback = json!({
        "history_id": history_id,
        "picked_title": "Inside Man",
        "picked_id": "11",
        "picked_medium": "movie"
    });
    let (status, entry) = send_json(&h.router, post_json("/feedback", feedback.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(entry["picked_title"], "Inside Man");
    assert_eq!(entry["type"], "movie");

    let (status, _) = send_json(&h.router, post_json("/feedback", feedback)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let unknown = json!({
        "history_id": uuid::Uuid::new_v4(),
        "picked_title": "Heat"
    });
    let (status, _) = send_json(&h.router, post_json("/feedback", unknown)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let history = Request::builder()
        .uri("/history?limit=5")
        .body(Body::empty())
        .unwrap();
    let (status, entries) = send_json(&h.router, history).await;
    assert_eq!(status, StatusCode::OK);
    let entries = entries.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["query"], "a clever heist");
}

#[tokio::test]
async fn health_reports_healthy() {
    let h = harness(r#"{"medium":"movie","search_terms":["x"]}"#, Vec::new());
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, body) = send_json(&h.router, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn stalled_completion_is_a_gateway_timeout() {
    let titles = Arc::new(StubTitles::default());
    let router = router_with(
        Arc::new(StalledCompletion),
        Duration::from_millis(20),
        titles.clone(),
        Arc::new(StubTracks::default()),
    );

    let (status, body) = send_json(
        &router,
        post_json("/recommend", json!({ "input": "a slow night in" })),
    )
    .await;

    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(body["error"], "TimeoutError");
    assert!(titles.queries.lock().unwrap().is_empty());
}

#[tokio::test]
async fn bad_history_limit_is_a_json_bad_request() {
    let h = harness(r#"{"medium":"movie","search_terms":["x"]}"#, Vec::new());

    let request = Request::builder()
        .uri("/history?limit=abc")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send_json(&h.router, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(
        body["error"]
            .as_str()
            .unwrap()
            .starts_with("Invalid query string")
    );
}
