use std::fmt;
use std::sync::Arc;

use graph_flow::{Context, Graph, GraphBuilder, GraphError, Task};
use tracing::{error, info};

use crate::catalog::{TitleCatalog, TrackCatalog};
use crate::classifier::IntentClassifier;
use crate::config::GenrePolicy;
use crate::error::{RecommendError, RecommendResult};
use crate::models::{Intent, Medium, Recommendation, RecommendationRequest};
use crate::tasks::*;

/// Lifecycle of one recommendation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Classified,
    ProviderSelected,
    Fetched,
    Normalized,
    Responded,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

pub fn build_recommendation_workflow(
    classifier: Arc<IntentClassifier>,
    titles: Arc<dyn TitleCatalog>,
    tracks: Arc<dyn TrackCatalog>,
    genre_policy: GenrePolicy,
) -> Graph {
    let classify_task = Arc::new(ClassifyIntentTask::new(classifier));
    let classify_id = classify_task.id().to_string();

    let select_task = Arc::new(SelectProviderTask::new(genre_policy));
    let select_id = select_task.id().to_string();

    let titles_task = Arc::new(SearchTitlesTask::new(titles));
    let titles_id = titles_task.id().to_string();

    let tracks_task = Arc::new(SearchTracksTask::new(tracks));
    let tracks_id = tracks_task.id().to_string();

    let normalize_task = Arc::new(NormalizeTask);
    let normalize_id = normalize_task.id().to_string();

    GraphBuilder::new("recommendation_flow")
        .add_task(classify_task)
        .add_task(select_task)
        .add_task(titles_task)
        .add_task(tracks_task)
        .add_task(normalize_task)
        .add_edge(&classify_id, &select_id)
        .add_conditional_edge(
            &select_id,
            |ctx| {
                ctx.get_sync::<CatalogQuery>(session_keys::CATALOG_QUERY)
                    .map(|query| query.is_track_search())
                    .unwrap_or(false)
            },
            &tracks_id,
            &titles_id,
        )
        .add_edge(&titles_id, &normalize_id)
        .add_edge(&tracks_id, &normalize_id)
        .set_start_task(&classify_id)
        .build()
}

/// What a successful run produced, before it is rendered for the caller.
#[derive(Debug, Clone)]
pub struct RecommendationOutcome {
    pub intent: Intent,
    pub recommendations: Vec<Recommendation>,
}

impl RecommendationOutcome {
    pub fn medium(&self) -> Medium {
        self.intent.medium
    }
}

/// Runs the recommendation graph for one request at a time; shared freely
/// between concurrent requests since each run gets its own context.
#[derive(Clone)]
pub struct Recommender {
    graph: Arc<Graph>,
}

impl Recommender {
    pub fn new(graph: Arc<Graph>) -> Self {
        Self { graph }
    }

    pub async fn recommend(
        &self,
        request: RecommendationRequest,
    ) -> RecommendResult<RecommendationOutcome> {
        info!(
            stage = %Stage::Received,
            input_length = request.raw_text.len(),
            forced_medium = ?request.forced_medium,
            "Recommendation request received"
        );

        let context = Context::new();
        context
            .set(session_keys::REQUEST, &request)
            .await
            .map_err(|e| RecommendError::Internal(e.to_string()))?;

        let execution = match self.graph.run(context.clone()).await {
            Ok(execution) => execution,
            Err(err) => {
                let err = recover_error(err);
                error!(stage = %Stage::Failed, kind = err.kind(), error = %err, "Recommendation failed");
                return Err(err);
            }
        };

        let intent: Intent = context
            .require(session_keys::INTENT)
            .await
            .map_err(|e| RecommendError::Internal(e.to_string()))?;
        let recommendations: Vec<Recommendation> = context
            .require(session_keys::RECOMMENDATIONS)
            .await
            .map_err(|e| RecommendError::Internal(e.to_string()))?;

        info!(
            stage = %Stage::Normalized,
            medium = %intent.medium,
            results = recommendations.len(),
            steps = execution.trail.len(),
            "Recommendation pipeline finished"
        );

        Ok(RecommendationOutcome {
            intent,
            recommendations,
        })
    }
}

/// Gets the typed error back out of a failed task; anything else is internal.
fn recover_error(err: GraphError) -> RecommendError {
    match err.into_task_error::<RecommendError>() {
        Ok(typed) => typed,
        Err(other) => RecommendError::Internal(other.to_string()),
    }
}
