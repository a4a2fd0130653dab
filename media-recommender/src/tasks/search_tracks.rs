use std::sync::Arc;

use async_trait::async_trait;
use graph_flow::{Context, GraphError, NextAction, Result, Task, TaskResult};
use tracing::info;

use super::{CatalogQuery, session_keys};
use crate::catalog::TrackCatalog;
use crate::normalize::NativeItems;
use crate::workflow::Stage;

/// ProviderSelected → Fetched, music branch.
pub struct SearchTracksTask {
    catalog: Arc<dyn TrackCatalog>,
}

impl SearchTracksTask {
    pub fn new(catalog: Arc<dyn TrackCatalog>) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl Task for SearchTracksTask {
    async fn run(&self, context: Context) -> Result<TaskResult> {
        let CatalogQuery::TrackSearch { query } =
            context.require::<CatalogQuery>(session_keys::CATALOG_QUERY).await?
        else {
            return Err(GraphError::TaskExecutionFailed(
                "title query routed to the track catalog".into(),
            ));
        };

        let tracks = self
            .catalog
            .search_tracks(&query)
            .await
            .map_err(|e| GraphError::task_failed(self.id(), e))?;

        info!(task_id = %self.id(), stage = %Stage::Fetched, results = tracks.len(), "Tracks fetched");
        context
            .set(session_keys::NATIVE_ITEMS, NativeItems::Tracks(tracks))
            .await?;

        Ok(TaskResult::new(None, NextAction::Continue))
    }
}
