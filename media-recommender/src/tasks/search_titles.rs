use std::sync::Arc;

use async_trait::async_trait;
use graph_flow::{Context, GraphError, NextAction, Result, Task, TaskResult};
use tracing::info;

use super::{CatalogQuery, session_keys};
use crate::catalog::TitleCatalog;
use crate::normalize::NativeItems;
use crate::workflow::Stage;

/// ProviderSelected → Fetched, movie/TV branch.
pub struct SearchTitlesTask {
    catalog: Arc<dyn TitleCatalog>,
}

impl SearchTitlesTask {
    pub fn new(catalog: Arc<dyn TitleCatalog>) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl Task for SearchTitlesTask {
    async fn run(&self, context: Context) -> Result<TaskResult> {
        let query: CatalogQuery = context.require(session_keys::CATALOG_QUERY).await?;

        let items = match &query {
            CatalogQuery::TitleSearch { title_kind, query } => {
                self.catalog.search(*title_kind, query).await
            }
            CatalogQuery::TitleDiscover {
                title_kind,
                genre_ids,
            } => self.catalog.discover(*title_kind, genre_ids).await,
            CatalogQuery::TrackSearch { .. } => {
                return Err(GraphError::TaskExecutionFailed(
                    "track query routed to the title catalog".into(),
                ));
            }
        }
        .map_err(|e| GraphError::task_failed(self.id(), e))?;

        info!(task_id = %self.id(), stage = %Stage::Fetched, results = items.len(), "Titles fetched");
        context
            .set(session_keys::NATIVE_ITEMS, NativeItems::Titles(items))
            .await?;

        Ok(TaskResult::new(None, NextAction::Continue))
    }
}
