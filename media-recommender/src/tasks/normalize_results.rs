use async_trait::async_trait;
use graph_flow::{Context, NextAction, Result, Task, TaskResult};
use tracing::info;

use super::session_keys;
use crate::models::Intent;
use crate::normalize::{NativeItems, normalize};

/// Fetched → Normalized. Last task of the graph.
pub struct NormalizeTask;

#[async_trait]
impl Task for NormalizeTask {
    async fn run(&self, context: Context) -> Result<TaskResult> {
        let intent: Intent = context.require(session_keys::INTENT).await?;
        let items: NativeItems = context.require(session_keys::NATIVE_ITEMS).await?;

        let fetched = items.len();
        let recommendations = normalize(intent.medium, items);
        info!(
            task_id = %self.id(),
            fetched,
            kept = recommendations.len(),
            "Results normalized"
        );
        context
            .set(session_keys::RECOMMENDATIONS, recommendations)
            .await?;

        Ok(TaskResult::new(None, NextAction::End))
    }
}
