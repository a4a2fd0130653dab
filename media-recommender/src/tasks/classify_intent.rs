use std::sync::Arc;

use async_trait::async_trait;
use graph_flow::{Context, GraphError, NextAction, Result, Task, TaskResult};
use tracing::info;

use super::session_keys;
use crate::classifier::IntentClassifier;
use crate::models::RecommendationRequest;
use crate::workflow::Stage;

/// Received → Classified.
pub struct ClassifyIntentTask {
    classifier: Arc<IntentClassifier>,
}

impl ClassifyIntentTask {
    pub fn new(classifier: Arc<IntentClassifier>) -> Self {
        Self { classifier }
    }
}

#[async_trait]
impl Task for ClassifyIntentTask {
    async fn run(&self, context: Context) -> Result<TaskResult> {
        let request: RecommendationRequest = context.require(session_keys::REQUEST).await?;

        info!(
            task_id = %self.id(),
            variant = ?self.classifier.variant(),
            "Starting intent classification"
        );

        let intent = self
            .classifier
            .classify(&request)
            .await
            .map_err(|e| GraphError::task_failed(self.id(), e))?;

        info!(task_id = %self.id(), stage = %Stage::Classified, medium = %intent.medium, "Intent classified");
        let status = format!("classified as {}", intent.medium);
        context.set(session_keys::INTENT, intent).await?;

        Ok(TaskResult::new_with_status(
            None,
            NextAction::Continue,
            Some(status),
        ))
    }
}
