use thiserror::Error;

/// Boxed error raised by a task, kept intact so callers can downcast it.
pub type TaskError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Context error: {0}")]
    ContextError(String),

    #[error("Task execution failed: {0}")]
    TaskExecutionFailed(String),

    #[error("Task {task_id} failed: {source}")]
    TaskFailed {
        task_id: String,
        #[source]
        source: TaskError,
    },

    #[error("Graph {0} has no start task")]
    NoStartTask(String),

    #[error("Step limit of {0} exceeded")]
    StepLimitExceeded(usize),
}

impl GraphError {
    /// Wrap a typed task error so it survives the trip through the graph.
    pub fn task_failed(
        task_id: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        GraphError::TaskFailed {
            task_id: task_id.into(),
            source: Box::new(source),
        }
    }

    /// Recover the original error of a failed task, if it has the requested type.
    pub fn into_task_error<E>(self) -> std::result::Result<E, GraphError>
    where
        E: std::error::Error + 'static,
    {
        match self {
            GraphError::TaskFailed { task_id, source } => match source.downcast::<E>() {
                Ok(typed) => Ok(*typed),
                Err(source) => Err(GraphError::TaskFailed { task_id, source }),
            },
            other => Err(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, GraphError>;
