use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use crate::{
    context::Context,
    error::{GraphError, Result},
    task::{NextAction, Task, TaskResult},
};

/// Type alias for edge condition functions
pub type EdgeCondition = Arc<dyn Fn(&Context) -> bool + Send + Sync>;

/// Upper bound on task executions per run, so a cyclic graph cannot spin forever.
pub const DEFAULT_MAX_STEPS: usize = 64;

/// Edge between tasks in the graph
#[derive(Clone)]
pub enum Edge {
    Direct {
        from: String,
        to: String,
    },
    /// Goes to `yes` when the condition holds, `no` otherwise.
    Conditional {
        from: String,
        condition: EdgeCondition,
        yes: String,
        no: String,
    },
}

impl Edge {
    fn from(&self) -> &str {
        match self {
            Edge::Direct { from, .. } | Edge::Conditional { from, .. } => from,
        }
    }

    fn target(&self, context: &Context) -> &str {
        match self {
            Edge::Direct { to, .. } => to,
            Edge::Conditional {
                condition, yes, no, ..
            } => {
                if condition(context) {
                    yes
                } else {
                    no
                }
            }
        }
    }
}

/// A graph of tasks that can be executed
pub struct Graph {
    pub id: String,
    tasks: HashMap<String, Arc<dyn Task>>,
    edges: Vec<Edge>,
    start_task_id: Option<String>,
    max_steps: usize,
}

impl Graph {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tasks: HashMap::new(),
            edges: Vec::new(),
            start_task_id: None,
            max_steps: DEFAULT_MAX_STEPS,
        }
    }

    /// Execute the graph from its start task until a task ends the run
    /// or no outgoing edge is left.
    pub async fn run(&self, context: Context) -> Result<ExecutionResult> {
        let start = self
            .start_task_id
            .clone()
            .ok_or_else(|| GraphError::NoStartTask(self.id.clone()))?;
        self.execute(&start, context).await
    }

    /// Execute the graph starting from a specific task
    pub async fn execute(&self, task_id: &str, context: Context) -> Result<ExecutionResult> {
        let mut current = task_id.to_string();
        let mut trail = Vec::new();

        loop {
            if trail.len() >= self.max_steps {
                return Err(GraphError::StepLimitExceeded(self.max_steps));
            }

            let result = self.execute_single_task(&current, context.clone()).await?;
            trail.push(current.clone());

            if let Some(status) = &result.status_message {
                debug!(graph = %self.id, task = %current, status = %status, "task status");
            }

            let next = match &result.next_action {
                NextAction::Continue => self.find_next_task(&current, &context),
                NextAction::GoTo(target) => {
                    if !self.tasks.contains_key(target) {
                        return Err(GraphError::TaskNotFound(target.clone()));
                    }
                    Some(target.clone())
                }
                NextAction::End => None,
            };

            match next {
                Some(next_task_id) => current = next_task_id,
                None => {
                    info!(graph = %self.id, steps = trail.len(), "graph run finished");
                    return Ok(ExecutionResult {
                        response: result.response,
                        status_message: result.status_message,
                        trail,
                    });
                }
            }
        }
    }

    /// Execute a single task without following its next action
    async fn execute_single_task(&self, task_id: &str, context: Context) -> Result<TaskResult> {
        let task = self
            .tasks
            .get(task_id)
            .ok_or_else(|| GraphError::TaskNotFound(task_id.to_string()))?;

        debug!(graph = %self.id, task = %task_id, "running task");
        let mut result = task.run(context).await?;
        result.task_id = task_id.to_string();

        Ok(result)
    }

    /// Find the next task based on edges and conditions. The first edge
    /// leaving `current_task_id` wins.
    pub fn find_next_task(&self, current_task_id: &str, context: &Context) -> Option<String> {
        self.edges
            .iter()
            .find(|edge| edge.from() == current_task_id)
            .map(|edge| edge.target(context).to_string())
    }
}

/// Builder for creating graphs
pub struct GraphBuilder {
    graph: Graph,
}

impl GraphBuilder {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            graph: Graph::new(id),
        }
    }

    /// Add a task; the first task added becomes the start task.
    pub fn add_task(mut self, task: Arc<dyn Task>) -> Self {
        let task_id = task.id().to_string();
        if self.graph.start_task_id.is_none() {
            self.graph.start_task_id = Some(task_id.clone());
        }
        self.graph.tasks.insert(task_id, task);
        self
    }

    pub fn add_edge(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.graph.edges.push(Edge::Direct {
            from: from.into(),
            to: to.into(),
        });
        self
    }

    pub fn add_conditional_edge<F>(
        mut self,
        from: impl Into<String>,
        condition: F,
        yes: impl Into<String>,
        no: impl Into<String>,
    ) -> Self
    where
        F: Fn(&Context) -> bool + Send + Sync + 'static,
    {
        self.graph.edges.push(Edge::Conditional {
            from: from.into(),
            condition: Arc::new(condition),
            yes: yes.into(),
            no: no.into(),
        });
        self
    }

    pub fn set_start_task(mut self, task_id: impl Into<String>) -> Self {
        let task_id = task_id.into();
        if self.graph.tasks.contains_key(&task_id) {
            self.graph.start_task_id = Some(task_id);
        }
        self
    }

    pub fn max_steps(mut self, max_steps: usize) -> Self {
        self.graph.max_steps = max_steps;
        self
    }

    pub fn build(self) -> Graph {
        self.graph
    }
}

/// Outcome of a completed graph run
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    /// Response of the last task that ran
    pub response: Option<String>,
    pub status_message: Option<String>,
    /// Ids of the tasks that ran, in order
    pub trail: Vec<String>,
}
