//! Model configuration.

use std::fmt;
use std::sync::Arc;

use crate::task::{Executor, TaskQueue};

/// Configuration for creating a [`Model`](crate::Model).
///
/// Usually assembled through [`ModelBuilder`](crate::ModelBuilder).
#[derive(Clone)]
pub struct ModelConfig {
    /// Name used in log output. `None` logs the model anonymously.
    pub name: Option<String>,
    /// Reject unknown property names and unknown listener ids instead of
    /// silently creating or ignoring them.
    pub strict: bool,
    /// Where combinator flushes are posted.
    pub executor: Arc<dyn Executor>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: None,
            strict: false,
            executor: Arc::new(TaskQueue::global().clone()),
        }
    }
}

impl ModelConfig {
    /// Create a permissive configuration that flushes on `queue`.
    pub fn with_queue(queue: &TaskQueue) -> Self {
        Self {
            executor: Arc::new(queue.clone()),
            ..Default::default()
        }
    }
}

impl fmt::Debug for ModelConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelConfig")
            .field("name", &self.name)
            .field("strict", &self.strict)
            .finish_non_exhaustive()
    }
}
