use crate::cancel::CancelToken;
use crate::workspace::SharedWorkspace;
use async_trait::async_trait;
use gantry_core::{GantryResult, TaskKind, TaskResult};
use serde_json::Value;
use std::sync::Arc;

/// Internal sink used by [`ProgressReporter`] to route intermediate progress
/// through the owning supervisor's status pipeline.
#[async_trait]
pub(crate) trait StatusSink: Send + Sync {
    async fn report_progress(&self, progress: u8, message: &str, data: Value);
}

/// Handle a task body uses to publish intermediate progress.
///
/// Every report flows through the supervisor's status pipeline: snapshot
/// mutation, notifier broadcast, then the optional status hook.
#[derive(Clone)]
pub struct ProgressReporter {
    sink: Option<Arc<dyn StatusSink>>,
}

impl ProgressReporter {
    pub(crate) fn new(sink: Arc<dyn StatusSink>) -> Self {
        Self { sink: Some(sink) }
    }

    /// A reporter that discards all progress, for contexts built outside a
    /// supervisor (tests, ad-hoc execution).
    pub fn disabled() -> Self {
        Self { sink: None }
    }

    /// Publishes a progress update without changing the agent's state.
    pub async fn report(&self, progress: u8, message: &str) {
        self.report_with_data(progress, message, Value::Null).await;
    }

    /// Publishes a progress update with an attached payload.
    pub async fn report_with_data(&self, progress: u8, message: &str, data: Value) {
        if let Some(sink) = &self.sink {
            sink.report_progress(progress, message, data).await;
        }
    }
}

/// Everything a task body receives for one execution.
pub struct TaskContext {
    /// Unique id of this task execution.
    pub task_id: String,
    /// The kind of task requested.
    pub task_type: TaskKind,
    /// Caller-supplied parameters.
    pub parameters: Value,
    /// Shared workspace, present only under collaborative orchestration.
    pub workspace: Option<Arc<SharedWorkspace>>,
    /// Cooperative cancellation token. Task bodies MUST check this at bounded
    /// intervals (≤100 ms) during any wait; see [`CancelToken::sleep_checked`].
    pub cancel: CancelToken,
    /// Progress reporting handle.
    pub progress: ProgressReporter,
}

impl TaskContext {
    /// Builds a bare context for running a body outside a supervisor.
    pub fn detached(task_type: TaskKind, parameters: Value) -> Self {
        Self {
            task_id: uuid::Uuid::new_v4().to_string(),
            task_type,
            parameters,
            workspace: None,
            cancel: CancelToken::new(),
            progress: ProgressReporter::disabled(),
        }
    }
}

/// The single entry point each concrete agent kind supplies.
///
/// The supervisor only needs `execute` plus the declared capability list;
/// everything platform-specific lives behind this trait.
#[async_trait]
pub trait TaskBody: Send + Sync {
    /// The task kinds this body can execute, as stable capability names.
    fn capabilities(&self) -> Vec<&'static str>;

    /// Executes one task to completion, failure, or cancellation.
    async fn execute(&self, ctx: &TaskContext) -> GantryResult<TaskResult>;
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_reporter_is_silent() {
        let reporter = ProgressReporter::disabled();
        // Must not panic or block.
        reporter.report(50, "halfway").await;
    }

    #[test]
    fn test_detached_context_has_fresh_token() {
        let ctx = TaskContext::detached(TaskKind::Analyze, Value::Null);
        assert!(!ctx.cancel.is_stopped());
        assert!(ctx.workspace.is_none());
        assert!(!ctx.task_id.is_empty());
    }
}
