use crate::cancel::CancelToken;
use crate::task::{ProgressReporter, StatusSink, TaskBody, TaskContext};
use crate::workspace::SharedWorkspace;
use async_trait::async_trait;
use gantry_core::{
    AgentKind, AgentState, GantryError, GantryResult, StatusUpdate, TaskKind, TaskResult,
};
use gantry_notify::EventNotifier;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Optional caller-supplied hook invoked after every status broadcast.
///
/// Hook failures are logged and swallowed so a broken observer can never
/// break the agent pipeline.
#[async_trait]
pub trait StatusHook: Send + Sync {
    /// Called with each status update, after the notifier broadcast.
    async fn on_status(&self, update: StatusUpdate) -> GantryResult<()>;
}

/// A snapshot of an agent's current status. Never blocks on the running task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentStatus {
    /// Caller-assigned agent id.
    pub agent_id: String,
    /// The agent's platform kind.
    pub agent_kind: AgentKind,
    /// Current lifecycle state.
    pub state: AgentState,
    /// Progress of the current or last task, 0–100.
    pub progress: u8,
    /// Last progress message.
    pub message: String,
    /// Last captured task error; empty when none.
    pub last_error: String,
    /// Whether a task is currently executing.
    pub is_running: bool,
    /// Id of the in-flight task; `None` when idle.
    pub current_task_id: Option<String>,
    /// The agent's configuration, as given at construction.
    pub config: Value,
    /// Capability names declared by the task body.
    pub capabilities: Vec<String>,
}

#[derive(Debug, Default)]
struct Snapshot {
    state: Option<AgentState>,
    progress: u8,
    message: String,
    last_error: String,
    current_task_id: Option<String>,
    last_result: Option<TaskResult>,
}

struct SupervisorInner {
    agent_id: String,
    kind: AgentKind,
    config: Value,
    snapshot: RwLock<Snapshot>,
    running: AtomicBool,
    should_stop: Arc<AtomicBool>,
    notifier: Arc<EventNotifier>,
    hook: RwLock<Option<Arc<dyn StatusHook>>>,
}

impl SupervisorInner {
    /// Mutate local state, broadcast, then invoke the hook (errors swallowed).
    async fn update_status(&self, state: AgentState, progress: u8, message: &str, data: Value) {
        {
            let mut snap = self.snapshot.write();
            snap.state = Some(state);
            snap.progress = progress.min(100);
            snap.message = message.to_string();
        }

        let update =
            StatusUpdate::new(&self.agent_id, state, progress, message).with_data(data);
        self.notifier.broadcast(update.clone()).await;

        let hook = self.hook.read().clone();
        if let Some(hook) = hook {
            if let Err(e) = hook.on_status(update).await {
                warn!(
                    agent_id = %self.agent_id,
                    error = %e,
                    "Status hook failed; continuing"
                );
            }
        }

        debug!(
            agent_id = %self.agent_id,
            status = %state,
            progress,
            "{message}"
        );
    }
}

#[async_trait]
impl StatusSink for SupervisorInner {
    async fn report_progress(&self, progress: u8, message: &str, data: Value) {
        let state = self.snapshot.read().state.unwrap_or(AgentState::Running);
        self.update_status(state, progress, message, data).await;
    }
}

/// Clears the running flag and task id on every exit path out of `start`,
/// including panics unwinding out of the task body.
struct RunningGuard {
    inner: Arc<SupervisorInner>,
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.inner.snapshot.write().current_task_id = None;
        self.inner.running.store(false, Ordering::SeqCst);
    }
}

/// Lifecycle supervisor wrapping one agent's task execution.
///
/// Executes exactly one task body per [`Supervisor::start`] call, reports
/// progress through the event notifier, supports cooperative cancellation,
/// and guarantees terminal-state reporting on success, failure, and stop.
///
/// No hard deadline is enforced here; callers wanting one should wrap
/// `start` in `tokio::time::timeout`.
pub struct Supervisor {
    inner: Arc<SupervisorInner>,
    body: Arc<dyn TaskBody>,
}

impl Supervisor {
    /// Creates an idle supervisor around the given task body.
    pub fn new(
        agent_id: impl Into<String>,
        kind: AgentKind,
        config: Value,
        body: Box<dyn TaskBody>,
        notifier: Arc<EventNotifier>,
    ) -> Self {
        let agent_id = agent_id.into();
        info!(agent_id = %agent_id, kind = %kind, "Initialized agent supervisor");
        Self {
            inner: Arc::new(SupervisorInner {
                agent_id,
                kind,
                config,
                snapshot: RwLock::new(Snapshot {
                    state: Some(AgentState::Idle),
                    ..Snapshot::default()
                }),
                running: AtomicBool::new(false),
                should_stop: Arc::new(AtomicBool::new(false)),
                notifier,
                hook: RwLock::new(None),
            }),
            body: Arc::from(body),
        }
    }

    /// Registers the optional status-change hook.
    pub fn set_status_hook(&self, hook: Arc<dyn StatusHook>) {
        *self.inner.hook.write() = Some(hook);
    }

    /// The caller-assigned agent id.
    pub fn agent_id(&self) -> &str {
        &self.inner.agent_id
    }

    /// The agent's platform kind.
    pub fn kind(&self) -> AgentKind {
        self.inner.kind
    }

    /// Starts the task body. See [`Supervisor::start_with_workspace`].
    pub async fn start(&self, task_type: TaskKind, parameters: Value) -> GantryResult<String> {
        self.start_with_workspace(task_type, parameters, None).await
    }

    /// Executes one task, optionally under a collaborative workspace.
    ///
    /// Fails with `AlreadyRunning` if a task is active, leaving the live task
    /// untouched. Otherwise emits Running/0%, runs the body, and finishes
    /// with exactly one terminal update: Completed/100% on success, Idle/0%
    /// when a stop was requested, or Error at the last known progress on
    /// failure (which is also returned to the caller). The running flag and
    /// task id are always cleared before this method returns.
    pub async fn start_with_workspace(
        &self,
        task_type: TaskKind,
        parameters: Value,
        workspace: Option<Arc<SharedWorkspace>>,
    ) -> GantryResult<String> {
        if self
            .inner
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(GantryError::AlreadyRunning(self.inner.agent_id.clone()));
        }

        // From here the guard owns cleanup, whatever the body does.
        let _guard = RunningGuard {
            inner: Arc::clone(&self.inner),
        };

        let task_id = Uuid::new_v4().to_string();
        self.inner.should_stop.store(false, Ordering::SeqCst);
        {
            let mut snap = self.inner.snapshot.write();
            snap.current_task_id = Some(task_id.clone());
            snap.last_result = None;
        }

        self.inner
            .update_status(
                AgentState::Running,
                0,
                &format!("Starting {task_type}"),
                Value::Null,
            )
            .await;
        info!(
            agent_id = %self.inner.agent_id,
            task_id = %task_id,
            task = %task_type,
            "Task accepted"
        );

        let ctx = TaskContext {
            task_id: task_id.clone(),
            task_type: task_type.clone(),
            parameters,
            workspace,
            cancel: CancelToken::from_flag(Arc::clone(&self.inner.should_stop)),
            progress: ProgressReporter::new(
                Arc::clone(&self.inner) as Arc<dyn StatusSink>
            ),
        };

        match self.body.execute(&ctx).await {
            Ok(result) => {
                if self.inner.should_stop.load(Ordering::SeqCst) {
                    self.inner
                        .update_status(AgentState::Idle, 0, "Task stopped by operator", Value::Null)
                        .await;
                    info!(agent_id = %self.inner.agent_id, "Task stopped by operator");
                } else {
                    self.inner.snapshot.write().last_result = Some(result);
                    self.inner
                        .update_status(
                            AgentState::Completed,
                            100,
                            "Task completed successfully",
                            Value::Null,
                        )
                        .await;
                    info!(
                        agent_id = %self.inner.agent_id,
                        task = %task_type,
                        "Task completed"
                    );
                }
                Ok(task_id)
            }
            Err(GantryError::TaskCancelled(reason)) => {
                self.inner
                    .update_status(AgentState::Idle, 0, "Task stopped by operator", Value::Null)
                    .await;
                info!(
                    agent_id = %self.inner.agent_id,
                    reason = %reason,
                    "Task cancelled mid-flight"
                );
                Err(GantryError::TaskCancelled(reason))
            }
            Err(e) => {
                let error_msg = format!("Task failed: {e}");
                let progress = {
                    let mut snap = self.inner.snapshot.write();
                    snap.last_error = error_msg.clone();
                    snap.progress
                };
                self.inner
                    .update_status(AgentState::Error, progress, &error_msg, Value::Null)
                    .await;
                error!(agent_id = %self.inner.agent_id, error = %e, "Task failed");
                Err(e)
            }
        }
    }

    /// Requests a cooperative stop of the running task.
    ///
    /// No-op with a warning when nothing is running. Does not forcibly
    /// terminate the body; the body observes the flag at its next check.
    pub async fn stop(&self) {
        if !self.inner.running.load(Ordering::SeqCst) {
            warn!(agent_id = %self.inner.agent_id, "Stop requested but agent is not running");
            return;
        }

        info!(agent_id = %self.inner.agent_id, "Stopping agent");
        self.inner.should_stop.store(true, Ordering::SeqCst);
        let progress = self.inner.snapshot.read().progress;
        self.inner
            .update_status(AgentState::Idle, progress, "Stopping...", Value::Null)
            .await;
    }

    /// Current status snapshot. Never blocks on the running task.
    pub fn status(&self) -> AgentStatus {
        let snap = self.inner.snapshot.read();
        AgentStatus {
            agent_id: self.inner.agent_id.clone(),
            agent_kind: self.inner.kind,
            state: snap.state.unwrap_or(AgentState::Idle),
            progress: snap.progress,
            message: snap.message.clone(),
            last_error: snap.last_error.clone(),
            is_running: self.inner.running.load(Ordering::SeqCst),
            current_task_id: snap.current_task_id.clone(),
            config: self.inner.config.clone(),
            capabilities: self
                .body
                .capabilities()
                .iter()
                .map(|c| (*c).to_string())
                .collect(),
        }
    }

    /// The result of the most recently completed task, if any.
    pub fn last_result(&self) -> Option<TaskResult> {
        self.inner.snapshot.read().last_result.clone()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use gantry_notify::ChannelListener;
    use std::time::Duration;

    /// Body that completes immediately.
    struct QuickBody;

    #[async_trait]
    impl TaskBody for QuickBody {
        fn capabilities(&self) -> Vec<&'static str> {
            vec!["quick"]
        }

        async fn execute(&self, _ctx: &TaskContext) -> GantryResult<TaskResult> {
            Ok(TaskResult::completed("done", serde_json::json!({"n": 1})))
        }
    }

    /// Body that always fails.
    struct FailingBody;

    #[async_trait]
    impl TaskBody for FailingBody {
        fn capabilities(&self) -> Vec<&'static str> {
            vec![]
        }

        async fn execute(&self, _ctx: &TaskContext) -> GantryResult<TaskResult> {
            Err(GantryError::TaskExecutionFailed("boom".to_string()))
        }
    }

    /// Body that sleeps cooperatively until cancelled or the duration elapses.
    struct SleepyBody {
        duration: Duration,
    }

    #[async_trait]
    impl TaskBody for SleepyBody {
        fn capabilities(&self) -> Vec<&'static str> {
            vec!["sleep"]
        }

        async fn execute(&self, ctx: &TaskContext) -> GantryResult<TaskResult> {
            ctx.cancel.sleep_checked(self.duration).await?;
            Ok(TaskResult::completed("slept", Value::Null))
        }
    }

    fn make_supervisor(body: Box<dyn TaskBody>) -> Supervisor {
        Supervisor::new(
            "a1",
            AgentKind::Demo,
            Value::Null,
            body,
            Arc::new(EventNotifier::new()),
        )
    }

    #[tokio::test]
    async fn test_successful_run_reaches_completed() {
        let supervisor = make_supervisor(Box::new(QuickBody));
        let task_id = supervisor
            .start(TaskKind::ExtractData, Value::Null)
            .await
            .unwrap();
        assert!(!task_id.is_empty());

        let status = supervisor.status();
        assert_eq!(status.state, AgentState::Completed);
        assert_eq!(status.progress, 100);
        assert!(!status.is_running);
        assert!(status.current_task_id.is_none());
        assert!(supervisor.last_result().is_some());
    }

    #[tokio::test]
    async fn test_start_while_running_is_rejected() {
        let supervisor = Arc::new(make_supervisor(Box::new(SleepyBody {
            duration: Duration::from_secs(5),
        })));

        let bg = Arc::clone(&supervisor);
        let handle =
            tokio::spawn(async move { bg.start(TaskKind::ExtractData, Value::Null).await });

        // Wait until the first task is visibly running.
        for _ in 0..100 {
            if supervisor.status().is_running {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(supervisor.status().is_running);
        let first_task = supervisor.status().current_task_id;

        let second = supervisor.start(TaskKind::ExtractData, Value::Null).await;
        assert!(matches!(second, Err(GantryError::AlreadyRunning(_))));
        // The live task is untouched by the rejected start.
        assert_eq!(supervisor.status().current_task_id, first_task);

        supervisor.stop().await;
        let _ = handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_failure_clears_flags_and_records_error() {
        let supervisor = make_supervisor(Box::new(FailingBody));
        let result = supervisor.start(TaskKind::ExtractData, Value::Null).await;
        assert!(matches!(result, Err(GantryError::TaskExecutionFailed(_))));

        let status = supervisor.status();
        assert_eq!(status.state, AgentState::Error);
        assert!(status.last_error.contains("boom"));
        assert!(!status.is_running);
        assert!(status.current_task_id.is_none());
    }

    #[tokio::test]
    async fn test_stop_on_idle_agent_is_silent_noop() {
        let notifier = Arc::new(EventNotifier::new());
        let (listener, mut rx) = ChannelListener::new("probe", 16);
        notifier.subscribe(Arc::new(listener)).await;

        let supervisor = Supervisor::new(
            "a1",
            AgentKind::Demo,
            Value::Null,
            Box::new(QuickBody),
            notifier,
        );
        supervisor.stop().await;

        // Only the warning log path runs; no status update is broadcast.
        assert!(rx.try_recv().is_err());
        assert_eq!(supervisor.status().state, AgentState::Idle);
    }

    #[tokio::test]
    async fn test_cooperative_stop_ends_in_idle() {
        let supervisor = Arc::new(make_supervisor(Box::new(SleepyBody {
            duration: Duration::from_secs(30),
        })));

        let bg = Arc::clone(&supervisor);
        let handle =
            tokio::spawn(async move { bg.start(TaskKind::ExtractData, Value::Null).await });

        for _ in 0..100 {
            if supervisor.status().is_running {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        supervisor.stop().await;

        let outcome = handle.await.unwrap();
        assert!(matches!(outcome, Err(GantryError::TaskCancelled(_))));

        let status = supervisor.status();
        assert_eq!(status.state, AgentState::Idle);
        assert!(!status.is_running);
        assert!(status.current_task_id.is_none());
    }

    #[tokio::test]
    async fn test_hook_failure_is_swallowed() {
        struct BadHook;

        #[async_trait]
        impl StatusHook for BadHook {
            async fn on_status(&self, _update: StatusUpdate) -> GantryResult<()> {
                Err(GantryError::Orchestration("hook broke".to_string()))
            }
        }

        let supervisor = make_supervisor(Box::new(QuickBody));
        supervisor.set_status_hook(Arc::new(BadHook));

        // A failing hook never propagates to the start caller.
        let result = supervisor.start(TaskKind::ExtractData, Value::Null).await;
        assert!(result.is_ok());
        assert_eq!(supervisor.status().state, AgentState::Completed);
    }

    #[tokio::test]
    async fn test_status_updates_are_broadcast_in_order() {
        let notifier = Arc::new(EventNotifier::new());
        let (listener, mut rx) = ChannelListener::new("probe", 32);
        notifier.subscribe(Arc::new(listener)).await;

        let supervisor = Supervisor::new(
            "a1",
            AgentKind::Demo,
            Value::Null,
            Box::new(QuickBody),
            notifier,
        );
        supervisor
            .start(TaskKind::ExtractData, Value::Null)
            .await
            .unwrap();

        let first = rx.recv().await.unwrap();
        assert_eq!(first.status, AgentState::Running);
        assert_eq!(first.progress, 0);

        let last = rx.recv().await.unwrap();
        assert_eq!(last.status, AgentState::Completed);
        assert_eq!(last.progress, 100);
    }
}
