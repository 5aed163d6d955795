use crate::plan::{AgentSpec, OrchestrationPlan, Strategy};
use chrono::Utc;
use futures_util::future::join_all;
use gantry_agent::{default_task_body, SharedWorkspace, Supervisor, TaskBody};
use gantry_core::{AgentKind, AgentState, GantryError, GantryResult, StatusUpdate, TaskKind};
use gantry_graph::KnowledgeGraph;
use gantry_notify::EventNotifier;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Builds the task body for an agent, given its kind and parameters.
pub type TaskBodyFactory = Arc<dyn Fn(AgentKind, &Value) -> Box<dyn TaskBody> + Send + Sync>;

struct CoordinatorInner {
    notifier: Arc<EventNotifier>,
    graph: Arc<KnowledgeGraph>,
    active: RwLock<HashMap<String, Arc<Supervisor>>>,
    handles: RwLock<HashMap<String, JoinHandle<GantryResult<()>>>>,
    factory: TaskBodyFactory,
}

/// Orchestration coordinator: owns the live supervisors, dispatches plans,
/// and records lifecycle events into the knowledge graph.
///
/// One supervisor per agent id; a second start for the same id is rejected
/// with `AlreadyRunning`. The knowledge graph must be initialized before
/// construction (it is, by its constructor).
pub struct Coordinator {
    inner: Arc<CoordinatorInner>,
}

impl Coordinator {
    /// Creates a coordinator using the default simulated task bodies.
    pub fn new(notifier: Arc<EventNotifier>, graph: Arc<KnowledgeGraph>) -> Self {
        Self::with_factory(notifier, graph, Arc::new(default_task_body))
    }

    /// Creates a coordinator with a custom task-body factory.
    pub fn with_factory(
        notifier: Arc<EventNotifier>,
        graph: Arc<KnowledgeGraph>,
        factory: TaskBodyFactory,
    ) -> Self {
        Self {
            inner: Arc::new(CoordinatorInner {
                notifier,
                graph,
                active: RwLock::new(HashMap::new()),
                handles: RwLock::new(HashMap::new()),
                factory,
            }),
        }
    }

    /// Starts an agent as a background task.
    ///
    /// Rejects with `AlreadyRunning` when a live supervisor exists for the
    /// id. Otherwise constructs the supervisor, registers it, records the
    /// start event, and spawns the task body; the call returns right after
    /// dispatch, not after the task finishes.
    pub async fn start_agent(
        &self,
        agent_id: &str,
        kind: AgentKind,
        task_type: TaskKind,
        parameters: Value,
    ) -> GantryResult<String> {
        self.launch(agent_id, kind, task_type, parameters, None).await
    }

    async fn launch(
        &self,
        agent_id: &str,
        kind: AgentKind,
        task_type: TaskKind,
        parameters: Value,
        workspace: Option<Arc<SharedWorkspace>>,
    ) -> GantryResult<String> {
        // Reap handles of tasks that already finished on their own.
        self.inner
            .handles
            .write()
            .await
            .retain(|_, handle| !handle.is_finished());

        let mut active = self.inner.active.write().await;
        if active.contains_key(agent_id) {
            return Err(GantryError::AlreadyRunning(agent_id.to_string()));
        }

        let mut parameters = parameters;
        if let Some(ws) = &workspace {
            match parameters.as_object_mut() {
                Some(object) => {
                    object.insert("workspace".to_string(), ws.descriptor());
                }
                None => parameters = json!({"workspace": ws.descriptor()}),
            }
        }

        let body = (self.inner.factory)(kind, &parameters);
        let supervisor = Arc::new(Supervisor::new(
            agent_id,
            kind,
            parameters.clone(),
            body,
            Arc::clone(&self.inner.notifier),
        ));
        active.insert(agent_id.to_string(), Arc::clone(&supervisor));
        drop(active);

        let task_type_name = task_type.to_string();
        let project_id = parameters
            .get("project_id")
            .and_then(Value::as_str)
            .map(str::to_string);
        if let Err(e) = self.inner.graph.store_agent_event(
            agent_id,
            "start",
            json!({"task_type": task_type_name, "parameters": parameters}),
            project_id.as_deref(),
        ) {
            warn!(agent_id, error = %e, "Failed to record start event");
        }

        let inner = Arc::clone(&self.inner);
        let id = agent_id.to_string();
        let params = parameters;
        let handle = tokio::spawn(async move {
            let outcome = supervisor
                .start_with_workspace(task_type, params.clone(), workspace)
                .await;
            let settled = match outcome {
                Ok(_) => {
                    if let Some(result) = supervisor.last_result() {
                        if let Err(e) =
                            inner
                                .graph
                                .store_task_result(&id, &task_type_name, &result, &params)
                        {
                            warn!(agent_id = %id, error = %e, "Failed to record task result");
                        }
                    }
                    Ok(())
                }
                // A cooperative stop settles the task; it is not a failure.
                Err(GantryError::TaskCancelled(_)) => Ok(()),
                Err(e) => {
                    if let Err(log_err) = inner.graph.store_agent_event(
                        &id,
                        "error",
                        json!({"error": e.to_string()}),
                        None,
                    ) {
                        warn!(agent_id = %id, error = %log_err, "Failed to record error event");
                    }
                    error!(agent_id = %id, error = %e, "Agent task failed");
                    Err(e)
                }
            };
            inner.active.write().await.remove(&id);
            settled
        });
        self.inner
            .handles
            .write()
            .await
            .insert(agent_id.to_string(), handle);

        info!(agent_id, kind = %kind, "Agent started");
        Ok(format!("Agent {agent_id} started"))
    }

    /// Stops an agent: cooperative stop request, handle abort, settlement.
    ///
    /// Unknown ids are a benign no-op. Always broadcasts an Idle update and
    /// records a stop event, even when the agent was not running. Only a
    /// cancellation is suppressed silently; real failures during settlement
    /// are logged.
    pub async fn stop_agent(&self, agent_id: &str) -> String {
        let supervisor = self.inner.active.write().await.remove(agent_id);
        let handle = self.inner.handles.write().await.remove(agent_id);

        let message = match supervisor {
            None => {
                if let Some(handle) = handle {
                    handle.abort();
                }
                format!("Agent {agent_id} was not running")
            }
            Some(supervisor) => {
                supervisor.stop().await;
                if let Some(handle) = handle {
                    handle.abort();
                    match handle.await {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => {
                            warn!(agent_id, error = %e, "Agent finished with error during stop");
                        }
                        Err(join_err) if join_err.is_cancelled() => {}
                        Err(join_err) => {
                            warn!(agent_id, error = %join_err, "Agent task panicked during stop");
                        }
                    }
                }
                format!("Agent {agent_id} stopped")
            }
        };

        self.inner
            .notifier
            .broadcast(StatusUpdate::new(
                agent_id,
                AgentState::Idle,
                0,
                message.as_str(),
            ))
            .await;

        if let Err(e) =
            self.inner
                .graph
                .store_agent_event(agent_id, "stop", Value::Null, None)
        {
            warn!(agent_id, error = %e, "Failed to record stop event");
        }
        info!(agent_id, "{message}");
        message
    }

    /// Status report for an agent. Live snapshot with capabilities when
    /// active, a default idle report otherwise; never fails.
    pub async fn agent_status(&self, agent_id: &str) -> Value {
        if let Some(supervisor) = self.inner.active.read().await.get(agent_id) {
            serde_json::to_value(supervisor.status())
                .unwrap_or_else(|_| json!({"agent_id": agent_id}))
        } else {
            json!({
                "agent_id": agent_id,
                "state": "idle",
                "is_running": false,
                "message": "Agent not active",
            })
        }
    }

    /// Ids of the agents with a live supervisor.
    pub async fn active_agents(&self) -> Vec<String> {
        self.inner.active.read().await.keys().cloned().collect()
    }

    /// Dispatches an orchestration plan, returning its id.
    ///
    /// The id has the form `orchestration_YYYYMMDD_HHMMSS`. Parallel and
    /// collaborative plans return right after dispatch; sequential plans run
    /// to completion (or to the first failure) before returning. Launch and
    /// step failures are recorded, not raised.
    pub async fn orchestrate(&self, plan: OrchestrationPlan) -> GantryResult<String> {
        let orchestration_id = format!("orchestration_{}", Utc::now().format("%Y%m%d_%H%M%S"));
        info!(
            orchestration_id,
            strategy = %plan.strategy,
            agents = plan.agents.len(),
            "Orchestration started"
        );

        let payload = serde_json::to_value(&plan)?;
        if let Err(e) = self
            .inner
            .graph
            .store_orchestration_event(&orchestration_id, "start", payload)
        {
            warn!(orchestration_id, error = %e, "Failed to record orchestration start");
        }

        match plan.strategy {
            Strategy::Parallel => self.launch_all(&plan.agents, None).await,
            Strategy::Collaborative => {
                let workspace = Arc::new(SharedWorkspace::new(orchestration_id.clone()));
                self.launch_all(&plan.agents, Some(workspace)).await;
            }
            Strategy::Sequential => self.run_sequential(&orchestration_id, &plan.agents).await,
        }

        Ok(orchestration_id)
    }

    async fn launch_all(&self, specs: &[AgentSpec], workspace: Option<Arc<SharedWorkspace>>) {
        let launches = specs.iter().map(|spec| {
            let workspace = workspace.clone();
            async move {
                let outcome = self
                    .launch(
                        &spec.agent_id,
                        spec.agent_kind,
                        spec.task_type.clone(),
                        spec.parameters.clone(),
                        workspace,
                    )
                    .await;
                (spec.agent_id.clone(), outcome)
            }
        });

        for (agent_id, outcome) in join_all(launches).await {
            if let Err(e) = outcome {
                warn!(agent_id = %agent_id, error = %e, "Agent launch failed");
            }
        }
    }

    /// Runs specs one at a time; the first failed step aborts the rest.
    async fn run_sequential(&self, orchestration_id: &str, specs: &[AgentSpec]) {
        for spec in specs {
            if let Err(e) = self
                .launch(
                    &spec.agent_id,
                    spec.agent_kind,
                    spec.task_type.clone(),
                    spec.parameters.clone(),
                    None,
                )
                .await
            {
                warn!(agent_id = %spec.agent_id, error = %e, "Sequential launch failed; aborting");
                self.record_sequential_abort(orchestration_id, &spec.agent_id, &e.to_string());
                return;
            }

            let handle = self.inner.handles.write().await.remove(&spec.agent_id);
            let Some(handle) = handle else { continue };
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(
                        agent_id = %spec.agent_id,
                        error = %e,
                        "Sequential step failed; remaining steps aborted"
                    );
                    self.record_sequential_abort(orchestration_id, &spec.agent_id, &e.to_string());
                    return;
                }
                Err(join_err) => {
                    warn!(
                        agent_id = %spec.agent_id,
                        error = %join_err,
                        "Sequential step panicked; remaining steps aborted"
                    );
                    self.record_sequential_abort(
                        orchestration_id,
                        &spec.agent_id,
                        &join_err.to_string(),
                    );
                    return;
                }
            }
        }
    }

    fn record_sequential_abort(&self, orchestration_id: &str, agent_id: &str, reason: &str) {
        if let Err(e) = self.inner.graph.store_orchestration_event(
            orchestration_id,
            "sequential_abort",
            json!({"failed_agent": agent_id, "reason": reason}),
        ) {
            warn!(orchestration_id, error = %e, "Failed to record sequential abort");
        }
    }

    /// Stops every active agent and closes the notifier. Safe with zero
    /// agents. The knowledge graph stays open for its other owners.
    pub async fn shutdown(&self) {
        let ids = self.active_agents().await;
        for agent_id in ids {
            self.stop_agent(&agent_id).await;
        }
        for (_, handle) in self.inner.handles.write().await.drain() {
            handle.abort();
        }
        self.inner.notifier.close().await;
        info!("Coordinator shut down");
    }
}
