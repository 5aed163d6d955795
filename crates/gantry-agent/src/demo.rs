use crate::task::{TaskBody, TaskContext};
use async_trait::async_trait;
use gantry_core::{AgentKind, GantryError, GantryResult, TaskKind, TaskResult};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::info;

/// Default per-stage simulated work interval, in milliseconds.
const DEFAULT_STAGE_MILLIS: u64 = 200;

/// Simulated task body standing in for a live platform connector.
///
/// Produces deterministic demo payloads shaped like real extraction output
/// so the rest of the engine (status pipeline, knowledge graph ingestion,
/// orchestration) can be exercised end to end without platform credentials.
pub struct DemoTaskBody {
    kind: AgentKind,
    stage_millis: u64,
    should_fail: bool,
}

impl DemoTaskBody {
    /// Builds a demo body with default pacing for the given platform kind.
    pub fn new(kind: AgentKind) -> Self {
        Self {
            kind,
            stage_millis: DEFAULT_STAGE_MILLIS,
            should_fail: false,
        }
    }

    /// Builds a demo body honoring `simulation_millis` and `should_fail`
    /// keys from the agent configuration, when present.
    pub fn from_config(kind: AgentKind, config: &Value) -> Self {
        let stage_millis = config
            .get("simulation_millis")
            .and_then(Value::as_u64)
            .unwrap_or(DEFAULT_STAGE_MILLIS);
        let should_fail = config
            .get("should_fail")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        Self {
            kind,
            stage_millis,
            should_fail,
        }
    }

    async fn run_stage(&self, ctx: &TaskContext, progress: u8, message: &str) -> GantryResult<()> {
        ctx.progress.report(progress, message).await;
        ctx.cancel
            .sleep_checked(Duration::from_millis(self.stage_millis))
            .await
    }

    async fn extract_data(&self, ctx: &TaskContext) -> GantryResult<TaskResult> {
        self.run_stage(ctx, 20, "Connecting to platform").await?;
        self.run_stage(ctx, 40, "Fetching projects").await?;
        self.run_stage(ctx, 60, "Fetching RFIs").await?;
        self.run_stage(ctx, 80, "Fetching budget items").await?;

        let platform = self.kind.to_string();
        let data = json!({
            "platform": platform,
            "projects": [
                {"id": format!("{platform}-proj-001"), "name": "Downtown Tower", "status": "active"},
                {"id": format!("{platform}-proj-002"), "name": "Riverside Plant", "status": "active"},
            ],
            "rfis": [
                {"id": format!("{platform}-rfi-101"), "name": "Clarify slab reinforcement", "open": true},
                {"id": format!("{platform}-rfi-102"), "name": "Confirm HVAC duct routing", "open": false},
            ],
            "budget_items": [
                {"id": format!("{platform}-bud-201"), "name": "Concrete works", "amount": 125_000},
                {"id": format!("{platform}-bud-202"), "name": "Electrical rough-in", "amount": 86_500},
            ],
        });

        info!(platform = %self.kind, "Simulated extraction finished");
        Ok(TaskResult::completed("Extraction completed", data))
    }

    async fn platform_integration(&self, ctx: &TaskContext) -> GantryResult<TaskResult> {
        self.run_stage(ctx, 30, "Authenticating").await?;
        self.run_stage(ctx, 70, "Syncing records").await?;

        let data = json!({
            "platform": self.kind.to_string(),
            "synced_records": 42,
            "conflicts": 0,
        });
        Ok(TaskResult::completed("Integration sync completed", data))
    }

    async fn analyze(&self, ctx: &TaskContext) -> GantryResult<TaskResult> {
        self.run_stage(ctx, 50, "Analyzing extracted data").await?;

        let data = json!({
            "platform": self.kind.to_string(),
            "summary": {
                "open_rfis": 1,
                "budget_total": 211_500,
            },
        });
        Ok(TaskResult::completed("Analysis completed", data))
    }
}

#[async_trait]
impl TaskBody for DemoTaskBody {
    fn capabilities(&self) -> Vec<&'static str> {
        vec![
            "extract_data",
            "platform_integration",
            "analyze",
            "error_handling_probe",
        ]
    }

    async fn execute(&self, ctx: &TaskContext) -> GantryResult<TaskResult> {
        if self.should_fail {
            return Err(GantryError::TaskExecutionFailed(
                "simulated failure requested by configuration".to_string(),
            ));
        }

        match &ctx.task_type {
            TaskKind::ExtractData => self.extract_data(ctx).await,
            TaskKind::PlatformIntegration => self.platform_integration(ctx).await,
            TaskKind::Analyze => self.analyze(ctx).await,
            TaskKind::ErrorHandlingProbe => Err(GantryError::TaskExecutionFailed(
                "simulated task failure".to_string(),
            )),
            TaskKind::Other(name) => Err(GantryError::UnsupportedTask(name.clone())),
        }
    }
}

/// Builds the task body for an agent of the given kind.
///
/// Every kind currently maps to the simulated body; live platform connectors
/// plug in here without touching the supervisor or coordinator.
pub fn default_task_body(kind: AgentKind, config: &Value) -> Box<dyn TaskBody> {
    Box::new(DemoTaskBody::from_config(kind, config))
}
