//! Multi-agent orchestration for the Gantry coordination engine.
//!
//! The [`Coordinator`] owns the live agent supervisors, dispatches
//! orchestration plans under three strategies (parallel, sequential,
//! collaborative), and records every lifecycle event into the knowledge
//! graph. A [`MaintenanceScheduler`] runs the graph's daily consolidation
//! cycle on a cron schedule.
//!
//! # Main types
//!
//! - [`Coordinator`] — start/stop/status for single agents plus plan
//!   dispatch.
//! - [`OrchestrationPlan`] / [`AgentSpec`] / [`Strategy`] — plan model.
//! - [`MaintenanceScheduler`] — cron-driven consolidation loop.

/// Coordinator and task-body factory.
pub mod coordinator;
/// Orchestration plan model.
pub mod plan;
/// Cron-driven maintenance loop.
pub mod scheduler;

pub use coordinator::{Coordinator, TaskBodyFactory};
pub use plan::{AgentSpec, OrchestrationPlan, Strategy};
pub use scheduler::MaintenanceScheduler;
