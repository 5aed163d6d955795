//! Agent lifecycle supervision for the Gantry coordination engine.
//!
//! A [`Supervisor`] wraps one unit of work per agent: it accepts exactly one
//! task at a time, reports progress through the event notifier, supports
//! cooperative cancellation, and guarantees terminal-state reporting
//! regardless of success, failure, or a stop request.
//!
//! # Main types
//!
//! - [`Supervisor`] — start/stop/status lifecycle wrapper around a task body.
//! - [`TaskBody`] — the single entry point each concrete agent kind supplies.
//! - [`CancelToken`] — cooperative stop flag with a bounded-latency sleep.
//! - [`SharedWorkspace`] — mutable slot shared by collaborative agents.

/// Cooperative cancellation token and stop-checked sleep.
pub mod cancel;
/// Simulated task body used for development and tests.
pub mod demo;
/// Lifecycle supervisor and status reporting.
pub mod supervisor;
/// Task body trait and execution context.
pub mod task;
/// Shared workspace for collaborative orchestration.
pub mod workspace;

pub use cancel::CancelToken;
pub use demo::{default_task_body, DemoTaskBody};
pub use supervisor::{AgentStatus, StatusHook, Supervisor};
pub use task::{ProgressReporter, TaskBody, TaskContext};
pub use workspace::SharedWorkspace;
