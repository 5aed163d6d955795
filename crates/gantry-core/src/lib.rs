//! Core types and error definitions for the Gantry coordination engine.
//!
//! This crate provides the foundational types shared across all Gantry crates:
//! error handling, agent state enums, the status-update message that flows
//! through the event notifier, and configuration structs.
//!
//! # Main types
//!
//! - [`GantryError`] — Unified error enum for all Gantry subsystems.
//! - [`GantryResult`] — Convenience alias for `Result<T, GantryError>`.
//! - [`AgentKind`] — The platform flavor of an agent.
//! - [`AgentState`] — Lifecycle state of an agent (idle, running, completed, error).
//! - [`StatusUpdate`] — A single broadcast status message.

/// Configuration structs for the graph store and coordinator.
pub mod config;
/// Task kinds and task execution results.
pub mod task;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use config::{CoordinatorConfig, GraphConfig};
pub use task::{TaskKind, TaskResult};

// --- Error types ---

/// Top-level error type for the Gantry coordination engine.
///
/// Each variant corresponds to a failure class a public operation can return.
#[derive(Debug, thiserror::Error)]
pub enum GantryError {
    /// The agent already has a live task; starting it again is an error, not a queue.
    #[error("Agent '{0}' is already running")]
    AlreadyRunning(String),

    /// An operation referenced an agent id with no registered supervisor.
    #[error("Agent '{0}' not found")]
    NotFound(String),

    /// Platform-specific authentication failed inside a task body.
    ///
    /// Surfaced as a task failure, not a framework failure.
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// A task body raised; the message is also captured in the agent's `last_error`.
    #[error("Task execution failed: {0}")]
    TaskExecutionFailed(String),

    /// A task body observed the cooperative stop flag and aborted.
    #[error("Task cancelled: {0}")]
    TaskCancelled(String),

    /// A task body was asked to run a kind it does not implement.
    #[error("Task kind '{0}' is not supported by this agent")]
    UnsupportedTask(String),

    /// The knowledge graph failed to persist a node, edge, or event.
    #[error("Graph persistence error: {0}")]
    GraphPersistence(String),

    /// A maintenance step inside a consolidation cycle failed.
    #[error("Consolidation failed: {0}")]
    Consolidation(String),

    /// An error from the multi-agent coordinator.
    #[error("Orchestration error: {0}")]
    Orchestration(String),

    /// An error in configuration parsing or validation.
    #[error("Config error: {0}")]
    Config(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A convenience `Result` alias using [`GantryError`].
pub type GantryResult<T> = Result<T, GantryError>;

// --- Agent enums ---

/// The construction platform an agent integrates with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentKind {
    /// Procore platform agent.
    Procore,
    /// Autodesk Construction Cloud agent.
    Autodesk,
    /// Primavera scheduling agent.
    Primavera,
    /// Microsoft Project agent.
    MsProject,
    /// Simulated agent for testing and development.
    Demo,
}

impl std::fmt::Display for AgentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentKind::Procore => write!(f, "procore"),
            AgentKind::Autodesk => write!(f, "autodesk"),
            AgentKind::Primavera => write!(f, "primavera"),
            AgentKind::MsProject => write!(f, "msproject"),
            AgentKind::Demo => write!(f, "demo"),
        }
    }
}

/// Lifecycle state of an agent.
///
/// Not a DAG: a completed or errored agent returns to `Running` when a new
/// task is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentState {
    /// No task is active.
    Idle,
    /// A task body is executing.
    Running,
    /// The last task finished successfully.
    Completed,
    /// The last task failed; see `last_error`.
    Error,
}

impl std::fmt::Display for AgentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentState::Idle => write!(f, "idle"),
            AgentState::Running => write!(f, "running"),
            AgentState::Completed => write!(f, "completed"),
            AgentState::Error => write!(f, "error"),
        }
    }
}

// --- Status updates ---

/// A single status message broadcast through the event notifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdate {
    /// The agent (or orchestration pseudo-agent) this update concerns.
    pub agent_id: String,
    /// Lifecycle state at the time of the update.
    pub status: AgentState,
    /// Progress percentage, 0–100.
    pub progress: u8,
    /// Human-readable progress message.
    pub message: String,
    /// Arbitrary structured payload attached to the update.
    #[serde(default)]
    pub data: serde_json::Value,
    /// UTC timestamp of when the update was created.
    pub timestamp: DateTime<Utc>,
}

impl StatusUpdate {
    /// Creates a new status update, clamping progress to 0–100.
    pub fn new(
        agent_id: impl Into<String>,
        status: AgentState,
        progress: u8,
        message: impl Into<String>,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            status,
            progress: progress.min(100),
            message: message.into(),
            data: serde_json::Value::Null,
            timestamp: Utc::now(),
        }
    }

    /// Attaches a structured payload to the update.
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }
}
