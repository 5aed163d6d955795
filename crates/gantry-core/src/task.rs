use serde::{Deserialize, Serialize};

/// The kind of task an agent is asked to execute.
///
/// A tagged enum rather than a free-form string so that unsupported kinds are
/// an explicit, typed outcome instead of a runtime lookup failure. Kinds not
/// known to this build arrive as [`TaskKind::Other`] and task bodies reject
/// them with `GantryError::UnsupportedTask`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// Extract projects, RFIs, and budget items from a platform.
    ExtractData,
    /// Connect to and synchronize several platforms in one pass.
    PlatformIntegration,
    /// Deliberately exercise the failure path (used by operators to verify alerting).
    ErrorHandlingProbe,
    /// Analyze previously extracted data.
    Analyze,
    /// A kind this build does not know about.
    #[serde(untagged)]
    Other(String),
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskKind::ExtractData => write!(f, "extract_data"),
            TaskKind::PlatformIntegration => write!(f, "platform_integration"),
            TaskKind::ErrorHandlingProbe => write!(f, "error_handling_probe"),
            TaskKind::Analyze => write!(f, "analyze"),
            TaskKind::Other(s) => write!(f, "{s}"),
        }
    }
}

/// The result returned by a task body on completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    /// Outcome status string; anything other than `"error"` counts as success.
    pub status: String,
    /// Human-readable summary of the outcome.
    pub message: String,
    /// Structured output produced by the task.
    #[serde(default)]
    pub data: serde_json::Value,
}

impl TaskResult {
    /// Creates a successful result.
    pub fn completed(message: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            status: "completed".to_string(),
            message: message.into(),
            data,
        }
    }

    /// Whether this result represents a success.
    pub fn success(&self) -> bool {
        self.status != "error"
    }
}
