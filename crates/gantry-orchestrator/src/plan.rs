use gantry_core::{AgentKind, TaskKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How an orchestration dispatches its agents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Launch every agent concurrently; failures are collected, not raised.
    Parallel,
    /// Run agents one at a time; the first failure stops the rest.
    Sequential,
    /// Parallel launch with a shared workspace injected into every agent.
    Collaborative,
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Parallel => "parallel",
            Self::Sequential => "sequential",
            Self::Collaborative => "collaborative",
        };
        write!(f, "{name}")
    }
}

/// One agent's assignment within an orchestration plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSpec {
    pub agent_id: String,
    pub agent_kind: AgentKind,
    pub task_type: TaskKind,
    #[serde(default)]
    pub parameters: Value,
}

/// A complete orchestration request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrationPlan {
    pub strategy: Strategy,
    pub agents: Vec<AgentSpec>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_strategy_serde_is_lowercase() {
        assert_eq!(serde_json::to_string(&Strategy::Parallel).unwrap(), "\"parallel\"");
        let parsed: Strategy = serde_json::from_str("\"collaborative\"").unwrap();
        assert_eq!(parsed, Strategy::Collaborative);
    }

    #[test]
    fn test_plan_round_trip() {
        let plan = OrchestrationPlan {
            strategy: Strategy::Sequential,
            agents: vec![AgentSpec {
                agent_id: "a1".to_string(),
                agent_kind: AgentKind::Procore,
                task_type: TaskKind::ExtractData,
                parameters: json!({"project_id": "p1"}),
            }],
        };
        let text = serde_json::to_string(&plan).unwrap();
        let back: OrchestrationPlan = serde_json::from_str(&text).unwrap();
        assert_eq!(back.strategy, Strategy::Sequential);
        assert_eq!(back.agents[0].agent_id, "a1");
    }

    #[test]
    fn test_spec_parameters_default_to_null() {
        let spec: AgentSpec = serde_json::from_str(
            r#"{"agent_id": "a1", "agent_kind": "demo", "task_type": "extract_data"}"#,
        )
        .unwrap();
        assert!(spec.parameters.is_null());
    }
}
