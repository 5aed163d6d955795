use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Initial weight assigned to a newly observed relationship.
pub const EDGE_INITIAL_WEIGHT: f64 = 1.0;
/// Weight added on each re-observation of an existing relationship.
pub const EDGE_STRENGTHEN_STEP: f64 = 0.1;
/// Hard cap on relationship weight.
pub const EDGE_WEIGHT_CAP: f64 = 2.0;

/// One append-only entry in the temporal event log.
///
/// Events are the durable record; the node/edge graph is derived from them
/// and can always be rebuilt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemporalEvent {
    pub id: Uuid,
    pub event_type: String,
    pub agent_id: String,
    pub project_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub payload: Value,
    pub parent_event_id: Option<Uuid>,
    pub duration_seconds: Option<f64>,
    pub success: bool,
    pub error_message: Option<String>,
}

impl TemporalEvent {
    /// Builds a successful event with the current timestamp.
    pub fn new(event_type: impl Into<String>, agent_id: impl Into<String>, payload: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_type: event_type.into(),
            agent_id: agent_id.into(),
            project_id: None,
            timestamp: Utc::now(),
            payload,
            parent_event_id: None,
            duration_seconds: None,
            success: true,
            error_message: None,
        }
    }

    /// Attaches a project id.
    pub fn with_project(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    /// Marks the event as failed with the given message.
    pub fn failed(mut self, error_message: impl Into<String>) -> Self {
        self.success = false;
        self.error_message = Some(error_message.into());
        self
    }
}

/// A node in the knowledge graph, unique per `(node_type, entity_id)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeNode {
    pub id: Uuid,
    pub node_type: String,
    pub entity_id: String,
    pub entity_name: String,
    pub properties: Value,
    pub first_seen: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

/// A directed relationship between two nodes, unique per
/// `(from, to, relationship_type)`.
///
/// Weight starts at [`EDGE_INITIAL_WEIGHT`] and is strengthened by
/// [`EDGE_STRENGTHEN_STEP`] per re-observation, capped at
/// [`EDGE_WEIGHT_CAP`]. Weight and interaction count only ever grow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeEdge {
    pub id: Uuid,
    pub from_node_id: Uuid,
    pub to_node_id: Uuid,
    pub relationship_type: String,
    pub weight: f64,
    pub confidence: f64,
    pub interaction_count: i64,
    pub created_at: DateTime<Utc>,
    pub last_interaction: DateTime<Utc>,
}

/// A detected recurring pattern, append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pattern {
    pub id: Uuid,
    pub pattern_type: String,
    pub name: String,
    pub confidence_score: f64,
    pub window_days: i64,
    pub data: Value,
    pub detected_at: DateTime<Utc>,
}

impl Pattern {
    pub fn new(
        pattern_type: impl Into<String>,
        name: impl Into<String>,
        confidence_score: f64,
        window_days: i64,
        data: Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            pattern_type: pattern_type.into(),
            name: name.into(),
            confidence_score,
            window_days,
            data,
            detected_at: Utc::now(),
        }
    }
}

/// A stored prediction about a project outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    pub id: Uuid,
    pub prediction_type: String,
    pub project_id: String,
    pub value: Value,
    pub confidence_score: f64,
    pub risk_level: String,
    pub horizon_days: i64,
    pub created_at: DateTime<Utc>,
}

/// Audit row for one consolidation cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsolidationCycle {
    pub id: Uuid,
    pub cycle_type: String,
    pub cycle_date: DateTime<Utc>,
    pub status: String,
    pub patterns_detected: i64,
    pub data_quality_score: f64,
    pub insights_generated: i64,
    pub processing_time_seconds: f64,
    pub results: Value,
    pub error_message: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ConsolidationCycle {
    /// Starts a new cycle in the `running` state.
    pub fn running(cycle_type: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            cycle_type: cycle_type.into(),
            cycle_date: Utc::now(),
            status: "running".to_string(),
            patterns_detected: 0,
            data_quality_score: 0.0,
            insights_generated: 0,
            processing_time_seconds: 0.0,
            results: Value::Null,
            error_message: None,
            completed_at: None,
        }
    }
}

/// A node adjacent to the queried entity, with the connecting relationship.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelatedNode {
    pub entity_id: String,
    pub entity_name: String,
    pub node_type: String,
    pub relationship_type: String,
    pub weight: f64,
}

/// Aggregate statistics over the events in a temporal context window.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemporalSummary {
    pub event_count: usize,
    pub counts_by_type: std::collections::HashMap<String, usize>,
    pub mean_gap_seconds: Option<f64>,
    pub first_event: Option<DateTime<Utc>>,
    pub last_event: Option<DateTime<Utc>>,
}

/// Result of a windowed context query for one entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemporalContext {
    pub entity_id: String,
    pub entity_type: String,
    pub window_hours: i64,
    pub events: Vec<TemporalEvent>,
    pub related: Vec<RelatedNode>,
    pub summary: TemporalSummary,
}

/// Whole-graph connectivity metrics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkMetrics {
    pub node_count: usize,
    pub edge_count: usize,
    pub avg_degree: f64,
    pub max_degree: usize,
    pub density: f64,
}

/// Per-agent activity counters for collaboration reporting.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentActivity {
    pub events: usize,
    pub successes: usize,
    pub success_rate: f64,
}

/// Collaboration report combining event activity and graph connectivity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollaborationInsights {
    pub per_agent: std::collections::HashMap<String, AgentActivity>,
    pub network: NetworkMetrics,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_builder_defaults_to_success() {
        let event = TemporalEvent::new("start", "a1", json!({"k": 1}));
        assert!(event.success);
        assert!(event.project_id.is_none());
        assert!(event.error_message.is_none());
    }

    #[test]
    fn test_failed_event_carries_message() {
        let event = TemporalEvent::new("task_execution", "a1", Value::Null).failed("timeout");
        assert!(!event.success);
        assert_eq!(event.error_message.as_deref(), Some("timeout"));
    }

    #[test]
    fn test_running_cycle_has_no_completion() {
        let cycle = ConsolidationCycle::running("daily");
        assert_eq!(cycle.status, "running");
        assert!(cycle.completed_at.is_none());
    }

    #[test]
    fn test_event_serde_round_trip() {
        let event = TemporalEvent::new("stop", "a2", json!({"reason": "operator"}))
            .with_project("p1");
        let text = serde_json::to_string(&event).unwrap();
        let back: TemporalEvent = serde_json::from_str(&text).unwrap();
        assert_eq!(back.project_id.as_deref(), Some("p1"));
        assert_eq!(back.event_type, "stop");
    }
}
