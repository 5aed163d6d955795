use crate::graph::MemoryGraph;
use crate::models::{
    AgentActivity, CollaborationInsights, ConsolidationCycle, KnowledgeEdge, KnowledgeNode,
    Pattern, Prediction, TemporalContext, TemporalEvent, TemporalSummary,
};
use crate::predict::{Predictor, ProjectFeatures, PREDICTION_TYPES};
use crate::store::SqliteStore;
use chrono::{DateTime, Datelike, Duration, Timelike, Utc};
use gantry_core::{GantryError, GantryResult, GraphConfig, TaskResult};
use parking_lot::RwLock;
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Facade over the event log, the in-memory graph, and pattern analytics.
///
/// The event append is the durable guarantee: it either succeeds or the
/// call fails. Graph enrichment after a successful append is best-effort;
/// failures there are logged and never surfaced to the caller.
pub struct KnowledgeGraph {
    store: SqliteStore,
    graph: RwLock<MemoryGraph>,
    config: GraphConfig,
}

impl KnowledgeGraph {
    /// Opens the store and loads every persisted node and edge into the
    /// arena, so relationship strengthening continues across restarts.
    pub fn initialize(config: GraphConfig) -> GantryResult<Self> {
        let store = SqliteStore::open(config.database_path.as_deref())?;

        let mut graph = MemoryGraph::new();
        for node in store.load_nodes()? {
            graph.insert_loaded_node(node);
        }
        for edge in store.load_edges()? {
            graph.insert_loaded_edge(edge);
        }
        info!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "Knowledge graph initialized"
        );

        Ok(Self {
            store,
            graph: RwLock::new(graph),
            config,
        })
    }

    fn persist_node(&self, node: &KnowledgeNode) -> GantryResult<()> {
        self.store.upsert_node(node)
    }

    fn persist_edge(&self, edge: &KnowledgeEdge) -> GantryResult<()> {
        self.store.upsert_edge(edge)
    }

    /// Records a lifecycle event for an agent.
    ///
    /// Returns the event id once the append is durable. Graph enrichment
    /// (agent node, project node and `works_on` edge) happens afterwards and
    /// cannot fail the call.
    pub fn store_agent_event(
        &self,
        agent_id: &str,
        event_type: &str,
        payload: Value,
        project_id: Option<&str>,
    ) -> GantryResult<Uuid> {
        let mut event = TemporalEvent::new(event_type, agent_id, payload);
        if let Some(project_id) = project_id {
            event = event.with_project(project_id);
        }
        self.store.insert_event(&event)?;

        if let Err(e) = self.enrich_agent(agent_id, project_id) {
            warn!(agent_id, error = %e, "Graph enrichment failed after event append");
        }
        Ok(event.id)
    }

    fn enrich_agent(&self, agent_id: &str, project_id: Option<&str>) -> GantryResult<()> {
        let (agent, project_link) = {
            let mut graph = self.graph.write();
            let agent = graph.ensure_node("agent", agent_id, agent_id, Value::Null);
            let link = project_id.map(|pid| {
                let project = graph.ensure_node("project", pid, pid, Value::Null);
                let edge = graph.ensure_edge(agent.id, project.id, "works_on");
                (project, edge)
            });
            (agent, link)
        };

        self.persist_node(&agent)?;
        if let Some((project, edge)) = project_link {
            self.persist_node(&project)?;
            self.persist_edge(&edge)?;
        }
        Ok(())
    }

    /// Records the outcome of one task execution.
    ///
    /// The event carries the task type, the full result, the caller's
    /// parameters, and a `success` flag; the project id is pulled from
    /// `parameters.project_id` when present. After the append, arrays of
    /// `{id, name}` objects in the result data become entity nodes with
    /// `produced` edges from the agent, best-effort like all enrichment.
    pub fn store_task_result(
        &self,
        agent_id: &str,
        task_type: &str,
        result: &TaskResult,
        parameters: &Value,
    ) -> GantryResult<Uuid> {
        let project_id = parameters
            .get("project_id")
            .and_then(Value::as_str)
            .map(str::to_string);

        let payload = json!({
            "task_type": task_type,
            "result": result,
            "parameters": parameters,
            "success": result.success(),
        });

        let mut event = TemporalEvent::new("task_execution", agent_id, payload);
        event.project_id = project_id.clone();
        if !result.success() {
            event = event.failed(result.message.clone());
        }
        self.store.insert_event(&event)?;

        if let Err(e) = self.enrich_task_result(agent_id, project_id.as_deref(), &result.data) {
            warn!(agent_id, error = %e, "Graph enrichment failed after task result");
        }
        Ok(event.id)
    }

    fn enrich_task_result(
        &self,
        agent_id: &str,
        project_id: Option<&str>,
        data: &Value,
    ) -> GantryResult<()> {
        self.enrich_agent(agent_id, project_id)?;

        let Some(object) = data.as_object() else {
            return Ok(());
        };

        let mut persisted = Vec::new();
        {
            let mut graph = self.graph.write();
            let agent = graph.ensure_node("agent", agent_id, agent_id, Value::Null);

            for (collection, value) in object {
                let Some(items) = value.as_array() else {
                    continue;
                };
                for item in items {
                    let (Some(id), Some(name)) = (
                        item.get("id").and_then(Value::as_str),
                        item.get("name").and_then(Value::as_str),
                    ) else {
                        continue;
                    };
                    let entity =
                        graph.ensure_node("entity", id, name, json!({"collection": collection}));
                    let edge = graph.ensure_edge(agent.id, entity.id, "produced");
                    persisted.push((entity, edge));
                }
            }
        }

        for (entity, edge) in &persisted {
            self.persist_node(entity)?;
            self.persist_edge(edge)?;
        }
        debug!(agent_id, entities = persisted.len(), "Extracted entities from task result");
        Ok(())
    }

    /// Records an orchestration lifecycle event.
    ///
    /// The orchestration id acts as the event's agent; the graph gains an
    /// orchestration node with `coordinates` edges to every agent named in
    /// the plan data (`agents` array of specs or bare ids).
    pub fn store_orchestration_event(
        &self,
        orchestration_id: &str,
        event_type: &str,
        data: Value,
    ) -> GantryResult<Uuid> {
        let event = TemporalEvent::new(
            format!("orchestration_{event_type}"),
            orchestration_id,
            data.clone(),
        );
        self.store.insert_event(&event)?;

        if let Err(e) = self.enrich_orchestration(orchestration_id, &data) {
            warn!(orchestration_id, error = %e, "Graph enrichment failed after orchestration event");
        }
        Ok(event.id)
    }

    fn enrich_orchestration(&self, orchestration_id: &str, data: &Value) -> GantryResult<()> {
        let agent_ids: Vec<String> = data
            .get("agents")
            .and_then(Value::as_array)
            .map(|agents| {
                agents
                    .iter()
                    .filter_map(|a| {
                        a.as_str()
                            .or_else(|| a.get("agent_id").and_then(Value::as_str))
                            .map(str::to_string)
                    })
                    .collect()
            })
            .unwrap_or_default();

        let mut persisted = Vec::new();
        let orchestration = {
            let mut graph = self.graph.write();
            let orchestration = graph.ensure_node(
                "orchestration",
                orchestration_id,
                orchestration_id,
                Value::Null,
            );
            for agent_id in &agent_ids {
                let agent = graph.ensure_node("agent", agent_id, agent_id, Value::Null);
                let edge = graph.ensure_edge(orchestration.id, agent.id, "coordinates");
                persisted.push((agent, edge));
            }
            orchestration
        };

        self.persist_node(&orchestration)?;
        for (agent, edge) in &persisted {
            self.persist_node(agent)?;
            self.persist_edge(edge)?;
        }
        Ok(())
    }

    /// Windowed read of everything known about one entity: matching events
    /// in chronological order, graph neighborhood, and a temporal summary.
    /// Read-only.
    pub fn query_temporal_context(
        &self,
        entity_id: &str,
        entity_type: &str,
        window_hours: i64,
    ) -> GantryResult<TemporalContext> {
        let end = Utc::now();
        let start = end - Duration::hours(window_hours);
        // The store yields the newest events within the limit; consumers
        // read them oldest first.
        let mut events =
            self.store
                .events_for_entity(entity_id, start, end, self.config.query_limit)?;
        events.reverse();

        let related = {
            let graph = self.graph.read();
            graph
                .node_id(entity_type, entity_id)
                .map(|id| graph.neighborhood(id))
                .unwrap_or_default()
        };

        Ok(TemporalContext {
            entity_id: entity_id.to_string(),
            entity_type: entity_type.to_string(),
            window_hours,
            summary: summarize(&events),
            events,
            related,
        })
    }

    /// Runs every pattern detector over the lookback window, persisting each
    /// detected pattern before returning it.
    pub fn detect_patterns(&self, lookback_days: i64) -> GantryResult<Vec<Pattern>> {
        let end = Utc::now();
        let start = end - Duration::days(lookback_days);
        let events = self.store.events_between(start, end, self.config.query_limit)?;

        let mut patterns = Vec::new();
        patterns.extend(detect_hourly_peak(&events, lookback_days));
        patterns.extend(detect_daily_peak(&events, lookback_days));
        patterns.extend(detect_agent_hotspot(&events, lookback_days));
        patterns.extend(detect_failure_cluster(&events, lookback_days));

        for pattern in &patterns {
            self.store.insert_pattern(pattern)?;
        }
        debug!(count = patterns.len(), lookback_days, "Pattern detection finished");
        Ok(patterns)
    }

    /// Per-agent activity and whole-graph connectivity for collaboration
    /// reporting. Only orchestration-start and task-execution events count.
    pub fn collaboration_insights(
        &self,
        project_id: Option<&str>,
    ) -> GantryResult<CollaborationInsights> {
        let since = Utc::now() - Duration::days(i64::from(self.config.retention_days));
        let mut events = self.store.events_by_types(
            &["orchestration_start", "task_execution"],
            since,
            self.config.query_limit,
        )?;
        if let Some(project_id) = project_id {
            events.retain(|e| e.project_id.as_deref() == Some(project_id));
        }

        let mut per_agent: HashMap<String, AgentActivity> = HashMap::new();
        for event in &events {
            let entry = per_agent.entry(event.agent_id.clone()).or_default();
            entry.events += 1;
            if event.success {
                entry.successes += 1;
            }
        }
        for activity in per_agent.values_mut() {
            activity.success_rate = if activity.events == 0 {
                0.0
            } else {
                activity.successes as f64 / activity.events as f64
            };
        }

        Ok(CollaborationInsights {
            per_agent,
            network: self.graph.read().metrics(),
        })
    }

    /// Runs one daily consolidation cycle with a durable audit trail.
    ///
    /// The audit row is inserted as `running` before any work. Success marks
    /// it `completed` with timing and a results blob; any failure marks it
    /// `failed` with the captured error (partial results attached) and the
    /// error is returned to the caller.
    pub fn consolidate_daily_data(&self) -> GantryResult<ConsolidationCycle> {
        let mut cycle = ConsolidationCycle::running("daily");
        self.store.insert_cycle(&cycle)?;
        let started = std::time::Instant::now();
        info!(cycle_id = %cycle.id, "Consolidation cycle started");

        match self.run_consolidation() {
            Ok((patterns, quality, insights, pruned)) => {
                cycle.status = "completed".to_string();
                cycle.patterns_detected = patterns as i64;
                cycle.data_quality_score = quality;
                cycle.insights_generated = insights.len() as i64;
                cycle.processing_time_seconds = started.elapsed().as_secs_f64();
                cycle.results = json!({
                    "insights": insights,
                    "events_pruned": pruned,
                });
                cycle.completed_at = Some(Utc::now());
                self.store.update_cycle(&cycle)?;
                info!(
                    cycle_id = %cycle.id,
                    patterns,
                    pruned,
                    "Consolidation cycle completed"
                );
                Ok(cycle)
            }
            Err(e) => {
                cycle.status = "failed".to_string();
                cycle.error_message = Some(e.to_string());
                cycle.processing_time_seconds = started.elapsed().as_secs_f64();
                cycle.completed_at = Some(Utc::now());
                if let Err(update_err) = self.store.update_cycle(&cycle) {
                    warn!(cycle_id = %cycle.id, error = %update_err, "Failed to mark cycle failed");
                }
                Err(GantryError::Consolidation(e.to_string()))
            }
        }
    }

    fn run_consolidation(&self) -> GantryResult<(usize, f64, Vec<String>, usize)> {
        let patterns = self.detect_patterns(1)?;

        let end = Utc::now();
        let day = self
            .store
            .events_between(end - Duration::days(1), end, self.config.query_limit)?;
        let quality = if day.is_empty() {
            1.0
        } else {
            let good = day
                .iter()
                .filter(|e| e.project_id.is_some() && e.success)
                .count();
            good as f64 / day.len() as f64
        };

        let metrics = self.graph.read().metrics();
        let mut insights = Vec::new();
        if !patterns.is_empty() {
            insights.push(format!("{} recurring pattern(s) detected", patterns.len()));
        }
        insights.push(format!(
            "Knowledge graph holds {} entities across {} relationships",
            metrics.node_count, metrics.edge_count
        ));
        if quality < 0.5 {
            insights.push(format!(
                "Low data quality in the last day: {:.0}% of events complete and successful",
                quality * 100.0
            ));
        }

        let cutoff = end - Duration::days(i64::from(self.config.retention_days));
        let pruned = self.store.delete_events_before(cutoff)?;

        Ok((patterns.len(), quality, insights, pruned))
    }

    /// Generates and stores one prediction per type for a project.
    ///
    /// Features come from the project's event history; a project with no
    /// history still yields the predictor's baselines rather than an error.
    pub async fn predict_project_outcomes(
        &self,
        project_id: &str,
        predictor: &dyn Predictor,
    ) -> GantryResult<Vec<Prediction>> {
        let end = Utc::now();
        let start = end - Duration::days(i64::from(self.config.retention_days));
        let events = self
            .store
            .events_for_entity(project_id, start, end, self.config.query_limit)?;

        let features = ProjectFeatures {
            project_id: project_id.to_string(),
            event_count: events.len(),
            success_rate: if events.is_empty() {
                1.0
            } else {
                events.iter().filter(|e| e.success).count() as f64 / events.len() as f64
            },
            recent_failures: events.iter().filter(|e| !e.success).count(),
            collaboration_events: events
                .iter()
                .filter(|e| e.event_type.starts_with("orchestration_"))
                .count(),
        };

        let mut predictions = Vec::with_capacity(PREDICTION_TYPES.len());
        for prediction_type in PREDICTION_TYPES {
            let outcome = predictor.predict(prediction_type, &features).await?;
            let prediction = Prediction {
                id: Uuid::new_v4(),
                prediction_type: prediction_type.to_string(),
                project_id: project_id.to_string(),
                value: outcome.value,
                confidence_score: outcome.confidence_score,
                risk_level: outcome.risk_level,
                horizon_days: outcome.horizon_days,
                created_at: Utc::now(),
            };
            self.store.insert_prediction(&prediction)?;
            predictions.push(prediction);
        }
        Ok(predictions)
    }

    /// Recently detected patterns, newest first.
    pub fn recent_patterns(&self, limit: usize) -> GantryResult<Vec<Pattern>> {
        self.store.recent_patterns(limit)
    }

    /// Stored predictions for one project, newest first.
    pub fn predictions_for_project(&self, project_id: &str) -> GantryResult<Vec<Prediction>> {
        self.store.predictions_for_project(project_id)
    }

    /// Releases the store connection.
    pub fn close(self) {
        info!("Knowledge graph closed");
    }
}

fn summarize(events: &[TemporalEvent]) -> TemporalSummary {
    let mut counts_by_type: HashMap<String, usize> = HashMap::new();
    for event in events {
        *counts_by_type.entry(event.event_type.clone()).or_default() += 1;
    }

    let mut timestamps: Vec<DateTime<Utc>> = events.iter().map(|e| e.timestamp).collect();
    timestamps.sort_unstable();

    let mean_gap_seconds = if timestamps.len() < 2 {
        None
    } else {
        let total: f64 = timestamps
            .windows(2)
            .map(|pair| (pair[1] - pair[0]).num_milliseconds() as f64 / 1000.0)
            .sum();
        Some(total / (timestamps.len() - 1) as f64)
    };

    TemporalSummary {
        event_count: events.len(),
        counts_by_type,
        mean_gap_seconds,
        first_event: timestamps.first().copied(),
        last_event: timestamps.last().copied(),
    }
}

/// Bucket-and-threshold detector: flags the peak bucket when its count
/// exceeds `ratio` times the mean over observed buckets.
fn peak_bucket<K: Clone + std::fmt::Display>(
    counts: &HashMap<K, usize>,
    ratio: f64,
) -> Option<(K, usize, f64)> {
    if counts.len() < 2 {
        return None;
    }
    let total: usize = counts.values().sum();
    let mean = total as f64 / counts.len() as f64;
    let (key, &count) = counts.iter().max_by_key(|(_, &c)| c)?;
    if count as f64 > ratio * mean {
        Some((key.clone(), count, mean))
    } else {
        None
    }
}

fn detect_hourly_peak(events: &[TemporalEvent], window_days: i64) -> Option<Pattern> {
    let mut counts: HashMap<u32, usize> = HashMap::new();
    for event in events {
        *counts.entry(event.timestamp.hour()).or_default() += 1;
    }
    peak_bucket(&counts, 1.5).map(|(hour, count, mean)| {
        Pattern::new(
            "temporal_peak",
            format!("peak_hour_{hour}"),
            0.8,
            window_days,
            json!({"hour": hour, "count": count, "mean": mean}),
        )
    })
}

fn detect_daily_peak(events: &[TemporalEvent], window_days: i64) -> Option<Pattern> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for event in events {
        *counts
            .entry(event.timestamp.weekday().to_string())
            .or_default() += 1;
    }
    peak_bucket(&counts, 1.3).map(|(day, count, mean)| {
        Pattern::new(
            "daily_peak",
            format!("peak_day_{day}"),
            0.75,
            window_days,
            json!({"weekday": day, "count": count, "mean": mean}),
        )
    })
}

fn detect_agent_hotspot(events: &[TemporalEvent], window_days: i64) -> Option<Pattern> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for event in events {
        *counts.entry(event.agent_id.clone()).or_default() += 1;
    }
    peak_bucket(&counts, 2.0).map(|(agent_id, count, mean)| {
        Pattern::new(
            "agent_hotspot",
            format!("hotspot_{agent_id}"),
            0.7,
            window_days,
            json!({"agent_id": agent_id, "count": count, "mean": mean}),
        )
    })
}

fn detect_failure_cluster(events: &[TemporalEvent], window_days: i64) -> Option<Pattern> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for event in events.iter().filter(|e| !e.success) {
        *counts.entry(event.agent_id.clone()).or_default() += 1;
    }
    peak_bucket(&counts, 2.0)
        .filter(|(_, count, _)| *count >= 3)
        .map(|(agent_id, count, mean)| {
            Pattern::new(
                "failure_cluster",
                format!("failures_{agent_id}"),
                0.85,
                window_days,
                json!({"agent_id": agent_id, "failures": count, "mean": mean}),
            )
        })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn graph() -> KnowledgeGraph {
        KnowledgeGraph::initialize(GraphConfig::default()).unwrap()
    }

    fn at_hour(hour: u32, agent: &str) -> TemporalEvent {
        let mut event = TemporalEvent::new("task_execution", agent, Value::Null);
        event.timestamp = Utc
            .with_ymd_and_hms(2026, 8, 25, hour, 0, 0)
            .single()
            .unwrap();
        event
    }

    #[test]
    fn test_agent_event_appends_and_builds_graph() {
        let kg = graph();
        kg.store_agent_event("a1", "start", json!({"task": "extract_data"}), Some("p1"))
            .unwrap();

        let context = kg.query_temporal_context("a1", "agent", 24).unwrap();
        assert_eq!(context.events.len(), 1);
        assert_eq!(context.related.len(), 1);
        assert_eq!(context.related[0].entity_id, "p1");
        assert_eq!(context.related[0].relationship_type, "works_on");
    }

    #[test]
    fn test_repeated_collaboration_strengthens_edge() {
        let kg = graph();
        for _ in 0..3 {
            kg.store_agent_event("a1", "start", Value::Null, Some("p1"))
                .unwrap();
        }
        let context = kg.query_temporal_context("a1", "agent", 24).unwrap();
        assert_eq!(context.related.len(), 1);
        assert!((context.related[0].weight - 1.2).abs() < 1e-9);
    }

    #[test]
    fn test_two_observations_yield_single_strengthened_edge() {
        let kg = graph();
        kg.store_agent_event("a1", "start", Value::Null, Some("p1"))
            .unwrap();
        kg.store_agent_event("a1", "task_execution", Value::Null, Some("p1"))
            .unwrap();

        let edges = kg.store.load_edges().unwrap();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].relationship_type, "works_on");
        assert_eq!(edges[0].interaction_count, 2);
        assert!((edges[0].weight - 1.1).abs() < 1e-9);
    }

    #[test]
    fn test_task_result_extracts_entities() {
        let kg = graph();
        let result = TaskResult::completed(
            "done",
            json!({
                "projects": [{"id": "pr-1", "name": "Tower"}],
                "rfis": [{"id": "rfi-1", "name": "Clarify slab"}, {"id": "rfi-2", "name": "Ducts"}],
                "not_entities": [{"foo": 1}],
                "scalar": 5,
            }),
        );
        kg.store_task_result("a1", "extract_data", &result, &json!({"project_id": "p1"}))
            .unwrap();

        let context = kg.query_temporal_context("a1", "agent", 24).unwrap();
        let produced: Vec<_> = context
            .related
            .iter()
            .filter(|r| r.relationship_type == "produced")
            .collect();
        assert_eq!(produced.len(), 3);
    }

    #[test]
    fn test_task_result_payload_carries_full_result_and_success() {
        let kg = graph();
        let result = TaskResult::completed(
            "done",
            json!({"projects": [{"id": "pr-1", "name": "Tower"}]}),
        );
        kg.store_task_result("a1", "extract_data", &result, &json!({"project_id": "p1"}))
            .unwrap();

        let context = kg.query_temporal_context("a1", "agent", 24).unwrap();
        let payload = &context.events[0].payload;
        assert_eq!(payload["success"], true);
        assert_eq!(payload["result"]["status"], "completed");
        assert_eq!(payload["result"]["data"]["projects"][0]["name"], "Tower");
        assert_eq!(payload["parameters"]["project_id"], "p1");
    }

    #[test]
    fn test_context_events_are_chronological() {
        let kg = graph();
        let now = Utc::now();
        for hours_ago in [1, 3, 2] {
            let mut event = TemporalEvent::new("task_execution", "a1", Value::Null);
            event.timestamp = now - Duration::hours(hours_ago);
            kg.store.insert_event(&event).unwrap();
        }

        let context = kg.query_temporal_context("a1", "agent", 24).unwrap();
        assert_eq!(context.events.len(), 3);
        assert!(context
            .events
            .windows(2)
            .all(|pair| pair[0].timestamp <= pair[1].timestamp));
    }

    #[test]
    fn test_failed_task_records_failure_event() {
        let kg = graph();
        let result = TaskResult {
            status: "error".to_string(),
            message: "boom".to_string(),
            data: Value::Null,
        };
        kg.store_task_result("a1", "extract_data", &result, &Value::Null)
            .unwrap();

        let context = kg.query_temporal_context("a1", "agent", 24).unwrap();
        assert_eq!(context.events.len(), 1);
        assert!(!context.events[0].success);
        assert_eq!(context.events[0].error_message.as_deref(), Some("boom"));
    }

    #[test]
    fn test_orchestration_event_links_agents() {
        let kg = graph();
        kg.store_orchestration_event(
            "orch-1",
            "start",
            json!({"agents": [{"agent_id": "a1"}, {"agent_id": "a2"}]}),
        )
        .unwrap();

        let context = kg.query_temporal_context("orch-1", "orchestration", 24).unwrap();
        assert_eq!(context.events.len(), 1);
        assert_eq!(context.events[0].event_type, "orchestration_start");
        assert_eq!(context.related.len(), 2);
    }

    #[test]
    fn test_window_excludes_old_events() {
        let kg = graph();
        kg.store_agent_event("a1", "start", Value::Null, None)
            .unwrap();
        // Direct insert of an out-of-window event.
        let mut old = TemporalEvent::new("start", "a1", Value::Null);
        old.timestamp = Utc::now() - Duration::hours(30);
        kg.store.insert_event(&old).unwrap();

        let context = kg.query_temporal_context("a1", "agent", 24).unwrap();
        assert_eq!(context.events.len(), 1);
        assert_eq!(context.summary.event_count, 1);
    }

    #[test]
    fn test_hourly_peak_detected() {
        let events: Vec<TemporalEvent> = (0..10)
            .map(|_| at_hour(9, "a1"))
            .chain([at_hour(3, "a1"), at_hour(15, "a1")])
            .collect();
        let pattern = detect_hourly_peak(&events, 7).unwrap();
        assert_eq!(pattern.pattern_type, "temporal_peak");
        assert!((pattern.confidence_score - 0.8).abs() < f64::EPSILON);
        assert_eq!(pattern.data["hour"], 9);
    }

    #[test]
    fn test_uniform_activity_yields_no_peak() {
        let events: Vec<TemporalEvent> = (0..6).map(|i| at_hour(i * 4, "a1")).collect();
        assert!(detect_hourly_peak(&events, 7).is_none());
    }

    #[test]
    fn test_failure_cluster_needs_three_failures() {
        let mut events: Vec<TemporalEvent> = (0..2)
            .map(|_| at_hour(9, "a1").failed("x"))
            .chain([at_hour(9, "a2").failed("x")])
            .collect();
        assert!(detect_failure_cluster(&events, 7).is_none());

        events.push(at_hour(10, "a1").failed("x"));
        events.push(at_hour(11, "a1").failed("x"));
        let pattern = detect_failure_cluster(&events, 7).unwrap();
        assert_eq!(pattern.pattern_type, "failure_cluster");
        assert_eq!(pattern.data["agent_id"], "a1");
    }

    #[test]
    fn test_detect_patterns_persists_findings() {
        let kg = graph();
        for _ in 0..10 {
            kg.store_agent_event("busy", "task_execution", Value::Null, None)
                .unwrap();
        }
        kg.store_agent_event("quiet", "task_execution", Value::Null, None)
            .unwrap();

        let detected = kg.detect_patterns(1).unwrap();
        let hotspots: Vec<_> = detected
            .iter()
            .filter(|p| p.pattern_type == "agent_hotspot")
            .collect();
        assert_eq!(hotspots.len(), 1);

        let stored = kg.recent_patterns(50).unwrap();
        assert_eq!(stored.len(), detected.len());
    }

    #[test]
    fn test_collaboration_insights_counts_per_agent() {
        let kg = graph();
        let ok = TaskResult::completed("done", Value::Null);
        let bad = TaskResult {
            status: "error".to_string(),
            message: "boom".to_string(),
            data: Value::Null,
        };
        kg.store_task_result("a1", "extract_data", &ok, &Value::Null).unwrap();
        kg.store_task_result("a1", "extract_data", &bad, &Value::Null).unwrap();
        kg.store_agent_event("a1", "start", Value::Null, None).unwrap();

        let insights = kg.collaboration_insights(None).unwrap();
        let a1 = &insights.per_agent["a1"];
        // A lifecycle start is not a collaboration event type.
        assert_eq!(a1.events, 2);
        assert!((a1.success_rate - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_consolidation_completes_and_prunes() {
        let kg = graph();
        kg.store_agent_event("a1", "start", Value::Null, Some("p1"))
            .unwrap();
        let mut ancient = TemporalEvent::new("start", "a1", Value::Null);
        ancient.timestamp = Utc::now() - Duration::days(365);
        kg.store.insert_event(&ancient).unwrap();

        let cycle = kg.consolidate_daily_data().unwrap();
        assert_eq!(cycle.status, "completed");
        assert!(cycle.completed_at.is_some());
        assert_eq!(cycle.results["events_pruned"], 1);
    }

    #[tokio::test]
    async fn test_predictions_fall_back_to_baselines() {
        let kg = graph();
        let predictor = crate::predict::BaselinePredictor;
        let predictions = kg
            .predict_project_outcomes("p-empty", &predictor)
            .await
            .unwrap();
        assert_eq!(predictions.len(), 4);
        assert!(predictions
            .iter()
            .all(|p| (p.confidence_score - 0.6).abs() < f64::EPSILON));

        let stored = kg.predictions_for_project("p-empty").unwrap();
        assert_eq!(stored.len(), 4);
    }
}
