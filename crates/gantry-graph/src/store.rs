use crate::models::{
    ConsolidationCycle, KnowledgeEdge, KnowledgeNode, Pattern, Prediction, TemporalEvent,
};
use chrono::{DateTime, Utc};
use gantry_core::{GantryError, GantryResult};
use parking_lot::Mutex;
use rusqlite::{params, params_from_iter, Connection, Row};
use serde_json::Value;
use std::path::Path;
use tracing::debug;
use uuid::Uuid;

/// SQLite persistence for the temporal event log and the derived graph.
///
/// All access goes through a single connection behind a mutex; lock scopes
/// are kept to one statement so readers never wait on long scans.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS temporal_events (
    id TEXT PRIMARY KEY,
    event_type TEXT NOT NULL,
    agent_id TEXT NOT NULL,
    project_id TEXT,
    timestamp TEXT NOT NULL,
    payload TEXT NOT NULL,
    parent_event_id TEXT,
    duration_seconds REAL,
    success INTEGER NOT NULL,
    error_message TEXT
);
CREATE INDEX IF NOT EXISTS idx_events_timestamp ON temporal_events(timestamp);
CREATE INDEX IF NOT EXISTS idx_events_agent ON temporal_events(agent_id);

CREATE TABLE IF NOT EXISTS knowledge_nodes (
    id TEXT PRIMARY KEY,
    node_type TEXT NOT NULL,
    entity_id TEXT NOT NULL,
    entity_name TEXT NOT NULL,
    properties TEXT NOT NULL,
    first_seen TEXT NOT NULL,
    last_updated TEXT NOT NULL,
    UNIQUE(node_type, entity_id)
);

CREATE TABLE IF NOT EXISTS knowledge_edges (
    id TEXT PRIMARY KEY,
    from_node_id TEXT NOT NULL,
    to_node_id TEXT NOT NULL,
    relationship_type TEXT NOT NULL,
    weight REAL NOT NULL,
    confidence REAL NOT NULL,
    interaction_count INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    last_interaction TEXT NOT NULL,
    UNIQUE(from_node_id, to_node_id, relationship_type)
);

CREATE TABLE IF NOT EXISTS patterns (
    id TEXT PRIMARY KEY,
    pattern_type TEXT NOT NULL,
    name TEXT NOT NULL,
    confidence_score REAL NOT NULL,
    window_days INTEGER NOT NULL,
    data TEXT NOT NULL,
    detected_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS predictions (
    id TEXT PRIMARY KEY,
    prediction_type TEXT NOT NULL,
    project_id TEXT NOT NULL,
    value TEXT NOT NULL,
    confidence_score REAL NOT NULL,
    risk_level TEXT NOT NULL,
    horizon_days INTEGER NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS consolidation_cycles (
    id TEXT PRIMARY KEY,
    cycle_type TEXT NOT NULL,
    cycle_date TEXT NOT NULL,
    status TEXT NOT NULL,
    patterns_detected INTEGER NOT NULL,
    data_quality_score REAL NOT NULL,
    insights_generated INTEGER NOT NULL,
    processing_time_seconds REAL NOT NULL,
    results TEXT NOT NULL,
    error_message TEXT,
    completed_at TEXT
);
";

fn persist(e: rusqlite::Error) -> GantryError {
    GantryError::GraphPersistence(e.to_string())
}

fn sql_invalid(idx: usize, err: impl std::error::Error + Send + Sync + 'static) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(err))
}

fn ts_from_sql(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| sql_invalid(idx, e))
}

fn uuid_from_sql(idx: usize, raw: &str) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(raw).map_err(|e| sql_invalid(idx, e))
}

fn json_from_sql(idx: usize, raw: &str) -> rusqlite::Result<Value> {
    serde_json::from_str(raw).map_err(|e| sql_invalid(idx, e))
}

fn event_from_row(row: &Row<'_>) -> rusqlite::Result<TemporalEvent> {
    Ok(TemporalEvent {
        id: uuid_from_sql(0, &row.get::<_, String>(0)?)?,
        event_type: row.get(1)?,
        agent_id: row.get(2)?,
        project_id: row.get(3)?,
        timestamp: ts_from_sql(4, &row.get::<_, String>(4)?)?,
        payload: json_from_sql(5, &row.get::<_, String>(5)?)?,
        parent_event_id: row
            .get::<_, Option<String>>(6)?
            .as_deref()
            .map(|raw| uuid_from_sql(6, raw))
            .transpose()?,
        duration_seconds: row.get(7)?,
        success: row.get::<_, i64>(8)? != 0,
        error_message: row.get(9)?,
    })
}

fn node_from_row(row: &Row<'_>) -> rusqlite::Result<KnowledgeNode> {
    Ok(KnowledgeNode {
        id: uuid_from_sql(0, &row.get::<_, String>(0)?)?,
        node_type: row.get(1)?,
        entity_id: row.get(2)?,
        entity_name: row.get(3)?,
        properties: json_from_sql(4, &row.get::<_, String>(4)?)?,
        first_seen: ts_from_sql(5, &row.get::<_, String>(5)?)?,
        last_updated: ts_from_sql(6, &row.get::<_, String>(6)?)?,
    })
}

fn edge_from_row(row: &Row<'_>) -> rusqlite::Result<KnowledgeEdge> {
    Ok(KnowledgeEdge {
        id: uuid_from_sql(0, &row.get::<_, String>(0)?)?,
        from_node_id: uuid_from_sql(1, &row.get::<_, String>(1)?)?,
        to_node_id: uuid_from_sql(2, &row.get::<_, String>(2)?)?,
        relationship_type: row.get(3)?,
        weight: row.get(4)?,
        confidence: row.get(5)?,
        interaction_count: row.get(6)?,
        created_at: ts_from_sql(7, &row.get::<_, String>(7)?)?,
        last_interaction: ts_from_sql(8, &row.get::<_, String>(8)?)?,
    })
}

const EVENT_COLUMNS: &str = "id, event_type, agent_id, project_id, timestamp, payload, \
     parent_event_id, duration_seconds, success, error_message";

impl SqliteStore {
    /// Opens (or creates) the database and applies the schema.
    /// `None` opens an in-memory database, for tests and ephemeral runs.
    pub fn open(path: Option<&Path>) -> GantryResult<Self> {
        let conn = match path {
            Some(path) => Connection::open(path).map_err(persist)?,
            None => Connection::open_in_memory().map_err(persist)?,
        };
        conn.execute_batch(SCHEMA).map_err(persist)?;
        debug!(path = ?path, "Opened knowledge store");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Appends one event to the log.
    pub fn insert_event(&self, event: &TemporalEvent) -> GantryResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO temporal_events (id, event_type, agent_id, project_id, timestamp, \
             payload, parent_event_id, duration_seconds, success, error_message) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                event.id.to_string(),
                event.event_type,
                event.agent_id,
                event.project_id,
                event.timestamp.to_rfc3339(),
                event.payload.to_string(),
                event.parent_event_id.map(|id| id.to_string()),
                event.duration_seconds,
                i64::from(event.success),
                event.error_message,
            ],
        )
        .map_err(persist)?;
        Ok(())
    }

    /// Events with `start <= timestamp <= end`, newest first.
    pub fn events_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: usize,
    ) -> GantryResult<Vec<TemporalEvent>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {EVENT_COLUMNS} FROM temporal_events \
                 WHERE timestamp >= ?1 AND timestamp <= ?2 \
                 ORDER BY timestamp DESC LIMIT ?3"
            ))
            .map_err(persist)?;
        let rows = stmt
            .query_map(
                params![start.to_rfc3339(), end.to_rfc3339(), limit as i64],
                event_from_row,
            )
            .map_err(persist)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(persist)
    }

    /// Events whose agent or project matches `entity_id`, newest first,
    /// within the given window.
    pub fn events_for_entity(
        &self,
        entity_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: usize,
    ) -> GantryResult<Vec<TemporalEvent>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {EVENT_COLUMNS} FROM temporal_events \
                 WHERE (agent_id = ?1 OR project_id = ?1) \
                 AND timestamp >= ?2 AND timestamp <= ?3 \
                 ORDER BY timestamp DESC LIMIT ?4"
            ))
            .map_err(persist)?;
        let rows = stmt
            .query_map(
                params![entity_id, start.to_rfc3339(), end.to_rfc3339(), limit as i64],
                event_from_row,
            )
            .map_err(persist)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(persist)
    }

    /// Events of any of the given types since `since`, newest first.
    pub fn events_by_types(
        &self,
        event_types: &[&str],
        since: DateTime<Utc>,
        limit: usize,
    ) -> GantryResult<Vec<TemporalEvent>> {
        if event_types.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = (1..=event_types.len())
            .map(|i| format!("?{i}"))
            .collect::<Vec<_>>()
            .join(", ");
        let since_idx = event_types.len() + 1;
        let limit_idx = event_types.len() + 2;

        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {EVENT_COLUMNS} FROM temporal_events \
                 WHERE event_type IN ({placeholders}) AND timestamp >= ?{since_idx} \
                 ORDER BY timestamp DESC LIMIT ?{limit_idx}"
            ))
            .map_err(persist)?;

        let mut args: Vec<String> = event_types.iter().map(|t| (*t).to_string()).collect();
        args.push(since.to_rfc3339());
        args.push((limit as i64).to_string());

        let rows = stmt
            .query_map(params_from_iter(args.iter()), event_from_row)
            .map_err(persist)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(persist)
    }

    /// Deletes events strictly older than `cutoff`, returning how many.
    pub fn delete_events_before(&self, cutoff: DateTime<Utc>) -> GantryResult<usize> {
        let conn = self.conn.lock();
        conn.execute(
            "DELETE FROM temporal_events WHERE timestamp < ?1",
            params![cutoff.to_rfc3339()],
        )
        .map_err(persist)
    }

    /// Inserts or refreshes a node keyed by `(node_type, entity_id)`.
    pub fn upsert_node(&self, node: &KnowledgeNode) -> GantryResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO knowledge_nodes (id, node_type, entity_id, entity_name, properties, \
             first_seen, last_updated) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7) \
             ON CONFLICT(node_type, entity_id) DO UPDATE SET \
             entity_name = excluded.entity_name, \
             properties = excluded.properties, \
             last_updated = excluded.last_updated",
            params![
                node.id.to_string(),
                node.node_type,
                node.entity_id,
                node.entity_name,
                node.properties.to_string(),
                node.first_seen.to_rfc3339(),
                node.last_updated.to_rfc3339(),
            ],
        )
        .map_err(persist)?;
        Ok(())
    }

    /// Inserts or refreshes an edge keyed by `(from, to, relationship_type)`.
    pub fn upsert_edge(&self, edge: &KnowledgeEdge) -> GantryResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO knowledge_edges (id, from_node_id, to_node_id, relationship_type, \
             weight, confidence, interaction_count, created_at, last_interaction) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9) \
             ON CONFLICT(from_node_id, to_node_id, relationship_type) DO UPDATE SET \
             weight = excluded.weight, \
             confidence = excluded.confidence, \
             interaction_count = excluded.interaction_count, \
             last_interaction = excluded.last_interaction",
            params![
                edge.id.to_string(),
                edge.from_node_id.to_string(),
                edge.to_node_id.to_string(),
                edge.relationship_type,
                edge.weight,
                edge.confidence,
                edge.interaction_count,
                edge.created_at.to_rfc3339(),
                edge.last_interaction.to_rfc3339(),
            ],
        )
        .map_err(persist)?;
        Ok(())
    }

    /// Loads every persisted node, for graph bootstrap.
    pub fn load_nodes(&self) -> GantryResult<Vec<KnowledgeNode>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT id, node_type, entity_id, entity_name, properties, first_seen, \
                 last_updated FROM knowledge_nodes",
            )
            .map_err(persist)?;
        let rows = stmt.query_map([], node_from_row).map_err(persist)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(persist)
    }

    /// Loads every persisted edge, for graph bootstrap.
    pub fn load_edges(&self) -> GantryResult<Vec<KnowledgeEdge>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT id, from_node_id, to_node_id, relationship_type, weight, confidence, \
                 interaction_count, created_at, last_interaction FROM knowledge_edges",
            )
            .map_err(persist)?;
        let rows = stmt.query_map([], edge_from_row).map_err(persist)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(persist)
    }

    /// Appends one detected pattern.
    pub fn insert_pattern(&self, pattern: &Pattern) -> GantryResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO patterns (id, pattern_type, name, confidence_score, window_days, \
             data, detected_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                pattern.id.to_string(),
                pattern.pattern_type,
                pattern.name,
                pattern.confidence_score,
                pattern.window_days,
                pattern.data.to_string(),
                pattern.detected_at.to_rfc3339(),
            ],
        )
        .map_err(persist)?;
        Ok(())
    }

    /// Most recently detected patterns, newest first.
    pub fn recent_patterns(&self, limit: usize) -> GantryResult<Vec<Pattern>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT id, pattern_type, name, confidence_score, window_days, data, \
                 detected_at FROM patterns ORDER BY detected_at DESC LIMIT ?1",
            )
            .map_err(persist)?;
        let rows = stmt
            .query_map(params![limit as i64], |row| {
                Ok(Pattern {
                    id: uuid_from_sql(0, &row.get::<_, String>(0)?)?,
                    pattern_type: row.get(1)?,
                    name: row.get(2)?,
                    confidence_score: row.get(3)?,
                    window_days: row.get(4)?,
                    data: json_from_sql(5, &row.get::<_, String>(5)?)?,
                    detected_at: ts_from_sql(6, &row.get::<_, String>(6)?)?,
                })
            })
            .map_err(persist)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(persist)
    }

    /// Stores one prediction.
    pub fn insert_prediction(&self, prediction: &Prediction) -> GantryResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO predictions (id, prediction_type, project_id, value, \
             confidence_score, risk_level, horizon_days, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                prediction.id.to_string(),
                prediction.prediction_type,
                prediction.project_id,
                prediction.value.to_string(),
                prediction.confidence_score,
                prediction.risk_level,
                prediction.horizon_days,
                prediction.created_at.to_rfc3339(),
            ],
        )
        .map_err(persist)?;
        Ok(())
    }

    /// All stored predictions for one project, newest first.
    pub fn predictions_for_project(&self, project_id: &str) -> GantryResult<Vec<Prediction>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT id, prediction_type, project_id, value, confidence_score, risk_level, \
                 horizon_days, created_at FROM predictions WHERE project_id = ?1 \
                 ORDER BY created_at DESC",
            )
            .map_err(persist)?;
        let rows = stmt
            .query_map(params![project_id], |row| {
                Ok(Prediction {
                    id: uuid_from_sql(0, &row.get::<_, String>(0)?)?,
                    prediction_type: row.get(1)?,
                    project_id: row.get(2)?,
                    value: json_from_sql(3, &row.get::<_, String>(3)?)?,
                    confidence_score: row.get(4)?,
                    risk_level: row.get(5)?,
                    horizon_days: row.get(6)?,
                    created_at: ts_from_sql(7, &row.get::<_, String>(7)?)?,
                })
            })
            .map_err(persist)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(persist)
    }

    /// Inserts a consolidation audit row.
    pub fn insert_cycle(&self, cycle: &ConsolidationCycle) -> GantryResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO consolidation_cycles (id, cycle_type, cycle_date, status, \
             patterns_detected, data_quality_score, insights_generated, \
             processing_time_seconds, results, error_message, completed_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                cycle.id.to_string(),
                cycle.cycle_type,
                cycle.cycle_date.to_rfc3339(),
                cycle.status,
                cycle.patterns_detected,
                cycle.data_quality_score,
                cycle.insights_generated,
                cycle.processing_time_seconds,
                cycle.results.to_string(),
                cycle.error_message,
                cycle.completed_at.map(|t| t.to_rfc3339()),
            ],
        )
        .map_err(persist)?;
        Ok(())
    }

    /// Rewrites the terminal fields of an existing audit row.
    pub fn update_cycle(&self, cycle: &ConsolidationCycle) -> GantryResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE consolidation_cycles SET status = ?2, patterns_detected = ?3, \
             data_quality_score = ?4, insights_generated = ?5, \
             processing_time_seconds = ?6, results = ?7, error_message = ?8, \
             completed_at = ?9 WHERE id = ?1",
            params![
                cycle.id.to_string(),
                cycle.status,
                cycle.patterns_detected,
                cycle.data_quality_score,
                cycle.insights_generated,
                cycle.processing_time_seconds,
                cycle.results.to_string(),
                cycle.error_message,
                cycle.completed_at.map(|t| t.to_rfc3339()),
            ],
        )
        .map_err(persist)?;
        Ok(())
    }
}
