//! End-to-end persistence tests against a file-backed database.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use gantry_core::{GraphConfig, TaskResult};
use gantry_graph::{KnowledgeGraph, EDGE_WEIGHT_CAP};
use serde_json::{json, Value};

fn file_config(dir: &tempfile::TempDir) -> GraphConfig {
    GraphConfig {
        database_path: Some(dir.path().join("knowledge.db")),
        ..GraphConfig::default()
    }
}

#[test]
fn strengthening_survives_restart() {
    let dir = tempfile::tempdir().unwrap();

    {
        let kg = KnowledgeGraph::initialize(file_config(&dir)).unwrap();
        for _ in 0..4 {
            kg.store_agent_event("a1", "start", Value::Null, Some("p1"))
                .unwrap();
        }
        kg.close();
    }

    // A fresh instance continues from the persisted weight (1.3), not 1.0.
    let kg = KnowledgeGraph::initialize(file_config(&dir)).unwrap();
    kg.store_agent_event("a1", "start", Value::Null, Some("p1"))
        .unwrap();

    let context = kg.query_temporal_context("a1", "agent", 24).unwrap();
    let edge = context
        .related
        .iter()
        .find(|r| r.relationship_type == "works_on")
        .unwrap();
    assert!((edge.weight - 1.4).abs() < 1e-9);
}

#[test]
fn weight_cap_holds_across_many_observations() {
    let dir = tempfile::tempdir().unwrap();
    let kg = KnowledgeGraph::initialize(file_config(&dir)).unwrap();

    for _ in 0..30 {
        kg.store_agent_event("a1", "start", Value::Null, Some("p1"))
            .unwrap();
    }

    let context = kg.query_temporal_context("p1", "project", 24).unwrap();
    assert_eq!(context.related.len(), 1);
    assert!((context.related[0].weight - EDGE_WEIGHT_CAP).abs() < 1e-9);
}

#[test]
fn events_survive_restart_and_windowing() {
    let dir = tempfile::tempdir().unwrap();

    {
        let kg = KnowledgeGraph::initialize(file_config(&dir)).unwrap();
        let result = TaskResult::completed(
            "done",
            json!({"projects": [{"id": "pr-1", "name": "Tower"}]}),
        );
        kg.store_task_result("a1", "extract_data", &result, &json!({"project_id": "p1"}))
            .unwrap();
        kg.close();
    }

    let kg = KnowledgeGraph::initialize(file_config(&dir)).unwrap();
    let context = kg.query_temporal_context("a1", "agent", 24).unwrap();
    assert_eq!(context.events.len(), 1);
    assert_eq!(context.events[0].event_type, "task_execution");

    // Entity nodes created before the restart are reachable again.
    let produced: Vec<_> = context
        .related
        .iter()
        .filter(|r| r.relationship_type == "produced")
        .collect();
    assert_eq!(produced.len(), 1);
    assert_eq!(produced[0].entity_name, "Tower");
}

#[test]
fn consolidation_audit_rows_persist() {
    let dir = tempfile::tempdir().unwrap();
    let kg = KnowledgeGraph::initialize(file_config(&dir)).unwrap();

    kg.store_agent_event("a1", "start", Value::Null, Some("p1"))
        .unwrap();
    let cycle = kg.consolidate_daily_data().unwrap();
    assert_eq!(cycle.status, "completed");
    assert!(cycle.processing_time_seconds >= 0.0);
}
