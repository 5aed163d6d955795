//! Temporal knowledge graph store for the Gantry coordination engine.
//!
//! Two layers back the [`KnowledgeGraph`] facade: an append-only temporal
//! event log in SQLite (the durable record) and an in-memory node/edge
//! arena derived from it (the working copy, rebuilt on startup). Repeated
//! observations of the same relationship strengthen its weight up to a cap,
//! so frequently collaborating entities surface in context queries.
//!
//! # Main types
//!
//! - [`KnowledgeGraph`] — facade: event ingestion, context queries, pattern
//!   detection, consolidation cycles, predictions.
//! - [`SqliteStore`] — `rusqlite` persistence for all six tables.
//! - [`MemoryGraph`] — node/edge arena with key indexes and adjacency.
//! - [`Predictor`] / [`BaselinePredictor`] — opaque prediction boundary.

/// In-memory node/edge arena.
pub mod graph;
/// Facade combining the store, the arena, and analytics.
pub mod knowledge;
/// Data model for events, nodes, edges, patterns, and cycles.
pub mod models;
/// Prediction boundary and baseline implementation.
pub mod predict;
/// SQLite persistence.
pub mod store;

pub use graph::MemoryGraph;
pub use knowledge::KnowledgeGraph;
pub use models::{
    AgentActivity, CollaborationInsights, ConsolidationCycle, KnowledgeEdge, KnowledgeNode,
    NetworkMetrics, Pattern, Prediction, RelatedNode, TemporalContext, TemporalEvent,
    TemporalSummary, EDGE_INITIAL_WEIGHT, EDGE_STRENGTHEN_STEP, EDGE_WEIGHT_CAP,
};
pub use predict::{BaselinePredictor, PredictionOutcome, Predictor, ProjectFeatures};
pub use store::SqliteStore;
