use crate::models::{
    KnowledgeEdge, KnowledgeNode, NetworkMetrics, RelatedNode, EDGE_INITIAL_WEIGHT,
    EDGE_STRENGTHEN_STEP, EDGE_WEIGHT_CAP,
};
use chrono::Utc;
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

/// In-memory arena of nodes and edges with key indexes and adjacency lists.
///
/// The arena is the working copy; durability lives in the SQLite store. Both
/// `ensure_*` methods return a clone of the resulting record so the caller
/// can persist exactly what the arena now holds.
#[derive(Debug, Default)]
pub struct MemoryGraph {
    nodes: HashMap<Uuid, KnowledgeNode>,
    edges: HashMap<Uuid, KnowledgeEdge>,
    node_index: HashMap<(String, String), Uuid>,
    edge_index: HashMap<(Uuid, Uuid, String), Uuid>,
    adjacency: HashMap<Uuid, Vec<Uuid>>,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a node loaded from the store, preserving its identity.
    pub fn insert_loaded_node(&mut self, node: KnowledgeNode) {
        self.node_index
            .insert((node.node_type.clone(), node.entity_id.clone()), node.id);
        self.adjacency.entry(node.id).or_default();
        self.nodes.insert(node.id, node);
    }

    /// Inserts an edge loaded from the store, preserving its identity.
    pub fn insert_loaded_edge(&mut self, edge: KnowledgeEdge) {
        self.edge_index.insert(
            (
                edge.from_node_id,
                edge.to_node_id,
                edge.relationship_type.clone(),
            ),
            edge.id,
        );
        self.adjacency.entry(edge.from_node_id).or_default().push(edge.id);
        self.adjacency.entry(edge.to_node_id).or_default().push(edge.id);
        self.edges.insert(edge.id, edge);
    }

    /// Upserts a node keyed by `(node_type, entity_id)`.
    ///
    /// An existing node keeps its id and `first_seen`; name and properties
    /// are refreshed and `last_updated` moves forward.
    pub fn ensure_node(
        &mut self,
        node_type: &str,
        entity_id: &str,
        entity_name: &str,
        properties: Value,
    ) -> KnowledgeNode {
        let now = Utc::now();
        let key = (node_type.to_string(), entity_id.to_string());

        if let Some(id) = self.node_index.get(&key).copied() {
            if let Some(node) = self.nodes.get_mut(&id) {
                if !entity_name.is_empty() {
                    node.entity_name = entity_name.to_string();
                }
                if !properties.is_null() {
                    node.properties = properties;
                }
                node.last_updated = now;
                return node.clone();
            }
        }

        let node = KnowledgeNode {
            id: Uuid::new_v4(),
            node_type: node_type.to_string(),
            entity_id: entity_id.to_string(),
            entity_name: if entity_name.is_empty() {
                entity_id.to_string()
            } else {
                entity_name.to_string()
            },
            properties,
            first_seen: now,
            last_updated: now,
        };
        self.insert_loaded_node(node.clone());
        node
    }

    /// Upserts an edge keyed by `(from, to, relationship_type)`.
    ///
    /// A new observation starts at [`EDGE_INITIAL_WEIGHT`]; every
    /// re-observation adds [`EDGE_STRENGTHEN_STEP`] up to
    /// [`EDGE_WEIGHT_CAP`] and bumps the interaction count. Weight and
    /// count never decrease.
    pub fn ensure_edge(
        &mut self,
        from_node_id: Uuid,
        to_node_id: Uuid,
        relationship_type: &str,
    ) -> KnowledgeEdge {
        let now = Utc::now();
        let key = (from_node_id, to_node_id, relationship_type.to_string());

        if let Some(id) = self.edge_index.get(&key).copied() {
            if let Some(edge) = self.edges.get_mut(&id) {
                edge.weight = (edge.weight + EDGE_STRENGTHEN_STEP).min(EDGE_WEIGHT_CAP);
                edge.interaction_count += 1;
                edge.last_interaction = now;
                return edge.clone();
            }
        }

        let edge = KnowledgeEdge {
            id: Uuid::new_v4(),
            from_node_id,
            to_node_id,
            relationship_type: relationship_type.to_string(),
            weight: EDGE_INITIAL_WEIGHT,
            confidence: 1.0,
            interaction_count: 1,
            created_at: now,
            last_interaction: now,
        };
        self.insert_loaded_edge(edge.clone());
        edge
    }

    /// Looks up a node id by its `(node_type, entity_id)` key.
    pub fn node_id(&self, node_type: &str, entity_id: &str) -> Option<Uuid> {
        self.node_index
            .get(&(node_type.to_string(), entity_id.to_string()))
            .copied()
    }

    pub fn node(&self, id: Uuid) -> Option<&KnowledgeNode> {
        self.nodes.get(&id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Nodes adjacent to `node_id` (either direction), with the connecting
    /// relationship and its weight.
    pub fn neighborhood(&self, node_id: Uuid) -> Vec<RelatedNode> {
        let Some(edge_ids) = self.adjacency.get(&node_id) else {
            return Vec::new();
        };

        let mut related = Vec::with_capacity(edge_ids.len());
        for edge_id in edge_ids {
            let Some(edge) = self.edges.get(edge_id) else {
                continue;
            };
            let other = if edge.from_node_id == node_id {
                edge.to_node_id
            } else {
                edge.from_node_id
            };
            if let Some(node) = self.nodes.get(&other) {
                related.push(RelatedNode {
                    entity_id: node.entity_id.clone(),
                    entity_name: node.entity_name.clone(),
                    node_type: node.node_type.clone(),
                    relationship_type: edge.relationship_type.clone(),
                    weight: edge.weight,
                });
            }
        }
        related
    }

    /// Degree of a node, counting both directions.
    pub fn degree(&self, node_id: Uuid) -> usize {
        self.adjacency.get(&node_id).map_or(0, Vec::len)
    }

    /// Whole-graph connectivity metrics. Density is over the directed graph.
    pub fn metrics(&self) -> NetworkMetrics {
        let node_count = self.nodes.len();
        let edge_count = self.edges.len();
        let max_degree = self.adjacency.values().map(Vec::len).max().unwrap_or(0);
        let avg_degree = if node_count == 0 {
            0.0
        } else {
            // Each edge contributes to two adjacency lists.
            2.0 * edge_count as f64 / node_count as f64
        };
        let density = if node_count < 2 {
            0.0
        } else {
            edge_count as f64 / (node_count as f64 * (node_count as f64 - 1.0))
        };
        NetworkMetrics {
            node_count,
            edge_count,
            avg_degree,
            max_degree,
            density,
        }
    }
}
