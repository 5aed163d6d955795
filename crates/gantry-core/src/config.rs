use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the temporal knowledge graph store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphConfig {
    /// SQLite database path; `None` uses an in-memory database.
    #[serde(default)]
    pub database_path: Option<PathBuf>,
    /// Events older than this are removed by the consolidation cleanup step.
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
    /// Maximum number of events a single insight query will scan.
    #[serde(default = "default_query_limit")]
    pub query_limit: usize,
}

fn default_retention_days() -> u32 {
    90
}

fn default_query_limit() -> usize {
    1000
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            retention_days: default_retention_days(),
            query_limit: default_query_limit(),
        }
    }
}

/// Configuration for the orchestration coordinator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Cron expression (7-field) for the daily consolidation cycle.
    #[serde(default = "default_consolidation_cron")]
    pub consolidation_cron: String,
}

fn default_consolidation_cron() -> String {
    // 02:00 UTC every day
    "0 0 2 * * * *".to_string()
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            consolidation_cron: default_consolidation_cron(),
        }
    }
}
