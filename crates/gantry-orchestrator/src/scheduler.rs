use chrono::{DateTime, Utc};
use cron::Schedule;
use gantry_core::{CoordinatorConfig, GantryError, GantryResult};
use gantry_graph::KnowledgeGraph;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};

/// Cron-driven maintenance loop for the knowledge graph.
///
/// Sleeps until the next fire time of the configured expression, then runs
/// one daily consolidation cycle. Cycle failures are logged; the loop keeps
/// going.
pub struct MaintenanceScheduler {
    graph: Arc<KnowledgeGraph>,
    config: CoordinatorConfig,
}

impl MaintenanceScheduler {
    pub fn new(graph: Arc<KnowledgeGraph>, config: CoordinatorConfig) -> Self {
        Self { graph, config }
    }

    /// Parses a 7-field cron expression: sec min hour dom month dow year.
    pub fn parse_cron(cron_expr: &str) -> GantryResult<Schedule> {
        Schedule::from_str(cron_expr)
            .map_err(|e| GantryError::Config(format!("Invalid cron expression '{cron_expr}': {e}")))
    }

    /// The first upcoming fire time after now.
    pub fn next_fire_time(cron_expr: &str) -> GantryResult<DateTime<Utc>> {
        let schedule = Self::parse_cron(cron_expr)?;
        schedule.upcoming(Utc).next().ok_or_else(|| {
            GantryError::Config(format!(
                "Cron expression '{cron_expr}' has no upcoming fire times"
            ))
        })
    }

    /// Starts the background loop, validating the expression up front.
    ///
    /// Returns the `JoinHandle` so the caller can abort it on shutdown.
    pub fn start(self) -> GantryResult<tokio::task::JoinHandle<()>> {
        Self::parse_cron(&self.config.consolidation_cron)?;

        Ok(tokio::spawn(async move {
            loop {
                let next = match Self::next_fire_time(&self.config.consolidation_cron) {
                    Ok(next) => next,
                    Err(e) => {
                        warn!(error = %e, "Scheduler: cron evaluation failed, sleeping 60s");
                        tokio::time::sleep(std::time::Duration::from_secs(60)).await;
                        continue;
                    }
                };

                let now = Utc::now();
                if next > now {
                    let wait = (next - now).to_std().unwrap_or_default();
                    info!(fire_at = %next, "Scheduler: sleeping until next consolidation");
                    tokio::time::sleep(wait).await;
                }

                match self.graph.consolidate_daily_data() {
                    Ok(cycle) => info!(
                        cycle_id = %cycle.id,
                        patterns = cycle.patterns_detected,
                        quality = cycle.data_quality_score,
                        "Scheduled consolidation completed"
                    ),
                    Err(e) => warn!(error = %e, "Scheduled consolidation failed"),
                }
            }
        }))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_cron() {
        assert!(MaintenanceScheduler::parse_cron("0 0 2 * * * *").is_ok());
    }

    #[test]
    fn test_parse_invalid_cron() {
        let result = MaintenanceScheduler::parse_cron("definitely not cron");
        assert!(matches!(result, Err(GantryError::Config(_))));
    }

    #[test]
    fn test_default_config_expression_parses() {
        let config = CoordinatorConfig::default();
        assert!(MaintenanceScheduler::parse_cron(&config.consolidation_cron).is_ok());
    }

    #[test]
    fn test_next_fire_time_is_future() {
        let next = MaintenanceScheduler::next_fire_time("0 * * * * * *").unwrap();
        assert!(next > Utc::now());
    }

    #[tokio::test]
    async fn test_start_rejects_invalid_expression() {
        let graph = Arc::new(
            gantry_graph::KnowledgeGraph::initialize(gantry_core::GraphConfig::default()).unwrap(),
        );
        let scheduler = MaintenanceScheduler::new(
            graph,
            CoordinatorConfig {
                consolidation_cron: "bogus".to_string(),
            },
        );
        assert!(scheduler.start().is_err());
    }
}
