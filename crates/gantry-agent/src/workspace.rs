use parking_lot::RwLock;
use serde_json::{Map, Value};

/// Mutable workspace shared by every agent in a collaborative orchestration.
///
/// The engine imposes no synchronization beyond handing the same reference to
/// all participants: a write by one agent is visible to any agent that reads
/// afterwards, but callers must treat mutation as best-effort, not
/// transactional.
#[derive(Debug)]
pub struct SharedWorkspace {
    /// The orchestration this workspace belongs to.
    pub orchestration_id: String,
    /// Communication channel tag for out-of-band coordination.
    pub channel: String,
    shared: RwLock<Map<String, Value>>,
}

impl SharedWorkspace {
    /// Creates an empty workspace for the given orchestration.
    pub fn new(orchestration_id: impl Into<String>) -> Self {
        let orchestration_id = orchestration_id.into();
        let channel = format!("collab_{orchestration_id}");
        Self {
            orchestration_id,
            channel,
            shared: RwLock::new(Map::new()),
        }
    }

    /// Reads one key from the shared data slot.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.shared.read().get(key).cloned()
    }

    /// Writes one key into the shared data slot, returning the previous value.
    pub fn insert(&self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.shared.write().insert(key.into(), value)
    }

    /// Snapshot of the entire shared data slot.
    pub fn snapshot(&self) -> Map<String, Value> {
        self.shared.read().clone()
    }

    /// Workspace metadata as JSON, suitable for embedding in task parameters.
    pub fn descriptor(&self) -> Value {
        serde_json::json!({
            "orchestration_id": self.orchestration_id,
            "channel": self.channel,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_writes_visible_to_later_readers() {
        let ws = SharedWorkspace::new("orch-1");
        assert!(ws.get("findings").is_none());
        ws.insert("findings", serde_json::json!({"rfis": 4}));
        assert_eq!(ws.get("findings").unwrap()["rfis"], 4);
    }

    #[test]
    fn test_channel_tag_derived_from_id() {
        let ws = SharedWorkspace::new("orchestration_20240101_120000");
        assert_eq!(ws.channel, "collab_orchestration_20240101_120000");
    }

    #[test]
    fn test_descriptor_carries_orchestration_id() {
        let ws = SharedWorkspace::new("orch-9");
        let desc = ws.descriptor();
        assert_eq!(desc["orchestration_id"], "orch-9");
    }
}
