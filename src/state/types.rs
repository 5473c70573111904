//! State types for tracking deployed stack resources.
//!
//! These types form the persisted record of what a stack last successfully
//! deployed. The reconciler receives a copy, mutates a working copy as
//! actions are confirmed, and hands back a new record to persist.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{Properties, ResourceType};

/// Current version of the state record format.
pub const STATE_VERSION: &str = "1";

/// Maximum number of run-history entries retained per stack.
const MAX_HISTORY: usize = 100;

/// The persisted deployment record for one stack.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StackState {
    /// State format version.
    pub version: String,
    /// Name of the stack this record belongs to.
    pub stack_name: String,
    /// Status entries for deployed resources, as an ordered sequence.
    pub resources: Vec<DeployedResourceStatus>,
    /// When the record was last updated.
    pub last_updated: DateTime<Utc>,
    /// Recent reconciliation runs.
    #[serde(default)]
    pub history: Vec<RunHistoryEntry>,
}

/// The engine's record of what it last successfully did for one resource id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeployedResourceStatus {
    /// Stack-local resource id.
    pub id: String,
    /// Resource type deployed under this id.
    pub resource_type: ResourceType,
    /// Remote-side identifier, opaque to the reconciler and owned by the
    /// adapter that produced it.
    pub physical_id: String,
    /// Adapter-computed fingerprint of the last successfully deployed
    /// properties and content.
    #[serde(default)]
    pub checksum: Option<String>,
    /// The properties that were in effect at the last successful deploy.
    pub last_deployed_properties: Properties,
    /// When the resource was last successfully deployed.
    pub deployed_at: DateTime<Utc>,
    /// Annotation set when a delete for this entry failed, so the removal is
    /// retried on the next run instead of the resource being orphaned.
    #[serde(default)]
    pub last_error: Option<String>,
}

/// Summary of one reconciliation run, kept in the stack record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunHistoryEntry {
    /// When the run finished.
    pub timestamp: DateTime<Utc>,
    /// Identifier of the run.
    pub run_id: String,
    /// Resources created.
    pub created: usize,
    /// Resources updated (including type-change replacements).
    pub updated: usize,
    /// Resources deleted.
    pub deleted: usize,
    /// Resources left unchanged.
    pub unchanged: usize,
    /// Resources whose action failed.
    pub failed: usize,
    /// Whether every outcome succeeded.
    pub success: bool,
}

impl StackState {
    /// Creates a new empty record for a stack name.
    #[must_use]
    pub fn new(stack_name: &str) -> Self {
        Self {
            version: STATE_VERSION.to_string(),
            stack_name: stack_name.to_string(),
            resources: Vec::new(),
            last_updated: Utc::now(),
            history: Vec::new(),
        }
    }

    /// Gets the status entry for a resource id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&DeployedResourceStatus> {
        self.resources.iter().find(|r| r.id == id)
    }

    /// Gets a mutable status entry for a resource id.
    pub fn get_mut(&mut self, id: &str) -> Option<&mut DeployedResourceStatus> {
        self.resources.iter_mut().find(|r| r.id == id)
    }

    /// Returns true if an entry exists for the id.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Replaces the entry with the same id, or appends a new one.
    pub fn upsert(&mut self, status: DeployedResourceStatus) {
        self.last_updated = Utc::now();
        if let Some(existing) = self.get_mut(&status.id) {
            *existing = status;
        } else {
            self.resources.push(status);
        }
    }

    /// Removes the entry for a resource id, returning it if present.
    pub fn remove(&mut self, id: &str) -> Option<DeployedResourceStatus> {
        let index = self.resources.iter().position(|r| r.id == id)?;
        self.last_updated = Utc::now();
        Some(self.resources.remove(index))
    }

    /// Returns all tracked resource ids, in record order.
    #[must_use]
    pub fn resource_ids(&self) -> Vec<&str> {
        self.resources.iter().map(|r| r.id.as_str()).collect()
    }

    /// Returns the number of tracked resources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Returns true if no resources are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Appends a run-history entry, dropping the oldest past the cap.
    pub fn add_history(&mut self, entry: RunHistoryEntry) {
        if self.history.len() >= MAX_HISTORY {
            self.history.remove(0);
        }
        self.history.push(entry);
    }
}

impl DeployedResourceStatus {
    /// Creates a status entry for a freshly confirmed deploy.
    #[must_use]
    pub fn new(
        id: &str,
        resource_type: ResourceType,
        physical_id: &str,
        checksum: Option<String>,
        last_deployed_properties: Properties,
    ) -> Self {
        Self {
            id: id.to_string(),
            resource_type,
            physical_id: physical_id.to_string(),
            checksum,
            last_deployed_properties,
            deployed_at: Utc::now(),
            last_error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(id: &str) -> DeployedResourceStatus {
        DeployedResourceStatus::new(
            id,
            ResourceType::Jobs,
            "42",
            Some(String::from("abc")),
            Properties::new(),
        )
    }

    #[test]
    fn test_upsert_and_remove() {
        let mut state = StackState::new("test");
        assert!(state.is_empty());

        state.upsert(status("a"));
        state.upsert(status("b"));
        assert_eq!(state.len(), 2);
        assert_eq!(state.resource_ids(), vec!["a", "b"]);

        let mut replacement = status("a");
        replacement.physical_id = String::from("43");
        state.upsert(replacement);
        assert_eq!(state.len(), 2);
        assert_eq!(state.get("a").unwrap().physical_id, "43");

        let removed = state.remove("a").unwrap();
        assert_eq!(removed.physical_id, "43");
        assert_eq!(state.len(), 1);
        assert!(!state.contains("a"));
    }

    #[test]
    fn test_history_cap() {
        let mut state = StackState::new("test");
        for i in 0..120 {
            state.add_history(RunHistoryEntry {
                timestamp: Utc::now(),
                run_id: format!("run-{i}"),
                created: 0,
                updated: 0,
                deleted: 0,
                unchanged: 0,
                failed: 0,
                success: true,
            });
        }
        assert_eq!(state.history.len(), 100);
        assert_eq!(state.history[0].run_id, "run-20");
    }

    #[test]
    fn test_state_round_trip_is_lossless() {
        let mut state = StackState::new("round-trip");
        let mut entry = status("a");
        entry.checksum = Some(String::from("deadbeefcafe"));
        entry.physical_id = String::from("opaque-handle-17");
        state.upsert(entry);

        let json = serde_json::to_string(&state).unwrap();
        let loaded: StackState = serde_json::from_str(&json).unwrap();

        assert_eq!(loaded, state);
        assert_eq!(loaded.get("a").unwrap().physical_id, "opaque-handle-17");
        assert_eq!(
            loaded.get("a").unwrap().checksum.as_deref(),
            Some("deadbeefcafe")
        );
    }
}
