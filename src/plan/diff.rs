//! Classification of declared resources against the prior record.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::adapter::AdapterRegistry;
use crate::error::{AdapterError, Result, StackError};
use crate::model::{DeclaredResource, ResourceType, keys};
use crate::report::Outcome;
use crate::state::StackState;

/// The lifecycle action a planned change performs.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    /// Provision a resource that has no prior entry.
    Create,
    /// Re-apply a changed declaration to an existing resource.
    Update,
    /// Delete the prior resource and create it anew, used when the declared
    /// type differs from the deployed type.
    Replace,
    /// Remove a resource no longer declared.
    Delete,
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Replace => "replace",
            Self::Delete => "delete",
        };
        write!(f, "{label}")
    }
}

/// One action the reconciler will dispatch to an adapter.
#[derive(Debug, Clone, Serialize)]
pub struct PlannedAction {
    /// Stack-local resource id.
    pub id: String,
    /// The resource type whose adapter performs the action.
    pub resource_type: ResourceType,
    /// What the action does.
    pub kind: ActionKind,
    /// The declared resource, absent for pure deletes.
    pub resource: Option<DeclaredResource>,
    /// The prior physical id, absent for pure creates.
    pub physical_id: Option<String>,
    /// For replacements, the type of the prior resource being deleted; its
    /// adapter performs the delete half of the replacement.
    pub prior_resource_type: Option<ResourceType>,
    /// Fingerprint of the declared configuration, recorded on success.
    pub fingerprint: Option<String>,
}

/// The computed difference between a declaration and the prior record.
#[derive(Debug, Default, Serialize)]
pub struct StackDiff {
    /// Removals of ids no longer declared, in prior-record order. These run
    /// before any change so a freed job name is available to a same-named
    /// create in the same run.
    pub deletes: Vec<PlannedAction>,
    /// Creates, updates, and replacements, in declared order.
    pub changes: Vec<PlannedAction>,
    /// Ids whose fingerprint matches the prior record; no adapter is called.
    pub unchanged: Vec<String>,
    /// Resources whose fingerprint could not be computed; recorded as failed
    /// without any adapter action.
    pub failed: Vec<Outcome>,
}

impl StackDiff {
    /// Returns true if no adapter action would run.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.deletes.is_empty() && self.changes.is_empty()
    }

    /// Number of planned adapter actions.
    #[must_use]
    pub fn action_count(&self) -> usize {
        self.deletes.len() + self.changes.len()
    }
}

impl std::fmt::Display for StackDiff {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "{} to change, {} to delete, {} unchanged, {} failed",
            self.changes.len(),
            self.deletes.len(),
            self.unchanged.len(),
            self.failed.len()
        )?;
        for action in &self.deletes {
            writeln!(f, "  - {} {}/{}", action.kind, action.resource_type, action.id)?;
        }
        for action in &self.changes {
            writeln!(f, "  ~ {} {}/{}", action.kind, action.resource_type, action.id)?;
        }
        Ok(())
    }
}

/// Computes the declared-vs-deployed diff.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiffEngine;

impl DiffEngine {
    /// Creates a new diff engine.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Classifies every declared and prior-only resource.
    ///
    /// Fingerprints are computed through the adapters here, so a resource
    /// whose local content is unreadable surfaces as a failed entry rather
    /// than a planned action.
    ///
    /// # Errors
    ///
    /// Returns an error when a declared type has no registered adapter.
    pub async fn compute(
        &self,
        declared: &[DeclaredResource],
        prior: &StackState,
        adapters: &AdapterRegistry,
    ) -> Result<StackDiff> {
        let declared_ids: HashSet<&str> = declared.iter().map(|r| r.id.as_str()).collect();
        let mut declared_job_names: HashMap<String, String> = HashMap::new();
        let mut diff = StackDiff::default();

        // Prior-only ids become deletes, in prior-record order.
        for entry in &prior.resources {
            if !declared_ids.contains(entry.id.as_str()) {
                debug!("Planned delete of '{}' ({})", entry.id, entry.resource_type);
                diff.deletes.push(PlannedAction {
                    id: entry.id.clone(),
                    resource_type: entry.resource_type,
                    kind: ActionKind::Delete,
                    resource: None,
                    physical_id: Some(entry.physical_id.clone()),
                    prior_resource_type: None,
                    fingerprint: None,
                });
            }
        }

        for resource in declared {
            let adapter = adapters.get(resource.resource_type).ok_or_else(|| {
                StackError::internal(format!(
                    "no adapter registered for resource type '{}'",
                    resource.resource_type
                ))
            })?;

            let prior_entry = prior.get(&resource.id);
            let kind = match prior_entry {
                None => ActionKind::Create,
                Some(entry) if entry.resource_type != resource.resource_type => {
                    ActionKind::Replace
                }
                Some(_) => ActionKind::Update,
            };

            // Two declared jobs can never both hold the same remote name, so
            // the later holder is failed here, before any action is
            // dispatched. The first declared holder keeps the name.
            if resource.resource_type == ResourceType::Jobs {
                if let Some(name) = resource.property_str(keys::NAME) {
                    if let Some(holder) = declared_job_names.get(name) {
                        warn!(
                            "Job name '{name}' is declared by both '{holder}' and '{}'",
                            resource.id
                        );
                        diff.failed.push(Outcome::failed(
                            &resource.id,
                            resource.resource_type,
                            Some(kind),
                            AdapterError::NameCollision {
                                id: resource.id.clone(),
                                name: name.to_string(),
                            }
                            .to_string(),
                        ));
                        continue;
                    }
                    declared_job_names.insert(name.to_string(), resource.id.clone());
                }
            }

            let fingerprint = match adapter.fingerprint(resource).await {
                Ok(fingerprint) => fingerprint,
                Err(e) => {
                    diff.failed.push(Outcome::failed(
                        &resource.id,
                        resource.resource_type,
                        Some(kind),
                        e.to_string(),
                    ));
                    continue;
                }
            };

            match prior_entry {
                Some(entry)
                    if kind == ActionKind::Update
                        && entry.checksum.as_deref() == Some(fingerprint.as_str())
                        && entry.last_error.is_none() =>
                {
                    debug!("Resource '{}' is unchanged", resource.id);
                    diff.unchanged.push(resource.id.clone());
                }
                _ => {
                    debug!("Planned {kind} of '{}' ({})", resource.id, resource.resource_type);
                    diff.changes.push(PlannedAction {
                        id: resource.id.clone(),
                        resource_type: resource.resource_type,
                        kind,
                        resource: Some(resource.clone()),
                        physical_id: prior_entry.map(|e| e.physical_id.clone()),
                        prior_resource_type: (kind == ActionKind::Replace)
                            .then(|| prior_entry.map(|e| e.resource_type))
                            .flatten(),
                        fingerprint: Some(fingerprint),
                    });
                }
            }
        }

        info!(
            "Computed diff for stack '{}': {}",
            prior.stack_name,
            diff.to_string().lines().next().unwrap_or_default()
        );
        Ok(diff)
    }
}
