//! Per-resource outcomes and the aggregate run report.

use serde::Serialize;
use uuid::Uuid;

use crate::model::ResourceType;
use crate::plan::ActionKind;

/// How one resource's action ended.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    /// The adapter action completed.
    Success,
    /// The fingerprint matched the prior record; nothing ran.
    Unchanged,
    /// The action failed; the prior record entry is retained.
    Failed,
}

/// The result of reconciling one resource.
#[derive(Debug, Clone, Serialize)]
pub struct Outcome {
    /// Stack-local resource id.
    pub id: String,
    /// The resource's type.
    pub resource_type: ResourceType,
    /// The action that ran, absent for unchanged resources.
    pub action: Option<ActionKind>,
    /// How the action ended.
    pub status: OutcomeStatus,
    /// Physical id after the action, when known.
    pub physical_id: Option<String>,
    /// Failure description, for failed outcomes.
    pub error: Option<String>,
}

impl Outcome {
    /// Records a completed action.
    #[must_use]
    pub fn success(
        id: &str,
        resource_type: ResourceType,
        action: ActionKind,
        physical_id: Option<String>,
    ) -> Self {
        Self {
            id: id.to_string(),
            resource_type,
            action: Some(action),
            status: OutcomeStatus::Success,
            physical_id,
            error: None,
        }
    }

    /// Records a resource that needed no action.
    #[must_use]
    pub fn unchanged(id: &str, resource_type: ResourceType, physical_id: Option<String>) -> Self {
        Self {
            id: id.to_string(),
            resource_type,
            action: None,
            status: OutcomeStatus::Unchanged,
            physical_id,
            error: None,
        }
    }

    /// Records a failed action.
    #[must_use]
    pub fn failed(
        id: &str,
        resource_type: ResourceType,
        action: Option<ActionKind>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            id: id.to_string(),
            resource_type,
            action,
            status: OutcomeStatus::Failed,
            physical_id: None,
            error: Some(error.into()),
        }
    }

    /// Returns true if this outcome did not fail.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.status != OutcomeStatus::Failed
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let action = self
            .action
            .map_or_else(|| String::from("none"), |a| a.to_string());
        match (self.status, &self.error) {
            (OutcomeStatus::Failed, Some(error)) => {
                write!(f, "{}/{}: {action} FAILED: {error}", self.resource_type, self.id)
            }
            (OutcomeStatus::Unchanged, _) => {
                write!(f, "{}/{}: unchanged", self.resource_type, self.id)
            }
            _ => write!(f, "{}/{}: {action} ok", self.resource_type, self.id),
        }
    }
}

/// Overall result of a reconciliation run.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every outcome succeeded or was unchanged.
    Success,
    /// At least one outcome failed; successes are still persisted.
    PartialFailure,
}

/// Aggregate report for one reconciliation run.
#[derive(Debug, Clone, Serialize)]
pub struct DeployReport {
    /// Unique id of this run.
    pub run_id: Uuid,
    /// Name of the reconciled stack.
    pub stack: String,
    /// Overall result.
    pub status: RunStatus,
    /// Resources created.
    pub created: usize,
    /// Resources updated or replaced.
    pub updated: usize,
    /// Resources deleted.
    pub deleted: usize,
    /// Resources left unchanged.
    pub unchanged: usize,
    /// Resources whose action failed.
    pub failed: usize,
    /// Every per-resource outcome.
    pub outcomes: Vec<Outcome>,
}

impl DeployReport {
    /// Builds the aggregate report from per-resource outcomes.
    #[must_use]
    pub fn from_outcomes(run_id: Uuid, stack: &str, outcomes: Vec<Outcome>) -> Self {
        let mut created = 0;
        let mut updated = 0;
        let mut deleted = 0;
        let mut unchanged = 0;
        let mut failed = 0;

        for outcome in &outcomes {
            match (outcome.status, outcome.action) {
                (OutcomeStatus::Failed, _) => failed += 1,
                (OutcomeStatus::Unchanged, _) => unchanged += 1,
                (OutcomeStatus::Success, Some(ActionKind::Create)) => created += 1,
                (OutcomeStatus::Success, Some(ActionKind::Update | ActionKind::Replace)) => {
                    updated += 1;
                }
                (OutcomeStatus::Success, Some(ActionKind::Delete)) => deleted += 1,
                (OutcomeStatus::Success, None) => unchanged += 1,
            }
        }

        let status = if failed == 0 {
            RunStatus::Success
        } else {
            RunStatus::PartialFailure
        };

        Self {
            run_id,
            stack: stack.to_string(),
            status,
            created,
            updated,
            deleted,
            unchanged,
            failed,
            outcomes,
        }
    }

    /// Returns true if the run had no failed outcome.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Success
    }
}

impl std::fmt::Display for DeployReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "Stack '{}' run {}: {} created, {} updated, {} deleted, {} unchanged, {} failed",
            self.stack, self.run_id, self.created, self.updated, self.deleted, self.unchanged,
            self.failed
        )?;
        for outcome in &self.outcomes {
            writeln!(f, "  {outcome}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_and_status() {
        let outcomes = vec![
            Outcome::success("a", ResourceType::Workspace, ActionKind::Create, None),
            Outcome::success("b", ResourceType::Jobs, ActionKind::Update, Some("42".into())),
            Outcome::success("c", ResourceType::Dbfs, ActionKind::Replace, None),
            Outcome::success("d", ResourceType::Jobs, ActionKind::Delete, None),
            Outcome::unchanged("e", ResourceType::Workspace, Some("/Shared/e".into())),
            Outcome::failed("f", ResourceType::Jobs, Some(ActionKind::Create), "boom"),
        ];

        let report = DeployReport::from_outcomes(Uuid::new_v4(), "s", outcomes);
        assert_eq!(report.created, 1);
        assert_eq!(report.updated, 2);
        assert_eq!(report.deleted, 1);
        assert_eq!(report.unchanged, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.status, RunStatus::PartialFailure);
        assert!(!report.is_success());
    }

    #[test]
    fn test_all_ok_is_success() {
        let outcomes = vec![Outcome::unchanged("a", ResourceType::Jobs, None)];
        let report = DeployReport::from_outcomes(Uuid::new_v4(), "s", outcomes);
        assert!(report.is_success());
    }
}
