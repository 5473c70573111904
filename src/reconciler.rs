//! The reconciliation engine.
//!
//! A run diffs the declared resources against the persisted stack record,
//! dispatches the resulting actions through the per-type adapters, and
//! persists the updated record exactly once at the end. The working record
//! is updated immediately as each action is confirmed, so a failure partway
//! through never forgets a resource that was already created and never
//! claims a success that was not observed.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::adapter::{AdapterRegistry, ResourceAdapter};
use crate::error::{AdapterError, Result, StackError, StateError};
use crate::model::{DeclaredResource, validate_declared};
use crate::plan::{ActionKind, DiffEngine, PlannedAction, StackDiff};
use crate::report::{DeployReport, Outcome};
use crate::state::{DeployedResourceStatus, RunHistoryEntry, StackState, StateStore};

/// Tuning knobs for a reconciliation run.
#[derive(Debug, Clone)]
pub struct ReconcileOptions {
    /// Timeout applied to each individual adapter action.
    pub action_timeout: Duration,
    /// Maximum number of adapter actions in flight within one phase.
    pub max_workers: usize,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            action_timeout: Duration::from_secs(60),
            max_workers: 4,
        }
    }
}

/// Drives declared resources to convergence with the remote environment.
pub struct Reconciler<S: StateStore> {
    store: S,
    adapters: Arc<AdapterRegistry>,
    diff_engine: DiffEngine,
    options: ReconcileOptions,
}

/// State mutation to apply once an action's result is confirmed.
enum StateEffect {
    /// Record a confirmed create or update.
    Upsert(DeployedResourceStatus),
    /// Drop the entry for a confirmed delete.
    Remove(String),
    /// Keep the entry but note that its delete failed, so the removal is
    /// retried next run.
    AnnotateDeleteFailure {
        /// Id of the retained entry.
        id: String,
        /// The delete failure.
        error: String,
    },
    /// Leave the record untouched.
    None,
}

struct ActionCompletion {
    outcome: Outcome,
    effect: StateEffect,
}

impl<S: StateStore> Reconciler<S> {
    /// Creates a reconciler over a state store and adapter registry.
    pub fn new(store: S, adapters: AdapterRegistry) -> Self {
        Self {
            store,
            adapters: Arc::new(adapters),
            diff_engine: DiffEngine::new(),
            options: ReconcileOptions::default(),
        }
    }

    /// Replaces the default run options.
    #[must_use]
    pub fn with_options(mut self, options: ReconcileOptions) -> Self {
        self.options = options;
        self
    }

    fn validate(&self, declared: &[DeclaredResource]) -> Result<()> {
        validate_declared(declared)?;
        for resource in declared {
            let adapter = self.require_adapter(resource)?;
            adapter.validate(resource)?;
        }
        Ok(())
    }

    fn require_adapter(&self, resource: &DeclaredResource) -> Result<Arc<dyn ResourceAdapter>> {
        self.adapters.get(resource.resource_type).ok_or_else(|| {
            StackError::internal(format!(
                "no adapter registered for resource type '{}'",
                resource.resource_type
            ))
        })
    }

    /// Computes the diff a run would execute, without touching any remote
    /// resource or the persisted record.
    ///
    /// # Errors
    ///
    /// Returns an error on validation failure or when the prior record
    /// cannot be loaded.
    pub async fn plan(&self, stack_name: &str, declared: &[DeclaredResource]) -> Result<StackDiff> {
        self.validate(declared)?;
        let prior = self
            .store
            .load(stack_name)
            .await?
            .unwrap_or_else(|| StackState::new(stack_name));
        self.diff_engine.compute(declared, &prior, &self.adapters).await
    }

    /// Reconciles the declared resources and persists the updated record.
    ///
    /// Per-resource failures never abort the run; they are reported in the
    /// returned [`DeployReport`] while every other resource is still
    /// attempted.
    ///
    /// # Errors
    ///
    /// Returns an error on validation failure, when the prior record cannot
    /// be loaded, or when the final record cannot be persisted. In the last
    /// case remote changes from this run may not be reflected in the
    /// persisted record.
    pub async fn run(
        &self,
        stack_name: &str,
        declared: &[DeclaredResource],
    ) -> Result<DeployReport> {
        let run_id = Uuid::new_v4();
        info!(
            "Reconciling stack '{stack_name}' ({} declared resources, run {run_id})",
            declared.len()
        );

        self.validate(declared)?;

        let prior = self
            .store
            .load(stack_name)
            .await?
            .unwrap_or_else(|| StackState::new(stack_name));
        let diff = self
            .diff_engine
            .compute(declared, &prior, &self.adapters)
            .await?;
        let StackDiff {
            deletes,
            changes,
            unchanged,
            failed,
        } = diff;

        let mut working = prior.clone();
        let mut outcomes: Vec<Outcome> = Vec::new();

        for id in &unchanged {
            if let Some(entry) = prior.get(id) {
                outcomes.push(Outcome::unchanged(
                    &entry.id,
                    entry.resource_type,
                    Some(entry.physical_id.clone()),
                ));
            }
        }
        outcomes.extend(failed);

        // Deletes of removed ids run first so a freed job name is available
        // to a same-named create later in the same run.
        self.run_phase(deletes, &mut working, &mut outcomes).await?;
        self.run_phase(changes, &mut working, &mut outcomes).await?;

        let report = DeployReport::from_outcomes(run_id, stack_name, outcomes);
        working.add_history(RunHistoryEntry {
            timestamp: Utc::now(),
            run_id: run_id.to_string(),
            created: report.created,
            updated: report.updated,
            deleted: report.deleted,
            unchanged: report.unchanged,
            failed: report.failed,
            success: report.is_success(),
        });

        if let Err(e) = self.store.save(&working).await {
            error!("Failed to persist record for stack '{stack_name}' after run {run_id}: {e}");
            for outcome in &report.outcomes {
                error!("  completed before persistence failure: {outcome}");
            }
            return Err(StackError::State(StateError::PersistFailed {
                stack: stack_name.to_string(),
                message: e.to_string(),
            }));
        }

        info!(
            "Stack '{stack_name}' run {run_id} finished: {} created, {} updated, {} deleted, \
             {} unchanged, {} failed",
            report.created, report.updated, report.deleted, report.unchanged, report.failed
        );
        Ok(report)
    }

    /// Dispatches one phase of actions with bounded parallelism, applying
    /// each confirmed result to the working record as it completes.
    async fn run_phase(
        &self,
        actions: Vec<PlannedAction>,
        working: &mut StackState,
        outcomes: &mut Vec<Outcome>,
    ) -> Result<()> {
        if actions.is_empty() {
            return Ok(());
        }

        // With a single worker the phase runs strictly in plan order.
        if self.options.max_workers <= 1 {
            for action in actions {
                let completion = match self.adapters_for(&action) {
                    Ok((adapter, delete_adapter)) => {
                        execute_action(adapter, delete_adapter, action, self.options.action_timeout)
                            .await
                    }
                    Err(completion) => completion,
                };
                outcomes.push(completion.outcome);
                apply_effect(working, completion.effect);
            }
            return Ok(());
        }

        let semaphore = Arc::new(Semaphore::new(self.options.max_workers));
        let mut tasks = JoinSet::new();

        for action in actions {
            let (adapter, delete_adapter) = match self.adapters_for(&action) {
                Ok(adapters) => adapters,
                Err(completion) => {
                    outcomes.push(completion.outcome);
                    apply_effect(working, completion.effect);
                    continue;
                }
            };
            let semaphore = Arc::clone(&semaphore);
            let timeout = self.options.action_timeout;
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                execute_action(adapter, delete_adapter, action, timeout).await
            });
        }

        // Results are applied serially here; the working record is the only
        // shared mutable state of the run.
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(completion) => {
                    outcomes.push(completion.outcome);
                    apply_effect(working, completion.effect);
                }
                Err(e) => {
                    return Err(StackError::internal(format!("action task failed: {e}")));
                }
            }
        }
        Ok(())
    }

    /// Resolves the acting adapter and, for replacements, the prior type's
    /// adapter that performs the delete half.
    fn adapters_for(
        &self,
        action: &PlannedAction,
    ) -> std::result::Result<(Arc<dyn ResourceAdapter>, Arc<dyn ResourceAdapter>), ActionCompletion>
    {
        let missing = |resource_type| {
            warn!("No adapter registered for resource type '{resource_type}'");
            ActionCompletion {
                outcome: Outcome::failed(
                    &action.id,
                    action.resource_type,
                    Some(action.kind),
                    format!("no adapter registered for resource type '{resource_type}'"),
                ),
                effect: StateEffect::None,
            }
        };

        let adapter = self
            .adapters
            .get(action.resource_type)
            .ok_or_else(|| missing(action.resource_type))?;
        let delete_adapter = match action.prior_resource_type {
            Some(prior_type) => self.adapters.get(prior_type).ok_or_else(|| missing(prior_type))?,
            None => Arc::clone(&adapter),
        };
        Ok((adapter, delete_adapter))
    }
}

fn apply_effect(working: &mut StackState, effect: StateEffect) {
    match effect {
        StateEffect::Upsert(status) => working.upsert(status),
        StateEffect::Remove(id) => {
            working.remove(&id);
        }
        StateEffect::AnnotateDeleteFailure { id, error } => {
            if let Some(entry) = working.get_mut(&id) {
                entry.last_error = Some(error);
            }
        }
        StateEffect::None => {}
    }
}

async fn with_timeout<T, F>(id: &str, timeout: Duration, action: F) -> std::result::Result<T, AdapterError>
where
    F: std::future::Future<Output = std::result::Result<T, AdapterError>>,
{
    match tokio::time::timeout(timeout, action).await {
        Ok(result) => result,
        Err(_) => Err(AdapterError::Timeout {
            id: id.to_string(),
            secs: timeout.as_secs(),
        }),
    }
}

fn malformed_action(action: &PlannedAction, missing: &str) -> ActionCompletion {
    ActionCompletion {
        outcome: Outcome::failed(
            &action.id,
            action.resource_type,
            Some(action.kind),
            format!("planned {} is missing its {missing}", action.kind),
        ),
        effect: StateEffect::None,
    }
}

/// Runs one planned action to completion and describes the record mutation
/// its confirmed result justifies.
///
/// `delete_adapter` differs from `adapter` only for replacements, where the
/// prior resource belongs to a different type.
async fn execute_action(
    adapter: Arc<dyn ResourceAdapter>,
    delete_adapter: Arc<dyn ResourceAdapter>,
    action: PlannedAction,
    timeout: Duration,
) -> ActionCompletion {
    match action.kind {
        ActionKind::Create => {
            let Some(resource) = action.resource.as_ref() else {
                return malformed_action(&action, "declared resource");
            };
            match with_timeout(&action.id, timeout, adapter.create(resource)).await {
                Ok(physical_id) => ActionCompletion {
                    outcome: Outcome::success(
                        &action.id,
                        action.resource_type,
                        ActionKind::Create,
                        Some(physical_id.clone()),
                    ),
                    effect: StateEffect::Upsert(DeployedResourceStatus::new(
                        &action.id,
                        action.resource_type,
                        &physical_id,
                        action.fingerprint.clone(),
                        resource.properties.clone(),
                    )),
                },
                Err(e) => {
                    warn!("Create of '{}' failed: {e}", action.id);
                    ActionCompletion {
                        outcome: Outcome::failed(
                            &action.id,
                            action.resource_type,
                            Some(ActionKind::Create),
                            e.to_string(),
                        ),
                        effect: StateEffect::None,
                    }
                }
            }
        }

        ActionKind::Update => {
            let Some(resource) = action.resource.as_ref() else {
                return malformed_action(&action, "declared resource");
            };
            let Some(prior_physical_id) = action.physical_id.as_deref() else {
                return malformed_action(&action, "prior physical id");
            };
            match with_timeout(&action.id, timeout, adapter.update(resource, prior_physical_id))
                .await
            {
                Ok(physical_id) => ActionCompletion {
                    outcome: Outcome::success(
                        &action.id,
                        action.resource_type,
                        ActionKind::Update,
                        Some(physical_id.clone()),
                    ),
                    effect: StateEffect::Upsert(DeployedResourceStatus::new(
                        &action.id,
                        action.resource_type,
                        &physical_id,
                        action.fingerprint.clone(),
                        resource.properties.clone(),
                    )),
                },
                Err(e) => {
                    warn!("Update of '{}' failed: {e}", action.id);
                    ActionCompletion {
                        outcome: Outcome::failed(
                            &action.id,
                            action.resource_type,
                            Some(ActionKind::Update),
                            e.to_string(),
                        ),
                        effect: StateEffect::None,
                    }
                }
            }
        }

        ActionKind::Replace => {
            let Some(resource) = action.resource.as_ref() else {
                return malformed_action(&action, "declared resource");
            };
            let Some(prior_physical_id) = action.physical_id.as_deref() else {
                return malformed_action(&action, "prior physical id");
            };

            // The prior resource has a different type and cannot be updated
            // in place; remove it first, then create the declared one.
            if let Err(e) =
                with_timeout(&action.id, timeout, delete_adapter.delete(prior_physical_id)).await
            {
                warn!("Replace of '{}' failed deleting the prior resource: {e}", action.id);
                return ActionCompletion {
                    outcome: Outcome::failed(
                        &action.id,
                        action.resource_type,
                        Some(ActionKind::Replace),
                        e.to_string(),
                    ),
                    effect: StateEffect::AnnotateDeleteFailure {
                        id: action.id.clone(),
                        error: e.to_string(),
                    },
                };
            }

            match with_timeout(&action.id, timeout, adapter.create(resource)).await {
                Ok(physical_id) => ActionCompletion {
                    outcome: Outcome::success(
                        &action.id,
                        action.resource_type,
                        ActionKind::Replace,
                        Some(physical_id.clone()),
                    ),
                    effect: StateEffect::Upsert(DeployedResourceStatus::new(
                        &action.id,
                        action.resource_type,
                        &physical_id,
                        action.fingerprint.clone(),
                        resource.properties.clone(),
                    )),
                },
                Err(e) => {
                    // The prior resource is confirmed gone; keeping its entry
                    // would claim a deploy that no longer exists.
                    warn!("Replace of '{}' failed creating the new resource: {e}", action.id);
                    ActionCompletion {
                        outcome: Outcome::failed(
                            &action.id,
                            action.resource_type,
                            Some(ActionKind::Replace),
                            e.to_string(),
                        ),
                        effect: StateEffect::Remove(action.id.clone()),
                    }
                }
            }
        }

        ActionKind::Delete => {
            let Some(physical_id) = action.physical_id.as_deref() else {
                return malformed_action(&action, "prior physical id");
            };
            match with_timeout(&action.id, timeout, adapter.delete(physical_id)).await {
                Ok(()) => {
                    debug!("Deleted '{}' ({})", action.id, physical_id);
                    ActionCompletion {
                        outcome: Outcome::success(
                            &action.id,
                            action.resource_type,
                            ActionKind::Delete,
                            Some(physical_id.to_string()),
                        ),
                        effect: StateEffect::Remove(action.id.clone()),
                    }
                }
                Err(e) => {
                    warn!("Delete of '{}' failed: {e}", action.id);
                    ActionCompletion {
                        outcome: Outcome::failed(
                            &action.id,
                            action.resource_type,
                            Some(ActionKind::Delete),
                            e.to_string(),
                        ),
                        effect: StateEffect::AnnotateDeleteFailure {
                            id: action.id.clone(),
                            error: e.to_string(),
                        },
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{JobsAdapter, WorkspaceAdapter};
    use crate::error::{RemoteError, ValidationError};
    use crate::model::{Properties, ResourceType};
    use crate::remote::{
        FsSourceReader, JobSummary, JobsService, NotebookImport, WorkspaceObject,
        WorkspaceService,
    };
    use crate::report::OutcomeStatus;
    use crate::state::{LocalStateStore, MockStateStore};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU64, Ordering};
    use tempfile::TempDir;

    /// Installs a test-writer subscriber once; later calls are no-ops.
    /// Run with `RUST_LOG=debug` and `--nocapture` to see engine tracing.
    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    /// Records workspace calls without any remote side.
    #[derive(Default)]
    struct FakeWorkspace {
        imports: Mutex<Vec<String>>,
        deletes: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl WorkspaceService for FakeWorkspace {
        async fn mkdirs(&self, _path: &str) -> std::result::Result<(), RemoteError> {
            Ok(())
        }

        async fn import(&self, request: &NotebookImport) -> std::result::Result<(), RemoteError> {
            self.imports.lock().unwrap().push(request.path.clone());
            Ok(())
        }

        async fn list_recursive(
            &self,
            _path: &str,
        ) -> std::result::Result<Vec<WorkspaceObject>, RemoteError> {
            Ok(Vec::new())
        }

        async fn delete(&self, path: &str, _recursive: bool) -> std::result::Result<(), RemoteError> {
            self.deletes.lock().unwrap().push(path.to_string());
            Ok(())
        }
    }

    /// In-memory jobs service with unique numeric ids.
    #[derive(Default)]
    struct FakeJobs {
        jobs: Mutex<Vec<JobSummary>>,
        next_id: AtomicU64,
    }

    #[async_trait]
    impl JobsService for FakeJobs {
        async fn create_job(&self, settings: &Properties) -> std::result::Result<u64, RemoteError> {
            let name = settings
                .get("name")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            let job_id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
            self.jobs.lock().unwrap().push(JobSummary { job_id, name });
            Ok(job_id)
        }

        async fn reset_job(
            &self,
            job_id: u64,
            settings: &Properties,
        ) -> std::result::Result<(), RemoteError> {
            let mut jobs = self.jobs.lock().unwrap();
            let job = jobs
                .iter_mut()
                .find(|j| j.job_id == job_id)
                .ok_or_else(|| RemoteError::not_found(format!("job {job_id}")))?;
            if let Some(name) = settings.get("name").and_then(|v| v.as_str()) {
                job.name = name.to_string();
            }
            Ok(())
        }

        async fn get_job(&self, job_id: u64) -> std::result::Result<JobSummary, RemoteError> {
            self.jobs
                .lock()
                .unwrap()
                .iter()
                .find(|j| j.job_id == job_id)
                .cloned()
                .ok_or_else(|| RemoteError::not_found(format!("job {job_id}")))
        }

        async fn delete_job(&self, job_id: u64) -> std::result::Result<(), RemoteError> {
            let mut jobs = self.jobs.lock().unwrap();
            let before = jobs.len();
            jobs.retain(|j| j.job_id != job_id);
            if jobs.len() == before {
                return Err(RemoteError::not_found(format!("job {job_id}")));
            }
            Ok(())
        }

        async fn find_jobs_by_name(
            &self,
            name: &str,
        ) -> std::result::Result<Vec<JobSummary>, RemoteError> {
            Ok(self
                .jobs
                .lock()
                .unwrap()
                .iter()
                .filter(|j| j.name == name)
                .cloned()
                .collect())
        }
    }

    /// Adapter whose behavior is fixed per test.
    struct ScriptedAdapter {
        resource_type: ResourceType,
        fingerprint: String,
        update_delay: Option<Duration>,
        fail_create: bool,
        fail_delete: bool,
    }

    impl ScriptedAdapter {
        fn new(resource_type: ResourceType, fingerprint: &str) -> Self {
            Self {
                resource_type,
                fingerprint: fingerprint.to_string(),
                update_delay: None,
                fail_create: false,
                fail_delete: false,
            }
        }
    }

    #[async_trait]
    impl ResourceAdapter for ScriptedAdapter {
        fn resource_type(&self) -> ResourceType {
            self.resource_type
        }

        fn validate(
            &self,
            _resource: &DeclaredResource,
        ) -> std::result::Result<(), ValidationError> {
            Ok(())
        }

        async fn fingerprint(
            &self,
            _resource: &DeclaredResource,
        ) -> std::result::Result<String, AdapterError> {
            Ok(self.fingerprint.clone())
        }

        async fn create(
            &self,
            resource: &DeclaredResource,
        ) -> std::result::Result<String, AdapterError> {
            if self.fail_create {
                return Err(AdapterError::create(&resource.id, "remote refused"));
            }
            Ok(format!("pid-{}", resource.id))
        }

        async fn update(
            &self,
            _resource: &DeclaredResource,
            physical_id: &str,
        ) -> std::result::Result<String, AdapterError> {
            if let Some(delay) = self.update_delay {
                tokio::time::sleep(delay).await;
            }
            Ok(physical_id.to_string())
        }

        async fn delete(&self, physical_id: &str) -> std::result::Result<(), AdapterError> {
            if self.fail_delete {
                return Err(AdapterError::delete(physical_id, "remote refused"));
            }
            Ok(())
        }
    }

    fn notebook_declaration(dir: &TempDir) -> Vec<DeclaredResource> {
        let source = dir.path().join("job1.py");
        std::fs::write(&source, b"print('hello')").unwrap();

        let mut properties = Properties::new();
        properties.insert("source_path".into(), json!(source.to_str().unwrap()));
        properties.insert("path".into(), json!("/Shared/stacks/job1"));
        properties.insert("object_type".into(), json!("NOTEBOOK"));
        vec![DeclaredResource::new(
            "job1",
            ResourceType::Workspace,
            properties,
        )]
    }

    fn workspace_reconciler(
        dir: &TempDir,
        workspace: Arc<FakeWorkspace>,
    ) -> Reconciler<LocalStateStore> {
        let mut registry = AdapterRegistry::new();
        registry.register(Arc::new(WorkspaceAdapter::new(
            workspace,
            Arc::new(FsSourceReader::new()),
        )));
        Reconciler::new(
            LocalStateStore::with_base_dir(dir.path().join("state")),
            registry,
        )
    }

    fn job_declaration(id: &str, name: &str) -> DeclaredResource {
        let mut properties = Properties::new();
        properties.insert("name".into(), json!(name));
        properties.insert("existing_cluster_id".into(), json!("cluster-1"));
        DeclaredResource::new(id, ResourceType::Jobs, properties)
    }

    /// Minimal declaration that passes structural validation; used with
    /// [`ScriptedAdapter`], which ignores the properties.
    fn minimal_job(id: &str) -> DeclaredResource {
        let mut properties = Properties::new();
        properties.insert("name".into(), json!(id));
        DeclaredResource::new(id, ResourceType::Jobs, properties)
    }

    #[tokio::test]
    async fn test_create_then_unchanged_then_delete() {
        init_tracing();
        let dir = TempDir::new().unwrap();
        let workspace = Arc::new(FakeWorkspace::default());
        let reconciler = workspace_reconciler(&dir, Arc::clone(&workspace));
        let declared = notebook_declaration(&dir);

        // First run creates the notebook.
        let report = reconciler.run("demo", &declared).await.unwrap();
        assert!(report.is_success());
        assert_eq!(report.created, 1);
        assert_eq!(report.outcomes[0].physical_id.as_deref(), Some("/Shared/stacks/job1"));

        let state = reconciler.store.load("demo").await.unwrap().unwrap();
        assert_eq!(state.len(), 1);
        assert_eq!(state.get("job1").unwrap().physical_id, "/Shared/stacks/job1");
        assert_eq!(workspace.imports.lock().unwrap().len(), 1);

        // Second run with the same declaration touches nothing.
        let report = reconciler.run("demo", &declared).await.unwrap();
        assert!(report.is_success());
        assert_eq!(report.unchanged, 1);
        assert_eq!(report.created + report.updated, 0);
        assert_eq!(workspace.imports.lock().unwrap().len(), 1);

        // Removing the declaration deletes the remote notebook.
        let report = reconciler.run("demo", &[]).await.unwrap();
        assert!(report.is_success());
        assert_eq!(report.deleted, 1);
        assert_eq!(
            workspace.deletes.lock().unwrap().as_slice(),
            ["/Shared/stacks/job1"]
        );

        let state = reconciler.store.load("demo").await.unwrap().unwrap();
        assert!(state.is_empty());
    }

    #[tokio::test]
    async fn test_content_edit_triggers_update() {
        let dir = TempDir::new().unwrap();
        let workspace = Arc::new(FakeWorkspace::default());
        let reconciler = workspace_reconciler(&dir, Arc::clone(&workspace));
        let declared = notebook_declaration(&dir);

        reconciler.run("demo", &declared).await.unwrap();
        std::fs::write(dir.path().join("job1.py"), b"print('changed')").unwrap();

        let report = reconciler.run("demo", &declared).await.unwrap();
        assert_eq!(report.updated, 1);
        assert_eq!(workspace.imports.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_job_name_fails_second_create_only() {
        let dir = TempDir::new().unwrap();
        let jobs = Arc::new(FakeJobs::default());
        let service: Arc<dyn JobsService> = jobs.clone();
        let mut registry = AdapterRegistry::new();
        registry.register(Arc::new(JobsAdapter::new(service)));

        // Default options dispatch changes in parallel; the collision must
        // still be deterministic.
        let reconciler = Reconciler::new(
            LocalStateStore::with_base_dir(dir.path().join("state")),
            registry,
        );

        let declared = vec![job_declaration("j1", "dup"), job_declaration("j2", "dup")];
        let report = reconciler.run("demo", &declared).await.unwrap();

        assert!(!report.is_success());
        assert_eq!(report.created, 1);
        assert_eq!(report.failed, 1);
        let failed = report
            .outcomes
            .iter()
            .find(|o| o.status == OutcomeStatus::Failed)
            .unwrap();
        assert_eq!(failed.id, "j2");
        assert!(failed.error.as_deref().unwrap().contains("dup"));

        // Exactly one remote job exists under the contested name.
        assert_eq!(jobs.jobs.lock().unwrap().len(), 1);

        // The first create is persisted despite the second one failing.
        let state = reconciler.store.load("demo").await.unwrap().unwrap();
        assert_eq!(state.len(), 1);
        assert!(state.contains("j1"));
    }

    #[tokio::test]
    async fn test_update_timeout_retains_prior_entry() {
        let dir = TempDir::new().unwrap();
        let store = LocalStateStore::with_base_dir(dir.path().join("state"));

        let mut prior = StackState::new("demo");
        prior.upsert(DeployedResourceStatus::new(
            "job1",
            ResourceType::Jobs,
            "42",
            Some(String::from("old-fp")),
            Properties::new(),
        ));
        store.save(&prior).await.unwrap();
        let before = store.load("demo").await.unwrap().unwrap().get("job1").cloned().unwrap();

        let mut adapter = ScriptedAdapter::new(ResourceType::Jobs, "new-fp");
        adapter.update_delay = Some(Duration::from_secs(5));
        let mut registry = AdapterRegistry::new();
        registry.register(Arc::new(adapter));

        let reconciler = Reconciler::new(store, registry).with_options(ReconcileOptions {
            action_timeout: Duration::from_millis(20),
            max_workers: 1,
        });

        let declared = vec![minimal_job("job1")];
        let report = reconciler.run("demo", &declared).await.unwrap();

        assert_eq!(report.failed, 1);
        let failed = &report.outcomes[0];
        assert_eq!(failed.status, OutcomeStatus::Failed);
        assert!(failed.error.as_deref().unwrap().contains("timed out"));

        let after = reconciler.store.load("demo").await.unwrap().unwrap();
        assert_eq!(after.get("job1").unwrap(), &before);
    }

    #[tokio::test]
    async fn test_failed_create_leaves_no_entry() {
        let dir = TempDir::new().unwrap();
        let mut adapter = ScriptedAdapter::new(ResourceType::Jobs, "fp");
        adapter.fail_create = true;
        let mut registry = AdapterRegistry::new();
        registry.register(Arc::new(adapter));

        let reconciler = Reconciler::new(
            LocalStateStore::with_base_dir(dir.path().join("state")),
            registry,
        );

        let declared = vec![minimal_job("j1")];
        let report = reconciler.run("demo", &declared).await.unwrap();

        assert_eq!(report.failed, 1);
        let state = reconciler.store.load("demo").await.unwrap().unwrap();
        assert!(state.is_empty());
    }

    #[tokio::test]
    async fn test_failed_delete_retains_annotated_entry() {
        let dir = TempDir::new().unwrap();
        let store = LocalStateStore::with_base_dir(dir.path().join("state"));

        let mut prior = StackState::new("demo");
        prior.upsert(DeployedResourceStatus::new(
            "gone",
            ResourceType::Jobs,
            "42",
            Some(String::from("fp")),
            Properties::new(),
        ));
        store.save(&prior).await.unwrap();

        let mut adapter = ScriptedAdapter::new(ResourceType::Jobs, "fp");
        adapter.fail_delete = true;
        let mut registry = AdapterRegistry::new();
        registry.register(Arc::new(adapter));

        let reconciler = Reconciler::new(store, registry);
        let report = reconciler.run("demo", &[]).await.unwrap();

        assert_eq!(report.failed, 1);
        let state = reconciler.store.load("demo").await.unwrap().unwrap();
        let entry = state.get("gone").unwrap();
        assert_eq!(entry.physical_id, "42");
        assert!(entry.last_error.as_deref().unwrap().contains("remote refused"));
    }

    #[tokio::test]
    async fn test_type_change_deletes_then_creates() {
        let dir = TempDir::new().unwrap();
        let store = LocalStateStore::with_base_dir(dir.path().join("state"));

        let mut prior = StackState::new("demo");
        prior.upsert(DeployedResourceStatus::new(
            "thing",
            ResourceType::Workspace,
            "/Shared/thing",
            Some(String::from("fp")),
            Properties::new(),
        ));
        store.save(&prior).await.unwrap();

        let mut registry = AdapterRegistry::new();
        registry.register(Arc::new(ScriptedAdapter::new(ResourceType::Jobs, "fp")));
        registry.register(Arc::new(ScriptedAdapter::new(ResourceType::Workspace, "fp")));

        let reconciler = Reconciler::new(store, registry);
        let declared = vec![minimal_job("thing")];
        let report = reconciler.run("demo", &declared).await.unwrap();

        assert!(report.is_success());
        assert_eq!(report.updated, 1);
        assert_eq!(report.outcomes[0].action, Some(ActionKind::Replace));

        let state = reconciler.store.load("demo").await.unwrap().unwrap();
        let entry = state.get("thing").unwrap();
        assert_eq!(entry.resource_type, ResourceType::Jobs);
        assert_eq!(entry.physical_id, "pid-thing");
    }

    #[tokio::test]
    async fn test_duplicate_ids_abort_before_any_action() {
        let dir = TempDir::new().unwrap();
        let mut registry = AdapterRegistry::new();
        registry.register(Arc::new(ScriptedAdapter::new(ResourceType::Jobs, "fp")));

        let reconciler = Reconciler::new(
            LocalStateStore::with_base_dir(dir.path().join("state")),
            registry,
        );

        let declared = vec![minimal_job("same"), minimal_job("same")];
        let err = reconciler.run("demo", &declared).await.unwrap_err();
        assert!(matches!(
            err,
            StackError::Validation(ValidationError::DuplicateResourceId { .. })
        ));
        assert!(!reconciler.store.exists("demo").await.unwrap());
    }

    #[tokio::test]
    async fn test_persistence_failure_is_fatal() {
        let mut store = MockStateStore::new();
        store.expect_load().returning(|_| Ok(None));
        store.expect_save().returning(|_| {
            Err(StackError::State(StateError::backend("disk full")))
        });

        let mut registry = AdapterRegistry::new();
        registry.register(Arc::new(ScriptedAdapter::new(ResourceType::Jobs, "fp")));

        let reconciler = Reconciler::new(store, registry);
        let declared = vec![minimal_job("j1")];
        let err = reconciler.run("demo", &declared).await.unwrap_err();
        assert!(matches!(
            err,
            StackError::State(StateError::PersistFailed { stack, .. }) if stack == "demo"
        ));
    }

    #[tokio::test]
    async fn test_plan_is_side_effect_free() {
        let dir = TempDir::new().unwrap();
        let workspace = Arc::new(FakeWorkspace::default());
        let reconciler = workspace_reconciler(&dir, Arc::clone(&workspace));
        let declared = notebook_declaration(&dir);

        let diff = reconciler.plan("demo", &declared).await.unwrap();
        assert_eq!(diff.action_count(), 1);
        assert_eq!(diff.changes[0].kind, ActionKind::Create);

        assert!(workspace.imports.lock().unwrap().is_empty());
        assert!(!reconciler.store.exists("demo").await.unwrap());
    }

    #[tokio::test]
    async fn test_parallel_phase_applies_all_results() {
        init_tracing();
        let dir = TempDir::new().unwrap();
        let jobs = Arc::new(FakeJobs::default());
        let service: Arc<dyn JobsService> = jobs.clone();
        let mut registry = AdapterRegistry::new();
        registry.register(Arc::new(JobsAdapter::new(service)));

        let reconciler = Reconciler::new(
            LocalStateStore::with_base_dir(dir.path().join("state")),
            registry,
        )
        .with_options(ReconcileOptions {
            max_workers: 4,
            ..ReconcileOptions::default()
        });

        let declared: Vec<_> = (0..8)
            .map(|i| job_declaration(&format!("j{i}"), &format!("job-{i}")))
            .collect();
        let report = reconciler.run("demo", &declared).await.unwrap();

        assert!(report.is_success());
        assert_eq!(report.created, 8);
        let state = reconciler.store.load("demo").await.unwrap().unwrap();
        assert_eq!(state.len(), 8);
    }
}
