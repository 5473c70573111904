//! Per-type resource adapters.
//!
//! Each adapter owns the full lifecycle of one resource type: validating
//! its declared properties, fingerprinting its desired configuration, and
//! performing create, update, and delete actions against the remote
//! services. The reconciler treats adapters uniformly through
//! [`ResourceAdapter`] and never inspects type-specific properties itself.

mod dbfs;
mod fingerprint;
mod jobs;
mod workspace;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

pub use dbfs::DbfsAdapter;
pub use fingerprint::Fingerprinter;
pub use jobs::JobsAdapter;
pub use workspace::WorkspaceAdapter;

use crate::error::{AdapterError, RemoteError, ValidationError};
use crate::model::{DeclaredResource, ResourceType};
use crate::remote::{DbfsService, JobsService, SourceReader, WorkspaceService};

/// Lifecycle operations for one resource type.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ResourceAdapter: Send + Sync {
    /// The resource type this adapter handles.
    fn resource_type(&self) -> ResourceType;

    /// Checks type-specific property values without touching any remote
    /// service.
    fn validate(&self, resource: &DeclaredResource) -> Result<(), ValidationError>;

    /// Computes the deterministic fingerprint of the resource's desired
    /// configuration, including local source content where applicable.
    async fn fingerprint(&self, resource: &DeclaredResource) -> Result<String, AdapterError>;

    /// Provisions the resource remotely and returns its physical id.
    async fn create(&self, resource: &DeclaredResource) -> Result<String, AdapterError>;

    /// Applies the declared configuration to an existing remote resource,
    /// returning its (possibly new) physical id.
    async fn update(
        &self,
        resource: &DeclaredResource,
        physical_id: &str,
    ) -> Result<String, AdapterError>;

    /// Removes the remote resource. Deleting an already absent resource is
    /// not an error.
    async fn delete(&self, physical_id: &str) -> Result<(), AdapterError>;
}

/// Failure inside an adapter operation, before it is attributed to a
/// specific lifecycle action.
#[derive(Debug)]
pub(crate) enum OpError {
    /// A remote service call failed.
    Remote(RemoteError),
    /// Local source content could not be read.
    Source(std::io::Error),
}

impl From<RemoteError> for OpError {
    fn from(e: RemoteError) -> Self {
        Self::Remote(e)
    }
}

impl From<std::io::Error> for OpError {
    fn from(e: std::io::Error) -> Self {
        Self::Source(e)
    }
}

impl std::fmt::Display for OpError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Remote(e) => write!(f, "{e}"),
            Self::Source(e) => write!(f, "source content error: {e}"),
        }
    }
}

/// Registry mapping resource types to their adapters.
pub struct AdapterRegistry {
    adapters: HashMap<ResourceType, Arc<dyn ResourceAdapter>>,
}

impl AdapterRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            adapters: HashMap::new(),
        }
    }

    /// Creates a registry wired with the three built-in adapters.
    #[must_use]
    pub fn standard(
        workspace: Arc<dyn WorkspaceService>,
        jobs: Arc<dyn JobsService>,
        dbfs: Arc<dyn DbfsService>,
        source: Arc<dyn SourceReader>,
    ) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(WorkspaceAdapter::new(workspace, Arc::clone(&source))));
        registry.register(Arc::new(JobsAdapter::new(jobs)));
        registry.register(Arc::new(DbfsAdapter::new(dbfs, source)));
        registry
    }

    /// Registers an adapter under its declared resource type.
    pub fn register(&mut self, adapter: Arc<dyn ResourceAdapter>) {
        self.adapters.insert(adapter.resource_type(), adapter);
    }

    /// Looks up the adapter for a resource type.
    #[must_use]
    pub fn get(&self, resource_type: ResourceType) -> Option<Arc<dyn ResourceAdapter>> {
        self.adapters.get(&resource_type).map(Arc::clone)
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}
