//! Adapter for scheduled jobs.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::error::{AdapterError, RemoteError, ValidationError};
use crate::model::{DeclaredResource, ResourceType, keys};
use crate::remote::JobsService;

use super::fingerprint::Fingerprinter;
use super::ResourceAdapter;

/// Manages job resources.
///
/// A job's physical id is its numeric service-assigned id, stored as a
/// string. Job names are treated as unique: creating or renaming onto a
/// name another remote job already holds is rejected as a collision rather
/// than silently producing twins.
pub struct JobsAdapter {
    service: Arc<dyn JobsService>,
    fingerprinter: Fingerprinter,
}

impl JobsAdapter {
    /// Creates a jobs adapter over the given service.
    #[must_use]
    pub fn new(service: Arc<dyn JobsService>) -> Self {
        Self {
            service,
            fingerprinter: Fingerprinter::new(),
        }
    }

    /// Reports whether a remote job other than `own_id` already holds the
    /// given name. Lookup failures are returned raw so the caller can map
    /// them to the action being performed.
    async fn name_is_taken(&self, name: &str, own_id: Option<u64>) -> Result<bool, RemoteError> {
        let matches = self.service.find_jobs_by_name(name).await?;
        Ok(matches.iter().any(|job| Some(job.job_id) != own_id))
    }

    async fn create_fresh(&self, resource: &DeclaredResource, name: &str) -> Result<u64, AdapterError> {
        if self
            .name_is_taken(name, None)
            .await
            .map_err(|e| AdapterError::create(&resource.id, e.to_string()))?
        {
            return Err(AdapterError::NameCollision {
                id: resource.id.clone(),
                name: name.to_string(),
            });
        }
        let job_id = self
            .service
            .create_job(&resource.properties)
            .await
            .map_err(|e| AdapterError::create(&resource.id, e.to_string()))?;
        info!("Created job '{name}' with id {job_id}");
        Ok(job_id)
    }
}

fn parse_job_id(physical_id: &str) -> Result<u64, AdapterError> {
    physical_id.parse().map_err(|_| {
        AdapterError::delete(physical_id, "physical id is not a numeric job id")
    })
}

#[async_trait]
impl ResourceAdapter for JobsAdapter {
    fn resource_type(&self) -> ResourceType {
        ResourceType::Jobs
    }

    fn validate(&self, resource: &DeclaredResource) -> Result<(), ValidationError> {
        resource.require_str(keys::NAME)?;

        let has_existing = resource.has_property(keys::EXISTING_CLUSTER_ID);
        let has_new = resource.has_property(keys::NEW_CLUSTER);
        match (has_existing, has_new) {
            (true, true) => Err(ValidationError::InvalidClusterSpec {
                id: resource.id.clone(),
                message: String::from(
                    "existing_cluster_id and new_cluster are mutually exclusive",
                ),
            }),
            (false, false) => Err(ValidationError::InvalidClusterSpec {
                id: resource.id.clone(),
                message: String::from(
                    "one of existing_cluster_id or new_cluster is required",
                ),
            }),
            _ => Ok(()),
        }
    }

    async fn fingerprint(&self, resource: &DeclaredResource) -> Result<String, AdapterError> {
        self.fingerprinter
            .hash_properties(&resource.properties)
            .map_err(|e| AdapterError::fingerprint(&resource.id, e.to_string()))
    }

    async fn create(&self, resource: &DeclaredResource) -> Result<String, AdapterError> {
        let name = resource
            .require_str(keys::NAME)
            .map_err(|e| AdapterError::create(&resource.id, e.to_string()))?;
        let job_id = self.create_fresh(resource, name).await?;
        Ok(job_id.to_string())
    }

    async fn update(
        &self,
        resource: &DeclaredResource,
        physical_id: &str,
    ) -> Result<String, AdapterError> {
        let name = resource
            .require_str(keys::NAME)
            .map_err(|e| AdapterError::update(&resource.id, e.to_string()))?;
        let job_id = physical_id.parse::<u64>().map_err(|_| {
            AdapterError::update(
                &resource.id,
                format!("physical id '{physical_id}' is not a numeric job id"),
            )
        })?;

        // The tracked job may have been deleted out of band. Check for it
        // and fall back to recreating under a fresh id.
        match self.service.get_job(job_id).await {
            Ok(_) => {
                if self
                    .name_is_taken(name, Some(job_id))
                    .await
                    .map_err(|e| AdapterError::update(&resource.id, e.to_string()))?
                {
                    return Err(AdapterError::NameCollision {
                        id: resource.id.clone(),
                        name: name.to_string(),
                    });
                }
                self.service
                    .reset_job(job_id, &resource.properties)
                    .await
                    .map_err(|e| AdapterError::update(&resource.id, e.to_string()))?;
                info!("Updated job '{name}' (id {job_id})");
                Ok(physical_id.to_string())
            }
            Err(e) if e.is_not_found() => {
                warn!("Job {job_id} no longer exists remotely; recreating '{name}'");
                let new_id = self.create_fresh(resource, name).await?;
                Ok(new_id.to_string())
            }
            Err(e) => Err(AdapterError::update(&resource.id, e.to_string())),
        }
    }

    async fn delete(&self, physical_id: &str) -> Result<(), AdapterError> {
        let job_id = parse_job_id(physical_id)?;
        match self.service.delete_job(job_id).await {
            Ok(()) => {
                info!("Deleted job {job_id}");
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                debug!("Job {job_id} already absent");
                Ok(())
            }
            Err(e) => Err(AdapterError::delete(physical_id, e.to_string())),
        }
    }
}
