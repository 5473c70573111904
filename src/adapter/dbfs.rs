//! Adapter for DBFS files and directories.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::{AdapterError, ValidationError};
use crate::model::{DeclaredResource, ResourceType, keys};
use crate::remote::{DbfsService, SourceReader};

use super::fingerprint::Fingerprinter;
use super::{OpError, ResourceAdapter};

/// Required scheme prefix for DBFS target paths.
const DBFS_PREFIX: &str = "dbfs:/";

/// Manages DBFS file and directory resources.
///
/// A DBFS resource's physical id is its remote path. Uploads always
/// overwrite, so re-deploying changed local content converges without a
/// separate diff against remote bytes.
pub struct DbfsAdapter {
    service: Arc<dyn DbfsService>,
    source: Arc<dyn SourceReader>,
    fingerprinter: Fingerprinter,
}

struct DbfsSpec {
    source_path: PathBuf,
    path: String,
}

impl DbfsSpec {
    fn extract(resource: &DeclaredResource) -> Result<Self, ValidationError> {
        let path = resource.require_str(keys::PATH)?;
        if !path.starts_with(DBFS_PREFIX) {
            return Err(ValidationError::InvalidPath {
                id: resource.id.clone(),
                path: path.to_string(),
            });
        }
        let source_path = PathBuf::from(resource.require_str(keys::SOURCE_PATH)?);
        Ok(Self {
            source_path,
            path: path.to_string(),
        })
    }
}

fn join_dbfs(base: &str, relative: &std::path::Path) -> String {
    let relative = relative.to_string_lossy().replace('\\', "/");
    format!("{}/{}", base.trim_end_matches('/'), relative)
}

fn parent_dbfs(path: &str) -> Option<&str> {
    let (parent, _) = path.rsplit_once('/')?;
    (parent.len() > DBFS_PREFIX.len()).then_some(parent)
}

impl DbfsAdapter {
    /// Creates a DBFS adapter over the given service and source reader.
    #[must_use]
    pub fn new(service: Arc<dyn DbfsService>, source: Arc<dyn SourceReader>) -> Self {
        Self {
            service,
            source,
            fingerprinter: Fingerprinter::new(),
        }
    }

    async fn collect_content(&self, spec: &DbfsSpec) -> Result<Vec<(String, Vec<u8>)>, OpError> {
        if self.source.is_dir(&spec.source_path).await? {
            let mut blocks = Vec::new();
            for relative in self.source.walk(&spec.source_path).await? {
                let content = self.source.read(&spec.source_path.join(&relative)).await?;
                blocks.push((relative.to_string_lossy().into_owned(), content));
            }
            Ok(blocks)
        } else {
            let content = self.source.read(&spec.source_path).await?;
            Ok(vec![(spec.source_path.to_string_lossy().into_owned(), content)])
        }
    }

    async fn upload(&self, spec: &DbfsSpec) -> Result<(), OpError> {
        if self.source.is_dir(&spec.source_path).await? {
            self.service.mkdirs(&spec.path).await?;
            for relative in self.source.walk(&spec.source_path).await? {
                let target = join_dbfs(&spec.path, &relative);
                if let Some(parent) = parent_dbfs(&target) {
                    if parent != spec.path.trim_end_matches('/') {
                        self.service.mkdirs(parent).await?;
                    }
                }
                let content = self.source.read(&spec.source_path.join(&relative)).await?;
                self.service.put(&target, &content, true).await?;
                debug!("Uploaded {} to {target}", relative.display());
            }
        } else {
            if let Some(parent) = parent_dbfs(&spec.path) {
                self.service.mkdirs(parent).await?;
            }
            let content = self.source.read(&spec.source_path).await?;
            self.service.put(&spec.path, &content, true).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl ResourceAdapter for DbfsAdapter {
    fn resource_type(&self) -> ResourceType {
        ResourceType::Dbfs
    }

    fn validate(&self, resource: &DeclaredResource) -> Result<(), ValidationError> {
        DbfsSpec::extract(resource).map(|_| ())
    }

    async fn fingerprint(&self, resource: &DeclaredResource) -> Result<String, AdapterError> {
        let spec = DbfsSpec::extract(resource)
            .map_err(|e| AdapterError::fingerprint(&resource.id, e.to_string()))?;
        let content = self
            .collect_content(&spec)
            .await
            .map_err(|e| AdapterError::fingerprint(&resource.id, e.to_string()))?;
        self.fingerprinter
            .hash_properties_and_content(&resource.properties, &content)
            .map_err(|e| AdapterError::fingerprint(&resource.id, e.to_string()))
    }

    async fn create(&self, resource: &DeclaredResource) -> Result<String, AdapterError> {
        let spec = DbfsSpec::extract(resource)
            .map_err(|e| AdapterError::create(&resource.id, e.to_string()))?;
        self.upload(&spec)
            .await
            .map_err(|e| AdapterError::create(&resource.id, e.to_string()))?;
        info!("Created DBFS resource '{}' at {}", resource.id, spec.path);
        Ok(spec.path)
    }

    async fn update(
        &self,
        resource: &DeclaredResource,
        _physical_id: &str,
    ) -> Result<String, AdapterError> {
        let spec = DbfsSpec::extract(resource)
            .map_err(|e| AdapterError::update(&resource.id, e.to_string()))?;
        self.upload(&spec)
            .await
            .map_err(|e| AdapterError::update(&resource.id, e.to_string()))?;
        info!("Updated DBFS resource '{}' at {}", resource.id, spec.path);
        Ok(spec.path)
    }

    async fn delete(&self, physical_id: &str) -> Result<(), AdapterError> {
        match self.service.delete(physical_id, true).await {
            Ok(()) => {
                info!("Deleted DBFS path {physical_id}");
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                debug!("DBFS path {physical_id} already absent");
                Ok(())
            }
            Err(e) => Err(AdapterError::delete(physical_id, e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RemoteError;
    use crate::model::Properties;
    use crate::remote::{MockDbfsService, MockSourceReader};
    use mockall::predicate::eq;
    use serde_json::json;

    fn file_resource() -> DeclaredResource {
        let mut properties = Properties::new();
        properties.insert("source_path".into(), json!("data/features.parquet"));
        properties.insert("path".into(), json!("dbfs:/mnt/ml/features.parquet"));
        DeclaredResource::new("features", ResourceType::Dbfs, properties)
    }

    #[test]
    fn test_validate_requires_dbfs_prefix() {
        let adapter = DbfsAdapter::new(
            Arc::new(MockDbfsService::new()),
            Arc::new(MockSourceReader::new()),
        );

        assert!(adapter.validate(&file_resource()).is_ok());

        let mut bad = file_resource();
        bad.properties.insert("path".into(), json!("/mnt/ml/x"));
        assert!(matches!(
            adapter.validate(&bad),
            Err(ValidationError::InvalidPath { .. })
        ));
    }

    #[tokio::test]
    async fn test_create_uploads_file_with_overwrite() {
        let mut service = MockDbfsService::new();
        service
            .expect_mkdirs()
            .with(eq("dbfs:/mnt/ml"))
            .returning(|_| Ok(()));
        service
            .expect_put()
            .withf(|path, content, overwrite| {
                path == "dbfs:/mnt/ml/features.parquet" && content == b"bytes" && *overwrite
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        let mut source = MockSourceReader::new();
        source.expect_is_dir().returning(|_| Ok(false));
        source.expect_read().returning(|_| Ok(b"bytes".to_vec()));

        let adapter = DbfsAdapter::new(Arc::new(service), Arc::new(source));
        let physical_id = adapter.create(&file_resource()).await.unwrap();
        assert_eq!(physical_id, "dbfs:/mnt/ml/features.parquet");
    }

    #[tokio::test]
    async fn test_create_uploads_directory_recursively() {
        let mut resource = file_resource();
        resource.properties.insert("source_path".into(), json!("data"));
        resource.properties.insert("path".into(), json!("dbfs:/mnt/ml/data"));

        let mut service = MockDbfsService::new();
        service.expect_mkdirs().returning(|_| Ok(()));
        service
            .expect_put()
            .withf(|path, _, _| {
                path == "dbfs:/mnt/ml/data/a.parquet" || path == "dbfs:/mnt/ml/data/sub/b.parquet"
            })
            .times(2)
            .returning(|_, _, _| Ok(()));

        let mut source = MockSourceReader::new();
        source.expect_is_dir().returning(|_| Ok(true));
        source.expect_walk().returning(|_| {
            Ok(vec![PathBuf::from("a.parquet"), PathBuf::from("sub/b.parquet")])
        });
        source.expect_read().returning(|_| Ok(b"bytes".to_vec()));

        let adapter = DbfsAdapter::new(Arc::new(service), Arc::new(source));
        adapter.create(&resource).await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_absent_path_is_ok() {
        let mut service = MockDbfsService::new();
        service
            .expect_delete()
            .with(eq("dbfs:/mnt/gone"), eq(true))
            .returning(|_, _| Err(RemoteError::not_found("dbfs:/mnt/gone")));

        let adapter =
            DbfsAdapter::new(Arc::new(service), Arc::new(MockSourceReader::new()));
        adapter.delete("dbfs:/mnt/gone").await.unwrap();
    }

    #[tokio::test]
    async fn test_fingerprint_tracks_content() {
        let resource = file_resource();

        let adapter_for = |content: &'static [u8]| {
            let mut source = MockSourceReader::new();
            source.expect_is_dir().returning(|_| Ok(false));
            source.expect_read().returning(move |_| Ok(content.to_vec()));
            DbfsAdapter::new(Arc::new(MockDbfsService::new()), Arc::new(source))
        };

        let v1 = adapter_for(b"v1").fingerprint(&resource).await.unwrap();
        let v2 = adapter_for(b"v2").fingerprint(&resource).await.unwrap();
        assert_ne!(v1, v2);
    }
}
