//! Adapter for workspace notebooks and notebook directories.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::{AdapterError, ValidationError};
use crate::model::{DeclaredResource, ResourceType, keys};
use crate::remote::{NotebookImport, SourceReader, WorkspaceObjectType, WorkspaceService};

use super::fingerprint::Fingerprinter;
use super::{OpError, ResourceAdapter};

/// Default import format when the declaration does not name one.
const DEFAULT_FORMAT: &str = "SOURCE";

/// Source-file extensions recognized as importable notebooks.
const NOTEBOOK_EXTENSIONS: &[(&str, &str)] = &[
    ("py", "PYTHON"),
    ("scala", "SCALA"),
    ("sql", "SQL"),
    ("r", "R"),
    ("R", "R"),
];

/// Manages workspace notebook and directory resources.
pub struct WorkspaceAdapter {
    service: Arc<dyn WorkspaceService>,
    source: Arc<dyn SourceReader>,
    fingerprinter: Fingerprinter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ObjectKind {
    Notebook,
    Directory,
}

/// Declared workspace properties, extracted once per operation.
struct WorkspaceSpec {
    kind: ObjectKind,
    source_path: PathBuf,
    path: String,
    language: Option<String>,
    format: String,
}

impl WorkspaceSpec {
    fn extract(resource: &DeclaredResource) -> Result<Self, ValidationError> {
        let object_type = resource.require_str(keys::OBJECT_TYPE)?;
        let kind = match object_type {
            "NOTEBOOK" => ObjectKind::Notebook,
            "DIRECTORY" => ObjectKind::Directory,
            other => {
                return Err(ValidationError::InvalidProperty {
                    id: resource.id.clone(),
                    key: keys::OBJECT_TYPE.to_string(),
                    message: format!("must be NOTEBOOK or DIRECTORY, got '{other}'"),
                });
            }
        };

        let path = resource.require_str(keys::PATH)?;
        if !path.starts_with('/') {
            return Err(ValidationError::InvalidProperty {
                id: resource.id.clone(),
                key: keys::PATH.to_string(),
                message: String::from("workspace path must be absolute"),
            });
        }

        let source_path = PathBuf::from(resource.require_str(keys::SOURCE_PATH)?);
        let language = resource.property_str(keys::LANGUAGE).map(str::to_string);
        let format = resource
            .property_str(keys::FORMAT)
            .unwrap_or(DEFAULT_FORMAT)
            .to_string();

        Ok(Self {
            kind,
            source_path,
            path: path.to_string(),
            language,
            format,
        })
    }
}

/// Infers a notebook language from a source file extension.
fn infer_language(path: &Path) -> Option<&'static str> {
    let extension = path.extension()?.to_str()?;
    NOTEBOOK_EXTENSIONS
        .iter()
        .find(|(ext, _)| *ext == extension || ext.eq_ignore_ascii_case(extension))
        .map(|(_, language)| *language)
}

/// Returns true if the file extension marks an importable notebook source.
fn is_notebook_source(path: &Path) -> bool {
    infer_language(path).is_some()
}

/// Strips a recognized notebook extension from a relative source path,
/// yielding the remote name the import will create.
fn remote_name(relative: &Path) -> String {
    let joined = relative.to_string_lossy().replace('\\', "/");
    match relative.extension().and_then(|e| e.to_str()) {
        Some(ext) if is_notebook_source(relative) => {
            joined[..joined.len() - ext.len() - 1].to_string()
        }
        _ => joined,
    }
}

fn join_workspace(base: &str, relative: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), relative)
}

fn parent_path(path: &str) -> &str {
    match path.rsplit_once('/') {
        Some(("", _)) | None => "/",
        Some((parent, _)) => parent,
    }
}

impl WorkspaceAdapter {
    /// Creates a workspace adapter over the given service and source reader.
    #[must_use]
    pub fn new(service: Arc<dyn WorkspaceService>, source: Arc<dyn SourceReader>) -> Self {
        Self {
            service,
            source,
            fingerprinter: Fingerprinter::new(),
        }
    }

    /// Reads the content blocks backing the declaration, keyed by relative
    /// source name.
    async fn collect_content(
        &self,
        spec: &WorkspaceSpec,
    ) -> Result<Vec<(String, Vec<u8>)>, OpError> {
        match spec.kind {
            ObjectKind::Notebook => {
                let content = self.source.read(&spec.source_path).await?;
                Ok(vec![(spec.source_path.to_string_lossy().into_owned(), content)])
            }
            ObjectKind::Directory => {
                let mut blocks = Vec::new();
                for relative in self.source.walk(&spec.source_path).await? {
                    let content = self.source.read(&spec.source_path.join(&relative)).await?;
                    blocks.push((relative.to_string_lossy().into_owned(), content));
                }
                Ok(blocks)
            }
        }
    }

    async fn import_notebook(
        &self,
        spec: &WorkspaceSpec,
        target: &str,
        source_file: &Path,
    ) -> Result<(), OpError> {
        let content = self.source.read(source_file).await?;
        let language = spec
            .language
            .clone()
            .or_else(|| infer_language(source_file).map(str::to_string));

        self.service.mkdirs(parent_path(target)).await?;
        self.service
            .import(&NotebookImport {
                path: target.to_string(),
                language,
                format: spec.format.clone(),
                content,
                overwrite: true,
            })
            .await?;
        debug!("Imported notebook to {target}");
        Ok(())
    }

    /// Imports every notebook source under the directory, returning the set
    /// of remote notebook paths the declaration now accounts for.
    async fn sync_directory(&self, spec: &WorkspaceSpec) -> Result<HashSet<String>, OpError> {
        self.service.mkdirs(&spec.path).await?;

        let mut expected = HashSet::new();
        for relative in self.source.walk(&spec.source_path).await? {
            if !is_notebook_source(&relative) {
                debug!("Skipping non-notebook source file: {}", relative.display());
                continue;
            }
            let target = join_workspace(&spec.path, &remote_name(&relative));
            self.import_notebook(spec, &target, &spec.source_path.join(&relative))
                .await?;
            expected.insert(target);
        }
        Ok(expected)
    }

    /// Removes remote notebooks under the directory that no local source
    /// file accounts for.
    async fn prune_orphans(
        &self,
        spec: &WorkspaceSpec,
        expected: &HashSet<String>,
    ) -> Result<(), OpError> {
        let listing = match self.service.list_recursive(&spec.path).await {
            Ok(listing) => listing,
            Err(e) if e.is_not_found() => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        for object in listing {
            if object.object_type == WorkspaceObjectType::Notebook
                && !expected.contains(&object.path)
            {
                info!("Removing orphaned notebook: {}", object.path);
                self.service.delete(&object.path, false).await?;
            }
        }
        Ok(())
    }

    async fn apply(&self, spec: &WorkspaceSpec, prune: bool) -> Result<(), OpError> {
        match spec.kind {
            ObjectKind::Notebook => {
                self.import_notebook(spec, &spec.path, &spec.source_path)
                    .await
            }
            ObjectKind::Directory => {
                let expected = self.sync_directory(spec).await?;
                if prune {
                    self.prune_orphans(spec, &expected).await?;
                }
                Ok(())
            }
        }
    }
}

#[async_trait]
impl ResourceAdapter for WorkspaceAdapter {
    fn resource_type(&self) -> ResourceType {
        ResourceType::Workspace
    }

    fn validate(&self, resource: &DeclaredResource) -> Result<(), ValidationError> {
        WorkspaceSpec::extract(resource).map(|_| ())
    }

    async fn fingerprint(&self, resource: &DeclaredResource) -> Result<String, AdapterError> {
        let spec = WorkspaceSpec::extract(resource)
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
        let spec = WorkspaceSpec::extract(resource)
            .map_err(|e| AdapterError::create(&resource.id, e.to_string()))?;
        self.apply(&spec, false)
            .await
            .map_err(|e| AdapterError::create(&resource.id, e.to_string()))?;
        info!("Created workspace resource '{}' at {}", resource.id, spec.path);
        Ok(spec.path)
    }

    async fn update(
        &self,
        resource: &DeclaredResource,
        _physical_id: &str,
    ) -> Result<String, AdapterError> {
        let spec = WorkspaceSpec::extract(resource)
            .map_err(|e| AdapterError::update(&resource.id, e.to_string()))?;
        self.apply(&spec, true)
            .await
            .map_err(|e| AdapterError::update(&resource.id, e.to_string()))?;
        info!("Updated workspace resource '{}' at {}", resource.id, spec.path);
        Ok(spec.path)
    }

    async fn delete(&self, physical_id: &str) -> Result<(), AdapterError> {
        match self.service.delete(physical_id, true).await {
            Ok(()) => {
                info!("Deleted workspace object {physical_id}");
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                debug!("Workspace object {physical_id} already absent");
                Ok(())
            }
            Err(e) => Err(AdapterError::delete(physical_id, e.to_string())),
        }
    }
}
