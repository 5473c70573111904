//! Stack document ingestion.
//!
//! The stack document is a JSON object naming the stack and listing its
//! declared resources:
//!
//! ```json
//! {
//!   "name": "ml-pipeline",
//!   "resources": [
//!     { "id": "etl", "service": "workspace", "properties": { "...": "..." } }
//!   ]
//! }
//! ```
//!
//! Full configuration handling (templating, credential resolution, CLI
//! wiring) is an external concern; this loader only turns the document into
//! validated-shape [`DeclaredResource`] records.

use std::path::Path;
use tracing::{debug, info};

use crate::error::{DocumentError, Result, StackError};
use crate::model::{DeclaredResource, Properties, ResourceType};

/// A parsed stack document: the stack name plus its declared resources.
#[derive(Debug, Clone)]
pub struct StackDocument {
    /// Name of the stack, keying the persisted state record.
    pub name: String,
    /// Declared resources, in document order.
    pub resources: Vec<DeclaredResource>,
}

#[derive(serde::Deserialize)]
struct RawDocument {
    name: String,
    #[serde(default)]
    resources: Vec<RawResource>,
}

#[derive(serde::Deserialize)]
struct RawResource {
    id: String,
    service: String,
    #[serde(default)]
    properties: Properties,
}

/// Loader for stack documents.
#[derive(Debug, Default)]
pub struct DocumentLoader;

impl DocumentLoader {
    /// Creates a new document loader.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Loads a stack document from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if a
    /// resource names an unknown service.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<StackDocument> {
        let path = path.as_ref();
        info!("Loading stack document from: {}", path.display());

        if !path.exists() {
            return Err(StackError::Document(DocumentError::FileNotFound {
                path: path.to_path_buf(),
            }));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            StackError::Document(DocumentError::ParseError {
                message: format!("Failed to read file: {e}"),
                location: Some(path.display().to_string()),
            })
        })?;

        self.parse_json(&content, Some(path))
    }

    /// Parses a stack document from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is invalid or a resource names an
    /// unknown service.
    pub fn parse_json(&self, content: &str, source: Option<&Path>) -> Result<StackDocument> {
        debug!("Parsing stack document");

        let raw: RawDocument = serde_json::from_str(content).map_err(|e| {
            let location = source.map(|p| p.display().to_string());
            StackError::Document(DocumentError::ParseError {
                message: format!("JSON parse error: {e}"),
                location,
            })
        })?;

        let mut resources = Vec::with_capacity(raw.resources.len());
        for resource in raw.resources {
            let resource_type = ResourceType::parse(&resource.service)?;
            resources.push(DeclaredResource::new(
                resource.id,
                resource_type,
                resource.properties,
            ));
        }

        debug!(
            "Parsed stack document for '{}' with {} resources",
            raw.name,
            resources.len()
        );

        Ok(StackDocument {
            name: raw.name,
            resources,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_document() {
        let json = r#"{ "name": "empty-stack", "resources": [] }"#;
        let document = DocumentLoader::new().parse_json(json, None).unwrap();
        assert_eq!(document.name, "empty-stack");
        assert!(document.resources.is_empty());
    }

    #[test]
    fn test_parse_full_document() {
        let json = r#"
        {
          "name": "ml-pipeline",
          "resources": [
            {
              "id": "etl-notebook",
              "service": "workspace",
              "properties": {
                "source_path": "notebooks/etl.py",
                "path": "/Shared/ml/etl",
                "object_type": "NOTEBOOK"
              }
            },
            {
              "id": "nightly-train",
              "service": "jobs",
              "properties": {
                "name": "nightly-train",
                "existing_cluster_id": "0923-164208-meows279"
              }
            },
            {
              "id": "features",
              "service": "dbfs",
              "properties": {
                "source_path": "data/features.parquet",
                "path": "dbfs:/mnt/ml/features.parquet"
              }
            }
          ]
        }"#;

        let document = DocumentLoader::new().parse_json(json, None).unwrap();
        assert_eq!(document.name, "ml-pipeline");
        assert_eq!(document.resources.len(), 3);
        assert_eq!(document.resources[0].resource_type, ResourceType::Workspace);
        assert_eq!(document.resources[1].resource_type, ResourceType::Jobs);
        assert_eq!(document.resources[2].resource_type, ResourceType::Dbfs);
    }

    #[test]
    fn test_unknown_service_rejected() {
        let json = r#"
        {
          "name": "bad",
          "resources": [ { "id": "x", "service": "cluster", "properties": {} } ]
        }"#;

        let result = DocumentLoader::new().parse_json(json, None);
        assert!(result.is_err());
    }
}
