//! Workspace service capability.

use async_trait::async_trait;

use crate::error::RemoteError;

/// The kind of a remote workspace object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkspaceObjectType {
    /// An importable notebook.
    Notebook,
    /// A directory of workspace objects.
    Directory,
    /// Anything else (libraries, files the engine does not manage).
    Other,
}

/// One object listed from the remote workspace tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceObject {
    /// Absolute workspace path of the object.
    pub path: String,
    /// The object's kind.
    pub object_type: WorkspaceObjectType,
    /// Notebook language, when the object is a notebook.
    pub language: Option<String>,
}

/// A notebook import request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotebookImport {
    /// Target workspace path.
    pub path: String,
    /// Notebook language, when known.
    pub language: Option<String>,
    /// Import format, e.g. `SOURCE`.
    pub format: String,
    /// The notebook content.
    pub content: Vec<u8>,
    /// Whether an existing object at the path is replaced.
    pub overwrite: bool,
}

/// Operations the workspace adapter needs from the remote workspace API.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WorkspaceService: Send + Sync {
    /// Creates a workspace directory and any missing parents.
    async fn mkdirs(&self, path: &str) -> Result<(), RemoteError>;

    /// Imports notebook content to a workspace path.
    async fn import(&self, request: &NotebookImport) -> Result<(), RemoteError>;

    /// Lists all objects under a workspace path, recursively.
    async fn list_recursive(&self, path: &str) -> Result<Vec<WorkspaceObject>, RemoteError>;

    /// Deletes a workspace object.
    async fn delete(&self, path: &str, recursive: bool) -> Result<(), RemoteError>;
}
