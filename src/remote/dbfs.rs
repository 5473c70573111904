//! DBFS service capability.

use async_trait::async_trait;

use crate::error::RemoteError;

/// Operations the DBFS adapter needs from the remote file API.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DbfsService: Send + Sync {
    /// Uploads file content to a `dbfs:/` path.
    async fn put(&self, path: &str, content: &[u8], overwrite: bool) -> Result<(), RemoteError>;

    /// Creates a DBFS directory and any missing parents.
    async fn mkdirs(&self, path: &str) -> Result<(), RemoteError>;

    /// Deletes a DBFS path.
    async fn delete(&self, path: &str, recursive: bool) -> Result<(), RemoteError>;
}
