//! Local source content access.
//!
//! Workspace and DBFS resources are backed by local files. Adapters read
//! that content through this trait so tests can supply in-memory sources.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

/// Reads the local content that backs declared resources.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SourceReader: Send + Sync {
    /// Reads the full content of a source file.
    async fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Returns true if the source path is a directory.
    async fn is_dir(&self, path: &Path) -> io::Result<bool>;

    /// Lists the files under a source directory, recursively.
    ///
    /// Returned paths are relative to `path`, sorted, and exclude hidden
    /// files and directories (names starting with `.`).
    async fn walk(&self, path: &Path) -> io::Result<Vec<PathBuf>>;
}

/// [`SourceReader`] backed by the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsSourceReader;

impl FsSourceReader {
    /// Creates a new filesystem source reader.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_str().is_some_and(|n| n.starts_with('.'))
}

#[async_trait]
impl SourceReader for FsSourceReader {
    async fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        tokio::fs::read(path).await
    }

    async fn is_dir(&self, path: &Path) -> io::Result<bool> {
        Ok(tokio::fs::metadata(path).await?.is_dir())
    }

    async fn walk(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        let mut pending = vec![path.to_path_buf()];

        while let Some(dir) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                if is_hidden(&entry.file_name()) {
                    continue;
                }
                let entry_path = entry.path();
                if entry.file_type().await?.is_dir() {
                    pending.push(entry_path);
                } else {
                    let relative = entry_path
                        .strip_prefix(path)
                        .map_err(|e| io::Error::other(e.to_string()))?
                        .to_path_buf();
                    files.push(relative);
                }
            }
        }

        files.sort();
        Ok(files)
    }
}
