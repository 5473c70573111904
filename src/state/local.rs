//! Local filesystem state store.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::error::{Result, StackError, StateError, ValidationError};

use super::store::StateStore;
use super::types::StackState;

/// State store that keeps one JSON file per stack in a local directory.
///
/// Saves are atomic: the record is written to a temporary file, synced, and
/// renamed over the previous record, so a crash mid-save never leaves a
/// partially written record behind.
#[derive(Debug, Clone)]
pub struct LocalStateStore {
    base_dir: PathBuf,
}

impl LocalStateStore {
    /// Creates a store rooted at the default per-user directory
    /// (`~/.stack-deploy/stacks`).
    ///
    /// # Errors
    ///
    /// Returns an error when the home directory cannot be determined.
    pub fn new() -> Result<Self> {
        let home = dirs::home_dir().ok_or_else(|| {
            StackError::State(StateError::backend("Could not determine home directory"))
        })?;
        Ok(Self::with_base_dir(home.join(".stack-deploy").join("stacks")))
    }

    /// Creates a store rooted at an explicit directory.
    #[must_use]
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Returns the directory holding the state files.
    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn state_path(&self, stack_name: &str) -> Result<PathBuf> {
        validate_stack_name(stack_name)?;
        Ok(self.base_dir.join(format!("{stack_name}.json")))
    }
}

/// Rejects stack names that cannot safely key a file in the store directory.
fn validate_stack_name(name: &str) -> Result<()> {
    let safe = !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
        && !name.contains('\0');
    if safe {
        Ok(())
    } else {
        Err(StackError::Validation(ValidationError::InvalidStackName {
            name: name.to_string(),
        }))
    }
}

#[async_trait]
impl StateStore for LocalStateStore {
    async fn load(&self, stack_name: &str) -> Result<Option<StackState>> {
        let path = self.state_path(stack_name)?;
        debug!("Loading stack state from: {}", path.display());

        if !path.exists() {
            debug!("No state record for stack '{stack_name}'");
            return Ok(None);
        }

        let content = tokio::fs::read_to_string(&path).await.map_err(|e| {
            StackError::State(StateError::backend(format!(
                "Failed to read state file {}: {e}",
                path.display()
            )))
        })?;

        let state: StackState = serde_json::from_str(&content).map_err(|e| {
            StackError::State(StateError::corrupted(format!(
                "Failed to parse state file {}: {e}",
                path.display()
            )))
        })?;

        debug!(
            "Loaded stack '{stack_name}' with {} resources",
            state.resources.len()
        );
        Ok(Some(state))
    }

    async fn save(&self, state: &StackState) -> Result<()> {
        let path = self.state_path(&state.stack_name)?;

        tokio::fs::create_dir_all(&self.base_dir).await.map_err(|e| {
            StackError::State(StateError::backend(format!(
                "Failed to create state directory {}: {e}",
                self.base_dir.display()
            )))
        })?;

        let json = serde_json::to_string_pretty(state)
            .map_err(|e| StackError::State(StateError::serialization(e.to_string())))?;

        // Write to a temp file and rename, so readers never observe a
        // half-written record.
        let temp_path = path.with_extension("tmp");
        {
            use tokio::io::AsyncWriteExt;

            let mut file = tokio::fs::File::create(&temp_path).await.map_err(|e| {
                StackError::State(StateError::backend(format!(
                    "Failed to create temp state file: {e}"
                )))
            })?;
            file.write_all(json.as_bytes()).await.map_err(|e| {
                StackError::State(StateError::backend(format!(
                    "Failed to write state file: {e}"
                )))
            })?;
            file.sync_all().await.map_err(|e| {
                StackError::State(StateError::backend(format!(
                    "Failed to sync state file: {e}"
                )))
            })?;
        }

        tokio::fs::rename(&temp_path, &path).await.map_err(|e| {
            StackError::State(StateError::backend(format!(
                "Failed to commit state file {}: {e}",
                path.display()
            )))
        })?;

        info!(
            "Saved state for stack '{}' ({} resources) to {}",
            state.stack_name,
            state.resources.len(),
            path.display()
        );
        Ok(())
    }

    async fn delete(&self, stack_name: &str) -> Result<()> {
        let path = self.state_path(stack_name)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                info!("Deleted state record for stack '{stack_name}'");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StackError::State(StateError::backend(format!(
                "Failed to delete state file {}: {e}",
                path.display()
            )))),
        }
    }

    async fn exists(&self, stack_name: &str) -> Result<bool> {
        Ok(self.state_path(stack_name)?.exists())
    }

    async fn list(&self) -> Result<Vec<String>> {
        if !self.base_dir.exists() {
            return Ok(Vec::new());
        }

        let mut entries = tokio::fs::read_dir(&self.base_dir).await.map_err(|e| {
            StackError::State(StateError::backend(format!(
                "Failed to read state directory {}: {e}",
                self.base_dir.display()
            )))
        })?;

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| {
            StackError::State(StateError::backend(format!(
                "Failed to read state directory entry: {e}"
            )))
        })? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    names.push(stem.to_string());
                } else {
                    warn!("Skipping state file with unusable name: {}", path.display());
                }
            }
        }

        names.sort();
        Ok(names)
    }

    fn backend_type(&self) -> &'static str {
        "local"
    }
}
