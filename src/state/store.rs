//! The state store abstraction.

use async_trait::async_trait;

use crate::error::Result;

use super::types::StackState;

/// Persistence backend for stack state records.
///
/// One record is kept per stack name. The reconciler loads the record at the
/// start of a run and saves the updated record exactly once at the end.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Loads the record for a stack, or `None` if the stack has never been
    /// deployed.
    async fn load(&self, stack_name: &str) -> Result<Option<StackState>>;

    /// Saves the record for a stack, replacing any previous record.
    async fn save(&self, state: &StackState) -> Result<()>;

    /// Deletes the record for a stack. Deleting an absent record is not an
    /// error.
    async fn delete(&self, stack_name: &str) -> Result<()>;

    /// Returns true if a record exists for the stack.
    async fn exists(&self, stack_name: &str) -> Result<bool>;

    /// Lists the names of all stacks with a record.
    async fn list(&self) -> Result<Vec<String>>;

    /// A short label for the backend, used in logs.
    fn backend_type(&self) -> &'static str;
}

#[async_trait]
impl StateStore for Box<dyn StateStore> {
    async fn load(&self, stack_name: &str) -> Result<Option<StackState>> {
        (**self).load(stack_name).await
    }

    async fn save(&self, state: &StackState) -> Result<()> {
        (**self).save(state).await
    }

    async fn delete(&self, stack_name: &str) -> Result<()> {
        (**self).delete(stack_name).await
    }

    async fn exists(&self, stack_name: &str) -> Result<bool> {
        (**self).exists(stack_name).await
    }

    async fn list(&self) -> Result<Vec<String>> {
        (**self).list().await
    }

    fn backend_type(&self) -> &'static str {
        (**self).backend_type()
    }
}
