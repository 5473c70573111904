//! State management for the stack deployment engine.
//!
//! This module provides persistent per-stack records of what was last
//! successfully deployed, so re-running a declaration is idempotent and
//! removed resources are cleaned up instead of orphaned.

mod local;
mod store;
mod types;

pub use local::LocalStateStore;
pub use store::StateStore;
pub use types::{DeployedResourceStatus, RunHistoryEntry, STATE_VERSION, StackState};

#[cfg(test)]
pub use store::MockStateStore;
