//! Remote service capability traits.
//!
//! The reconciler never talks to a workspace directly; adapters are handed
//! implementations of these narrow traits. Production wiring injects real
//! API clients, tests inject mocks or in-memory fakes.

mod dbfs;
mod jobs;
mod source;
mod workspace;

pub use dbfs::DbfsService;
pub use jobs::{JobSummary, JobsService};
pub use source::{FsSourceReader, SourceReader};
pub use workspace::{NotebookImport, WorkspaceObject, WorkspaceObjectType, WorkspaceService};

#[cfg(test)]
pub use dbfs::MockDbfsService;
#[cfg(test)]
pub use jobs::MockJobsService;
#[cfg(test)]
pub use source::MockSourceReader;
#[cfg(test)]
pub use workspace::MockWorkspaceService;
