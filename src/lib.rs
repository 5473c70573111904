// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(warnings)]                    // All warnings are treated as errors
#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![deny(missing_docs)]                // All public items must be documented
#![deny(dead_code)]                   // Unused code is forbidden
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![deny(unused_imports)]              // Unused imports are forbidden
#![deny(unused_variables)]            // Unused variables are forbidden
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::missing_const_for_fn)] // Force const when possible
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::module_inception)]    // Module with same name as crate warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::shadow_unrelated)]    // Shadowing unrelated variables warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # Stack Deploy
//!
//! A declarative, idempotent reconciliation engine for named stacks of
//! workspace, job, and DBFS resources.
//!
//! ## Overview
//!
//! Stack Deploy takes a declarative list of typed resources and brings a
//! remote environment into conformance with it:
//!
//! - Declare workspace notebooks, scheduled jobs, and DBFS files in a single
//!   stack document
//! - Re-run the same declaration safely: unchanged resources are detected by
//!   fingerprint and skipped
//! - Remove a resource from the declaration and its remote counterpart is
//!   cleaned up
//! - Partial failures never corrupt the persisted record: only confirmed
//!   results are recorded, and every failure is reported
//!
//! ## Architecture
//!
//! The engine is built around **declared-vs-deployed reconciliation**:
//!
//! 1. **Declared resources**: the stack document, parsed into typed records
//! 2. **Deployed record**: the persisted per-stack state from the last run
//! 3. **Reconciler**: diffs the two and dispatches create/update/delete
//!    actions through per-type adapters
//!
//! ## Modules
//!
//! - [`config`]: stack document ingestion
//! - [`model`]: declared resource records and structural validation
//! - [`state`]: persisted stack records and storage backends
//! - [`remote`]: capability traits for the injected service clients
//! - [`adapter`]: per-type resource lifecycle adapters
//! - [`plan`]: declared-vs-deployed diff computation
//! - [`reconciler`]: the reconciliation engine
//! - [`report`]: per-resource outcomes and run reports
//!
//! ## Example
//!
//! ```json
//! {
//!   "name": "ml-pipeline",
//!   "resources": [
//!     {
//!       "id": "etl-notebook",
//!       "service": "workspace",
//!       "properties": {
//!         "source_path": "notebooks/etl.py",
//!         "path": "/Shared/ml/etl",
//!         "object_type": "NOTEBOOK"
//!       }
//!     }
//!   ]
//! }
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod adapter;
pub mod config;
pub mod error;
pub mod model;
pub mod plan;
pub mod reconciler;
pub mod remote;
pub mod report;
pub mod state;

// ============================================================================
// Re-exports
// ============================================================================

pub use adapter::{
    AdapterRegistry, DbfsAdapter, Fingerprinter, JobsAdapter, ResourceAdapter, WorkspaceAdapter,
};
pub use config::{DocumentLoader, StackDocument};
pub use error::{Result, StackError};
pub use model::{DeclaredResource, Properties, ResourceType};
pub use plan::{ActionKind, DiffEngine, PlannedAction, StackDiff};
pub use reconciler::{ReconcileOptions, Reconciler};
pub use remote::{
    DbfsService, FsSourceReader, JobSummary, JobsService, NotebookImport, SourceReader,
    WorkspaceObject, WorkspaceObjectType, WorkspaceService,
};
pub use report::{DeployReport, Outcome, OutcomeStatus, RunStatus};
pub use state::{DeployedResourceStatus, LocalStateStore, StackState, StateStore};
