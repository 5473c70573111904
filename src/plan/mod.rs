//! Diff planning between a declaration and the persisted record.

mod diff;

pub use diff::{ActionKind, DiffEngine, PlannedAction, StackDiff};
