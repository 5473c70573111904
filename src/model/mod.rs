//! Resource model for the stack deployment engine.
//!
//! This module defines the typed records for declared resources and the
//! structural validation applied before any remote action:
//! - Resource types and declared-resource records
//! - Property key constants and accessors
//! - Uniqueness and required-key validation

mod resource;
mod validator;

pub use resource::{DeclaredResource, Properties, ResourceType, keys};
pub use validator::validate_declared;
