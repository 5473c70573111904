//! Structural validation of a declared resource list.
//!
//! Only structural invariants are checked here: id uniqueness and the
//! presence of the properties each resource type requires. No network or
//! filesystem access occurs. Type-specific value checks (path prefixes,
//! cluster specs) live in the adapters' `validate` implementations.

use std::collections::HashSet;
use tracing::debug;

use crate::error::ValidationError;

use super::resource::DeclaredResource;

/// Validates the structural invariants of a declared resource list.
///
/// # Errors
///
/// Returns the first violation found, in declaration order:
/// [`ValidationError::EmptyResourceId`], [`ValidationError::DuplicateResourceId`],
/// [`ValidationError::MissingRequiredProperty`], or
/// [`ValidationError::InvalidProperty`].
pub fn validate_declared(resources: &[DeclaredResource]) -> Result<(), ValidationError> {
    let mut seen_ids: HashSet<&str> = HashSet::new();

    for (index, resource) in resources.iter().enumerate() {
        if resource.id.is_empty() {
            return Err(ValidationError::EmptyResourceId { index });
        }

        if !seen_ids.insert(resource.id.as_str()) {
            return Err(ValidationError::DuplicateResourceId {
                id: resource.id.clone(),
            });
        }

        for key in resource.resource_type.required_keys() {
            // Jobs settings are opaque except for the name, which must be a
            // string; the same check applies to path-like keys.
            resource.require_str(key)?;
        }
    }

    debug!("Validated {} declared resources", resources.len());
    Ok(())
}
