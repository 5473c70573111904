//! Error types for the stack deployment engine.
//!
//! This module provides the error hierarchy for all phases of a
//! reconciliation run: declaration validation, state persistence, remote
//! service calls, and per-resource adapter actions.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for the stack deployment engine.
#[derive(Debug, Error)]
pub enum StackError {
    /// Stack document errors.
    #[error("Document error: {0}")]
    Document(#[from] DocumentError),

    /// Declaration validation errors.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// State persistence errors.
    #[error("State error: {0}")]
    State(#[from] StateError),

    /// Remote service errors.
    #[error("Remote service error: {0}")]
    Remote(#[from] RemoteError),

    /// Per-resource adapter errors.
    #[error("Adapter error: {0}")]
    Adapter(#[from] AdapterError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Stack document (configuration ingestion) errors.
#[derive(Debug, Error)]
pub enum DocumentError {
    /// The stack document file was not found.
    #[error("Stack document not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The stack document could not be parsed.
    #[error("Failed to parse stack document: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },
}

/// Declaration validation errors.
///
/// All of these are detected before any remote action is taken; a single
/// validation failure aborts the entire run with no state mutation.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A declared resource has an empty id.
    #[error("Declared resource at index {index} has an empty id")]
    EmptyResourceId {
        /// Position of the offending resource in the declaration.
        index: usize,
    },

    /// Two declared resources share the same id.
    #[error("Duplicate resource id: {id}")]
    DuplicateResourceId {
        /// The duplicated id.
        id: String,
    },

    /// The declared service does not name a known resource type.
    #[error("Unknown resource type: {service}")]
    UnknownResourceType {
        /// The unrecognized service string.
        service: String,
    },

    /// A property required by the resource type is absent.
    #[error("Resource '{id}' is missing required property: {key}")]
    MissingRequiredProperty {
        /// Id of the offending resource.
        id: String,
        /// The missing property key.
        key: String,
    },

    /// A property is present but its value is not acceptable.
    #[error("Resource '{id}' has invalid property '{key}': {message}")]
    InvalidProperty {
        /// Id of the offending resource.
        id: String,
        /// The offending property key.
        key: String,
        /// Description of the problem.
        message: String,
    },

    /// A DBFS path does not carry the required `dbfs:/` prefix.
    #[error("Resource '{id}' has invalid DBFS path '{path}': must start with dbfs:/")]
    InvalidPath {
        /// Id of the offending resource.
        id: String,
        /// The rejected path.
        path: String,
    },

    /// A job declares both or neither of its cluster alternatives.
    #[error("Resource '{id}' has an invalid cluster spec: {message}")]
    InvalidClusterSpec {
        /// Id of the offending resource.
        id: String,
        /// Description of the problem.
        message: String,
    },

    /// The stack name cannot be used as a state record key.
    #[error("Invalid stack name: {name}")]
    InvalidStackName {
        /// The rejected stack name.
        name: String,
    },
}

/// State persistence errors.
#[derive(Debug, Error)]
pub enum StateError {
    /// A persisted record exists but cannot be read back.
    #[error("Stack state is corrupted: {message}")]
    Corrupted {
        /// Description of the corruption.
        message: String,
    },

    /// State serialization failed.
    #[error("State serialization error: {message}")]
    SerializationError {
        /// Description of the serialization error.
        message: String,
    },

    /// A storage backend operation failed.
    #[error("State backend error: {message}")]
    Backend {
        /// Description of the backend failure.
        message: String,
    },

    /// The final state record could not be committed.
    ///
    /// This is fatal to the run's result even when remote actions succeeded:
    /// the persisted record would otherwise understate true remote state.
    #[error(
        "Failed to persist state for stack '{stack}': {message}; \
         remote changes from this run may not be reflected in the persisted record"
    )]
    PersistFailed {
        /// Name of the stack whose record could not be written.
        stack: String,
        /// Description of the persistence failure.
        message: String,
    },
}

/// Errors reported by the injected remote service clients.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The addressed remote object does not exist.
    #[error("Remote object not found: {target}")]
    NotFound {
        /// Identifier of the missing object.
        target: String,
    },

    /// The remote API rejected the request.
    #[error("Remote API error ({status}): {message}")]
    Api {
        /// Status code reported by the service.
        status: u16,
        /// Error message from the service.
        message: String,
    },

    /// The request never completed.
    #[error("Network error: {message}")]
    Network {
        /// Description of the network failure.
        message: String,
    },

    /// The service returned a response the client could not interpret.
    #[error("Invalid response from remote service: {message}")]
    InvalidResponse {
        /// Description of the response issue.
        message: String,
    },
}

/// Per-resource adapter errors.
///
/// These are scoped to a single resource: they are recorded as a FAILED
/// outcome and never abort the run or corrupt the retained state entry.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// Fingerprint computation failed (e.g. unreadable source content).
    #[error("Failed to fingerprint resource '{id}': {cause}")]
    FingerprintFailed {
        /// Id of the resource.
        id: String,
        /// Underlying cause.
        cause: String,
    },

    /// Provisioning a new remote resource failed.
    #[error("Failed to create resource '{id}': {cause}")]
    CreateFailed {
        /// Id of the resource.
        id: String,
        /// Underlying cause.
        cause: String,
    },

    /// Applying changes to an existing remote resource failed.
    #[error("Failed to update resource '{id}': {cause}")]
    UpdateFailed {
        /// Id of the resource.
        id: String,
        /// Underlying cause.
        cause: String,
    },

    /// Removing a remote resource failed.
    #[error("Failed to delete remote resource '{physical_id}': {cause}")]
    DeleteFailed {
        /// Physical id of the remote resource.
        physical_id: String,
        /// Underlying cause.
        cause: String,
    },

    /// The action did not complete within the caller-supplied timeout.
    #[error("Action for resource '{id}' timed out after {secs}s")]
    Timeout {
        /// Id of the resource.
        id: String,
        /// The timeout that elapsed, in seconds.
        secs: u64,
    },

    /// A job's physical name is already taken, remotely or by an earlier
    /// declaration in the same stack.
    #[error("Resource '{id}' collides with another job named '{name}'")]
    NameCollision {
        /// Id of the declared resource.
        id: String,
        /// The contested job name.
        name: String,
    },
}

/// Result type alias for stack deployment operations.
pub type Result<T> = std::result::Result<T, StackError>;

impl StackError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

impl StateError {
    /// Creates a backend error with the given message.
    #[must_use]
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }

    /// Creates a serialization error with the given message.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::SerializationError {
            message: message.into(),
        }
    }

    /// Creates a corruption error with the given message.
    #[must_use]
    pub fn corrupted(message: impl Into<String>) -> Self {
        Self::Corrupted {
            message: message.into(),
        }
    }
}

impl RemoteError {
    /// Creates a not-found error for the given target.
    #[must_use]
    pub fn not_found(target: impl Into<String>) -> Self {
        Self::NotFound {
            target: target.into(),
        }
    }

    /// Creates an API error.
    #[must_use]
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Creates a network error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Returns true if this error means the addressed object is absent.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl AdapterError {
    /// Creates a fingerprint error for a resource.
    #[must_use]
    pub fn fingerprint(id: impl Into<String>, cause: impl Into<String>) -> Self {
        Self::FingerprintFailed {
            id: id.into(),
            cause: cause.into(),
        }
    }

    /// Creates a create-failure for a resource.
    #[must_use]
    pub fn create(id: impl Into<String>, cause: impl Into<String>) -> Self {
        Self::CreateFailed {
            id: id.into(),
            cause: cause.into(),
        }
    }

    /// Creates an update-failure for a resource.
    #[must_use]
    pub fn update(id: impl Into<String>, cause: impl Into<String>) -> Self {
        Self::UpdateFailed {
            id: id.into(),
            cause: cause.into(),
        }
    }

    /// Creates a delete-failure for a remote resource.
    #[must_use]
    pub fn delete(physical_id: impl Into<String>, cause: impl Into<String>) -> Self {
        Self::DeleteFailed {
            physical_id: physical_id.into(),
            cause: cause.into(),
        }
    }

    /// Returns true if this error is a timeout.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
