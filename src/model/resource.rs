//! Declared resource records.
//!
//! A declared resource is one entry in the stack document: a stack-local id,
//! a resource type, and a type-specific bag of properties. Properties stay
//! an opaque JSON mapping here; the adapters interpret them.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Type-specific resource properties, as parsed from the stack document.
///
/// `serde_json`'s map type is ordered by key, which keeps serialization of
/// properties deterministic for fingerprinting.
pub type Properties = serde_json::Map<String, serde_json::Value>;

/// Well-known property keys used by the built-in resource types.
pub mod keys {
    /// Local path of the content backing a workspace or DBFS resource.
    pub const SOURCE_PATH: &str = "source_path";
    /// Remote target path of a workspace or DBFS resource.
    pub const PATH: &str = "path";
    /// Workspace object type: `NOTEBOOK` or `DIRECTORY`.
    pub const OBJECT_TYPE: &str = "object_type";
    /// Workspace notebook language (optional, inferred when absent).
    pub const LANGUAGE: &str = "language";
    /// Workspace import format (optional, defaults to `SOURCE`).
    pub const FORMAT: &str = "format";
    /// Job name (required for job resources).
    pub const NAME: &str = "name";
    /// Id of an existing cluster the job runs on.
    pub const EXISTING_CLUSTER_ID: &str = "existing_cluster_id";
    /// Inline spec of a new cluster the job runs on.
    pub const NEW_CLUSTER: &str = "new_cluster";
}

/// The kinds of resources a stack can declare.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    /// Workspace objects: notebooks and notebook directories.
    Workspace,
    /// Scheduled jobs.
    Jobs,
    /// DBFS blob-storage files.
    Dbfs,
}

impl ResourceType {
    /// Parses the `service` string used by the stack document.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::UnknownResourceType`] for any string other
    /// than `workspace`, `jobs`, or `dbfs`.
    pub fn parse(service: &str) -> Result<Self, ValidationError> {
        match service {
            "workspace" => Ok(Self::Workspace),
            "jobs" => Ok(Self::Jobs),
            "dbfs" => Ok(Self::Dbfs),
            other => Err(ValidationError::UnknownResourceType {
                service: other.to_string(),
            }),
        }
    }

    /// Returns the canonical service string for this type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Workspace => "workspace",
            Self::Jobs => "jobs",
            Self::Dbfs => "dbfs",
        }
    }

    /// Property keys that must be present for this resource type.
    #[must_use]
    pub const fn required_keys(self) -> &'static [&'static str] {
        match self {
            Self::Workspace => &[keys::SOURCE_PATH, keys::PATH, keys::OBJECT_TYPE],
            Self::Jobs => &[keys::NAME],
            Self::Dbfs => &[keys::SOURCE_PATH, keys::PATH],
        }
    }
}

impl std::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One declared resource from the stack document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeclaredResource {
    /// Stack-local identifier, unique within one declaration.
    pub id: String,
    /// The resource type, selecting the adapter that handles it.
    #[serde(rename = "type")]
    pub resource_type: ResourceType,
    /// Type-specific properties.
    pub properties: Properties,
}

impl DeclaredResource {
    /// Creates a new declared resource.
    #[must_use]
    pub fn new(id: impl Into<String>, resource_type: ResourceType, properties: Properties) -> Self {
        Self {
            id: id.into(),
            resource_type,
            properties,
        }
    }

    /// Returns the string value of a property, if present and a string.
    #[must_use]
    pub fn property_str(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(|v| v.as_str())
    }

    /// Returns the string value of a required property.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::MissingRequiredProperty`] when the key is
    /// absent and [`ValidationError::InvalidProperty`] when it is present but
    /// not a non-empty string.
    pub fn require_str(&self, key: &str) -> Result<&str, ValidationError> {
        match self.properties.get(key) {
            None => Err(ValidationError::MissingRequiredProperty {
                id: self.id.clone(),
                key: key.to_string(),
            }),
            Some(value) => match value.as_str() {
                Some(s) if !s.is_empty() => Ok(s),
                Some(_) => Err(ValidationError::InvalidProperty {
                    id: self.id.clone(),
                    key: key.to_string(),
                    message: String::from("must be a non-empty string"),
                }),
                None => Err(ValidationError::InvalidProperty {
                    id: self.id.clone(),
                    key: key.to_string(),
                    message: String::from("must be a string"),
                }),
            },
        }
    }

    /// Returns true if the property key is present.
    #[must_use]
    pub fn has_property(&self, key: &str) -> bool {
        self.properties.contains_key(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn props(pairs: &[(&str, serde_json::Value)]) -> Properties {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_parse_resource_type() {
        assert_eq!(ResourceType::parse("workspace").unwrap(), ResourceType::Workspace);
        assert_eq!(ResourceType::parse("jobs").unwrap(), ResourceType::Jobs);
        assert_eq!(ResourceType::parse("dbfs").unwrap(), ResourceType::Dbfs);
        assert!(ResourceType::parse("cluster").is_err());
    }

    #[test]
    fn test_require_str() {
        let resource = DeclaredResource::new(
            "r1",
            ResourceType::Jobs,
            props(&[("name", json!("nightly")), ("retries", json!(3))]),
        );

        assert_eq!(resource.require_str("name").unwrap(), "nightly");
        assert!(resource.require_str("missing").is_err());
        assert!(resource.require_str("retries").is_err());
    }
}
