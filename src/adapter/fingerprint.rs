//! Deterministic resource fingerprinting.

use sha2::{Digest, Sha256};

use crate::model::Properties;

/// Computes deterministic SHA-256 fingerprints of declared resources.
///
/// Properties are serialized from a key-ordered map, so two equal property
/// bags always hash identically regardless of declaration order.
#[derive(Debug, Clone, Copy, Default)]
pub struct Fingerprinter;

impl Fingerprinter {
    /// Creates a new fingerprinter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Fingerprints a property bag.
    ///
    /// # Errors
    ///
    /// Returns an error if the properties cannot be serialized.
    pub fn hash_properties(&self, properties: &Properties) -> Result<String, serde_json::Error> {
        let bytes = serde_json::to_vec(properties)?;
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        Ok(hex::encode(hasher.finalize()))
    }

    /// Fingerprints a property bag together with named content blocks.
    ///
    /// Used for source-backed resources, where a content edit must change
    /// the fingerprint even when the properties are untouched. Each block is
    /// framed by its name and length so distinct block layouts cannot
    /// collide.
    ///
    /// # Errors
    ///
    /// Returns an error if the properties cannot be serialized.
    pub fn hash_properties_and_content(
        &self,
        properties: &Properties,
        content: &[(String, Vec<u8>)],
    ) -> Result<String, serde_json::Error> {
        let bytes = serde_json::to_vec(properties)?;
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        for (name, block) in content {
            hasher.update(name.as_bytes());
            hasher.update(b"\0");
            hasher.update((block.len() as u64).to_be_bytes());
            hasher.update(block);
        }
        Ok(hex::encode(hasher.finalize()))
    }
}
