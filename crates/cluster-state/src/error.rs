//! Error types for cluster-state

use thiserror::Error;

use crate::resource::ResourceKey;

/// Result type for state store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errors that can occur talking to the state store
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    /// The resource does not exist (yet)
    #[error("{key} not found")]
    NotFound { key: ResourceKey },

    /// Create was called for a resource that already exists
    #[error("{key} already exists")]
    AlreadyExists { key: ResourceKey },

    /// A patch operation could not be applied
    #[error("invalid patch at {path:?}: {reason}")]
    InvalidPatch { path: String, reason: String },

    /// The store could not be reached or rejected the call outright
    #[error("state store unavailable: {0}")]
    Unavailable(String),

    /// Serialization error
    #[error("Serialization failed: {0}")]
    Serialization(String),
}

impl StoreError {
    /// Whether this error means the resource is not present yet.
    ///
    /// Callers waiting for a resource to be (re-)created treat this class as
    /// "keep polling"; everything else is a hard failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_classification() {
        let key = ResourceKey::namespaced("ConfigMap", "ns", "trusted-ca");
        assert!(StoreError::NotFound { key: key.clone() }.is_not_found());
        assert!(!StoreError::AlreadyExists { key }.is_not_found());
        assert!(!StoreError::Unavailable("connection refused".into()).is_not_found());
    }

    #[test]
    fn test_not_found_message_names_resource() {
        let key = ResourceKey::namespaced("ConfigMap", "ns", "trusted-ca");
        let msg = StoreError::NotFound { key }.to_string();
        assert_eq!(msg, "ConfigMap ns/trusted-ca not found");
    }
}
