//! The state store trait.

use async_trait::async_trait;

use crate::error::StoreResult;
use crate::patch::JsonPatch;
use crate::resource::{Resource, ResourceKey};

/// Access to named resources in the orchestration API.
///
/// Guarantees:
/// - `get` on an absent resource returns `StoreError::NotFound`.
/// - `create` on an existing resource returns `StoreError::AlreadyExists`.
/// - `patch` applies all operations or none.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Fetch a resource by key.
    async fn get(&self, key: &ResourceKey) -> StoreResult<Resource>;

    /// Create a new resource.
    async fn create(&self, resource: Resource) -> StoreResult<Resource>;

    /// Delete a resource. Returns `NotFound` if absent.
    async fn delete(&self, key: &ResourceKey) -> StoreResult<()>;

    /// Apply a JSON patch document and return the patched resource.
    async fn patch(&self, key: &ResourceKey, patches: &[JsonPatch]) -> StoreResult<Resource>;
}
