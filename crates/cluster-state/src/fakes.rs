//! In-memory state store (testing only)
//!
//! `MemoryStateStore` satisfies the `StateStore` contract without a live
//! API server. Patches are applied locally, and individual keys can be
//! marked unavailable to simulate transport failures.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::patch::{apply_patches, JsonPatch};
use crate::resource::{Resource, ResourceKey};
use crate::store::StateStore;

/// In-memory store backed by a `HashMap<ResourceKey, document>`.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    resources: Mutex<HashMap<ResourceKey, Value>>,
    unavailable: Mutex<HashMap<ResourceKey, String>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a resource, bypassing `create` semantics.
    pub fn upsert(&self, resource: Resource) {
        let mut resources = self.resources.lock().unwrap();
        resources.insert(resource.key, resource.document);
    }

    /// Make every call touching `key` fail with `StoreError::Unavailable`.
    pub fn set_unavailable(&self, key: &ResourceKey, reason: &str) {
        let mut unavailable = self.unavailable.lock().unwrap();
        unavailable.insert(key.clone(), reason.to_string());
    }

    /// Undo [`set_unavailable`](Self::set_unavailable).
    pub fn clear_unavailable(&self, key: &ResourceKey) {
        let mut unavailable = self.unavailable.lock().unwrap();
        unavailable.remove(key);
    }

    pub fn contains(&self, key: &ResourceKey) -> bool {
        self.resources.lock().unwrap().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.resources.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_available(&self, key: &ResourceKey) -> StoreResult<()> {
        let unavailable = self.unavailable.lock().unwrap();
        match unavailable.get(key) {
            Some(reason) => Err(StoreError::Unavailable(reason.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn get(&self, key: &ResourceKey) -> StoreResult<Resource> {
        self.check_available(key)?;
        let resources = self.resources.lock().unwrap();
        resources
            .get(key)
            .map(|doc| Resource::new(key.clone(), doc.clone()))
            .ok_or_else(|| StoreError::NotFound { key: key.clone() })
    }

    async fn create(&self, resource: Resource) -> StoreResult<Resource> {
        self.check_available(&resource.key)?;
        let mut resources = self.resources.lock().unwrap();
        if resources.contains_key(&resource.key) {
            return Err(StoreError::AlreadyExists { key: resource.key });
        }
        debug!(resource = %resource.key, "created");
        resources.insert(resource.key.clone(), resource.document.clone());
        Ok(resource)
    }

    async fn delete(&self, key: &ResourceKey) -> StoreResult<()> {
        self.check_available(key)?;
        let mut resources = self.resources.lock().unwrap();
        resources
            .remove(key)
            .map(|_| debug!(resource = %key, "deleted"))
            .ok_or_else(|| StoreError::NotFound { key: key.clone() })
    }

    async fn patch(&self, key: &ResourceKey, patches: &[JsonPatch]) -> StoreResult<Resource> {
        self.check_available(key)?;
        let mut resources = self.resources.lock().unwrap();
        let document = resources
            .get_mut(key)
            .ok_or_else(|| StoreError::NotFound { key: key.clone() })?;
        apply_patches(document, patches)?;
        debug!(resource = %key, operations = patches.len(), "patched");
        Ok(Resource::new(key.clone(), document.clone()))
    }
}
