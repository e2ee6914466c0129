//! Cluster-State: declarative state store abstraction for proxy probes
//!
//! This crate models the orchestration API the probes talk to: named
//! resources that can be fetched, created, deleted and patched with
//! RFC 6902 JSON patch documents.
//!
//! ## Key Components
//!
//! - `StateStore`: async get/create/delete/patch over named resources
//! - `Resource` / `ResourceKey`: a resource document and its identity
//! - `JsonPatch`: a single patch operation, serialized as the API expects
//!
//! An in-memory implementation that applies patches locally is provided in
//! the `fakes` module.

mod error;
pub mod fakes;
pub mod patch;
pub mod resource;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use patch::{patch_document, JsonPatch, PatchOp};
pub use resource::{kinds, Resource, ResourceKey};
pub use store::StateStore;
