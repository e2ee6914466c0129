//! RFC 6902 JSON patch documents.
//!
//! The probes disturb controller-managed resources by patching them
//! (dropping a required label, swapping the trusted CA reference, removing
//! proxy settings). [`JsonPatch`] is the serializable form handed to the
//! state store; [`apply_patches`] is the local interpretation used by the
//! in-memory store.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{StoreError, StoreResult};

/// Patch operation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchOp {
    Add,
    Remove,
    Replace,
}

/// A single JSON patch operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonPatch {
    pub op: PatchOp,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl JsonPatch {
    pub fn new(op: PatchOp, path: &str, value: Option<Value>) -> Self {
        Self {
            op,
            path: path.to_string(),
            value,
        }
    }

    pub fn add(path: &str, value: Value) -> Self {
        Self::new(PatchOp::Add, path, Some(value))
    }

    pub fn remove(path: &str) -> Self {
        Self::new(PatchOp::Remove, path, None)
    }

    pub fn replace(path: &str, value: Value) -> Self {
        Self::new(PatchOp::Replace, path, Some(value))
    }
}

/// Serialize a sequence of patches into the wire document.
pub fn patch_document(patches: &[JsonPatch]) -> StoreResult<String> {
    Ok(serde_json::to_string(patches)?)
}

/// Apply patches to a document in order.
///
/// Either every operation applies or the document is left untouched.
pub fn apply_patches(document: &mut Value, patches: &[JsonPatch]) -> StoreResult<()> {
    let mut working = document.clone();
    for patch in patches {
        apply_one(&mut working, patch)?;
    }
    *document = working;
    Ok(())
}

fn apply_one(document: &mut Value, patch: &JsonPatch) -> StoreResult<()> {
    match patch.op {
        PatchOp::Add => {
            let value = required_value(patch)?;
            if patch.path.is_empty() {
                *document = value;
                return Ok(());
            }
            let (parent, token) = split_parent(document, &patch.path)?;
            match parent {
                Value::Object(map) => {
                    map.insert(token, value);
                    Ok(())
                }
                Value::Array(items) => {
                    let index = if token == "-" {
                        items.len()
                    } else {
                        parse_index(&patch.path, &token, items.len() + 1)?
                    };
                    items.insert(index, value);
                    Ok(())
                }
                _ => Err(invalid(&patch.path, "parent is not a container")),
            }
        }
        PatchOp::Remove => {
            if patch.path.is_empty() {
                return Err(invalid(&patch.path, "cannot remove the document root"));
            }
            let (parent, token) = split_parent(document, &patch.path)?;
            match parent {
                Value::Object(map) => map
                    .remove(&token)
                    .map(|_| ())
                    .ok_or_else(|| invalid(&patch.path, "path does not exist")),
                Value::Array(items) => {
                    let index = parse_index(&patch.path, &token, items.len())?;
                    items.remove(index);
                    Ok(())
                }
                _ => Err(invalid(&patch.path, "parent is not a container")),
            }
        }
        PatchOp::Replace => {
            let value = required_value(patch)?;
            let target = document
                .pointer_mut(&patch.path)
                .ok_or_else(|| invalid(&patch.path, "path does not exist"))?;
            *target = value;
            Ok(())
        }
    }
}

fn required_value(patch: &JsonPatch) -> StoreResult<Value> {
    patch
        .value
        .clone()
        .ok_or_else(|| invalid(&patch.path, "operation requires a value"))
}

/// Resolve the parent container of `path` and the unescaped final token.
fn split_parent<'a>(document: &'a mut Value, path: &str) -> StoreResult<(&'a mut Value, String)> {
    if !path.starts_with('/') {
        return Err(invalid(path, "pointer must start with '/'"));
    }
    let idx = path.rfind('/').unwrap_or(0);
    let (parent_ptr, last) = (&path[..idx], &path[idx + 1..]);
    let parent = document
        .pointer_mut(parent_ptr)
        .ok_or_else(|| invalid(path, "parent path does not exist"))?;
    Ok((parent, unescape(last)))
}

fn unescape(token: &str) -> String {
    token.replace("~1", "/").replace("~0", "~")
}

fn parse_index(path: &str, token: &str, upper: usize) -> StoreResult<usize> {
    let index: usize = token
        .parse()
        .map_err(|_| invalid(path, "array index is not a number"))?;
    if index >= upper {
        return Err(invalid(path, "array index out of bounds"));
    }
    Ok(index)
}

fn invalid(path: &str, reason: &str) -> StoreError {
    StoreError::InvalidPatch {
        path: path.to_string(),
        reason: reason.to_string(),
    }
}
