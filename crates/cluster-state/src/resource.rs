//! Resource identity and document accessors.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Well-known resource kinds used by the probes.
pub mod kinds {
    pub const CONFIG_MAP: &str = "ConfigMap";
    pub const PROXY: &str = "Proxy";
    pub const NODE: &str = "Node";
}

/// Identity of a resource: kind, optional namespace and name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceKey {
    pub kind: String,
    pub namespace: Option<String>,
    pub name: String,
}

impl ResourceKey {
    /// Key for a namespaced resource.
    pub fn namespaced(kind: &str, namespace: &str, name: &str) -> Self {
        Self {
            kind: kind.to_string(),
            namespace: Some(namespace.to_string()),
            name: name.to_string(),
        }
    }

    /// Key for a cluster-scoped resource.
    pub fn cluster(kind: &str, name: &str) -> Self {
        Self {
            kind: kind.to_string(),
            namespace: None,
            name: name.to_string(),
        }
    }
}

impl std::fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{} {}/{}", self.kind, ns, self.name),
            None => write!(f, "{} {}", self.kind, self.name),
        }
    }
}

/// A resource document as returned by the state store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub key: ResourceKey,
    pub document: Value,
}

impl Resource {
    pub fn new(key: ResourceKey, document: Value) -> Self {
        Self { key, document }
    }

    /// Build a ConfigMap document with the given labels and data.
    pub fn config_map(
        namespace: &str,
        name: &str,
        labels: BTreeMap<String, String>,
        data: BTreeMap<String, String>,
    ) -> Self {
        let document = json!({
            "metadata": {
                "name": name,
                "namespace": namespace,
                "labels": labels,
            },
            "data": data,
        });
        Self::new(
            ResourceKey::namespaced(kinds::CONFIG_MAP, namespace, name),
            document,
        )
    }

    /// Look up a value by JSON pointer.
    pub fn pointer(&self, pointer: &str) -> Option<&Value> {
        self.document.pointer(pointer)
    }

    /// Look up a string value by JSON pointer.
    pub fn str_at(&self, pointer: &str) -> Option<&str> {
        self.pointer(pointer).and_then(Value::as_str)
    }

    /// `metadata.labels` as a string map. Non-string values are skipped.
    pub fn labels(&self) -> BTreeMap<String, String> {
        string_map(self.pointer("/metadata/labels"))
    }

    /// A single label value.
    pub fn label(&self, key: &str) -> Option<&str> {
        self.pointer("/metadata/labels")
            .and_then(|labels| labels.get(key))
            .and_then(Value::as_str)
    }

    /// The `data` section as a string map.
    pub fn data(&self) -> BTreeMap<String, String> {
        string_map(self.pointer("/data"))
    }
}

fn string_map(value: Option<&Value>) -> BTreeMap<String, String> {
    value
        .and_then(Value::as_object)
        .map(|obj| {
            obj.iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect()
        })
        .unwrap_or_default()
}
