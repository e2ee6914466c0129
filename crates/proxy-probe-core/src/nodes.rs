//! Node readiness after reconfiguration.

use futures::future::join_all;
use serde_json::Value;

use cluster_state::{kinds, Resource, ResourceKey, StateStore};

use crate::poll::{poll_until, ConvergenceOutcome, PollPolicy, PredicateError};

pub fn node_key(name: &str) -> ResourceKey {
    ResourceKey::cluster(kinds::NODE, name)
}

/// `Ready=True` and not cordoned.
pub fn node_ready_and_schedulable(node: &Resource) -> bool {
    let ready = node
        .pointer("/status/conditions")
        .and_then(Value::as_array)
        .map(|conditions| {
            conditions.iter().any(|c| {
                c.get("type").and_then(Value::as_str) == Some("Ready")
                    && c.get("status").and_then(Value::as_str) == Some("True")
            })
        })
        .unwrap_or(false);
    let unschedulable = node
        .pointer("/spec/unschedulable")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    ready && !unschedulable
}

/// Wait for a node to be Ready and schedulable, checking immediately.
///
/// Any store error, including a missing node, aborts the wait.
pub async fn wait_for_node_ready(
    store: &dyn StateStore,
    name: &str,
    policy: &PollPolicy,
) -> ConvergenceOutcome {
    let key = node_key(name);
    let key = &key;
    poll_until(policy, true, move || async move {
        store
            .get(key)
            .await
            .map(|node| node_ready_and_schedulable(&node))
            .map_err(PredicateError::fatal)
    })
    .await
}

/// Wait for several nodes concurrently, one independent poll per node.
/// Outcomes are returned in input order.
pub async fn wait_for_nodes_ready(
    store: &dyn StateStore,
    names: &[String],
    policy: &PollPolicy,
) -> Vec<(String, ConvergenceOutcome)> {
    join_all(names.iter().map(|name| async move {
        let outcome = wait_for_node_ready(store, name, policy).await;
        (name.clone(), outcome)
    }))
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn node(conditions: Value, unschedulable: Option<bool>) -> Resource {
        let mut doc = json!({"metadata": {"name": "winworker-a"}, "status": {"conditions": conditions}});
        if let Some(flag) = unschedulable {
            doc["spec"] = json!({"unschedulable": flag});
        }
        Resource::new(node_key("winworker-a"), doc)
    }

    #[test]
    fn test_ready_and_schedulable() {
        let n = node(json!([{"type": "Ready", "status": "True"}]), None);
        assert!(node_ready_and_schedulable(&n));
    }

    #[test]
    fn test_cordoned_node_not_schedulable() {
        let n = node(json!([{"type": "Ready", "status": "True"}]), Some(true));
        assert!(!node_ready_and_schedulable(&n));
    }

    #[test]
    fn test_not_ready() {
        let n = node(
            json!([
                {"type": "MemoryPressure", "status": "False"},
                {"type": "Ready", "status": "False"},
            ]),
            Some(false),
        );
        assert!(!node_ready_and_schedulable(&n));
    }

    #[test]
    fn test_no_conditions() {
        let n = Resource::new(node_key("winworker-a"), json!({}));
        assert!(!node_ready_and_schedulable(&n));
    }
}
