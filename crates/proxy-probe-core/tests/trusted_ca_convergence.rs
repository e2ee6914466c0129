//! Integration tests for trusted CA convergence against MemoryStateStore.
//!
//! A spawned task plays the operator: it repairs the ConfigMap after a
//! delay while the poll runs. Time is paused, so the waits are instant.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use cluster_state::fakes::MemoryStateStore;
use cluster_state::{Resource, StateStore};
use proxy_probe_core::proxy::cluster_proxy_key;
use proxy_probe_core::trusted_ca::{
    configure_user_ca_bundle, delete_trusted_ca, disable_cluster_proxy, remove_injection_label,
    trusted_ca_key, user_ca_bundle, wait_for_valid_trusted_ca, INJECTION_LABEL,
    OPERATOR_NAMESPACE, TRUSTED_CA_CONFIG_MAP,
};
use proxy_probe_core::{ConvergenceOutcome, PollPolicy, ProbeError, ProxyEnv};
use serde_json::json;

fn valid_trusted_ca() -> Resource {
    Resource::config_map(
        OPERATOR_NAMESPACE,
        TRUSTED_CA_CONFIG_MAP,
        BTreeMap::from([(INJECTION_LABEL.to_string(), "true".to_string())]),
        BTreeMap::new(),
    )
}

fn policy(interval_secs: u64, timeout_secs: u64) -> PollPolicy {
    PollPolicy::new(
        Duration::from_secs(interval_secs),
        Duration::from_secs(timeout_secs),
    )
    .unwrap()
}

/// Paused time still rounds timer deadlines to the millisecond.
fn assert_about(actual: Duration, expected: Duration) {
    let diff = actual.abs_diff(expected);
    assert!(
        diff <= Duration::from_millis(5),
        "expected about {expected:?}, got {actual:?}"
    );
}

/// Re-create a valid ConfigMap after `delay`.
fn spawn_operator(store: Arc<MemoryStateStore>, delay: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        store.upsert(valid_trusted_ca());
    })
}

/// Test: a deleted ConfigMap is re-created and the poll converges
#[tokio::test(start_paused = true)]
async fn test_deleted_config_map_restored() {
    let store = Arc::new(MemoryStateStore::new());
    store.upsert(valid_trusted_ca());

    delete_trusted_ca(store.as_ref()).await.unwrap();
    assert!(!store.contains(&trusted_ca_key()));
    let operator = spawn_operator(store.clone(), Duration::from_secs(7));

    let outcome = wait_for_valid_trusted_ca(store.as_ref(), &policy(5, 180)).await;
    operator.await.unwrap();

    // Missing at t=5s, restored by t=10s
    assert!(outcome.is_converged(), "outcome: {outcome:?}");
    assert_eq!(outcome.attempts(), 2);
    assert_about(outcome.elapsed(), Duration::from_secs(10));
}

/// Test: a ConfigMap stripped of its labels is re-labelled
#[tokio::test(start_paused = true)]
async fn test_invalidated_config_map_relabelled() {
    let store = Arc::new(MemoryStateStore::new());
    store.upsert(valid_trusted_ca());

    remove_injection_label(store.as_ref()).await.unwrap();
    let stripped = store.get(&trusted_ca_key()).await.unwrap();
    assert!(stripped.labels().is_empty());

    let operator = spawn_operator(store.clone(), Duration::from_secs(12));
    let outcome = wait_for_valid_trusted_ca(store.as_ref(), &policy(5, 180)).await;
    operator.await.unwrap();

    assert!(outcome.is_converged());
    assert_eq!(outcome.attempts(), 3);
}

/// Test: no repair within the timeout carries the last retryable error
#[tokio::test(start_paused = true)]
async fn test_never_restored_times_out() {
    let store = MemoryStateStore::new();

    let outcome = wait_for_valid_trusted_ca(&store, &policy(5, 20)).await;

    match &outcome {
        ConvergenceOutcome::TimedOut {
            attempts,
            elapsed,
            last_error,
        } => {
            assert_eq!(*attempts, 4);
            assert_about(*elapsed, Duration::from_secs(20));
            assert!(last_error.as_ref().is_some_and(|e| e.is_retryable()));
        }
        other => panic!("expected timeout, got {other:?}"),
    }

    let err = outcome.into_result("trusted CA ConfigMap").unwrap_err();
    assert!(matches!(err, ProbeError::Timeout { .. }));
    assert!(err.to_string().contains("not found"), "{err}");
}

/// Test: a store failure other than not-found aborts the poll
#[tokio::test(start_paused = true)]
async fn test_store_unavailable_is_fatal() {
    let store = MemoryStateStore::new();
    store.upsert(valid_trusted_ca());
    store.set_unavailable(&trusted_ca_key(), "connection refused");

    let outcome = wait_for_valid_trusted_ca(&store, &policy(5, 180)).await;

    assert!(matches!(
        outcome,
        ConvergenceOutcome::PredicateError { attempts: 1, .. }
    ));
    assert_about(outcome.elapsed(), Duration::from_secs(5));
    let err = outcome.into_result("trusted CA ConfigMap").unwrap_err();
    assert!(err.to_string().contains("connection refused"), "{err}");
}

/// Test: the user CA bundle is stored and referenced from the cluster proxy
#[tokio::test]
async fn test_configure_user_ca_bundle() {
    let store = MemoryStateStore::new();
    store.upsert(Resource::new(
        cluster_proxy_key(),
        json!({"spec": {"httpProxy": "http://proxy:3128/", "trustedCA": {"name": ""}}}),
    ));

    let bundle = "-----BEGIN CERTIFICATE-----\nMIIB\n-----END CERTIFICATE-----\n";
    configure_user_ca_bundle(&store, bundle).await.unwrap();

    assert_eq!(user_ca_bundle(&store).await.unwrap(), bundle);
    let proxy = store.get(&cluster_proxy_key()).await.unwrap();
    assert_eq!(proxy.str_at("/spec/trustedCA/name"), Some("user-ca-bundle"));

    // A second create conflicts
    let err = configure_user_ca_bundle(&store, bundle).await.unwrap_err();
    assert!(matches!(err, ProbeError::Store(_)));
}

/// Test: disabling the proxy removes the spec fields only
#[tokio::test]
async fn test_disable_cluster_proxy() {
    let store = MemoryStateStore::new();
    store.upsert(Resource::new(
        cluster_proxy_key(),
        json!({
            "spec": {"httpProxy": "http://proxy:3128/", "httpsProxy": "http://proxy:3128/", "noProxy": ".svc"},
            "status": {"httpProxy": "http://proxy:3128/"},
        }),
    ));

    let patched = disable_cluster_proxy(&store).await.unwrap();

    assert!(patched.pointer("/spec/httpProxy").is_none());
    assert!(patched.pointer("/spec/httpsProxy").is_none());
    assert_eq!(patched.str_at("/spec/noProxy"), Some(".svc"));

    // Status is left to the controller
    let env = ProxyEnv::fetch(&store).await.unwrap();
    assert_eq!(env.http_proxy, "http://proxy:3128/");
}
