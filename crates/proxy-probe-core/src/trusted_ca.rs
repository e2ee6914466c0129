//! Trusted CA bundle convergence
//!
//! The operator owns a `trusted-ca` ConfigMap carrying the injection label
//! that asks the network operator to fill in the merged proxy CA bundle.
//! After the ConfigMap is deleted, or patched so the label is gone, the
//! operator must restore it. These helpers apply the disturbances and wait
//! for the repair.

use std::collections::BTreeMap;

use serde_json::json;
use tracing::info;

use cluster_state::{kinds, JsonPatch, PatchOp, Resource, ResourceKey, StateStore};

use crate::error::Result;
use crate::poll::{poll_until, ConvergenceOutcome, PollPolicy, PredicateError};
use crate::proxy::cluster_proxy_key;

/// Namespace the operator runs in.
pub const OPERATOR_NAMESPACE: &str = "openshift-windows-machine-config-operator";

/// Operator-managed ConfigMap holding the merged proxy CA bundle.
pub const TRUSTED_CA_CONFIG_MAP: &str = "trusted-ca";

/// Label requesting CA bundle injection.
pub const INJECTION_LABEL: &str = "config.openshift.io/inject-trusted-cabundle";

/// Data key of the CA bundle in both ConfigMaps.
pub const CA_BUNDLE_KEY: &str = "ca-bundle.crt";

/// User-provided additional CA bundle.
pub const USER_CA_BUNDLE_NAME: &str = "user-ca-bundle";
pub const USER_CA_BUNDLE_NAMESPACE: &str = "openshift-config";

pub fn trusted_ca_key() -> ResourceKey {
    ResourceKey::namespaced(kinds::CONFIG_MAP, OPERATOR_NAMESPACE, TRUSTED_CA_CONFIG_MAP)
}

pub fn user_ca_bundle_key() -> ResourceKey {
    ResourceKey::namespaced(kinds::CONFIG_MAP, USER_CA_BUNDLE_NAMESPACE, USER_CA_BUNDLE_NAME)
}

/// Whether the ConfigMap carries `INJECTION_LABEL=true`.
pub fn has_injection_label(config_map: &Resource) -> bool {
    config_map.label(INJECTION_LABEL) == Some("true")
}

/// Wait for a valid trusted CA ConfigMap.
///
/// Waits one interval before the first check so the controller can react
/// to a disturbance. A missing ConfigMap keeps polling; any other store
/// error aborts. A ConfigMap without the label keeps polling.
pub async fn wait_for_valid_trusted_ca(
    store: &dyn StateStore,
    policy: &PollPolicy,
) -> ConvergenceOutcome {
    let key = trusted_ca_key();
    let key = &key;
    poll_until(policy, false, move || async move {
        match store.get(key).await {
            Ok(cm) => Ok(has_injection_label(&cm)),
            Err(e) if e.is_not_found() => Err(PredicateError::retryable(e)),
            Err(e) => Err(PredicateError::fatal(e)),
        }
    })
    .await
}

/// Delete the trusted CA ConfigMap.
pub async fn delete_trusted_ca(store: &dyn StateStore) -> Result<()> {
    store.delete(&trusted_ca_key()).await?;
    info!(config_map = TRUSTED_CA_CONFIG_MAP, "deleted trusted CA ConfigMap");
    Ok(())
}

/// Strip the labels from the trusted CA ConfigMap, invalidating it.
pub async fn remove_injection_label(store: &dyn StateStore) -> Result<()> {
    let patch = JsonPatch::new(
        PatchOp::Remove,
        "/metadata/labels",
        Some(json!({ INJECTION_LABEL: "true" })),
    );
    store.patch(&trusted_ca_key(), &[patch]).await?;
    info!(config_map = TRUSTED_CA_CONFIG_MAP, "removed injection label");
    Ok(())
}

/// Create the user CA bundle ConfigMap holding `bundle_pem`.
pub async fn create_user_ca_bundle(store: &dyn StateStore, bundle_pem: &str) -> Result<Resource> {
    let cm = Resource::config_map(
        USER_CA_BUNDLE_NAMESPACE,
        USER_CA_BUNDLE_NAME,
        BTreeMap::new(),
        BTreeMap::from([(CA_BUNDLE_KEY.to_string(), bundle_pem.to_string())]),
    );
    let created = store.create(cm).await?;
    info!(config_map = USER_CA_BUNDLE_NAME, "created user CA bundle");
    Ok(created)
}

/// Point the cluster proxy at the user CA bundle.
pub async fn patch_proxy_trusted_ca(store: &dyn StateStore) -> Result<Resource> {
    let patch = JsonPatch::replace("/spec/trustedCA/name", json!(USER_CA_BUNDLE_NAME));
    Ok(store.patch(&cluster_proxy_key(), &[patch]).await?)
}

/// Create the user CA bundle and reference it from the cluster proxy.
pub async fn configure_user_ca_bundle(store: &dyn StateStore, bundle_pem: &str) -> Result<()> {
    create_user_ca_bundle(store, bundle_pem).await?;
    patch_proxy_trusted_ca(store).await?;
    Ok(())
}

/// Read the user-provided CA bundle.
pub async fn user_ca_bundle(store: &dyn StateStore) -> Result<String> {
    let cm = store.get(&user_ca_bundle_key()).await?;
    Ok(cm.data().remove(CA_BUNDLE_KEY).unwrap_or_default())
}

/// Remove `spec.httpProxy` and `spec.httpsProxy` from the cluster proxy.
pub async fn disable_cluster_proxy(store: &dyn StateStore) -> Result<Resource> {
    let patches = [
        JsonPatch::new(
            PatchOp::Remove,
            "/spec/httpProxy",
            Some(json!("httpProxy")),
        ),
        JsonPatch::new(
            PatchOp::Remove,
            "/spec/httpsProxy",
            Some(json!("httpsProxy")),
        ),
    ];
    let patched = store.patch(&cluster_proxy_key(), &patches).await?;
    info!("disabled cluster proxy");
    Ok(patched)
}
