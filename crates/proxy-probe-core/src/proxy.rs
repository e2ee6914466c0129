//! Proxy environment verification
//!
//! The cluster proxy's resolved settings must show up on every Windows node
//! twice: as system-level environment variables, and in the environment of
//! each required service process. Both are read with PowerShell and decoded
//! with the listing parser.

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use cluster_state::{kinds, Resource, ResourceKey, StateStore};
use node_exec::executor::RemoteExecutor;
use node_exec::powershell::{job_name, service_env_vars_query, system_env_var_query};

use crate::envvars::{parse_output, EnvVarMap, WATCHED_VARS};
use crate::error::Result;
use crate::poll::{poll_until, ConvergenceOutcome, PollPolicy, PredicateError};

/// Name of the cluster-scoped proxy resource.
pub const CLUSTER_PROXY_NAME: &str = "cluster";

/// Services that must run with the cluster proxy settings.
pub const REQUIRED_SERVICES: [&str; 6] = [
    "windows_exporter",
    "kubelet",
    "hybrid-overlay-node",
    "kube-proxy",
    "containerd",
    "windows-instance-config-daemon",
];

/// Where a set of variables was read from.
pub const SYSTEM_SOURCE: &str = "system";

pub fn cluster_proxy_key() -> ResourceKey {
    ResourceKey::cluster(kinds::PROXY, CLUSTER_PROXY_NAME)
}

/// Expected proxy variables, as resolved in the cluster proxy's status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyEnv {
    pub http_proxy: String,
    pub https_proxy: String,
    pub no_proxy: String,
}

impl ProxyEnv {
    /// Read `status.httpProxy`, `status.httpsProxy` and `status.noProxy`.
    pub fn from_cluster_proxy(proxy: &Resource) -> Self {
        let status = |field: &str| {
            proxy
                .str_at(&format!("/status/{field}"))
                .unwrap_or_default()
                .to_string()
        };
        Self {
            http_proxy: status("httpProxy"),
            https_proxy: status("httpsProxy"),
            no_proxy: status("noProxy"),
        }
    }

    /// Fetch the cluster proxy and read its resolved settings.
    pub async fn fetch(store: &dyn StateStore) -> Result<Self> {
        let proxy = store.get(&cluster_proxy_key()).await?;
        Ok(Self::from_cluster_proxy(&proxy))
    }

    /// Whether a proxy is configured at all.
    pub fn is_enabled(&self) -> bool {
        !(self.http_proxy.is_empty() && self.https_proxy.is_empty() && self.no_proxy.is_empty())
    }

    /// Expected value for one of the watched variables.
    pub fn get(&self, variable: &str) -> Option<&str> {
        match variable {
            "HTTP_PROXY" => Some(&self.http_proxy),
            "HTTPS_PROXY" => Some(&self.https_proxy),
            "NO_PROXY" => Some(&self.no_proxy),
            _ => None,
        }
    }

    /// The watched variables and their expected values.
    pub fn expected(&self) -> EnvVarMap {
        WATCHED_VARS
            .iter()
            .filter_map(|var| self.get(var).map(|v| (var.to_string(), v.to_string())))
            .collect()
    }

    /// Compare `actual` against the expected values for `variables`.
    ///
    /// A variable missing from `actual` compares as the empty string.
    pub fn diff(&self, source: &str, variables: &[&str], actual: &EnvVarMap) -> Vec<EnvMismatch> {
        variables
            .iter()
            .filter_map(|var| {
                let expected = self.get(var)?;
                let found = actual.get(*var);
                if found.map(String::as_str).unwrap_or_default() == expected {
                    return None;
                }
                Some(EnvMismatch {
                    source: source.to_string(),
                    variable: var.to_string(),
                    expected: expected.to_string(),
                    actual: found.cloned(),
                })
            })
            .collect()
    }
}

/// A watched variable whose value differs from the cluster proxy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvMismatch {
    /// `system` or the service name
    pub source: String,
    pub variable: String,
    pub expected: String,
    pub actual: Option<String>,
}

impl std::fmt::Display for EnvMismatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "incorrect value for {} ({}): expected {:?}, found {:?}",
            self.variable,
            self.source,
            self.expected,
            self.actual.as_deref().unwrap_or_default()
        )
    }
}

/// A source that could not be read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFailure {
    pub source: String,
    pub error: String,
}

/// Result of verifying one node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeEnvReport {
    pub address: String,
    pub mismatches: Vec<EnvMismatch>,
    pub failures: Vec<SourceFailure>,
}

impl NodeEnvReport {
    pub fn is_clean(&self) -> bool {
        self.mismatches.is_empty() && self.failures.is_empty()
    }
}

/// Read one system-level variable from a node.
pub async fn read_system_env_var(
    executor: &dyn RemoteExecutor,
    address: &str,
    variable: &str,
) -> Result<EnvVarMap> {
    debug!(job = %job_name(variable), address, "reading system environment variable");
    let output = executor
        .run(address, &system_env_var_query(variable))
        .await?;
    Ok(parse_output(&output))
}

/// Read the environment a service process on a node was started with.
pub async fn read_service_env_vars(
    executor: &dyn RemoteExecutor,
    address: &str,
    service: &str,
) -> Result<EnvVarMap> {
    debug!(job = %job_name(service), address, "reading service environment");
    let output = executor
        .run(address, &service_env_vars_query(service))
        .await?;
    Ok(parse_output(&output))
}

/// Check system-level variables and every listed service on one node.
pub async fn verify_node(
    executor: &dyn RemoteExecutor,
    address: &str,
    expected: &ProxyEnv,
    services: &[&str],
) -> NodeEnvReport {
    let mut report = NodeEnvReport {
        address: address.to_string(),
        ..Default::default()
    };

    for var in WATCHED_VARS {
        match read_system_env_var(executor, address, var).await {
            Ok(actual) => report
                .mismatches
                .extend(expected.diff(SYSTEM_SOURCE, &[var], &actual)),
            Err(e) => report.failures.push(SourceFailure {
                source: format!("{SYSTEM_SOURCE}:{var}"),
                error: e.to_string(),
            }),
        }
    }

    for service in services {
        match read_service_env_vars(executor, address, service).await {
            Ok(actual) => report
                .mismatches
                .extend(expected.diff(service, &WATCHED_VARS, &actual)),
            Err(e) => report.failures.push(SourceFailure {
                source: service.to_string(),
                error: e.to_string(),
            }),
        }
    }

    if report.is_clean() {
        info!(address, "proxy environment matches cluster proxy");
    } else {
        warn!(
            address,
            mismatches = report.mismatches.len(),
            failures = report.failures.len(),
            "proxy environment differs from cluster proxy"
        );
    }
    report
}

/// Verify several nodes concurrently. Reports are returned in input order.
pub async fn verify_nodes(
    executor: &dyn RemoteExecutor,
    addresses: &[String],
    expected: &ProxyEnv,
    services: &[&str],
) -> Vec<NodeEnvReport> {
    join_all(
        addresses
            .iter()
            .map(|address| verify_node(executor, address, expected, services)),
    )
    .await
}

/// Whether none of the watched variables is set at system level.
pub async fn env_vars_removed(executor: &dyn RemoteExecutor, address: &str) -> Result<bool> {
    for var in WATCHED_VARS {
        let actual = read_system_env_var(executor, address, var).await?;
        if actual.get(var).is_some_and(|v| !v.is_empty()) {
            debug!(address, variable = var, "proxy variable still set");
            return Ok(false);
        }
    }
    Ok(true)
}

/// Wait until the system-level variables on a node match `expected`.
///
/// Command failures abort the wait; a mismatch keeps polling.
pub async fn wait_for_system_env(
    executor: &dyn RemoteExecutor,
    address: &str,
    expected: &ProxyEnv,
    policy: &PollPolicy,
) -> ConvergenceOutcome {
    poll_until(policy, true, move || async move {
        for var in WATCHED_VARS {
            let actual = match read_system_env_var(executor, address, var).await {
                Ok(actual) => actual,
                Err(e) => return Err(PredicateError::fatal(e)),
            };
            if !expected.diff(SYSTEM_SOURCE, &[var], &actual).is_empty() {
                return Ok(false);
            }
        }
        Ok(true)
    })
    .await
}
