//! Certificate import checks.
//!
//! Every certificate in the user CA bundle must end up exactly once in each
//! node's `LocalMachine\Root` store.

use serde::{Deserialize, Serialize};
use tracing::debug;

use node_exec::executor::RemoteExecutor;
use node_exec::powershell::cert_count_query;
use node_exec::{final_line, fingerprint, split_bundle, ExecError};

use crate::error::{ProbeError, Result};

/// Import status of one certificate on one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertCheck {
    /// Position in the bundle
    pub index: usize,
    /// SHA-256 of the DER contents
    pub fingerprint: String,
    /// Matching certificates found in the root store
    pub count: u32,
}

impl CertCheck {
    pub fn imported(&self) -> bool {
        self.count == 1
    }
}

/// Count each certificate of `bundle` in the node's root store.
///
/// A bundle without certificates, command failures and unparsable counts
/// are errors.
pub async fn verify_bundle_imported(
    executor: &dyn RemoteExecutor,
    address: &str,
    bundle: &str,
) -> Result<Vec<CertCheck>> {
    let certs = split_bundle(bundle)?;
    if certs.is_empty() {
        return Err(ProbeError::EmptyBundle);
    }

    let mut checks = Vec::new();
    for (index, cert) in certs.iter().enumerate() {
        let output = executor.run(address, &cert_count_query(cert)).await?;
        let line = final_line(&output);
        let count = line.parse::<u32>().map_err(|_| {
            ExecError::InvalidOutput(format!("expected a certificate count, got {line:?}"))
        })?;
        let check = CertCheck {
            index,
            fingerprint: fingerprint(cert)?,
            count,
        };
        debug!(address, index, count, "certificate lookup");
        checks.push(check);
    }
    Ok(checks)
}
