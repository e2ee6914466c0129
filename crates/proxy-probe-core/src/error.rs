//! Error types for proxy-probe-core

use std::time::Duration;

use thiserror::Error;

/// Result type for probe operations
pub type Result<T> = std::result::Result<T, ProbeError>;

/// Errors surfaced by the probes
#[derive(Error, Debug)]
pub enum ProbeError {
    /// Poll policy rejected at construction
    #[error("invalid poll policy: {0}")]
    InvalidPolicy(String),

    /// A resource did not converge before the deadline
    #[error("timed out after {elapsed:?} waiting for {resource}{}", last_error_suffix(.last_error))]
    Timeout {
        resource: String,
        elapsed: Duration,
        last_error: Option<String>,
    },

    /// The convergence check itself failed
    #[error("error waiting for {resource}: {source:#}")]
    Predicate {
        resource: String,
        source: anyhow::Error,
    },

    /// A CA bundle held no certificates to check
    #[error("no certificates in CA bundle")]
    EmptyBundle,

    /// State store call failed
    #[error("state store error: {0}")]
    Store(#[from] cluster_state::StoreError),

    /// Remote command failed
    #[error("remote command error: {0}")]
    Exec(#[from] node_exec::ExecError),
}

fn last_error_suffix(last_error: &Option<String>) -> String {
    last_error
        .as_deref()
        .map(|e| format!(" (last error: {e})"))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_message_with_last_error() {
        let err = ProbeError::Timeout {
            resource: "ConfigMap ns/trusted-ca".to_string(),
            elapsed: Duration::from_secs(180),
            last_error: Some("ConfigMap ns/trusted-ca not found".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "timed out after 180s waiting for ConfigMap ns/trusted-ca \
             (last error: ConfigMap ns/trusted-ca not found)"
        );
    }

    #[test]
    fn test_timeout_message_without_last_error() {
        let err = ProbeError::Timeout {
            resource: "node winworker-a".to_string(),
            elapsed: Duration::from_secs(5),
            last_error: None,
        };
        assert_eq!(err.to_string(), "timed out after 5s waiting for node winworker-a");
    }
}
