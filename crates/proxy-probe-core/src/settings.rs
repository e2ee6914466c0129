//! Poll timing configuration.

use std::time::Duration;

use crate::error::Result;
use crate::poll::PollPolicy;

/// Default interval between convergence checks
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Default limit for a controller to repair a disturbed resource
pub const DEFAULT_RESOURCE_CHANGE_TIMEOUT: Duration = Duration::from_secs(180);

/// Default limit for a node to come back Ready after reconfiguration
pub const DEFAULT_NODE_READY_TIMEOUT: Duration = Duration::from_secs(600);

/// Poll timing used by the checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    pub resource_change_timeout: Duration,
    pub node_ready_timeout: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            resource_change_timeout: DEFAULT_RESOURCE_CHANGE_TIMEOUT,
            node_ready_timeout: DEFAULT_NODE_READY_TIMEOUT,
        }
    }
}

impl PollSettings {
    /// Read overrides from `PROXY_PROBE_POLL_INTERVAL_SECS`,
    /// `PROXY_PROBE_RESOURCE_TIMEOUT_SECS` and `PROXY_PROBE_NODE_TIMEOUT_SECS`.
    /// Missing or unparsable values keep the defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let secs = |key: &str, default: Duration| {
            lookup(key)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(default)
        };
        Self {
            interval: secs("PROXY_PROBE_POLL_INTERVAL_SECS", DEFAULT_POLL_INTERVAL),
            resource_change_timeout: secs(
                "PROXY_PROBE_RESOURCE_TIMEOUT_SECS",
                DEFAULT_RESOURCE_CHANGE_TIMEOUT,
            ),
            node_ready_timeout: secs("PROXY_PROBE_NODE_TIMEOUT_SECS", DEFAULT_NODE_READY_TIMEOUT),
        }
    }

    /// Policy for waiting on controller-managed resources.
    pub fn policy(&self) -> Result<PollPolicy> {
        PollPolicy::new(self.interval, self.resource_change_timeout)
    }

    /// Policy for waiting on node readiness.
    pub fn node_policy(&self) -> Result<PollPolicy> {
        PollPolicy::new(self.interval, self.node_ready_timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let s = PollSettings::default();
        assert_eq!(s.interval, Duration::from_secs(5));
        assert_eq!(s.resource_change_timeout, Duration::from_secs(180));
        assert_eq!(s.node_ready_timeout, Duration::from_secs(600));
    }

    #[test]
    fn test_overrides_and_fallbacks() {
        let env = HashMap::from([
            ("PROXY_PROBE_POLL_INTERVAL_SECS", "2"),
            ("PROXY_PROBE_RESOURCE_TIMEOUT_SECS", "not-a-number"),
        ]);
        let s = PollSettings::from_lookup(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(s.interval, Duration::from_secs(2));
        assert_eq!(s.resource_change_timeout, DEFAULT_RESOURCE_CHANGE_TIMEOUT);
        assert_eq!(s.node_ready_timeout, DEFAULT_NODE_READY_TIMEOUT);
    }

    #[test]
    fn test_zero_interval_override_rejected_by_policy() {
        let s = PollSettings {
            interval: Duration::ZERO,
            ..Default::default()
        };
        assert!(s.policy().is_err());
    }
}
