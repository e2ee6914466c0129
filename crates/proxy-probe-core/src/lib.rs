//! Proxy Probe Core Library
//!
//! Parses PowerShell `Format-List` environment listings captured from
//! Windows nodes and polls cluster state until it converges. Built on these,
//! the proxy, trusted CA, node readiness and certificate checks compare a
//! node's configuration against the cluster proxy.

pub mod certs;
pub mod envvars;
mod error;
pub mod nodes;
pub mod poll;
pub mod proxy;
pub mod settings;
pub mod telemetry;
pub mod trusted_ca;

pub use error::{ProbeError, Result};

pub use envvars::{parse, parse_output, render_listing, EnvVarMap, WATCHED_VARS};

pub use poll::{poll_until, ConvergenceOutcome, PollPolicy, PredicateError};

pub use settings::PollSettings;

pub use telemetry::init_tracing;

pub use certs::{verify_bundle_imported, CertCheck};
pub use nodes::{wait_for_node_ready, wait_for_nodes_ready};
pub use proxy::{verify_node, verify_nodes, EnvMismatch, NodeEnvReport, ProxyEnv};
