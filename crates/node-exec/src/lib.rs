//! Node-Exec: command execution on managed nodes
//!
//! Provides the remote command channel used by the proxy probes: an
//! executor trait with an SSH implementation, builders for the PowerShell
//! queries the probes issue, and generation of throwaway certificates used
//! to exercise trusted bundle propagation.

pub mod cert;
mod error;
pub mod executor;
pub mod fakes;
pub mod powershell;

pub use cert::{fingerprint, generate_certificate, split_bundle};
pub use error::{ExecError, ExecResult};
pub use executor::{RemoteExecutor, SshConfig, SshExecutor};
pub use powershell::final_line;
