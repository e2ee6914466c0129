//! Error types for node-exec

use thiserror::Error;

/// Result type for node-exec operations
pub type ExecResult<T> = std::result::Result<T, ExecError>;

/// Errors that can occur running commands on a node
#[derive(Error, Debug)]
pub enum ExecError {
    /// The remote command ran but exited unsuccessfully
    #[error("command on {address} exited with code {exit_code}: {stderr}")]
    CommandFailed {
        address: String,
        exit_code: i32,
        stderr: String,
    },

    /// The remote command did not finish in time
    #[error("command on {address} timed out after {secs} seconds")]
    Timeout { address: String, secs: u64 },

    /// Command output could not be interpreted
    #[error("unexpected command output: {0}")]
    InvalidOutput(String),

    /// Certificate generation or PEM handling failed
    #[error("certificate error: {0}")]
    Certificate(String),

    /// IO error (spawning the transport)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rcgen::Error> for ExecError {
    fn from(err: rcgen::Error) -> Self {
        ExecError::Certificate(err.to_string())
    }
}

impl From<pem::PemError> for ExecError {
    fn from(err: pem::PemError) -> Self {
        ExecError::Certificate(err.to_string())
    }
}
