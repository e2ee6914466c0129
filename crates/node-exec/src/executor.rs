//! Remote command execution.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::{ExecError, ExecResult};
use crate::powershell::encode_command;

/// A channel that runs a command on a node and returns its captured output.
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    /// Run `command` on the node reachable at `address`.
    ///
    /// Returns captured stdout on success. Transport failures and non-zero
    /// exits are errors; they are never retried here.
    async fn run(&self, address: &str, command: &str) -> ExecResult<String>;
}

/// SSH connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SshConfig {
    /// Remote user
    pub user: String,
    /// Private key file (optional, falls back to the ssh agent)
    pub key_path: Option<PathBuf>,
    /// SSH port
    pub port: u16,
    /// Connection timeout passed to ssh
    pub connect_timeout_secs: u64,
    /// Overall limit for one command, 0 disables it
    pub command_timeout_secs: u64,
}

impl Default for SshConfig {
    fn default() -> Self {
        SshConfig {
            user: std::env::var("PROXY_PROBE_SSH_USER")
                .unwrap_or_else(|_| "Administrator".to_string()),
            key_path: std::env::var("PROXY_PROBE_SSH_KEY").ok().map(PathBuf::from),
            port: std::env::var("PROXY_PROBE_SSH_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(22),
            connect_timeout_secs: 10,
            command_timeout_secs: 300,
        }
    }
}

impl SshConfig {
    /// Create a config from environment variables
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Create config for a specific user and port
    pub fn new(user: &str, port: u16) -> Self {
        SshConfig {
            user: user.to_string(),
            key_path: None,
            port,
            connect_timeout_secs: 10,
            command_timeout_secs: 300,
        }
    }

    /// Set the private key file
    pub fn with_key(mut self, key_path: impl Into<PathBuf>) -> Self {
        self.key_path = Some(key_path.into());
        self
    }

    /// Arguments passed to `ssh` for one invocation.
    pub fn ssh_args(&self, address: &str, command: &str) -> Vec<String> {
        let mut args = vec![
            "-o".to_string(),
            "StrictHostKeyChecking=no".to_string(),
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", self.connect_timeout_secs),
            "-p".to_string(),
            self.port.to_string(),
        ];
        if let Some(key) = &self.key_path {
            args.push("-i".to_string());
            args.push(key.display().to_string());
        }
        args.push(format!("{}@{}", self.user, address));
        args.push(format!(
            "powershell.exe -NonInteractive -NoProfile -EncodedCommand {}",
            encode_command(command)
        ));
        args
    }
}

/// Runs PowerShell commands on Windows nodes over `ssh`.
pub struct SshExecutor {
    config: SshConfig,
}

impl SshExecutor {
    pub fn new(config: SshConfig) -> Self {
        SshExecutor { config }
    }

    /// Create executor from environment variables
    pub fn from_env() -> Self {
        Self::new(SshConfig::from_env())
    }

    pub fn config(&self) -> &SshConfig {
        &self.config
    }
}

#[async_trait]
impl RemoteExecutor for SshExecutor {
    async fn run(&self, address: &str, command: &str) -> ExecResult<String> {
        let start = Instant::now();

        let child = Command::new("ssh")
            .args(self.config.ssh_args(address, command))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let output = if self.config.command_timeout_secs > 0 {
            tokio::time::timeout(
                Duration::from_secs(self.config.command_timeout_secs),
                child.wait_with_output(),
            )
            .await
            .map_err(|_| ExecError::Timeout {
                address: address.to_string(),
                secs: self.config.command_timeout_secs,
            })??
        } else {
            child.wait_with_output().await?
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            warn!(address, duration_ms, "remote command failed");
            return Err(ExecError::CommandFailed {
                address: address.to_string(),
                exit_code: output.status.code().unwrap_or(-1),
                stderr,
            });
        }

        debug!(address, duration_ms, "remote command finished");
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}
