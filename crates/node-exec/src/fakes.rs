//! Scripted executor (testing only)
//!
//! `ScriptedExecutor` answers commands from a table of canned responses
//! instead of reaching a node. Responses are matched by address and a
//! substring of the command; the most recently scripted match wins, so a
//! test can change what a node reports while a poll is running.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{ExecError, ExecResult};
use crate::executor::RemoteExecutor;

#[derive(Debug, Clone)]
enum Reply {
    Output(String),
    Failure { exit_code: i32, stderr: String },
}

#[derive(Debug, Clone)]
struct Script {
    address: Option<String>,
    needle: String,
    reply: Reply,
}

/// A command issued against the fake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedCommand {
    pub address: String,
    pub command: String,
}

#[derive(Debug, Default)]
pub struct ScriptedExecutor {
    scripts: Mutex<Vec<Script>>,
    issued: Mutex<Vec<IssuedCommand>>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reply with `output` to commands containing `needle` on any node.
    pub fn respond(&self, needle: &str, output: &str) {
        self.push(None, needle, Reply::Output(output.to_string()));
    }

    /// Reply with `output` to commands containing `needle` on `address` only.
    pub fn respond_on(&self, address: &str, needle: &str, output: &str) {
        self.push(Some(address), needle, Reply::Output(output.to_string()));
    }

    /// Fail commands containing `needle` on `address` with a non-zero exit.
    pub fn fail_on(&self, address: &str, needle: &str, exit_code: i32, stderr: &str) {
        self.push(
            Some(address),
            needle,
            Reply::Failure {
                exit_code,
                stderr: stderr.to_string(),
            },
        );
    }

    /// Every command issued so far, in order.
    pub fn issued(&self) -> Vec<IssuedCommand> {
        self.issued.lock().unwrap().clone()
    }

    fn push(&self, address: Option<&str>, needle: &str, reply: Reply) {
        self.scripts.lock().unwrap().push(Script {
            address: address.map(str::to_string),
            needle: needle.to_string(),
            reply,
        });
    }
}

#[async_trait]
impl RemoteExecutor for ScriptedExecutor {
    async fn run(&self, address: &str, command: &str) -> ExecResult<String> {
        self.issued.lock().unwrap().push(IssuedCommand {
            address: address.to_string(),
            command: command.to_string(),
        });

        let scripts = self.scripts.lock().unwrap();
        let matched = scripts.iter().rev().find(|s| {
            s.address.as_deref().map_or(true, |a| a == address) && command.contains(&s.needle)
        });

        match matched.map(|s| s.reply.clone()) {
            Some(Reply::Output(out)) => Ok(out),
            Some(Reply::Failure { exit_code, stderr }) => Err(ExecError::CommandFailed {
                address: address.to_string(),
                exit_code,
                stderr,
            }),
            None => Err(ExecError::CommandFailed {
                address: address.to_string(),
                exit_code: 127,
                stderr: format!("no scripted response for: {command}"),
            }),
        }
    }
}
