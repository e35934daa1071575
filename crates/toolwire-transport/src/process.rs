//! Child-process transport: spawn a server and talk over its stdio.

use crate::connection::Connection;
use crate::error::TransportError;
use std::collections::HashMap;
use std::process::Stdio;
use tokio::process::Command;

/// Spawns a subprocess and binds its stdin/stdout as the byte stream.
///
/// The connection lives for the lifetime of the subprocess. Closing it sends
/// EOF on the child's stdin and lets the child exit naturally; the child is
/// only killed if the caller asks for it explicitly.
#[derive(Debug, Clone)]
pub struct ProcessTransport {
    command: String,
    args: Vec<String>,
    env: HashMap<String, String>,
}

impl ProcessTransport {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            env: HashMap::new(),
        }
    }

    pub fn args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn envs(mut self, env: &HashMap<String, String>) -> Self {
        self.env
            .extend(env.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    /// Spawn the subprocess and produce a connection over its stdio.
    pub fn connect(&self) -> Result<Connection, TransportError> {
        let mut cmd = Command::new(&self.command);
        cmd.args(&self.args)
            .envs(&self.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());

        let mut child = cmd.spawn().map_err(|e| TransportError::Spawn {
            command: self.command.clone(),
            source: e,
        })?;

        let stdin = child.stdin.take().expect("stdin was piped");
        let stdout = child.stdout.take().expect("stdout was piped");

        tracing::debug!(command = %self.command, "spawned server process");
        Ok(Connection::with_child(
            Box::new(stdout),
            Box::new(stdin),
            Some(child),
        ))
    }
}
