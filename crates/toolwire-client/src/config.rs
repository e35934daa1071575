//! Endpoint configuration for client sessions.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use toolwire_transport::{Connection, ProcessTransport, TcpTransport, TransportError};

fn default_timeout() -> u64 {
    30000
}

/// Where a server lives: a command to spawn, or an address to dial.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Endpoint {
    Stdio {
        /// Command to run (e.g., "npx", "python").
        command: String,
        #[serde(default)]
        args: Vec<String>,
        /// Environment variables to set for the server process.
        #[serde(default)]
        env: HashMap<String, String>,
    },
    Tcp {
        /// Address to dial, `host:port`.
        addr: String,
    },
}

/// One configured server endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    #[serde(flatten)]
    pub endpoint: Endpoint,
    /// Timeout for requests in milliseconds (default: 30000).
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,
}

impl EndpointConfig {
    /// Open a connection to the configured endpoint.
    pub async fn connect(&self) -> Result<Connection, TransportError> {
        match &self.endpoint {
            Endpoint::Stdio { command, args, env } => ProcessTransport::new(command)
                .args(args.iter().cloned())
                .envs(env)
                .connect(),
            Endpoint::Tcp { addr } => TcpTransport::new(addr).dial().await,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}
