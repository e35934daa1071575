//! TCP transport: dial an address, or wrap an accepted socket.

use crate::connection::Connection;
use crate::error::TransportError;
use tokio::net::TcpStream;

/// Dials a remote address in the client role.
///
/// There is no reconnect logic: a dial failure surfaces immediately.
#[derive(Debug, Clone)]
pub struct TcpTransport {
    addr: String,
}

impl TcpTransport {
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }

    pub async fn dial(&self) -> Result<Connection, TransportError> {
        let stream = TcpStream::connect(&self.addr)
            .await
            .map_err(|e| TransportError::Connect {
                addr: self.addr.clone(),
                source: e,
            })?;
        tracing::debug!(addr = %self.addr, "dialed server");
        Ok(accepted(stream))
    }
}

/// Wrap an already-established socket (the server role uses this for each
/// accepted connection).
pub fn accepted(stream: TcpStream) -> Connection {
    let (read, write) = stream.into_split();
    Connection::new(read, write)
}
