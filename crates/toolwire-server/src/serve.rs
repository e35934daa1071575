//! Serve loops: one connection over stdio, or many over TCP.

use crate::dispatch::Dispatcher;
use crate::error::ServeError;
use crate::registry::Registry;
use std::sync::Arc;
use tokio::net::TcpListener;
use toolwire_protocol::{CallConvention, Implementation, Message};
use toolwire_transport::{Connection, tcp};

/// A server: an identity, a registry, and a call convention.
///
/// Construction finishes registration; serving never mutates the registry.
#[derive(Clone)]
pub struct Server {
    registry: Arc<Registry>,
    info: Implementation,
    convention: CallConvention,
}

impl Server {
    pub fn new(info: Implementation, registry: Registry) -> Self {
        Self {
            registry: Arc::new(registry),
            info,
            convention: CallConvention::default(),
        }
    }

    pub fn with_convention(mut self, convention: CallConvention) -> Self {
        self.convention = convention;
        self
    }

    fn dispatcher(&self) -> Dispatcher {
        Dispatcher::new(
            Arc::clone(&self.registry),
            self.info.clone(),
            self.convention,
        )
    }

    /// Serve one connection to completion.
    ///
    /// Requests are read, dispatched, and answered strictly in order: one
    /// in-flight request is fully handled before the next is read, so
    /// responses on a connection are FIFO. Ends on end-of-stream; a
    /// transport or framing error closes the connection and surfaces.
    pub async fn serve_connection(&self, conn: Connection) -> Result<(), ServeError> {
        let dispatcher = self.dispatcher();
        loop {
            let msg = match conn.recv().await {
                Ok(Some(msg)) => msg,
                Ok(None) => break,
                Err(e) => {
                    conn.close().await;
                    return Err(e.into());
                }
            };
            if let Some(response) = dispatcher.dispatch(msg).await {
                if let Err(e) = conn.send(&Message::Response(response)).await {
                    conn.close().await;
                    return Err(e.into());
                }
            }
        }
        conn.close().await;
        Ok(())
    }

    /// Serve exactly one connection over this process's own stdin/stdout.
    pub async fn serve_stdio(&self) -> Result<(), ServeError> {
        tracing::info!(server = %self.info.name, "serving on stdio");
        let conn = Connection::new(tokio::io::stdin(), tokio::io::stdout());
        self.serve_connection(conn).await
    }

    /// Bind `addr` and serve connections until an accept error.
    pub async fn serve_tcp(&self, addr: &str) -> Result<(), ServeError> {
        let listener = TcpListener::bind(addr).await.map_err(|e| ServeError::Bind {
            addr: addr.to_string(),
            source: e,
        })?;
        tracing::info!(server = %self.info.name, addr, "listening");
        self.serve_listener(listener).await
    }

    /// Serve connections from an already-bound listener.
    ///
    /// Each accepted connection runs in its own task; one connection's
    /// failure never disturbs the others.
    pub async fn serve_listener(&self, listener: TcpListener) -> Result<(), ServeError> {
        loop {
            let (stream, peer) = listener.accept().await.map_err(ServeError::Accept)?;
            tracing::info!(%peer, "accepted connection");
            let server = self.clone();
            tokio::spawn(async move {
                match server.serve_connection(tcp::accepted(stream)).await {
                    Ok(()) => tracing::info!(%peer, "connection closed"),
                    Err(e) => tracing::warn!(%peer, "connection ended with error: {e}"),
                }
            });
        }
    }
}
