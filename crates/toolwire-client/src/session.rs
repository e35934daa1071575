//! The client session: handshake, call correlation, lifecycle.

use crate::config::EndpointConfig;
use crate::error::SessionError;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;
use toolwire_protocol::{
    CallConvention, CallToolParams, CallToolResult, Implementation, InitializeParams,
    InitializeResult, Message, Notification, PROTOCOL_VERSION, ReadResourceResult, Request,
    RequestId, Response, ResourceContents, ResourceInfo, ResourcesListResult, ToolInfo,
    ToolsListResult, methods,
};
use toolwire_transport::{Connection, TransportError};

const DEFAULT_TIMEOUT: Duration = Duration::from_millis(30000);

/// Tunables for a session.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Per-call timeout. Expiry abandons the pending slot; it does not
    /// retract the in-flight request.
    pub timeout: Duration,
    /// Wire shape used for `call_tool`.
    pub convention: CallConvention,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            convention: CallConvention::default(),
        }
    }
}

type Pending = Mutex<HashMap<RequestId, oneshot::Sender<Response>>>;

/// State shared between the reader task and calling tasks. The pending-call
/// map is the only mutable state crossing that boundary.
struct Shared {
    conn: Connection,
    pending: Pending,
    next_id: AtomicI64,
}

impl Shared {
    /// Send a request and wait for its response, correlated by id.
    async fn request(
        &self,
        method: &str,
        params: Option<Value>,
        timeout: Duration,
    ) -> Result<Response, SessionError> {
        let id = RequestId::Number(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = oneshot::channel();
        {
            self.pending.lock().await.insert(id.clone(), tx);
        }

        let request = Message::Request(Request {
            id: id.clone(),
            method: method.to_string(),
            params,
        });
        if let Err(e) = self.conn.send(&request).await {
            self.pending.lock().await.remove(&id);
            return Err(match e {
                TransportError::Closed => SessionError::ConnectionClosed,
                other => other.into(),
            });
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(response)) => Ok(response),
            // Sender dropped: the reader failed all pending calls.
            Ok(Err(_)) => Err(SessionError::ConnectionClosed),
            Err(_) => {
                // Abandon the slot; a late response will find no entry and
                // be dropped by the reader.
                self.pending.lock().await.remove(&id);
                Err(SessionError::Timeout {
                    method: method.to_string(),
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
        }
    }

    async fn notify(&self, method: &str, params: Option<Value>) -> Result<(), SessionError> {
        self.conn
            .send(&Message::Notification(Notification::new(method, params)))
            .await?;
        Ok(())
    }

    /// Drop every pending sender; each waiting caller observes a closed
    /// channel and fails with a connection error.
    async fn fail_pending(&self) {
        self.pending.lock().await.clear();
    }
}

/// Routes inbound messages until end-of-stream or a fatal error, then fails
/// whatever is still pending. Exactly one of these runs per session.
async fn read_loop(shared: Arc<Shared>) {
    loop {
        match shared.conn.recv().await {
            Ok(Some(Message::Response(response))) => {
                let mut pending = shared.pending.lock().await;
                match pending.remove(&response.id) {
                    Some(tx) => {
                        let _ = tx.send(response);
                    }
                    None => {
                        tracing::warn!(id = %response.id, "dropping response with no pending call");
                    }
                }
            }
            Ok(Some(Message::Request(req))) => {
                tracing::warn!(method = %req.method, "ignoring server-initiated request");
            }
            Ok(Some(Message::Notification(n))) => {
                tracing::debug!(method = %n.method, "ignoring server notification");
            }
            Ok(None) => break,
            Err(e) => {
                tracing::warn!("session reader stopping: {e}");
                break;
            }
        }
    }
    shared.conn.close().await;
    shared.fail_pending().await;
}

/// A client session over one connection.
///
/// Created by a successful initialize handshake; destroyed by [`close`]
/// (`Session::close`) or by connection failure, at which point every pending
/// call fails with a connection error.
pub struct Session {
    shared: Arc<Shared>,
    server: InitializeResult,
    reader: JoinHandle<()>,
    options: SessionOptions,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("server", &self.server)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Perform the initialize handshake over `conn` with default options.
    pub async fn connect(conn: Connection, client: Implementation) -> Result<Self, SessionError> {
        Self::connect_with(conn, client, SessionOptions::default()).await
    }

    /// Perform the initialize handshake over `conn`.
    ///
    /// On any failure the connection is closed and the error surfaces; a
    /// session is never half-initialized and connect is never retried
    /// automatically.
    pub async fn connect_with(
        conn: Connection,
        client: Implementation,
        options: SessionOptions,
    ) -> Result<Self, SessionError> {
        let shared = Arc::new(Shared {
            conn,
            pending: Mutex::new(HashMap::new()),
            next_id: AtomicI64::new(1),
        });
        let reader = tokio::spawn(read_loop(Arc::clone(&shared)));

        match Self::handshake(&shared, client, options.timeout).await {
            Ok(server) => {
                tracing::info!(
                    server = %server.server_info.name,
                    version = %server.server_info.version,
                    "session ready"
                );
                Ok(Self {
                    shared,
                    server,
                    reader,
                    options,
                })
            }
            Err(e) => {
                shared.conn.close().await;
                shared.fail_pending().await;
                reader.abort();
                Err(e)
            }
        }
    }

    /// Spawn or dial per `config` and connect a session over the result.
    pub async fn open(
        config: &EndpointConfig,
        client: Implementation,
    ) -> Result<Self, SessionError> {
        let conn = config.connect().await?;
        let options = SessionOptions {
            timeout: config.timeout(),
            ..SessionOptions::default()
        };
        Self::connect_with(conn, client, options).await
    }

    async fn handshake(
        shared: &Shared,
        client: Implementation,
        timeout: Duration,
    ) -> Result<InitializeResult, SessionError> {
        let params = serde_json::to_value(InitializeParams {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: serde_json::json!({}),
            client_info: client,
        })?;

        let response = shared
            .request(methods::INITIALIZE, Some(params), timeout)
            .await?;
        let result = expect_result(methods::INITIALIZE, response)?;
        let server: InitializeResult = serde_json::from_value(result).map_err(|e| {
            SessionError::Protocol(format!("failed to parse initialize result: {e}"))
        })?;

        shared.notify(methods::INITIALIZED, None).await?;
        Ok(server)
    }

    /// Identity the server reported during the handshake.
    pub fn server_info(&self) -> &Implementation {
        &self.server.server_info
    }

    pub fn server_capabilities(&self) -> &Value {
        &self.server.capabilities
    }

    /// Discover the server's tools.
    pub async fn list_tools(&self) -> Result<Vec<ToolInfo>, SessionError> {
        let result = self.call_rpc(methods::TOOLS_LIST, None).await?;
        let list: ToolsListResult = serde_json::from_value(result).map_err(|e| {
            SessionError::Protocol(format!("failed to parse tools/list result: {e}"))
        })?;
        Ok(list.tools)
    }

    /// Invoke a tool by name.
    ///
    /// A JSON-RPC error in the response becomes [`SessionError::Rpc`]; a
    /// domain failure arrives as `Ok` with `is_error` set and must be
    /// checked separately.
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Value,
    ) -> Result<CallToolResult, SessionError> {
        let (method, params) = match self.options.convention {
            CallConvention::ToolsCall => (
                methods::TOOLS_CALL,
                serde_json::to_value(CallToolParams {
                    name: name.to_string(),
                    arguments,
                })?,
            ),
            CallConvention::MethodPerTool => (name, arguments),
        };
        let result = self.call_rpc(method, Some(params)).await?;
        serde_json::from_value(result).map_err(|e| {
            SessionError::Protocol(format!("failed to parse tool call result: {e}"))
        })
    }

    /// Discover the server's resources.
    pub async fn list_resources(&self) -> Result<Vec<ResourceInfo>, SessionError> {
        let result = self.call_rpc(methods::RESOURCES_LIST, None).await?;
        let list: ResourcesListResult = serde_json::from_value(result).map_err(|e| {
            SessionError::Protocol(format!("failed to parse resources/list result: {e}"))
        })?;
        Ok(list.resources)
    }

    /// Read one resource by uri.
    pub async fn read_resource(&self, uri: &str) -> Result<Vec<ResourceContents>, SessionError> {
        let params = serde_json::json!({"uri": uri});
        let result = self.call_rpc(methods::RESOURCES_READ, Some(params)).await?;
        let read: ReadResourceResult = serde_json::from_value(result).map_err(|e| {
            SessionError::Protocol(format!("failed to parse resources/read result: {e}"))
        })?;
        Ok(read.contents)
    }

    async fn call_rpc(&self, method: &str, params: Option<Value>) -> Result<Value, SessionError> {
        let response = self
            .shared
            .request(method, params, self.options.timeout)
            .await?;
        expect_result(method, response)
    }

    /// Close the session: close the connection, fail all pending calls.
    /// Safe to call more than once; later calls are no-ops.
    pub async fn close(&self) {
        self.shared.conn.close().await;
        self.shared.fail_pending().await;
    }

    pub fn is_closed(&self) -> bool {
        self.shared.conn.is_closed()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

fn expect_result(method: &str, response: Response) -> Result<Value, SessionError> {
    if let Some(error) = response.error {
        return Err(SessionError::Rpc {
            code: error.code,
            message: error.message,
        });
    }
    response.result.ok_or_else(|| {
        SessionError::Protocol(format!("{method} response has neither result nor error"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use toolwire_protocol::RpcError;

    fn conn_pair() -> (Connection, Connection) {
        let (a, b) = tokio::io::duplex(64 * 1024);
        let (ar, aw) = tokio::io::split(a);
        let (br, bw) = tokio::io::split(b);
        (Connection::new(ar, aw), Connection::new(br, bw))
    }

    fn init_result() -> Value {
        json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {"tools": {}},
            "serverInfo": {"name": "fake", "version": "v0"}
        })
    }

    /// Answer the initialize request and swallow the initialized
    /// notification, leaving the peer Ready.
    async fn fake_handshake(conn: &Connection) {
        let Message::Request(req) = conn.recv().await.unwrap().unwrap() else {
            panic!("expected initialize request");
        };
        assert_eq!(req.method, "initialize");
        conn.send(&Message::Response(Response::success(req.id, init_result())))
            .await
            .unwrap();
        let Message::Notification(n) = conn.recv().await.unwrap().unwrap() else {
            panic!("expected initialized notification");
        };
        assert_eq!(n.method, "notifications/initialized");
    }

    fn client_info() -> Implementation {
        Implementation::new("test-client", "v0")
    }

    #[tokio::test]
    async fn connect_records_server_identity() {
        let (client_conn, peer) = conn_pair();
        let fake = tokio::spawn(async move {
            fake_handshake(&peer).await;
            peer
        });
        let session = Session::connect(client_conn, client_info()).await.unwrap();
        assert_eq!(session.server_info().name, "fake");
        assert_eq!(session.server_capabilities()["tools"], json!({}));
        session.close().await;
        fake.await.unwrap();
    }

    #[tokio::test]
    async fn connect_fails_on_error_response() {
        let (client_conn, peer) = conn_pair();
        tokio::spawn(async move {
            let Message::Request(req) = peer.recv().await.unwrap().unwrap() else {
                panic!("expected request");
            };
            peer.send(&Message::Response(Response::failure(
                req.id,
                RpcError::new(-32600, "go away"),
            )))
            .await
            .unwrap();
        });
        let err = Session::connect(client_conn, client_info())
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Rpc { code: -32600, .. }));
    }

    #[tokio::test]
    async fn out_of_order_responses_reach_their_own_callers() {
        let (client_conn, peer) = conn_pair();
        let fake = tokio::spawn(async move {
            fake_handshake(&peer).await;
            // Collect two call requests, then answer them in reverse order,
            // echoing each call's tool name as its result text.
            let mut reqs = Vec::new();
            for _ in 0..2 {
                let Message::Request(req) = peer.recv().await.unwrap().unwrap() else {
                    panic!("expected request");
                };
                reqs.push(req);
            }
            for req in reqs.into_iter().rev() {
                let name = req.params.unwrap()["name"].as_str().unwrap().to_string();
                let result = serde_json::to_value(CallToolResult::text(name)).unwrap();
                peer.send(&Message::Response(Response::success(req.id, result)))
                    .await
                    .unwrap();
            }
            peer
        });

        let session = Arc::new(Session::connect(client_conn, client_info()).await.unwrap());
        let (first, second) = tokio::join!(
            session.call_tool("alpha", json!({})),
            session.call_tool("beta", json!({})),
        );
        assert_eq!(first.unwrap().text_content(), "alpha");
        assert_eq!(second.unwrap().text_content(), "beta");
        session.close().await;
        fake.await.unwrap();
    }

    #[tokio::test]
    async fn close_fails_all_pending_calls() {
        let (client_conn, peer) = conn_pair();
        let fake = tokio::spawn(async move {
            fake_handshake(&peer).await;
            // Read requests but never answer them.
            while let Ok(Some(_)) = peer.recv().await {}
        });

        let session = Arc::new(Session::connect(client_conn, client_info()).await.unwrap());
        let mut callers = Vec::new();
        for i in 0..3 {
            let session = Arc::clone(&session);
            callers.push(tokio::spawn(async move {
                session.call_tool(&format!("tool{i}"), json!({})).await
            }));
        }
        // Let the calls get registered before closing.
        tokio::time::sleep(Duration::from_millis(50)).await;
        session.close().await;

        for caller in callers {
            let result = caller.await.unwrap();
            assert!(
                matches!(result, Err(SessionError::ConnectionClosed)),
                "expected ConnectionClosed, got {result:?}"
            );
        }
        session.close().await; // second close is a no-op
        fake.await.unwrap();
    }

    #[tokio::test]
    async fn peer_disconnect_fails_pending_calls() {
        let (client_conn, peer) = conn_pair();
        let fake = tokio::spawn(async move {
            fake_handshake(&peer).await;
            let _ = peer.recv().await; // swallow the call request
            peer.close().await;
        });

        let session = Session::connect(client_conn, client_info()).await.unwrap();
        let result = session.call_tool("whatever", json!({})).await;
        assert!(matches!(result, Err(SessionError::ConnectionClosed)));
        fake.await.unwrap();
    }

    #[tokio::test]
    async fn timeout_abandons_the_slot_and_late_response_is_dropped() {
        let (client_conn, peer) = conn_pair();
        let fake = tokio::spawn(async move {
            fake_handshake(&peer).await;
            // Sit on the first call past the client's timeout, then answer
            // it anyway; answer the second call promptly.
            let Message::Request(slow) = peer.recv().await.unwrap().unwrap() else {
                panic!("expected request");
            };
            tokio::time::sleep(Duration::from_millis(200)).await;
            let late = serde_json::to_value(CallToolResult::text("late")).unwrap();
            peer.send(&Message::Response(Response::success(slow.id, late)))
                .await
                .unwrap();

            let Message::Request(req) = peer.recv().await.unwrap().unwrap() else {
                panic!("expected request");
            };
            let result = serde_json::to_value(CallToolResult::text("prompt")).unwrap();
            peer.send(&Message::Response(Response::success(req.id, result)))
                .await
                .unwrap();
            peer
        });

        let options = SessionOptions {
            timeout: Duration::from_millis(100),
            ..SessionOptions::default()
        };
        let session = Session::connect_with(client_conn, client_info(), options)
            .await
            .unwrap();

        let result = session.call_tool("slow", json!({})).await;
        assert!(matches!(result, Err(SessionError::Timeout { .. })));

        // The session survives the abandoned call and the stray response.
        let result = session.call_tool("quick", json!({})).await.unwrap();
        assert_eq!(result.text_content(), "prompt");
        session.close().await;
        fake.await.unwrap();
    }

    #[tokio::test]
    async fn rpc_error_response_is_typed_and_non_fatal() {
        let (client_conn, peer) = conn_pair();
        let fake = tokio::spawn(async move {
            fake_handshake(&peer).await;
            let Message::Request(req) = peer.recv().await.unwrap().unwrap() else {
                panic!("expected request");
            };
            peer.send(&Message::Response(Response::failure(
                req.id,
                RpcError::new(-32601, "unknown tool 'sub'"),
            )))
            .await
            .unwrap();
            peer
        });

        let session = Session::connect(client_conn, client_info()).await.unwrap();
        let err = session.call_tool("sub", json!({})).await.unwrap_err();
        match err {
            SessionError::Rpc { code, message } => {
                assert_eq!(code, -32601);
                assert!(message.contains("sub"));
            }
            other => panic!("expected Rpc error, got {other:?}"),
        }
        assert!(!session.is_closed());
        session.close().await;
        fake.await.unwrap();
    }

    #[tokio::test]
    async fn method_per_tool_convention_sends_tool_as_method() {
        let (client_conn, peer) = conn_pair();
        let fake = tokio::spawn(async move {
            fake_handshake(&peer).await;
            let Message::Request(req) = peer.recv().await.unwrap().unwrap() else {
                panic!("expected request");
            };
            assert_eq!(req.method, "orderStatus");
            assert_eq!(req.params.unwrap()["idOrder"], "42");
            let result = serde_json::to_value(CallToolResult::text("new-42")).unwrap();
            peer.send(&Message::Response(Response::success(req.id, result)))
                .await
                .unwrap();
            peer
        });

        let options = SessionOptions {
            convention: CallConvention::MethodPerTool,
            ..SessionOptions::default()
        };
        let session = Session::connect_with(client_conn, client_info(), options)
            .await
            .unwrap();
        let result = session
            .call_tool("orderStatus", json!({"idOrder": "42"}))
            .await
            .unwrap();
        assert_eq!(result.text_content(), "new-42");
        session.close().await;
        fake.await.unwrap();
    }
}
