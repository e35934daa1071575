//! End-to-end tests: a real session against a real server.

use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::net::TcpListener;
use toolwire_client::{Session, SessionError};
use toolwire_protocol::{CallToolResult, Implementation};
use toolwire_server::{Registry, Server, ToolError};
use toolwire_transport::{Connection, TcpTransport};

fn math_server() -> (Server, Arc<AtomicUsize>) {
    let invocations = Arc::new(AtomicUsize::new(0));
    let mut registry = Registry::new();

    let counter = Arc::clone(&invocations);
    registry.register_fn(
        "add",
        "Add two numbers",
        json!({
            "type": "object",
            "properties": {"x": {"type": "number"}, "y": {"type": "number"}},
            "required": ["x", "y"]
        }),
        move |args: Value| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                let x = args["x"].as_f64().unwrap_or(0.0);
                let y = args["y"].as_f64().unwrap_or(0.0);
                Ok(CallToolResult::text(format!("{}", x + y)))
            }
        },
    );

    registry.register_fn(
        "divide",
        "Divide x by y",
        json!({
            "type": "object",
            "properties": {"x": {"type": "number"}, "y": {"type": "number"}},
            "required": ["x", "y"]
        }),
        |args: Value| async move {
            let x = args["x"].as_f64().unwrap_or(0.0);
            let y = args["y"].as_f64().unwrap_or(0.0);
            if y == 0.0 {
                return Err(ToolError::failed("division by zero"));
            }
            Ok(CallToolResult::text(format!("{}", x / y)))
        },
    );

    registry.register_resource(
        toolwire_protocol::ResourceInfo {
            uri: "math://readme".into(),
            name: "readme".into(),
            description: "About this server".into(),
            mime_type: Some("text/plain".into()),
        },
        || Ok("a small math server".to_string()),
    );

    (
        Server::new(Implementation::new("math", "v1.0.0"), registry),
        invocations,
    )
}

fn client_info() -> Implementation {
    Implementation::new("integration-test", "v0")
}

async fn session_over_duplex(server: Server) -> Session {
    let (a, b) = tokio::io::duplex(64 * 1024);
    let (ar, aw) = tokio::io::split(a);
    let (br, bw) = tokio::io::split(b);
    tokio::spawn(async move {
        let _ = server.serve_connection(Connection::new(br, bw)).await;
    });
    Session::connect(Connection::new(ar, aw), client_info())
        .await
        .expect("handshake should succeed")
}

#[tokio::test]
async fn handshake_reports_server_identity() {
    let (server, _) = math_server();
    let session = session_over_duplex(server).await;
    assert_eq!(session.server_info().name, "math");
    assert_eq!(session.server_info().version, "v1.0.0");
    session.close().await;
}

#[tokio::test]
async fn list_tools_returns_each_tool_exactly_once() {
    let (server, _) = math_server();
    let session = session_over_duplex(server).await;

    let first: Vec<_> = session
        .list_tools()
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.name)
        .collect();
    assert_eq!(first, ["add", "divide"]);

    // Order is stable across calls.
    let second: Vec<_> = session
        .list_tools()
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.name)
        .collect();
    assert_eq!(first, second);
    session.close().await;
}

#[tokio::test]
async fn add_two_and_three_is_five() {
    let (server, _) = math_server();
    let session = session_over_duplex(server).await;
    let result = session.call_tool("add", json!({"x": 2, "y": 3})).await.unwrap();
    assert!(!result.is_error);
    assert_eq!(result.text_content(), "5");
    session.close().await;
}

#[tokio::test]
async fn mistyped_argument_is_invalid_params_and_handler_never_runs() {
    let (server, invocations) = math_server();
    let session = session_over_duplex(server).await;
    let err = session
        .call_tool("add", json!({"x": "a", "y": 1}))
        .await
        .unwrap_err();
    match err {
        SessionError::Rpc { code, message } => {
            assert_eq!(code, -32602);
            assert!(message.contains("'x'"));
        }
        other => panic!("expected Rpc error, got {other:?}"),
    }
    assert_eq!(invocations.load(Ordering::SeqCst), 0);
    session.close().await;
}

#[tokio::test]
async fn unregistered_tool_is_method_not_found() {
    let (server, _) = math_server();
    let session = session_over_duplex(server).await;
    let err = session.call_tool("sub", json!({})).await.unwrap_err();
    assert!(matches!(err, SessionError::Rpc { code: -32601, .. }));

    // The registry is unchanged: "add" still lists and still works.
    let names: Vec<_> = session
        .list_tools()
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.name)
        .collect();
    assert_eq!(names, ["add", "divide"]);
    session.close().await;
}

#[tokio::test]
async fn division_by_zero_is_a_domain_error() {
    let (server, _) = math_server();
    let session = session_over_duplex(server).await;
    let result = session
        .call_tool("divide", json!({"x": 1, "y": 0}))
        .await
        .unwrap();
    assert!(result.is_error);
    assert_eq!(result.text_content(), "division by zero");
    session.close().await;
}

#[tokio::test]
async fn resources_list_and_read() {
    let (server, _) = math_server();
    let session = session_over_duplex(server).await;

    let resources = session.list_resources().await.unwrap();
    assert_eq!(resources.len(), 1);
    assert_eq!(resources[0].uri, "math://readme");

    let contents = session.read_resource("math://readme").await.unwrap();
    assert_eq!(contents[0].text, "a small math server");
    session.close().await;
}

#[tokio::test]
async fn concurrent_callers_each_get_their_own_answer() {
    let (server, _) = math_server();
    let session = Arc::new(session_over_duplex(server).await);

    let mut callers = Vec::new();
    for i in 0..8i64 {
        let session = Arc::clone(&session);
        callers.push(tokio::spawn(async move {
            let result = session
                .call_tool("add", json!({"x": i, "y": i}))
                .await
                .unwrap();
            (i, result.text_content())
        }));
    }
    for caller in callers {
        let (i, text) = caller.await.unwrap();
        assert_eq!(text, format!("{}", i * 2));
    }
    session.close().await;
}

#[tokio::test]
async fn full_stack_over_tcp() {
    let (server, _) = math_server();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { server.serve_listener(listener).await });

    let conn = TcpTransport::new(addr.to_string()).dial().await.unwrap();
    let session = Session::connect(conn, client_info()).await.unwrap();

    let tools = session.list_tools().await.unwrap();
    assert_eq!(tools.len(), 2);

    let result = session
        .call_tool("add", json!({"x": 20, "y": 22}))
        .await
        .unwrap();
    assert_eq!(result.text_content(), "42");

    // A second independent session against the same server.
    let conn = TcpTransport::new(addr.to_string()).dial().await.unwrap();
    let second = Session::connect(conn, client_info()).await.unwrap();
    let result = second
        .call_tool("divide", json!({"x": 9, "y": 3}))
        .await
        .unwrap();
    assert_eq!(result.text_content(), "3");

    session.close().await;
    second.close().await;
}
