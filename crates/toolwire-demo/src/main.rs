//! Demo: an order-lookup server and a one-shot client.
//!
//! `serve` exposes two tools (`orderStatus`, `getOrder`) over TCP or stdio;
//! `list` and `call` dial a running server and use it. Natural-language
//! argument extraction is somebody else's job — `call` takes the argument
//! object as JSON on the command line.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{Value, json};
use std::io;
use toolwire_client::Session;
use toolwire_protocol::{CallToolResult, Content, Implementation, ResourceInfo};
use toolwire_server::{Registry, Server};
use toolwire_transport::TcpTransport;

#[derive(Parser)]
#[command(name = "toolwire-demo", version, about = "toolwire demo client/server")]
struct Cli {
    /// Enable verbose/debug logging
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the order server
    Serve {
        /// TCP listen address
        #[arg(long, default_value = "127.0.0.1:9000", conflicts_with = "stdio")]
        addr: String,
        /// Serve a single connection on stdin/stdout instead of TCP
        #[arg(long)]
        stdio: bool,
    },
    /// List the tools of a running server
    List {
        /// Server address to dial
        #[arg(long, default_value = "127.0.0.1:9000")]
        addr: String,
    },
    /// Call one tool and print the result
    Call {
        /// Server address to dial
        #[arg(long, default_value = "127.0.0.1:9000")]
        addr: String,
        /// Tool name, e.g. orderStatus
        tool: String,
        /// Arguments as a JSON object, e.g. '{"idOrder": "42"}'
        #[arg(default_value = "{}")]
        arguments: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Command::Serve { addr, stdio } => {
            let server = Server::new(Implementation::new("order", "v1.0.0"), order_registry());
            if stdio {
                server.serve_stdio().await?;
            } else {
                server.serve_tcp(&addr).await?;
            }
        }
        Command::List { addr } => {
            let session = connect(&addr).await?;
            for tool in session.list_tools().await? {
                println!("{}\t{}", tool.name, tool.description);
            }
            session.close().await;
        }
        Command::Call {
            addr,
            tool,
            arguments,
        } => {
            let arguments: Value =
                serde_json::from_str(&arguments).context("arguments must be a JSON object")?;
            let session = connect(&addr).await?;
            let result = session.call_tool(&tool, arguments).await?;
            session.close().await;
            print_result(&result);
            if result.is_error {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

async fn connect(addr: &str) -> Result<Session> {
    let conn = TcpTransport::new(addr).dial().await?;
    let session = Session::connect(
        conn,
        Implementation::new("toolwire-demo", env!("CARGO_PKG_VERSION")),
    )
    .await?;
    Ok(session)
}

fn print_result(result: &CallToolResult) {
    for item in &result.content {
        match item {
            Content::Text { text } => println!("{text}"),
            Content::Image { mime_type, .. } => println!("[image: {mime_type}]"),
        }
    }
}

/// The order tools, as in the original order-lookup service: statuses and
/// orders are synthesized from the id.
fn order_registry() -> Registry {
    let mut registry = Registry::new();

    registry.register_fn(
        "orderStatus",
        "check the order status by id",
        json!({
            "type": "object",
            "properties": {"idOrder": {"type": "string"}},
            "required": ["idOrder"]
        }),
        |args: Value| async move {
            let id = args["idOrder"].as_str().unwrap_or_default().to_string();
            tracing::info!(order = %id, "looking up order status");
            Ok(CallToolResult::text(format!("new-{id}")))
        },
    );

    registry.register_fn(
        "getOrder",
        "get the order by id",
        json!({
            "type": "object",
            "properties": {"idOrder": {"type": "string"}},
            "required": ["idOrder"]
        }),
        |args: Value| async move {
            let id = args["idOrder"].as_str().unwrap_or_default().to_string();
            tracing::info!(order = %id, "fetching order");
            Ok(CallToolResult::text(format!("order {id}")))
        },
    );

    registry.register_resource(
        ResourceInfo {
            uri: "order://about".into(),
            name: "about".into(),
            description: "What this server does".into(),
            mime_type: Some("text/plain".into()),
        },
        || Ok("order lookup demo: orderStatus and getOrder".to_string()),
    );

    registry
}
