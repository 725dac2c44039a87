//! MCP (Model Context Protocol) JSON-RPC handler.
//!
//! Implements the [MCP specification](https://spec.modelcontextprotocol.io/)
//! over stdio — reads JSON-RPC 2.0 requests from stdin (one per line) and
//! writes responses to stdout.
//!
//! ## Supported methods
//!
//! | Method              | Description                      |
//! |---------------------|----------------------------------|
//! | `initialize`        | Handshake, returns capabilities  |
//! | `tools/list`        | List available tool definitions  |
//! | `tools/call`        | Execute a tool and return result |
//! | `ping`              | Liveness check                   |
//!
//! Notifications (`notifications/initialized`, `notifications/cancelled`) are
//! acknowledged silently.
//!
//! `tools/call` requests run as independent tasks, so a slow Overseerr call
//! does not hold up the next one. Responses may therefore be written out of
//! request order; all writes go through one writer task so lines never
//! interleave.

use std::sync::Arc;

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

use crate::tools::Dispatcher;

const SERVER_NAME: &str = "overseerr-mcp";
const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");
const PROTOCOL_VERSION: &str = "2024-11-05";

/// Run the MCP server on stdio, processing JSON-RPC requests until EOF.
///
/// In-flight tool calls are allowed to finish before this returns.
pub async fn run_stdio(dispatcher: Arc<Dispatcher>) {
    let (tx, rx) = mpsc::unbounded_channel::<Value>();
    let writer = tokio::spawn(write_responses(rx));

    let mut reader = BufReader::new(tokio::io::stdin());
    let mut line = String::new();

    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => break, // EOF
            Ok(_) => {}
            Err(e) => {
                tracing::error!(error = %e, "stdin read error");
                break;
            }
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let request: Value = match serde_json::from_str(trimmed) {
            Ok(v) => v,
            Err(e) => {
                let _ = tx.send(json!({
                    "jsonrpc": "2.0",
                    "id": null,
                    "error": {
                        "code": -32700,
                        "message": format!("Parse error: {}", e)
                    }
                }));
                continue;
            }
        };

        let method = request
            .get("method")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();

        // Notifications (no id) — acknowledge silently
        let Some(id) = request.get("id").cloned() else {
            match method.as_str() {
                "notifications/initialized" | "notifications/cancelled" => {}
                _ => tracing::debug!(method = %method, "unknown notification"),
            }
            continue;
        };

        if method == "tools/call" {
            let dispatcher = Arc::clone(&dispatcher);
            let tx = tx.clone();
            tokio::spawn(async move {
                let response = handle_tools_call(&request, &dispatcher).await;
                let _ = tx.send(inject_id(response, id));
            });
            continue;
        }

        let response = match method.as_str() {
            "initialize" => handle_initialize(),
            "tools/list" => handle_tools_list(&dispatcher),
            "ping" => json!({ "jsonrpc": "2.0", "result": {} }),
            _ => json!({
                "jsonrpc": "2.0",
                "error": {
                    "code": -32601,
                    "message": format!("Method not found: {}", method)
                }
            }),
        };
        let _ = tx.send(inject_id(response, id));
    }

    drop(tx);
    let _ = writer.await;
}

/// Handle `initialize` — return protocol version, capabilities, and server info.
fn handle_initialize() -> Value {
    json!({
        "jsonrpc": "2.0",
        "result": {
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {
                "tools": { "listChanged": false }
            },
            "serverInfo": {
                "name": SERVER_NAME,
                "version": SERVER_VERSION
            }
        }
    })
}

/// Handle `tools/list` — definitions were built once at startup.
fn handle_tools_list(dispatcher: &Dispatcher) -> Value {
    json!({
        "jsonrpc": "2.0",
        "result": {
            "tools": dispatcher.definitions()
        }
    })
}

/// Handle `tools/call` — dispatch to the appropriate tool handler.
async fn handle_tools_call(request: &Value, dispatcher: &Dispatcher) -> Value {
    let params = request.get("params").cloned().unwrap_or(json!({}));
    let name = params.get("name").and_then(Value::as_str).unwrap_or("");
    let args = params.get("arguments").cloned().unwrap_or(json!({}));

    let result = dispatcher.call(name, &args).await;

    let mut response_result = json!({
        "content": result.content
    });
    if result.is_error {
        response_result["isError"] = json!(true);
    }

    json!({
        "jsonrpc": "2.0",
        "result": response_result
    })
}

/// Inject the request `id` into a response object.
fn inject_id(mut response: Value, id: Value) -> Value {
    response["id"] = id;
    response
}

/// Drain the response channel to stdout, one line per message, flushed
/// immediately.
async fn write_responses(mut rx: mpsc::UnboundedReceiver<Value>) {
    let mut stdout = tokio::io::stdout();
    while let Some(response) = rx.recv().await {
        let mut output = serde_json::to_string(&response).unwrap_or_default();
        output.push('\n');
        if let Err(e) = stdout.write_all(output.as_bytes()).await {
            tracing::error!(error = %e, "stdout write error");
        }
        if let Err(e) = stdout.flush().await {
            tracing::error!(error = %e, "stdout flush error");
        }
    }
}
