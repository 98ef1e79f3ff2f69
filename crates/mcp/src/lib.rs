//! Stdio transport adapter: line-delimited JSON-RPC 2.0 over stdin/stdout.
//!
//! The registry lives in a worker task; the read loop talks to it over an
//! mpsc request channel with oneshot replies, so a slow invocation never
//! blocks parsing of the next line.

use std::sync::Arc;

use serde_json::{json, Value};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use cryptopulse_ops::{InvocationRequest, OperationRegistry, OperationResult, Router};

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;

const PROTOCOL_VERSION: &str = "2024-11-05";

#[derive(Debug, Error)]
pub enum McpError {
    #[error("catalog worker unavailable")]
    WorkerGone,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, McpError>;

/// One request to the catalog worker. The reply channel carries the
/// complete answer; there is no partial delivery on this surface.
enum CatalogRequest {
    List {
        reply: oneshot::Sender<Vec<Value>>,
    },
    Call {
        name: String,
        arguments: Value,
        reply: oneshot::Sender<OperationResult>,
    },
}

/// Handle to the catalog worker task.
#[derive(Clone)]
pub struct CatalogHandle {
    requests: mpsc::Sender<CatalogRequest>,
}

impl CatalogHandle {
    /// Spawns the worker that owns the router and answers catalog
    /// requests until every handle is dropped.
    pub fn spawn(router: Router) -> Self {
        let (tx, mut rx) = mpsc::channel::<CatalogRequest>(32);

        tokio::spawn(async move {
            while let Some(request) = rx.recv().await {
                match request {
                    CatalogRequest::List { reply } => {
                        let _ = reply.send(router.registry().describe());
                    }
                    CatalogRequest::Call {
                        name,
                        arguments,
                        reply,
                    } => {
                        let result = router
                            .dispatch(InvocationRequest::new("mcp", name, arguments))
                            .await;
                        let _ = reply.send(result);
                    }
                }
            }
            debug!("catalog worker stopped");
        });

        Self { requests: tx }
    }

    pub async fn list(&self) -> Result<Vec<Value>> {
        let (reply, rx) = oneshot::channel();
        self.requests
            .send(CatalogRequest::List { reply })
            .await
            .map_err(|_| McpError::WorkerGone)?;
        rx.await.map_err(|_| McpError::WorkerGone)
    }

    pub async fn call(&self, name: impl Into<String>, arguments: Value) -> Result<OperationResult> {
        let (reply, rx) = oneshot::channel();
        self.requests
            .send(CatalogRequest::Call {
                name: name.into(),
                arguments,
                reply,
            })
            .await
            .map_err(|_| McpError::WorkerGone)?;
        rx.await.map_err(|_| McpError::WorkerGone)
    }
}

/// JSON-RPC server over any line-oriented byte stream.
pub struct McpServer {
    catalog: CatalogHandle,
}

impl McpServer {
    pub fn new(router: Router) -> Self {
        Self {
            catalog: CatalogHandle::spawn(router),
        }
    }

    pub fn with_registry(registry: Arc<OperationRegistry>) -> Self {
        Self::new(Router::new(registry, cryptopulse_ops::Executor::new()))
    }

    /// Serves stdin/stdout until EOF.
    pub async fn serve_stdio(&self) -> Result<()> {
        let stdin = BufReader::new(tokio::io::stdin());
        let stdout = tokio::io::stdout();
        self.serve(stdin, stdout).await
    }

    /// Reads one JSON-RPC message per line, writes one response per
    /// request. Notifications produce no output.
    pub async fn serve<R, W>(&self, reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncBufReadExt + Unpin,
        W: AsyncWrite + Unpin,
    {
        info!("stdio server ready");
        let mut lines = reader.lines();

        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            if let Some(response) = self.handle_line(&line).await? {
                let mut out = response.to_string();
                out.push('\n');
                writer.write_all(out.as_bytes()).await?;
                writer.flush().await?;
            }
        }

        info!("stdio server closed");
        Ok(())
    }

    /// Handles one raw line. Returns `None` for notifications.
    pub async fn handle_line(&self, line: &str) -> Result<Option<Value>> {
        let message: Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "unparseable request line");
                return Ok(Some(error_response(
                    Value::Null,
                    PARSE_ERROR,
                    "parse error",
                )));
            }
        };

        let method = match message.get("method").and_then(Value::as_str) {
            Some(method) => method.to_string(),
            None => {
                return Ok(Some(error_response(
                    message.get("id").cloned().unwrap_or(Value::Null),
                    INVALID_REQUEST,
                    "invalid request: missing method",
                )));
            }
        };

        // A message without an id is a notification; it gets work but no
        // response.
        let id = match message.get("id") {
            Some(id) if !id.is_null() => id.clone(),
            _ => {
                debug!(method = %method, "notification ignored");
                return Ok(None);
            }
        };

        let params = message.get("params").cloned().unwrap_or(json!({}));
        Ok(Some(self.handle_request(id, &method, params).await?))
    }

    async fn handle_request(&self, id: Value, method: &str, params: Value) -> Result<Value> {
        debug!(method, "request");

        let result = match method {
            "initialize" => json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": { "tools": {} },
                "serverInfo": {
                    "name": "cryptopulse-mcp",
                    "version": env!("CARGO_PKG_VERSION"),
                },
            }),
            "ping" => json!({}),
            "tools/list" => json!({ "tools": self.catalog.list().await? }),
            "tools/call" => {
                let name = match params.get("name").and_then(Value::as_str) {
                    Some(name) => name.to_string(),
                    None => {
                        return Ok(error_response(
                            id,
                            INVALID_PARAMS,
                            "invalid params: missing tool name",
                        ));
                    }
                };
                let arguments = params.get("arguments").cloned().unwrap_or(json!({}));
                let result = self.catalog.call(name, arguments).await?;
                json!({
                    "content": [{ "type": "text", "text": result.text() }],
                    "isError": result.is_error,
                })
            }
            other => {
                return Ok(error_response(
                    id,
                    METHOD_NOT_FOUND,
                    format!("method not found: {other}"),
                ));
            }
        };

        Ok(json!({ "jsonrpc": "2.0", "id": id, "result": result }))
    }
}

fn error_response(id: Value, code: i64, message: impl Into<String>) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": { "code": code, "message": message.into() },
    })
}
