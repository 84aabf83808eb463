//! MCP stdio server — read loop, concurrent tool calls, single writer.

use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::mcp::codec::{read_frame, write_frame, Frame};
use crate::mcp::router::{self, RpcError, ServerInfo};
use crate::tools::FhirTools;
use crate::types::{rpc_codes, ServerConfig};
use serde_json::{json, Value};

/// Bounded queue between request tasks and the writer.
const OUTBOUND_CAPACITY: usize = 64;

/// MCP server wrapping the FHIR tool facade.
#[derive(Debug)]
pub struct McpServer {
    tools: Arc<FhirTools>,
    info: ServerInfo,
    config: ServerConfig,
    cancel: CancellationToken,
}

impl McpServer {
    pub fn new(tools: FhirTools, config: ServerConfig) -> Self {
        let info = ServerInfo {
            name: config.name.clone(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        };
        Self {
            tools: Arc::new(tools),
            info,
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Token that stops [`McpServer::serve`] when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Request graceful shutdown.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Serve until EOF on `reader` or cancellation. In-flight calls finish
    /// and their responses are flushed before returning.
    pub async fn serve<R, W>(&self, reader: R, writer: W) -> std::io::Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let mut reader = BufReader::new(reader);
        let (tx, rx) = mpsc::channel::<Value>(OUTBOUND_CAPACITY);
        let writer_task = tokio::spawn(write_loop(writer, rx));
        let permits = Arc::new(Semaphore::new(self.config.max_concurrent_calls));
        let mut in_flight = JoinSet::new();

        tracing::info!(
            "MCP server '{}' ready on stdio (max_concurrent_calls={})",
            self.info.name,
            self.config.max_concurrent_calls,
        );

        let read_result = loop {
            let frame = tokio::select! {
                _ = self.cancel.cancelled() => {
                    tracing::info!("MCP server shutting down");
                    break Ok(());
                }
                frame = read_frame(&mut reader, self.config.max_message_bytes) => frame,
            };

            let bytes = match frame {
                Ok(Some(Frame::Message(bytes))) => bytes,
                Ok(Some(Frame::Oversized(len))) => {
                    tracing::warn!("Dropping oversized message ({} bytes)", len);
                    let error = RpcError::new(
                        rpc_codes::INVALID_REQUEST,
                        format!("Message too large: {} bytes", len),
                    );
                    send(&tx, error_response(Value::Null, &error)).await;
                    continue;
                }
                Ok(None) => {
                    tracing::info!("stdin closed");
                    break Ok(());
                }
                Err(e) => break Err(e),
            };

            if bytes.iter().all(u8::is_ascii_whitespace) {
                continue;
            }

            let request = match parse_request(&bytes) {
                Ok(Some(request)) => request,
                Ok(None) => continue,
                Err(response) => {
                    send(&tx, response).await;
                    continue;
                }
            };

            // Backpressure: wait for a slot before reading further.
            let permit = match permits.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break Ok(()),
            };
            let tools = self.tools.clone();
            let info = self.info.clone();
            let tx = tx.clone();
            in_flight.spawn(async move {
                let response = handle_request(&tools, &info, request).await;
                send(&tx, response).await;
                drop(permit);
            });

            // Reap finished tasks so the set does not grow unbounded.
            while let Some(joined) = in_flight.try_join_next() {
                if let Err(e) = joined {
                    tracing::error!("tool task failed: {}", e);
                }
            }
        };

        while let Some(joined) = in_flight.join_next().await {
            if let Err(e) = joined {
                tracing::error!("tool task failed: {}", e);
            }
        }
        drop(tx);
        match writer_task.await {
            Ok(write_result) => write_result?,
            Err(e) => tracing::error!("writer task failed: {}", e),
        }
        read_result
    }
}

/// A decoded JSON-RPC request that expects a response.
#[derive(Debug)]
struct Request {
    id: Value,
    method: String,
    params: Value,
}

/// `Ok(None)` for notifications, `Err(response)` for malformed input.
fn parse_request(bytes: &[u8]) -> Result<Option<Request>, Value> {
    let message: Value = serde_json::from_slice(bytes).map_err(|e| {
        error_response(
            Value::Null,
            &RpcError::new(rpc_codes::PARSE_ERROR, format!("Parse error: {}", e)),
        )
    })?;

    let id = message.get("id").cloned();
    let invalid = |reason: &str| {
        error_response(
            id.clone().unwrap_or(Value::Null),
            &RpcError::new(rpc_codes::INVALID_REQUEST, format!("Invalid request: {}", reason)),
        )
    };

    if !message.is_object() {
        return Err(invalid("expected a JSON object"));
    }
    if message.get("jsonrpc").and_then(Value::as_str) != Some("2.0") {
        return Err(invalid("jsonrpc must be \"2.0\""));
    }
    let method = message
        .get("method")
        .and_then(Value::as_str)
        .ok_or_else(|| invalid("missing method"))?
        .to_string();

    match id {
        None => {
            tracing::debug!("notification {}", method);
            Ok(None)
        }
        Some(id) => Ok(Some(Request {
            id,
            method,
            params: message.get("params").cloned().unwrap_or(Value::Null),
        })),
    }
}

async fn handle_request(tools: &FhirTools, info: &ServerInfo, request: Request) -> Value {
    tracing::debug!("request {} id={}", request.method, request.id);
    match router::route(tools, info, &request.method, request.params).await {
        Ok(result) => json!({"jsonrpc": "2.0", "id": request.id, "result": result}),
        Err(error) => {
            tracing::warn!("{} failed: {}", request.method, error.message);
            error_response(request.id, &error)
        }
    }
}

fn error_response(id: Value, error: &RpcError) -> Value {
    json!({"jsonrpc": "2.0", "id": id, "error": error.to_json()})
}

async fn send(tx: &mpsc::Sender<Value>, message: Value) {
    if tx.send(message).await.is_err() {
        tracing::warn!("writer closed, dropping response");
    }
}

async fn write_loop<W: AsyncWrite + Unpin>(
    mut writer: W,
    mut rx: mpsc::Receiver<Value>,
) -> std::io::Result<()> {
    while let Some(message) = rx.recv().await {
        write_frame(&mut writer, &message).await?;
    }
    Ok(())
}
