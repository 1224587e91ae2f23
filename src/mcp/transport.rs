//! MCP transport layer implementations.
//!
//! Supports stdio here; the HTTP/SSE transport lives in [`crate::http`].

use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, Stdin, Stdout};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::error::{Error, Result};
use crate::mcp::protocol::{error_codes, JsonRpcRequest, JsonRpcResponse, RequestId};
use crate::mcp::sender::ResponseSender;
use crate::mcp::server::McpServer;

/// Transport trait for MCP communication.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Serve requests until the input ends, `cancel` fires or [`stop`](Self::stop) is called.
    async fn start(&self, server: Arc<McpServer>, cancel: CancellationToken) -> Result<()>;

    /// Stop the transport.
    async fn stop(&self) -> Result<()>;
}

/// Newline-delimited JSON-RPC over a byte stream pair.
pub struct StdioTransport<R, W> {
    reader: StdMutex<Option<R>>,
    writer: Arc<Mutex<W>>,
    shutdown: CancellationToken,
}

impl StdioTransport<Stdin, Stdout> {
    /// Create a transport over the process's stdin and stdout.
    pub fn stdio() -> Self {
        Self::new(tokio::io::stdin(), tokio::io::stdout())
    }
}

impl<R, W> StdioTransport<R, W>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader: StdMutex::new(Some(reader)),
            writer: Arc::new(Mutex::new(writer)),
            shutdown: CancellationToken::new(),
        }
    }

    async fn process_line(&self, server: &McpServer, line: &str, cancel: &CancellationToken) {
        trace!("Received: {}", line);
        let sender = LineSender::new(self.writer.clone());

        let request: JsonRpcRequest = match serde_json::from_str(line) {
            Ok(request) => request,
            Err(e) => {
                warn!("Failed to parse message: {}", e);
                let id = RequestId::recover(line.as_bytes());
                let data = Some(Value::String(e.to_string()));
                if let Err(e) = sender
                    .send_error(id, error_codes::PARSE_ERROR, "Parse error".to_string(), data)
                    .await
                {
                    error!("Failed to write parse error: {}", e);
                }
                return;
            }
        };

        if !request.has_valid_version() {
            match request.id {
                Some(id) => {
                    if let Err(e) = sender
                        .send_error(
                            id,
                            error_codes::INVALID_REQUEST,
                            "Invalid JSON-RPC version".to_string(),
                            None,
                        )
                        .await
                    {
                        error!("Failed to write invalid request error: {}", e);
                    }
                }
                None => warn!("Dropping notification with invalid JSON-RPC version"),
            }
            return;
        }

        let id = request.id.clone();
        let result = tokio::select! {
            _ = self.shutdown.cancelled() => Err(Error::Cancelled),
            result = server.handle_request_with_timeout(request, &sender, None, cancel) => result,
        };

        match result {
            Ok(()) => {}
            Err(Error::Cancelled) => debug!("Request {:?} cancelled", id),
            Err(e) => {
                warn!("Request {:?} failed: {}", id, e);
                let Some(id) = id else { return };
                if sender.is_sent() {
                    return;
                }
                let data = Some(Value::String(e.to_string()));
                if let Err(e) = sender
                    .send_error(id, error_codes::INTERNAL_ERROR, "Internal error".to_string(), data)
                    .await
                {
                    error!("Failed to write internal error: {}", e);
                }
            }
        }
    }
}

#[async_trait]
impl<R, W> Transport for StdioTransport<R, W>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    async fn start(&self, server: Arc<McpServer>, cancel: CancellationToken) -> Result<()> {
        let reader = {
            let mut slot = self
                .reader
                .lock()
                .map_err(|_| Error::Internal("stdio reader lock poisoned".to_string()))?;
            slot.take()
                .ok_or_else(|| Error::Internal("stdio transport already started".to_string()))?
        };

        info!("Stdio transport started");
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();

        loop {
            buf.clear();
            let read = tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Stdio transport cancelled");
                    break;
                }
                _ = self.shutdown.cancelled() => {
                    info!("Stdio transport stopped");
                    break;
                }
                read = reader.read_until(b'\n', &mut buf) => read,
            };

            match read {
                Ok(0) => {
                    debug!("EOF on stdin, stopping transport");
                    break;
                }
                Ok(_) => {
                    // Invalid UTF-8 becomes U+FFFD; the line is then answered
                    // like any other payload.
                    let line = String::from_utf8_lossy(&buf);
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    self.process_line(&server, trimmed, &cancel).await;
                }
                Err(e) => {
                    error!("Error reading stdin: {}", e);
                    return Err(e.into());
                }
            }
        }

        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.shutdown.cancel();
        Ok(())
    }
}

/// Writes each response as one JSON line.
struct LineSender<W> {
    writer: Arc<Mutex<W>>,
    sent: AtomicBool,
}

impl<W> LineSender<W> {
    fn new(writer: Arc<Mutex<W>>) -> Self {
        Self {
            writer,
            sent: AtomicBool::new(false),
        }
    }

    fn is_sent(&self) -> bool {
        self.sent.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<W> ResponseSender for LineSender<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    async fn send_response(&self, response: JsonRpcResponse) -> Result<()> {
        let mut line = serde_json::to_string(&response)?;
        line.push('\n');
        trace!("Sending: {}", line.trim_end());

        let mut writer = self.writer.lock().await;
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await?;
        self.sent.store(true, Ordering::SeqCst);
        Ok(())
    }
}
