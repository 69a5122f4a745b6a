//! Stdio transport for the MCP server.
//!
//! Requests are read line by line and each one is dispatched on its own task.
//! Responses funnel through a single writer task, so lines never interleave;
//! they may leave out of order and correlate by id.

use crate::error::{DbError, DbResult};
use crate::mcp::{Framing, JsonRpcResponse, Message, ToolDispatcher, decode, encode};
use crate::transport::{Transport, wait_for_signal};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

pub struct StdioTransport {
    dispatcher: Arc<ToolDispatcher>,
}

impl StdioTransport {
    pub fn new(dispatcher: Arc<ToolDispatcher>) -> Self {
        Self { dispatcher }
    }
}

/// Serve one peer over `reader`/`writer` until the reader reaches EOF.
///
/// Returns after every in-flight request has been answered.
pub async fn serve<R, W>(dispatcher: Arc<ToolDispatcher>, reader: R, writer: W) -> DbResult<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, mut rx) = mpsc::unbounded_channel::<Vec<u8>>();

    let writer_task = tokio::spawn(async move {
        let mut writer = writer;
        while let Some(frame) = rx.recv().await {
            writer.write_all(&frame).await?;
            writer.flush().await?;
        }
        Ok::<_, std::io::Error>(())
    });

    let mut reader = BufReader::new(reader);
    let mut frame = Vec::new();
    loop {
        frame.clear();
        let read = reader
            .read_until(b'\n', &mut frame)
            .await
            .map_err(|e| DbError::internal(format!("Failed to read stdin: {}", e)))?;
        if read == 0 {
            break;
        }

        // Raw bytes go to the decoder, so invalid UTF-8 is just a malformed frame
        let line = frame.strip_suffix(b"\n").unwrap_or(&frame[..]);
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }

        match decode(line) {
            Ok(Message::Request(request)) => {
                let dispatcher = dispatcher.clone();
                let tx = tx.clone();
                tokio::spawn(async move {
                    let response = dispatcher.handle_request(request).await;
                    send(&tx, &response);
                });
            }
            Ok(message) => {
                dispatcher.handle_message(message).await;
            }
            Err(e) => {
                warn!(error = %e, "Discarding malformed line");
                send(&tx, &JsonRpcResponse::error(None, e.into()));
            }
        }
    }

    debug!("Stdin closed, waiting for in-flight requests");
    // The writer drains until every task has dropped its sender
    drop(tx);
    match writer_task.await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(DbError::internal(format!("Failed to write stdout: {}", e))),
        Err(e) => Err(DbError::internal(format!("Writer task failed: {}", e))),
    }
}

fn send(tx: &mpsc::UnboundedSender<Vec<u8>>, response: &JsonRpcResponse) {
    match encode(response, Framing::Line) {
        Ok(frame) => {
            if tx.send(frame).is_err() {
                warn!("Output closed, dropping response");
            }
        }
        Err(e) => warn!(error = %e, "Failed to encode response"),
    }
}

impl Transport for StdioTransport {
    async fn run(&self) -> DbResult<()> {
        info!("Starting MCP server with stdio transport");

        let shutdown_requested = tokio::select! {
            result = serve(self.dispatcher.clone(), tokio::io::stdin(), tokio::io::stdout()) => {
                result?;
                info!("Stdin closed, stdio transport completed");
                false
            }
            _ = wait_for_signal() => {
                info!("Shutdown signal received");
                true
            }
        };

        if shutdown_requested {
            // A blocking stdin read cannot be interrupted, exit directly
            info!("Exiting process");
            std::process::exit(0);
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        "stdio"
    }
}
