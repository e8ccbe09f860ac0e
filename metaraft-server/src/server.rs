use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, warn};

use crate::cluster_node::ClusterNode;
use crate::error::{ProtocolError, ServerError};
use crate::protocol::{parse_json, parse_text, render_text, Response};
use crate::raft_handler::handle_request;

/// Longest request line accepted, newline included. Sized for the largest
/// AppendEntries batch a lagging follower is sent.
pub const MAX_LINE_BYTES: usize = 16 * 1024 * 1024;

pub async fn bind(addr: &str) -> Result<TcpListener, ServerError> {
    TcpListener::bind(addr).await.map_err(|source| ServerError::Bind {
        addr: addr.to_string(),
        source,
    })
}

/// Accepts connections forever, one task per connection. Peers and
/// clients share the listener.
pub async fn run(listener: TcpListener, node: Arc<ClusterNode>) -> Result<(), ServerError> {
    loop {
        match listener.accept().await {
            Ok((socket, remote)) => {
                let node = Arc::clone(&node);
                tokio::spawn(async move {
                    handle_connection(socket, node, remote).await;
                });
            }
            Err(e) => {
                warn!(node = %node.id(), error = %e, "failed to accept connection");
            }
        }
    }
}

/// Answers one line per request line until the remote side hangs up.
/// Lines starting with `{` are JSON, anything else is the text protocol.
pub async fn handle_connection(socket: TcpStream, node: Arc<ClusterNode>, remote: SocketAddr) {
    let (reader, mut writer) = socket.into_split();
    let mut reader = BufReader::new(reader);

    loop {
        let line = match read_request_line(&mut reader, MAX_LINE_BYTES).await {
            Ok(Some(line)) => line,
            Ok(None) => return, // connection closed
            Err(e) => {
                debug!(%remote, error = %e, "error reading from connection");
                return;
            }
        };

        let mut reply = match line {
            Ok(line) if line.trim_start().starts_with('{') => json_reply(&node, line.trim()).await,
            Ok(line) => text_reply(&node, &line).await,
            Err(e) => {
                debug!(%remote, error = %e, "rejected request line");
                render_text(&Response::error(e))
            }
        };
        reply.push('\n');

        if let Err(e) = writer.write_all(reply.as_bytes()).await {
            debug!(%remote, error = %e, "failed to send reply");
            return;
        }
    }
}

async fn json_reply(node: &ClusterNode, line: &str) -> String {
    let response = match parse_json(line) {
        Ok(request) => handle_request(node, request).await,
        Err(e) => Response::error(e),
    };
    serde_json::to_string(&response).unwrap_or_else(|e| {
        warn!(node = %node.id(), error = %e, "failed to encode response");
        r#"{"type":"Error","message":"internal encoding error"}"#.to_string()
    })
}

async fn text_reply(node: &ClusterNode, line: &str) -> String {
    match parse_text(line) {
        Ok(request) => render_text(&handle_request(node, request).await),
        Err(e) => render_text(&Response::error(e)),
    }
}

/// Reads one newline-terminated request of at most `limit` bytes.
/// A longer line is skipped through its newline and reported as
/// [`ProtocolError::LineTooLong`], so the connection stays usable. `None` at
/// end of stream.
async fn read_request_line<R>(reader: &mut R, limit: usize) -> std::io::Result<Option<Result<String, ProtocolError>>>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    let read = (&mut *reader).take(limit as u64).read_until(b'\n', &mut buf).await?;
    if read == 0 {
        return Ok(None);
    }

    if read == limit && buf.last() != Some(&b'\n') {
        skip_line(reader).await?;
        return Ok(Some(Err(ProtocolError::LineTooLong { limit })));
    }

    Ok(Some(String::from_utf8(buf).map_err(|_| ProtocolError::NotUtf8)))
}

async fn skip_line<R: AsyncBufRead + Unpin>(reader: &mut R) -> std::io::Result<()> {
    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            return Ok(());
        }
        match available.iter().position(|&b| b == b'\n') {
            Some(pos) => {
                reader.consume(pos + 1);
                return Ok(());
            }
            None => {
                let len = available.len();
                reader.consume(len);
            }
        }
    }
}
