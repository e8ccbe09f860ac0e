use std::time::Duration;

use async_trait::async_trait;
use metaraft_core::{AppendEntriesRequest, AppendEntriesResponse, RequestVoteRequest, RequestVoteResponse};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::debug;

use crate::error::PeerError;
use crate::protocol::{Request, Response};

/// Outbound Raft RPCs. `None` means the peer gave no usable answer in time;
/// callers never see why.
///
/// Implementations hold no per-call state, so one client is shared by every
/// task of a node.
#[async_trait]
pub trait PeerClient: Send + Sync {
    async fn request_vote(&self, peer: &str, request: RequestVoteRequest) -> Option<RequestVoteResponse>;

    async fn append_entries(&self, peer: &str, request: AppendEntriesRequest) -> Option<AppendEntriesResponse>;
}

/// Opens one TCP connection per call to the peer id (`host:port`) and
/// exchanges a single JSON line each way.
#[derive(Debug, Clone)]
pub struct TcpPeerClient {
    timeout: Duration,
}

impl TcpPeerClient {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Sends `request` to `addr` and waits for the reply, bounded by the
    /// client timeout as a whole.
    pub async fn call(&self, addr: &str, request: &Request) -> Result<Response, PeerError> {
        tokio::time::timeout(self.timeout, exchange(addr, request))
            .await
            .map_err(|_| PeerError::Timeout {
                peer: addr.to_string(),
                timeout: self.timeout,
            })?
    }
}

async fn exchange(addr: &str, request: &Request) -> Result<Response, PeerError> {
    let io_err = |source| PeerError::Io {
        peer: addr.to_string(),
        source,
    };

    let stream = TcpStream::connect(addr).await.map_err(|source| PeerError::Connect {
        peer: addr.to_string(),
        source,
    })?;
    let (reader, mut writer) = stream.into_split();

    let mut line = serde_json::to_string(request).map_err(|source| PeerError::Codec {
        peer: addr.to_string(),
        source,
    })?;
    line.push('\n');
    writer.write_all(line.as_bytes()).await.map_err(io_err)?;
    writer.flush().await.map_err(io_err)?;

    let mut reader = BufReader::new(reader);
    let mut reply = String::new();
    if reader.read_line(&mut reply).await.map_err(io_err)? == 0 {
        return Err(PeerError::Closed { peer: addr.to_string() });
    }

    serde_json::from_str(reply.trim()).map_err(|source| PeerError::Codec {
        peer: addr.to_string(),
        source,
    })
}

#[async_trait]
impl PeerClient for TcpPeerClient {
    async fn request_vote(&self, peer: &str, request: RequestVoteRequest) -> Option<RequestVoteResponse> {
        let reply = self.call(peer, &Request::RequestVote(request)).await.and_then(|response| match response {
            Response::RequestVote(response) => Ok(response),
            _ => Err(PeerError::UnexpectedReply { peer: peer.to_string() }),
        });
        reply.map_err(|e| debug!(peer, error = %e, "RequestVote failed")).ok()
    }

    async fn append_entries(&self, peer: &str, request: AppendEntriesRequest) -> Option<AppendEntriesResponse> {
        let reply = self.call(peer, &Request::AppendEntries(request)).await.and_then(|response| match response {
            Response::AppendEntries(response) => Ok(response),
            _ => Err(PeerError::UnexpectedReply { peer: peer.to_string() }),
        });
        // routine while a peer is down or partitioned
        reply.map_err(|e| debug!(peer, error = %e, "AppendEntries failed")).ok()
    }
}
