use std::time::Duration;

use thiserror::Error;

/// A call to another node that produced no usable reply. The runtime treats
/// every variant the same way: as "no response".
#[derive(Error, Debug)]
pub enum PeerError {
    #[error("failed to connect to {peer}: {source}")]
    Connect {
        peer: String,
        #[source]
        source: std::io::Error,
    },
    #[error("I/O error talking to {peer}: {source}")]
    Io {
        peer: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{peer} did not answer within {timeout:?}")]
    Timeout { peer: String, timeout: Duration },
    #[error("{peer} closed the connection without replying")]
    Closed { peer: String },
    #[error("malformed reply from {peer}: {source}")]
    Codec {
        peer: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("{peer} answered with an unexpected reply")]
    UnexpectedReply { peer: String },
}

/// A client line that never reached the consensus engine.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("empty command")]
    Empty,
    #[error("unknown command `{0}`")]
    UnknownCommand(String),
    #[error("usage: {0}")]
    Usage(&'static str),
    #[error("invalid key {0:?}: keys must be non-empty and contain no whitespace")]
    InvalidKey(String),
    #[error("malformed request: {0}")]
    Json(#[from] serde_json::Error),
    #[error("request line longer than {limit} bytes")]
    LineTooLong { limit: usize },
    #[error("request is not valid UTF-8")]
    NotUtf8,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("node id must not be empty")]
    EmptyNodeId,
    #[error("{var} must be a number of milliseconds, got `{value}`")]
    InvalidNumber { var: &'static str, value: String },
    #[error("node {0} lists itself as a peer")]
    SelfInPeers(String),
    #[error("peer {0} is listed more than once")]
    DuplicatePeer(String),
    #[error("election timeout range {min}..{max} ms is empty")]
    EmptyTimeoutRange { min: u64, max: u64 },
    #[error("heartbeat interval {heartbeat} ms is not shorter than the minimum election timeout {min} ms")]
    HeartbeatTooSlow { heartbeat: u64, min: u64 },
}

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}
