//! Consensus core for the replicated metadata store: log, roles, elections,
//! replication and the key-value state machine committed entries feed.
//! No I/O happens here; `metaraft-server` drives it over the network.

pub mod error;
pub mod raft;
pub mod storage;

pub use error::{CommandError, NotLeader, ParseReplyError, ProposeError, WalError};
pub use raft::{
    AppendEntriesRequest, AppendEntriesResponse, ClientPutResult, ElectionConfig, LogEntry,
    NodeState, NodeStatus, Proposal, RaftLog, RaftNode, RequestVoteRequest, RequestVoteResponse,
};
pub use storage::command::Command;
pub use storage::engine::MetadataStore;
pub use storage::wal::{MemoryWal, WalRecord, WriteAheadLog};
