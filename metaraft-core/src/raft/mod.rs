pub mod log;
pub mod message;
pub mod node;
pub mod state;

pub use log::{LogEntry, MergeOutcome, RaftLog};
pub use message::{
    AppendEntriesRequest, AppendEntriesResponse, ClientPutResult, RequestVoteRequest,
    RequestVoteResponse,
};
pub use node::{NodeStatus, Proposal, RaftNode};
pub use state::{ElectionConfig, ElectionTimer, LeaderState, NodeState, PersistentState, Role, VolatileState};
