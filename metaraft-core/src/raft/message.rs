use serde::{Deserialize, Serialize};

use crate::error::ParseReplyError;
use crate::raft::log::LogEntry;

// ---- elections ----

/// Broadcast by a candidate when it opens an election.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestVoteRequest {
    pub term: u64,
    pub candidate_id: String,
    pub last_log_index: u64,
    pub last_log_term: u64,
}

impl RequestVoteRequest {
    pub fn new(term: u64, candidate_id: String, last_log_index: u64, last_log_term: u64) -> Self {
        Self {
            term,
            candidate_id,
            last_log_index,
            last_log_term,
        }
    }
}

/// Carries the voter's term so a stale candidate can step down.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestVoteResponse {
    pub term: u64,
    pub vote_granted: bool,
}

impl RequestVoteResponse {
    pub fn granted(term: u64) -> Self {
        Self {
            term,
            vote_granted: true,
        }
    }

    pub fn denied(term: u64) -> Self {
        Self {
            term,
            vote_granted: false,
        }
    }
}

// ---- replication ----

/// Ships `entries` to land right after `prev_log_index`. With no entries it
/// is a heartbeat that still carries the commit point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppendEntriesRequest {
    pub term: u64,
    pub leader_id: String,
    pub prev_log_index: u64,
    pub prev_log_term: u64,
    pub entries: Vec<LogEntry>,
    pub leader_commit: u64,
}

impl AppendEntriesRequest {
    pub fn heartbeat(
        term: u64,
        leader_id: String,
        prev_log_index: u64,
        prev_log_term: u64,
        leader_commit: u64,
    ) -> Self {
        Self {
            term,
            leader_id,
            prev_log_index,
            prev_log_term,
            entries: Vec::new(),
            leader_commit,
        }
    }

    pub fn is_heartbeat(&self) -> bool {
        self.entries.is_empty()
    }

    /// Highest index the follower holds once this request succeeds.
    pub fn last_index(&self) -> u64 {
        self.prev_log_index + self.entries.len() as u64
    }
}

/// `success` is false for a stale term or a failed consistency check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppendEntriesResponse {
    pub term: u64,
    pub success: bool,
}

impl AppendEntriesResponse {
    pub fn success(term: u64) -> Self {
        Self {
            term,
            success: true,
        }
    }

    pub fn failure(term: u64) -> Self {
        Self {
            term,
            success: false,
        }
    }
}

// ---- client replies ----

/// Outcome of a client write, carried on the wire as
/// `OK`, `IN_PROGRESS` or `NOT_LEADER:<leader id>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum ClientPutResult {
    Ok,
    InProgress,
    /// Empty when no leader is known.
    NotLeader(String),
}

const NOT_LEADER_PREFIX: &str = "NOT_LEADER:";

impl std::fmt::Display for ClientPutResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientPutResult::Ok => write!(f, "OK"),
            ClientPutResult::InProgress => write!(f, "IN_PROGRESS"),
            ClientPutResult::NotLeader(leader) => write!(f, "{NOT_LEADER_PREFIX}{leader}"),
        }
    }
}

impl std::str::FromStr for ClientPutResult {
    type Err = ParseReplyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OK" => Ok(ClientPutResult::Ok),
            "IN_PROGRESS" => Ok(ClientPutResult::InProgress),
            other => other
                .strip_prefix(NOT_LEADER_PREFIX)
                .map(|leader| ClientPutResult::NotLeader(leader.to_string()))
                .ok_or_else(|| ParseReplyError(other.to_string())),
        }
    }
}

impl From<ClientPutResult> for String {
    fn from(result: ClientPutResult) -> Self {
        result.to_string()
    }
}

impl TryFrom<String> for ClientPutResult {
    type Error = ParseReplyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
