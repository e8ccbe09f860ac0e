//! Wire formats accepted on the node's listener.
//!
//! Peers and programs speak newline-delimited JSON ([`Request`] /
//! [`Response`]). Operators can type the plain-text line protocol instead:
//!
//! ```text
//! PUT <key> <value>   -> OK | IN_PROGRESS | NOT_LEADER:<leader id>
//! GET <key>           -> <value>, or an empty line
//! DELETE <key>        -> OK | IN_PROGRESS | NOT_LEADER:<leader id>
//! STATUS              -> node=<id> state=<role> term=<n> ...
//! ```

use metaraft_core::{
    AppendEntriesRequest, AppendEntriesResponse, ClientPutResult, NodeStatus, RequestVoteRequest,
    RequestVoteResponse,
};
use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Request {
    RequestVote(RequestVoteRequest),
    AppendEntries(AppendEntriesRequest),
    ClientPut { key: String, value: String },
    ClientGet { key: String },
    ClientDelete { key: String },
    Status,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Response {
    RequestVote(RequestVoteResponse),
    AppendEntries(AppendEntriesResponse),
    ClientPut { result: ClientPutResult },
    /// Empty when the key is absent.
    ClientGet { value: String },
    ClientDelete { result: ClientPutResult },
    Status(NodeStatus),
    Error { message: String },
}

impl Response {
    pub fn error(err: impl std::fmt::Display) -> Self {
        Response::Error {
            message: err.to_string(),
        }
    }
}

impl Request {
    /// Rejects client keys the text form could not carry. Raft RPCs always pass.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        match self {
            Request::ClientPut { key, .. } | Request::ClientGet { key } | Request::ClientDelete { key } => {
                validate_key(key)
            }
            Request::RequestVote(_) | Request::AppendEntries(_) | Request::Status => Ok(()),
        }
    }
}

pub fn validate_key(key: &str) -> Result<(), ProtocolError> {
    if key.is_empty() || key.chars().any(char::is_whitespace) {
        return Err(ProtocolError::InvalidKey(key.to_string()));
    }
    Ok(())
}

pub fn parse_json(line: &str) -> Result<Request, ProtocolError> {
    let request: Request = serde_json::from_str(line)?;
    request.validate()?;
    Ok(request)
}

/// Parses one line of the text protocol. A PUT value runs to the end of the
/// line and may contain spaces.
pub fn parse_text(line: &str) -> Result<Request, ProtocolError> {
    let line = line.trim_end_matches(['\r', '\n']).trim_start();
    if line.trim().is_empty() {
        return Err(ProtocolError::Empty);
    }

    let (op, rest) = line.split_once(' ').unwrap_or((line, ""));
    let request = match op.to_uppercase().as_str() {
        "PUT" => match rest.split_once(' ') {
            Some((key, value)) if !key.is_empty() => Request::ClientPut {
                key: key.to_string(),
                value: value.to_string(),
            },
            _ => return Err(ProtocolError::Usage("PUT <key> <value>")),
        },
        "GET" => Request::ClientGet {
            key: single_key(rest, "GET <key>")?,
        },
        "DELETE" => Request::ClientDelete {
            key: single_key(rest, "DELETE <key>")?,
        },
        "STATUS" if rest.trim().is_empty() => Request::Status,
        "STATUS" => return Err(ProtocolError::Usage("STATUS")),
        other => return Err(ProtocolError::UnknownCommand(other.to_string())),
    };

    request.validate()?;
    Ok(request)
}

fn single_key(rest: &str, usage: &'static str) -> Result<String, ProtocolError> {
    let key = rest.trim();
    if key.is_empty() || key.contains(char::is_whitespace) {
        return Err(ProtocolError::Usage(usage));
    }
    Ok(key.to_string())
}

/// Renders a response as one line of the text protocol, without the newline.
pub fn render_text(response: &Response) -> String {
    match response {
        Response::ClientPut { result } | Response::ClientDelete { result } => result.to_string(),
        Response::ClientGet { value } => value.clone(),
        Response::Status(status) => format!(
            "node={} state={} term={} leader={} commit_index={} last_applied={} log_len={}",
            status.id,
            status.state,
            status.term,
            status.leader.as_deref().unwrap_or("-"),
            status.commit_index,
            status.last_applied,
            status.log_len,
        ),
        Response::Error { message } => format!("ERROR: {message}"),
        Response::RequestVote(resp) => format!("term={} vote_granted={}", resp.term, resp.vote_granted),
        Response::AppendEntries(resp) => format!("term={} success={}", resp.term, resp.success),
    }
}
