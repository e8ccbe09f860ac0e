use thiserror::Error;

/// A log command that could not be interpreted by the state machine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("empty command")]
    Empty,
    #[error("unknown operation `{0}`")]
    UnknownOperation(String),
    #[error("{op} expects {expected}")]
    WrongArity { op: &'static str, expected: &'static str },
}

/// The write-ahead log refused or failed to persist a record.
#[derive(Error, Debug)]
pub enum WalError {
    #[error("write-ahead log I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("write-ahead log is closed")]
    Closed,
}

/// A write was submitted to a node that is not the leader.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("not the leader (leader: {})", leader.as_deref().unwrap_or("unknown"))]
pub struct NotLeader {
    pub leader: Option<String>,
}

/// Why a client command was not appended to the log.
#[derive(Error, Debug)]
pub enum ProposeError {
    #[error(transparent)]
    NotLeader(#[from] NotLeader),
    #[error("command was not persisted: {0}")]
    Wal(#[from] WalError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unrecognised client reply `{0}`")]
pub struct ParseReplyError(pub String);
