//! Write-ahead seam for the state Raft needs to survive a restart:
//! `currentTerm`, `votedFor` and the log.
//!
//! The engine writes a record for every change and calls [`WriteAheadLog::sync`]
//! before answering any RPC or client that depends on it. [`MemoryWal`] keeps
//! the records in process memory only, so a restart still loses everything;
//! a durable backend implements the same trait.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::WalError;
use crate::raft::log::LogEntry;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalRecord {
    HardState {
        term: u64,
        voted_for: Option<String>,
    },
    /// Drop the entry at `from` and everything after it.
    Truncate { from: u64 },
    /// `entries[0]` lands at index `start`, replacing anything from there on.
    Append { start: u64, entries: Vec<LogEntry> },
}

pub trait WriteAheadLog: Send + std::fmt::Debug {
    fn write(&mut self, record: WalRecord) -> Result<(), WalError>;

    /// Makes every record written so far durable.
    fn sync(&mut self) -> Result<(), WalError>;
}

/// In-memory records behind a shared handle; clones observe the same log.
#[derive(Debug, Clone, Default)]
pub struct MemoryWal {
    inner: Arc<Mutex<MemoryWalInner>>,
}

#[derive(Debug, Default)]
struct MemoryWalInner {
    records: Vec<WalRecord>,
    synced: usize,
}

impl MemoryWal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<WalRecord> {
        self.inner.lock().records.clone()
    }

    /// Records written but not yet covered by a `sync`.
    pub fn pending(&self) -> usize {
        let inner = self.inner.lock();
        inner.records.len() - inner.synced
    }
}

impl WriteAheadLog for MemoryWal {
    fn write(&mut self, record: WalRecord) -> Result<(), WalError> {
        self.inner.lock().records.push(record);
        Ok(())
    }

    fn sync(&mut self) -> Result<(), WalError> {
        let mut inner = self.inner.lock();
        inner.synced = inner.records.len();
        Ok(())
    }
}
