use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use rand::Rng;
use serde::{Deserialize, Serialize};

/// A node's role with the payload stripped, for status output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NodeState {
    #[default]
    Follower,
    Candidate,
    Leader,
}

impl std::fmt::Display for NodeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            NodeState::Follower => "Follower",
            NodeState::Candidate => "Candidate",
            NodeState::Leader => "Leader",
        };
        f.write_str(name)
    }
}

/// Role-specific state. Leader bookkeeping only exists while leading.
#[derive(Debug, Clone, Default)]
pub enum Role {
    #[default]
    Follower,
    Candidate { votes: HashSet<String> },
    Leader(LeaderState),
}

impl Role {
    pub fn state(&self) -> NodeState {
        match self {
            Role::Follower => NodeState::Follower,
            Role::Candidate { .. } => NodeState::Candidate,
            Role::Leader(_) => NodeState::Leader,
        }
    }
}

/// Term and vote. Every change is logged ahead before a reply depends on it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistentState {
    pub current_term: u64,
    pub voted_for: Option<String>,
}

impl PersistentState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adopts `term` if it is newer, clearing the vote. Returns whether it changed.
    pub fn update_term(&mut self, term: u64) -> bool {
        if term > self.current_term {
            self.current_term = term;
            self.voted_for = None;
            true
        } else {
            false
        }
    }

    pub fn can_vote_for(&self, candidate_id: &str) -> bool {
        match &self.voted_for {
            None => true,
            Some(voted_for) => voted_for == candidate_id,
        }
    }
}

/// Commit and apply progress; rebuilt from the log after a restart.
#[derive(Debug, Clone, Default)]
pub struct VolatileState {
    pub commit_index: u64,
    pub last_applied: u64,
}

impl VolatileState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raises the commit index; never lowers it.
    pub fn update_commit_index(&mut self, new_index: u64) -> bool {
        if new_index > self.commit_index {
            self.commit_index = new_index;
            true
        } else {
            false
        }
    }
}

/// Per-peer replication progress, rebuilt on every election win.
#[derive(Debug, Clone)]
pub struct LeaderState {
    next_index: HashMap<String, u64>,
    match_index: HashMap<String, u64>,
}

impl LeaderState {
    /// `log_len` is the leader's log length, so every peer starts probing
    /// right after the leader's last entry.
    pub fn new(peers: &[String], log_len: u64) -> Self {
        let next_index = peers.iter().map(|p| (p.clone(), log_len)).collect();
        let match_index = peers.iter().map(|p| (p.clone(), 0)).collect();

        Self {
            next_index,
            match_index,
        }
    }

    pub fn record_success(&mut self, peer: &str, match_idx: u64) {
        let Some(m) = self.match_index.get_mut(peer) else {
            return;
        };
        *m = (*m).max(match_idx);
        let next = *m + 1;
        if let Some(n) = self.next_index.get_mut(peer) {
            *n = next;
        }
    }

    pub fn decrement_next_index(&mut self, peer: &str) {
        if let Some(n) = self.next_index.get_mut(peer) {
            if *n > 1 {
                *n -= 1;
            }
        }
    }

    pub fn next_index(&self, peer: &str) -> Option<u64> {
        self.next_index.get(peer).copied()
    }

    pub fn match_index(&self, peer: &str) -> Option<u64> {
        self.match_index.get(peer).copied()
    }

    /// Peers (leader excluded) whose log is known to reach `index`.
    pub fn replicated_on(&self, index: u64) -> usize {
        self.match_index.values().filter(|&&m| m >= index).count()
    }
}

/// Election and heartbeat timings in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionConfig {
    pub min_timeout_ms: u64,
    pub max_timeout_ms: u64,
    pub heartbeat_interval_ms: u64,
}

impl Default for ElectionConfig {
    fn default() -> Self {
        Self {
            min_timeout_ms: 300,
            max_timeout_ms: 500,
            heartbeat_interval_ms: 150,
        }
    }
}

impl ElectionConfig {
    /// A timeout drawn uniformly from `[min_timeout_ms, max_timeout_ms)`.
    pub fn random_timeout(&self) -> Duration {
        let timeout = if self.max_timeout_ms > self.min_timeout_ms {
            rand::thread_rng().gen_range(self.min_timeout_ms..self.max_timeout_ms)
        } else {
            self.min_timeout_ms
        };
        Duration::from_millis(timeout)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }
}

/// Tracks election timing. Re-arming replaces the single pending deadline.
#[derive(Debug, Clone)]
pub struct ElectionTimer {
    last_reset: Instant,
    timeout: Duration,
    config: ElectionConfig,
}

impl ElectionTimer {
    pub fn new(config: ElectionConfig) -> Self {
        let timeout = config.random_timeout();
        Self {
            last_reset: Instant::now(),
            timeout,
            config,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.last_reset.elapsed() >= self.timeout
    }

    pub fn reset(&mut self) {
        self.last_reset = Instant::now();
        self.timeout = self.config.random_timeout();
    }

    pub fn remaining(&self) -> Duration {
        self.timeout.saturating_sub(self.last_reset.elapsed())
    }
}
