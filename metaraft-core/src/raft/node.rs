use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{NotLeader, ProposeError, WalError};
use crate::raft::log::{LogEntry, MergeOutcome, RaftLog};
use crate::raft::message::{
    AppendEntriesRequest, AppendEntriesResponse, RequestVoteRequest, RequestVoteResponse,
};
use crate::raft::state::{
    ElectionConfig, ElectionTimer, LeaderState, NodeState, PersistentState, Role, VolatileState,
};
use crate::storage::command::Command;
use crate::storage::engine::MetadataStore;
use crate::storage::wal::{MemoryWal, WalRecord, WriteAheadLog};

/// Where a proposed command landed in the leader's log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Proposal {
    pub index: u64,
    pub term: u64,
}

/// Point-in-time view of a node, for operators and tests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeStatus {
    pub id: String,
    pub state: NodeState,
    pub term: u64,
    pub leader: Option<String>,
    pub commit_index: u64,
    pub last_applied: u64,
    pub log_len: u64,
}

/// The consensus engine for one node.
///
/// Single writer of every piece of Raft state. It performs no I/O: callers
/// feed it RPCs and responses and ship the requests it builds.
#[derive(Debug)]
pub struct RaftNode {
    id: String,
    peers: Vec<String>,
    role: Role,
    persistent: PersistentState,
    volatile: VolatileState,
    log: RaftLog,
    current_leader: Option<String>,
    election_timer: ElectionTimer,
    store: MetadataStore,
    wal: Box<dyn WriteAheadLog>,
    /// First write failure since the last sync.
    wal_error: Option<WalError>,
    /// Term or vote changed in memory but the last sync did not cover it.
    hard_state_dirty: bool,
}

impl RaftNode {
    pub fn new(id: String, peers: Vec<String>) -> Self {
        Self::with_config(id, peers, ElectionConfig::default())
    }

    pub fn with_config(id: String, peers: Vec<String>, config: ElectionConfig) -> Self {
        Self::with_storage(id, peers, config, MetadataStore::new(), Box::new(MemoryWal::new()))
    }

    pub fn with_storage(
        id: String,
        peers: Vec<String>,
        config: ElectionConfig,
        store: MetadataStore,
        wal: Box<dyn WriteAheadLog>,
    ) -> Self {
        Self {
            id,
            peers,
            role: Role::Follower,
            persistent: PersistentState::new(),
            volatile: VolatileState::new(),
            log: RaftLog::new(),
            current_leader: None,
            election_timer: ElectionTimer::new(config),
            store,
            wal,
            wal_error: None,
            hard_state_dirty: false,
        }
    }

    // ==================== State Queries ====================

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn peers(&self) -> &[String] {
        &self.peers
    }

    pub fn state(&self) -> NodeState {
        self.role.state()
    }

    pub fn is_leader(&self) -> bool {
        matches!(self.role, Role::Leader(_))
    }

    pub fn is_candidate(&self) -> bool {
        matches!(self.role, Role::Candidate { .. })
    }

    pub fn is_follower(&self) -> bool {
        matches!(self.role, Role::Follower)
    }

    pub fn current_term(&self) -> u64 {
        self.persistent.current_term
    }

    pub fn voted_for(&self) -> Option<&str> {
        self.persistent.voted_for.as_deref()
    }

    pub fn current_leader(&self) -> Option<&str> {
        self.current_leader.as_deref()
    }

    pub fn commit_index(&self) -> u64 {
        self.volatile.commit_index
    }

    pub fn last_applied(&self) -> u64 {
        self.volatile.last_applied
    }

    pub fn log(&self) -> &RaftLog {
        &self.log
    }

    pub fn store(&self) -> &MetadataStore {
        &self.store
    }

    pub fn cluster_size(&self) -> usize {
        self.peers.len() + 1
    }

    pub fn quorum_size(&self) -> usize {
        (self.cluster_size() / 2) + 1
    }

    pub fn next_index(&self, peer: &str) -> Option<u64> {
        match &self.role {
            Role::Leader(leader) => leader.next_index(peer),
            Role::Follower | Role::Candidate { .. } => None,
        }
    }

    pub fn match_index(&self, peer: &str) -> Option<u64> {
        match &self.role {
            Role::Leader(leader) => leader.match_index(peer),
            Role::Follower | Role::Candidate { .. } => None,
        }
    }

    /// Reads applied state only; never the uncommitted tail.
    pub fn get(&self, key: &str) -> Option<String> {
        self.store.get(key)
    }

    pub fn status(&self) -> NodeStatus {
        NodeStatus {
            id: self.id.clone(),
            state: self.state(),
            term: self.current_term(),
            leader: self.current_leader.clone(),
            commit_index: self.commit_index(),
            last_applied: self.last_applied(),
            log_len: self.log.len() as u64,
        }
    }

    // ==================== State Transitions ====================

    /// Adopts a newer term and reverts to follower. Re-arms the election timer.
    pub fn step_down(&mut self, term: u64) {
        if self.persistent.update_term(term) {
            self.record_hard_state();
            self.current_leader = None;
        }
        self.become_follower();
    }

    fn become_follower(&mut self) {
        match &self.role {
            Role::Leader(_) => info!(node = %self.id, term = self.current_term(), "stepping down from leader"),
            Role::Candidate { .. } => debug!(node = %self.id, term = self.current_term(), "abandoning candidacy"),
            Role::Follower => {}
        }
        self.role = Role::Follower;
        self.election_timer.reset();
    }

    fn become_leader(&mut self) {
        self.role = Role::Leader(LeaderState::new(&self.peers, self.log.len() as u64));
        self.current_leader = Some(self.id.clone());
        info!(node = %self.id, term = self.current_term(), "became leader");
    }

    // ==================== Election Handling ====================

    /// Leaders never time out.
    pub fn should_start_election(&self) -> bool {
        !self.is_leader() && self.election_timer.is_expired()
    }

    pub fn election_timeout_remaining(&self) -> Duration {
        self.election_timer.remaining()
    }

    /// Starts a new election and returns the RequestVote to broadcast, or
    /// `None` if the self-vote could not be persisted.
    ///
    /// A node without peers wins immediately.
    pub fn start_election(&mut self) -> Option<RequestVoteRequest> {
        self.persistent.current_term += 1;
        self.persistent.voted_for = Some(self.id.clone());
        self.record_hard_state();

        self.role = Role::Candidate {
            votes: HashSet::from([self.id.clone()]),
        };
        self.current_leader = None;
        self.election_timer.reset();

        if !self.flush() {
            self.become_follower();
            return None;
        }

        info!(node = %self.id, term = self.current_term(), "starting election");
        if self.quorum_size() <= 1 {
            self.become_leader();
        }

        Some(RequestVoteRequest::new(
            self.current_term(),
            self.id.clone(),
            self.log.last_index(),
            self.log.last_term(),
        ))
    }

    /// Answers a candidate's vote request for this term.
    pub fn handle_request_vote(&mut self, request: &RequestVoteRequest) -> RequestVoteResponse {
        if request.term < self.current_term() {
            return RequestVoteResponse::denied(self.current_term());
        }

        if request.term > self.current_term() {
            self.step_down(request.term);
        }

        let log_ok = self.log.is_up_to_date(request.last_log_term, request.last_log_index);
        let granted = log_ok && self.persistent.can_vote_for(&request.candidate_id);

        if granted && self.voted_for() != Some(request.candidate_id.as_str()) {
            self.persistent.voted_for = Some(request.candidate_id.clone());
            self.record_hard_state();
        }

        if !self.flush() || !granted {
            debug!(
                node = %self.id,
                candidate = %request.candidate_id,
                term = self.current_term(),
                log_ok,
                "vote denied"
            );
            return RequestVoteResponse::denied(self.current_term());
        }

        self.election_timer.reset();
        debug!(node = %self.id, candidate = %request.candidate_id, term = self.current_term(), "vote granted");
        RequestVoteResponse::granted(self.current_term())
    }

    /// Counts a vote reply for the election started in `election_term`.
    /// Returns true if this reply made the node leader.
    pub fn handle_request_vote_response(
        &mut self,
        peer: &str,
        election_term: u64,
        response: &RequestVoteResponse,
    ) -> bool {
        if response.term > self.current_term() {
            self.step_down(response.term);
            self.flush();
            return false;
        }

        if election_term != self.current_term() || !response.vote_granted {
            return false;
        }

        let quorum = self.quorum_size();
        let won = match &mut self.role {
            Role::Candidate { votes } => {
                votes.insert(peer.to_string());
                votes.len() >= quorum
            }
            Role::Follower | Role::Leader(_) => return false,
        };

        if won {
            self.become_leader();
        }
        won
    }

    // ==================== Log Replication ====================

    /// Builds the AppendEntries for `peer` from its `nextIndex`: everything
    /// from there to the end of the log, or a heartbeat if it is caught up.
    pub fn replication_request(&self, peer: &str) -> Option<AppendEntriesRequest> {
        let Role::Leader(leader) = &self.role else {
            return None;
        };
        let next_index = leader.next_index(peer)?;
        let prev_log_index = next_index.saturating_sub(1);
        let prev_log_term = self.log.term_at(prev_log_index).unwrap_or(0);

        Some(AppendEntriesRequest {
            term: self.current_term(),
            leader_id: self.id.clone(),
            prev_log_index,
            prev_log_term,
            entries: self.log.entries_from(next_index),
            leader_commit: self.commit_index(),
        })
    }

    /// One request per peer, as sent on every heartbeat tick.
    pub fn replication_requests(&self) -> Vec<(String, AppendEntriesRequest)> {
        self.peers
            .iter()
            .filter_map(|peer| self.replication_request(peer).map(|req| (peer.clone(), req)))
            .collect()
    }

    /// Accepts or rejects a leader's append, merging entries on a match.
    pub fn handle_append_entries(&mut self, request: &AppendEntriesRequest) -> AppendEntriesResponse {
        if request.term < self.current_term() {
            return AppendEntriesResponse::failure(self.current_term());
        }

        if self.persistent.update_term(request.term) {
            self.record_hard_state();
        }
        self.become_follower();
        self.current_leader = Some(request.leader_id.clone());

        if !self.log.matches(request.prev_log_index, request.prev_log_term) {
            debug!(
                node = %self.id,
                prev_log_index = request.prev_log_index,
                prev_log_term = request.prev_log_term,
                last_index = self.log.last_index(),
                "log mismatch"
            );
            self.flush();
            return AppendEntriesResponse::failure(self.current_term());
        }

        let outcome = self.log.merge_from(request.prev_log_index, &request.entries);
        self.record_merge(request, outcome);

        if !self.flush() {
            if let Some(from) = outcome.appended_from {
                self.discard_from(from);
            }
            return AppendEntriesResponse::failure(self.current_term());
        }

        if request.leader_commit > self.commit_index() {
            let new_commit = request.leader_commit.min(request.last_index());
            if self.volatile.update_commit_index(new_commit) {
                self.apply_committed();
            }
        }

        AppendEntriesResponse::success(self.current_term())
    }

    /// Folds a peer's reply to `request` into `nextIndex`/`matchIndex`.
    pub fn handle_append_entries_response(
        &mut self,
        peer: &str,
        request: &AppendEntriesRequest,
        response: &AppendEntriesResponse,
    ) {
        if response.term > self.current_term() {
            self.step_down(response.term);
            self.flush();
            return;
        }

        if request.term != self.current_term() {
            return;
        }

        let Role::Leader(leader) = &mut self.role else {
            return;
        };

        if response.success {
            leader.record_success(peer, request.last_index());
            self.advance_commit_index();
        } else if leader.next_index(peer) == Some(request.prev_log_index + 1) {
            // only back off once per probe; stale rejections are ignored
            leader.decrement_next_index(peer);
            debug!(node = %self.id, peer, next_index = ?leader.next_index(peer), "backing off nextIndex");
        }
    }

    /// Commits the highest index stored on a majority whose entry is from the
    /// current term. Scans upward and stops at the first index short of a
    /// majority. Returns whether the commit index moved.
    pub fn advance_commit_index(&mut self) -> bool {
        let Role::Leader(leader) = &self.role else {
            return false;
        };

        let mut new_commit = self.commit_index();
        for index in (self.commit_index() + 1)..=self.log.last_index() {
            if 1 + leader.replicated_on(index) < self.quorum_size() {
                break;
            }
            if self.log.term_at(index) == Some(self.current_term()) {
                new_commit = index;
            }
        }

        if !self.volatile.update_commit_index(new_commit) {
            return false;
        }
        debug!(node = %self.id, commit_index = new_commit, "advanced commit index");
        self.apply_committed();
        true
    }

    // ==================== Client Request Handling ====================

    /// Appends `command` to the leader's log at the current term.
    ///
    /// The entry is synced before the leader counts itself toward a quorum
    /// for it; if the sync fails the entry is removed again.
    pub fn propose(&mut self, command: &Command) -> Result<Proposal, ProposeError> {
        if !self.is_leader() {
            return Err(NotLeader {
                leader: self.current_leader.clone(),
            }
            .into());
        }

        let term = self.current_term();
        let index = self.log.append(term, command.to_string());
        self.record(WalRecord::Append {
            start: index,
            entries: vec![LogEntry::new(term, command.to_string())],
        });
        if let Err(e) = self.sync_wal() {
            self.discard_from(index);
            return Err(ProposeError::Wal(e));
        }
        debug!(node = %self.id, index, term, %command, "appended client command");

        // a single-node cluster commits right away
        self.advance_commit_index();
        Ok(Proposal { index, term })
    }

    /// True once `proposal` is committed with the entry it was made with.
    pub fn is_committed(&self, proposal: Proposal) -> bool {
        self.commit_index() >= proposal.index && self.log.term_at(proposal.index) == Some(proposal.term)
    }

    // ==================== State Machine Application ====================

    fn apply_committed(&mut self) {
        while self.volatile.last_applied < self.volatile.commit_index {
            let index = self.volatile.last_applied + 1;
            if let Some(entry) = self.log.get(index) {
                match Command::parse(&entry.command) {
                    Ok(command) => {
                        self.store.apply(&command);
                        debug!(node = %self.id, index, %command, "applied");
                    }
                    Err(e) => warn!(
                        node = %self.id,
                        index,
                        command = %entry.command,
                        error = %e,
                        "skipping malformed command"
                    ),
                }
            }
            self.volatile.last_applied = index;
        }
    }

    // ==================== Write-ahead Log ====================

    fn record_hard_state(&mut self) {
        self.record(WalRecord::HardState {
            term: self.persistent.current_term,
            voted_for: self.persistent.voted_for.clone(),
        });
    }

    fn record_merge(&mut self, request: &AppendEntriesRequest, outcome: MergeOutcome) {
        if let Some(from) = outcome.truncated_from {
            self.record(WalRecord::Truncate { from });
        }
        if let Some(start) = outcome.appended_from {
            let skip = (start - request.prev_log_index - 1) as usize;
            self.record(WalRecord::Append {
                start,
                entries: request.entries[skip..].to_vec(),
            });
        }
    }

    fn record(&mut self, record: WalRecord) {
        if let Err(e) = self.wal.write(record) {
            warn!(node = %self.id, error = %e, "failed to write to write-ahead log");
            self.wal_error.get_or_insert(e);
        }
    }

    /// Removes log entries from `from` on after they failed to persist, so the
    /// log never acknowledges an entry the write-ahead log may not hold. The
    /// matching `Truncate` goes out with the next sync.
    fn discard_from(&mut self, from: u64) {
        warn!(node = %self.id, from, last_index = self.log.last_index(), "discarding unsynced log entries");
        self.log.truncate(from);
        self.record(WalRecord::Truncate { from });
    }

    /// Syncs the write-ahead log. Fails if the sync fails or any record
    /// written since the last sync was lost. Term and vote are written again
    /// on the next sync after a failure.
    fn sync_wal(&mut self) -> Result<(), WalError> {
        if std::mem::take(&mut self.hard_state_dirty) {
            self.record_hard_state();
        }
        let written = match self.wal_error.take() {
            Some(e) => Err(e),
            None => Ok(()),
        };
        let result = written.and(self.wal.sync().map_err(|e| {
            warn!(node = %self.id, error = %e, "failed to sync write-ahead log");
            e
        }));
        if result.is_err() {
            self.hard_state_dirty = true;
        }
        result
    }

    fn flush(&mut self) -> bool {
        self.sync_wal().is_ok()
    }
}
