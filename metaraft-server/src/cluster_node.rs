use std::collections::HashMap;
use std::sync::Arc;

use metaraft_core::{
    AppendEntriesRequest, AppendEntriesResponse, ClientPutResult, Command, MemoryWal, MetadataStore,
    NodeStatus, NotLeader, ProposeError, RaftNode, RequestVoteRequest, RequestVoteResponse, WalError,
    WriteAheadLog,
};
use parking_lot::Mutex;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cluster_config::ClusterConfig;
use crate::peer_client::PeerClient;
use crate::raft_tick_loop::{run_election_loop, run_replicator};

/// Cluster node - wraps the consensus engine with its network runtime.
///
/// Every touch of Raft state goes through `raft`, a synchronous lock that is
/// never held across an `.await`: requests are built under it, sent without
/// it and their replies re-checked under it.
pub struct ClusterNode {
    raft: Mutex<RaftNode>,
    store: MetadataStore,
    config: ClusterConfig,
    peers: Arc<dyn PeerClient>,
    /// One wake-up handle per peer replicator.
    replicators: HashMap<String, Arc<Notify>>,
    commit_tx: watch::Sender<u64>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl ClusterNode {
    pub fn new(config: ClusterConfig, peers: Arc<dyn PeerClient>) -> Arc<Self> {
        Self::with_wal(config, peers, Box::new(MemoryWal::new()))
    }

    pub fn with_wal(config: ClusterConfig, peers: Arc<dyn PeerClient>, wal: Box<dyn WriteAheadLog>) -> Arc<Self> {
        let store = MetadataStore::new();
        let raft = RaftNode::with_storage(
            config.node_id.clone(),
            config.peers.clone(),
            config.election.clone(),
            store.clone(),
            wal,
        );
        let replicators = config
            .peers
            .iter()
            .map(|peer| (peer.clone(), Arc::new(Notify::new())))
            .collect();
        let (commit_tx, _) = watch::channel(0);

        Arc::new(Self {
            raft: Mutex::new(raft),
            store,
            config,
            peers,
            replicators,
            commit_tx,
            tasks: Mutex::new(Vec::new()),
        })
    }

    /// Spawns the election loop and one replicator per peer.
    pub fn start(self: &Arc<Self>) {
        let mut tasks = self.tasks.lock();
        tasks.push(tokio::spawn(run_election_loop(Arc::clone(self))));
        for (peer, kick) in &self.replicators {
            tasks.push(tokio::spawn(run_replicator(Arc::clone(self), peer.clone(), Arc::clone(kick))));
        }
        info!(node = %self.config.node_id, peers = ?self.config.peers, "node started");
    }

    /// Stops the background tasks. RPCs already in flight finish on their own.
    pub fn shutdown(&self) {
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
        info!(node = %self.config.node_id, "node stopped");
    }

    // ==================== Queries ====================

    pub fn id(&self) -> &str {
        &self.config.node_id
    }

    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    pub fn peer_ids(&self) -> &[String] {
        &self.config.peers
    }

    pub fn store(&self) -> &MetadataStore {
        &self.store
    }

    pub fn status(&self) -> NodeStatus {
        self.raft.lock().status()
    }

    pub fn is_leader(&self) -> bool {
        self.raft.lock().is_leader()
    }

    /// Runs `f` against the engine under the node lock.
    pub fn with_raft<R>(&self, f: impl FnOnce(&RaftNode) -> R) -> R {
        let raft = self.raft.lock();
        f(&raft)
    }

    /// Subscribes to the commit index as it advances.
    pub fn watch_commit(&self) -> watch::Receiver<u64> {
        self.commit_tx.subscribe()
    }

    // ==================== Inbound RPCs ====================

    pub fn handle_request_vote(&self, request: &RequestVoteRequest) -> RequestVoteResponse {
        self.raft.lock().handle_request_vote(request)
    }

    pub fn handle_append_entries(&self, request: &AppendEntriesRequest) -> AppendEntriesResponse {
        let (response, commit_index) = {
            let mut raft = self.raft.lock();
            let response = raft.handle_append_entries(request);
            (response, raft.commit_index())
        };
        self.publish_commit(commit_index);
        response
    }

    // ==================== Client Operations ====================

    /// Fails only when the leader could not persist the command; it is then
    /// not in the log at all.
    pub async fn client_put(&self, key: String, value: String) -> Result<ClientPutResult, WalError> {
        self.submit(Command::put(key, value)).await
    }

    pub async fn client_delete(&self, key: String) -> Result<ClientPutResult, WalError> {
        self.submit(Command::delete(key)).await
    }

    /// Served from applied state on whichever node is asked.
    pub fn client_get(&self, key: &str) -> String {
        self.store.get(key).unwrap_or_default()
    }

    /// Appends `command` and waits a bounded time for it to commit. The
    /// replicators do all of the sending.
    async fn submit(&self, command: Command) -> Result<ClientPutResult, WalError> {
        let proposed = {
            let mut raft = self.raft.lock();
            raft.propose(&command).map(|proposal| (proposal, raft.commit_index()))
        };
        let (proposal, commit_index) = match proposed {
            Ok(proposed) => proposed,
            Err(ProposeError::NotLeader(NotLeader { leader })) => {
                return Ok(ClientPutResult::NotLeader(leader.unwrap_or_default()))
            }
            Err(ProposeError::Wal(e)) => {
                warn!(node = %self.config.node_id, key = command.key(), error = %e, "client write rejected");
                return Err(e);
            }
        };

        self.publish_commit(commit_index);
        self.kick_replicators();

        let mut commit_rx = self.commit_tx.subscribe();
        let wait = commit_rx.wait_for(|&commit| commit >= proposal.index);
        let committed = matches!(tokio::time::timeout(self.config.client_put_timeout(), wait).await, Ok(Ok(_)));
        if !committed {
            debug!(
                node = %self.config.node_id,
                key = command.key(),
                index = proposal.index,
                "client write still pending"
            );
            return Ok(ClientPutResult::InProgress);
        }

        let raft = self.raft.lock();
        if raft.is_committed(proposal) {
            Ok(ClientPutResult::Ok)
        } else {
            // a newer leader overwrote the entry
            Ok(ClientPutResult::NotLeader(raft.current_leader().unwrap_or_default().to_string()))
        }
    }

    // ==================== Outbound RPCs ====================

    /// Starts an election if the deadline has passed. Returns the request to
    /// fan out, if any.
    pub(crate) fn start_election_if_due(&self) -> Option<RequestVoteRequest> {
        let mut raft = self.raft.lock();
        if !raft.should_start_election() {
            return None;
        }
        raft.start_election()
    }

    pub(crate) async fn request_vote_from(&self, peer: &str, request: RequestVoteRequest) {
        let Some(response) = self.peers.request_vote(peer, request.clone()).await else {
            return;
        };
        let won = self
            .raft
            .lock()
            .handle_request_vote_response(peer, request.term, &response);
        if won {
            // announce leadership right away
            self.kick_replicators();
        }
    }

    /// One replication round to `peer`: the only place `nextIndex` and
    /// `matchIndex` move.
    pub(crate) async fn replicate_to(&self, peer: &str) {
        let request = self.raft.lock().replication_request(peer);
        let Some(request) = request else {
            return;
        };
        let Some(response) = self.peers.append_entries(peer, request.clone()).await else {
            return;
        };

        let (advanced, backed_off, commit_index) = {
            let mut raft = self.raft.lock();
            let commit_before = raft.commit_index();
            let next_before = raft.next_index(peer);
            raft.handle_append_entries_response(peer, &request, &response);
            let backed_off = matches!(
                (next_before, raft.next_index(peer)),
                (Some(before), Some(after)) if after < before
            );
            (raft.commit_index() > commit_before, backed_off, raft.commit_index())
        };

        if advanced {
            self.publish_commit(commit_index);
            self.kick_replicators();
        } else if backed_off {
            // probe the lowered nextIndex without waiting for the next tick;
            // other rejections wait for the heartbeat
            self.kick(peer);
        }
    }

    pub fn kick_replicators(&self) {
        for kick in self.replicators.values() {
            kick.notify_one();
        }
    }

    fn kick(&self, peer: &str) {
        if let Some(kick) = self.replicators.get(peer) {
            kick.notify_one();
        }
    }

    fn publish_commit(&self, commit_index: u64) {
        self.commit_tx.send_if_modified(|current| {
            if commit_index > *current {
                *current = commit_index;
                true
            } else {
                false
            }
        });
    }
}

impl std::fmt::Debug for ClusterNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterNode")
            .field("node_id", &self.config.node_id)
            .field("peers", &self.config.peers)
            .finish_non_exhaustive()
    }
}
