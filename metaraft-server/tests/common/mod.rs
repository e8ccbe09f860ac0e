#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use metaraft_core::{AppendEntriesRequest, AppendEntriesResponse, RequestVoteRequest, RequestVoteResponse};
use metaraft_server::{ClusterConfig, ClusterNode, PeerClient};
use parking_lot::RwLock;

/// In-process transport: nodes register here and call each other directly.
/// Links can be cut to simulate partitions.
#[derive(Default)]
pub struct LocalNetwork {
    nodes: RwLock<HashMap<String, Arc<ClusterNode>>>,
    isolated: RwLock<HashSet<String>>,
}

impl LocalNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn register(&self, node: Arc<ClusterNode>) {
        self.nodes.write().insert(node.id().to_string(), node);
    }

    /// The transport `from` uses to reach its peers.
    pub fn client_for(self: &Arc<Self>, from: &str) -> Arc<dyn PeerClient> {
        Arc::new(LocalPeerClient {
            network: Arc::downgrade(self),
            from: from.to_string(),
        })
    }

    /// Drops every RPC to or from `id`.
    pub fn isolate(&self, id: &str) {
        self.isolated.write().insert(id.to_string());
    }

    pub fn heal(&self, id: &str) {
        self.isolated.write().remove(id);
    }

    fn route(&self, from: &str, to: &str) -> Option<Arc<ClusterNode>> {
        let isolated = self.isolated.read();
        if isolated.contains(from) || isolated.contains(to) {
            return None;
        }
        self.nodes.read().get(to).cloned()
    }
}

struct LocalPeerClient {
    network: Weak<LocalNetwork>,
    from: String,
}

#[async_trait]
impl PeerClient for LocalPeerClient {
    async fn request_vote(&self, peer: &str, request: RequestVoteRequest) -> Option<RequestVoteResponse> {
        tokio::task::yield_now().await;
        let target = self.network.upgrade()?.route(&self.from, peer)?;
        Some(target.handle_request_vote(&request))
    }

    async fn append_entries(&self, peer: &str, request: AppendEntriesRequest) -> Option<AppendEntriesResponse> {
        tokio::task::yield_now().await;
        let target = self.network.upgrade()?.route(&self.from, peer)?;
        Some(target.handle_append_entries(&request))
    }
}

/// A started cluster of `n` nodes named `n1`..`nN` on a [`LocalNetwork`].
pub struct TestCluster {
    pub network: Arc<LocalNetwork>,
    pub nodes: Vec<Arc<ClusterNode>>,
}

impl TestCluster {
    pub fn start(n: usize) -> Self {
        let network = LocalNetwork::new();
        let ids: Vec<String> = (1..=n).map(|i| format!("n{i}")).collect();

        let nodes: Vec<Arc<ClusterNode>> = ids
            .iter()
            .map(|id| {
                let peers = ids.iter().filter(|p| *p != id).cloned().collect();
                let node = ClusterNode::new(ClusterConfig::new(id.clone(), peers), network.client_for(id));
                network.register(Arc::clone(&node));
                node
            })
            .collect();

        for node in &nodes {
            node.start();
        }
        Self { network, nodes }
    }

    pub fn node(&self, id: &str) -> Arc<ClusterNode> {
        self.nodes
            .iter()
            .find(|n| n.id() == id)
            .cloned()
            .unwrap_or_else(|| panic!("no node {id}"))
    }

    pub fn leaders(&self) -> Vec<Arc<ClusterNode>> {
        self.nodes.iter().filter(|n| n.is_leader()).cloned().collect()
    }

    /// Waits until exactly one node among `candidates` leads.
    pub async fn wait_for_leader_among(&self, candidates: &[Arc<ClusterNode>], within: Duration) -> Option<Arc<ClusterNode>> {
        let deadline = tokio::time::Instant::now() + within;
        while tokio::time::Instant::now() < deadline {
            let leaders: Vec<_> = candidates.iter().filter(|n| n.is_leader()).collect();
            if leaders.len() == 1 {
                return Some(Arc::clone(leaders[0]));
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        None
    }

    pub async fn wait_for_leader(&self, within: Duration) -> Option<Arc<ClusterNode>> {
        self.wait_for_leader_among(&self.nodes, within).await
    }

    pub fn shutdown(&self) {
        for node in &self.nodes {
            node.shutdown();
        }
    }
}

impl Drop for TestCluster {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Polls `check` every 10 ms until it holds or `within` elapses.
pub async fn eventually(within: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + within;
    loop {
        if check() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
