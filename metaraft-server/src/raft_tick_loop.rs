use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use crate::cluster_node::ClusterNode;

/// How often the election deadline is checked.
pub const ELECTION_TICK: Duration = Duration::from_millis(10);

/// Starts elections when the deadline passes and fans RequestVote out, one
/// task per peer so a dead peer never holds up the others.
pub async fn run_election_loop(node: Arc<ClusterNode>) {
    let mut ticker = tokio::time::interval(ELECTION_TICK);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;

        let Some(request) = node.start_election_if_due() else {
            continue;
        };
        debug!(node = %node.id(), term = request.term, "requesting votes");

        for peer in node.peer_ids() {
            let node = Arc::clone(&node);
            let peer = peer.clone();
            let request = request.clone();
            tokio::spawn(async move {
                node.request_vote_from(&peer, request).await;
            });
        }
    }
}

/// Keeps one peer in sync with the leader's log. Runs a round every
/// heartbeat interval, or sooner when kicked; sends nothing while the node
/// is not leader.
///
/// Rounds for a peer never overlap, so at most one AppendEntries per peer
/// is in flight.
pub async fn run_replicator(node: Arc<ClusterNode>, peer: String, kick: Arc<Notify>) {
    let mut ticker = tokio::time::interval(node.config().election.heartbeat_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = kick.notified() => {}
        }
        node.replicate_to(&peer).await;
    }
}
