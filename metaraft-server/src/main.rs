use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use metaraft_server::cluster_config::parse_peers;
use metaraft_server::{server, ClusterConfig, ClusterNode, TcpPeerClient};

/// One node of the replicated metadata store. Flags override the
/// environment (`LISTEN_ADDR`, `PEERS`, `NODE_ID`, ...).
#[derive(Parser, Debug)]
#[command(name = "metaraft-node", version, about)]
struct Args {
    /// Address to listen on for peers and clients
    #[arg(long)]
    listen: Option<String>,

    /// Comma separated peer addresses
    #[arg(long)]
    peers: Option<String>,

    /// Node id; defaults to the listen address
    #[arg(long)]
    node_id: Option<String>,

    #[arg(long)]
    election_timeout_min_ms: Option<u64>,

    #[arg(long)]
    election_timeout_max_ms: Option<u64>,

    #[arg(long)]
    heartbeat_interval_ms: Option<u64>,

    #[arg(long)]
    rpc_timeout_ms: Option<u64>,

    #[arg(long)]
    client_put_timeout_ms: Option<u64>,
}

impl Args {
    fn into_config(self) -> anyhow::Result<ClusterConfig> {
        let mut config = ClusterConfig::from_env().context("reading configuration from the environment")?;

        if let Some(listen) = self.listen {
            if self.node_id.is_none() && std::env::var("NODE_ID").is_err() {
                config.node_id = listen.clone();
            }
            config.listen_addr = listen;
        }
        if let Some(peers) = self.peers {
            config.peers = parse_peers(&peers);
        }
        if let Some(node_id) = self.node_id {
            config.node_id = node_id;
        }
        if let Some(ms) = self.election_timeout_min_ms {
            config.election.min_timeout_ms = ms;
        }
        if let Some(ms) = self.election_timeout_max_ms {
            config.election.max_timeout_ms = ms;
        }
        if let Some(ms) = self.heartbeat_interval_ms {
            config.election.heartbeat_interval_ms = ms;
        }
        if let Some(ms) = self.rpc_timeout_ms {
            config.rpc_timeout_ms = ms;
        }
        if let Some(ms) = self.client_put_timeout_ms {
            config.client_put_timeout_ms = ms;
        }

        config.validate().context("invalid configuration")?;
        Ok(config)
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_target(false).try_init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let config = Args::parse().into_config()?;

    let listener = server::bind(&config.listen_addr).await?;
    info!(node = %config.node_id, addr = %config.listen_addr, peers = ?config.peers, "listening");

    let peers = Arc::new(TcpPeerClient::new(config.rpc_timeout()));
    let node = ClusterNode::new(config, peers);
    node.start();

    tokio::select! {
        result = server::run(listener, Arc::clone(&node)) => result?,
        _ = tokio::signal::ctrl_c() => info!(node = %node.id(), "shutting down"),
    }
    node.shutdown();
    Ok(())
}
