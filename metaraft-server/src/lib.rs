//! Network runtime for a metaraft node: the TCP listener shared by peers
//! and clients, the outbound peer client, and the election and replication
//! tasks that drive `metaraft_core::RaftNode`.

pub mod cluster_config;
pub mod cluster_node;
pub mod error;
pub mod peer_client;
pub mod protocol;
pub mod raft_handler;
pub mod raft_tick_loop;
pub mod server;

pub use cluster_config::ClusterConfig;
pub use cluster_node::ClusterNode;
pub use error::{ConfigError, PeerError, ProtocolError, ServerError};
pub use peer_client::{PeerClient, TcpPeerClient};
pub use protocol::{Request, Response};
