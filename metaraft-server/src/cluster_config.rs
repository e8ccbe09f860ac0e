use std::collections::HashSet;
use std::time::Duration;

use metaraft_core::ElectionConfig;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8001";
pub const DEFAULT_RPC_TIMEOUT_MS: u64 = 100;
pub const DEFAULT_CLIENT_PUT_TIMEOUT_MS: u64 = 300;

/// Cluster configuration - built from CLI flags or the environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Opaque id; other nodes use it as the RPC target, so it is normally
    /// the `host:port` this node listens on.
    pub node_id: String,
    pub listen_addr: String,
    pub peers: Vec<String>,
    pub election: ElectionConfig,
    pub rpc_timeout_ms: u64,
    pub client_put_timeout_ms: u64,
}

impl ClusterConfig {
    /// A node whose id is its listen address.
    pub fn new(listen_addr: impl Into<String>, peers: Vec<String>) -> Self {
        let listen_addr = listen_addr.into();
        Self {
            node_id: listen_addr.clone(),
            listen_addr,
            peers,
            election: ElectionConfig::default(),
            rpc_timeout_ms: DEFAULT_RPC_TIMEOUT_MS,
            client_put_timeout_ms: DEFAULT_CLIENT_PUT_TIMEOUT_MS,
        }
    }

    /// Load from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads `NODE_ID`, `LISTEN_ADDR`, `PEERS` (comma separated),
    /// `ELECTION_TIMEOUT_MIN_MS`, `ELECTION_TIMEOUT_MAX_MS`,
    /// `HEARTBEAT_INTERVAL_MS`, `RPC_TIMEOUT_MS` and `CLIENT_PUT_TIMEOUT_MS`
    /// through `lookup`. Missing values fall back to the defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let listen_addr = lookup("LISTEN_ADDR").unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string());
        let peers = lookup("PEERS").map(|p| parse_peers(&p)).unwrap_or_default();
        let mut config = Self::new(listen_addr, peers);

        if let Some(node_id) = lookup("NODE_ID") {
            config.node_id = node_id;
        }

        let millis = |var: &'static str, default: u64| -> Result<u64, ConfigError> {
            match lookup(var) {
                Some(value) => value
                    .trim()
                    .parse()
                    .map_err(|_| ConfigError::InvalidNumber { var, value }),
                None => Ok(default),
            }
        };
        config.election.min_timeout_ms = millis("ELECTION_TIMEOUT_MIN_MS", config.election.min_timeout_ms)?;
        config.election.max_timeout_ms = millis("ELECTION_TIMEOUT_MAX_MS", config.election.max_timeout_ms)?;
        config.election.heartbeat_interval_ms =
            millis("HEARTBEAT_INTERVAL_MS", config.election.heartbeat_interval_ms)?;
        config.rpc_timeout_ms = millis("RPC_TIMEOUT_MS", config.rpc_timeout_ms)?;
        config.client_put_timeout_ms = millis("CLIENT_PUT_TIMEOUT_MS", config.client_put_timeout_ms)?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.node_id.is_empty() {
            return Err(ConfigError::EmptyNodeId);
        }

        let mut seen = HashSet::new();
        for peer in &self.peers {
            if *peer == self.node_id {
                return Err(ConfigError::SelfInPeers(peer.clone()));
            }
            if !seen.insert(peer.as_str()) {
                return Err(ConfigError::DuplicatePeer(peer.clone()));
            }
        }

        let election = &self.election;
        if election.min_timeout_ms == 0 || election.max_timeout_ms < election.min_timeout_ms {
            return Err(ConfigError::EmptyTimeoutRange {
                min: election.min_timeout_ms,
                max: election.max_timeout_ms,
            });
        }
        if election.heartbeat_interval_ms >= election.min_timeout_ms {
            return Err(ConfigError::HeartbeatTooSlow {
                heartbeat: election.heartbeat_interval_ms,
                min: election.min_timeout_ms,
            });
        }
        Ok(())
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc_timeout_ms)
    }

    pub fn client_put_timeout(&self) -> Duration {
        Duration::from_millis(self.client_put_timeout_ms)
    }
}

/// Splits a comma separated peer list, skipping blanks.
pub fn parse_peers(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|peer| !peer.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ClusterConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.node_id, DEFAULT_LISTEN_ADDR);
        assert!(config.peers.is_empty());
        assert_eq!(config.election, ElectionConfig::default());
        assert_eq!(config.client_put_timeout(), Duration::from_millis(300));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let config = ClusterConfig::from_lookup(lookup(&[
            ("LISTEN_ADDR", "10.0.0.1:9000"),
            ("PEERS", "10.0.0.2:9000, 10.0.0.3:9000,"),
            ("ELECTION_TIMEOUT_MIN_MS", "600"),
            ("ELECTION_TIMEOUT_MAX_MS", "900"),
        ]))
        .unwrap();

        assert_eq!(config.node_id, "10.0.0.1:9000");
        assert_eq!(config.peers, vec!["10.0.0.2:9000", "10.0.0.3:9000"]);
        assert_eq!(config.election.min_timeout_ms, 600);
        assert_eq!(config.election.max_timeout_ms, 900);
    }

    #[test]
    fn test_bad_number() {
        let err = ClusterConfig::from_lookup(lookup(&[("RPC_TIMEOUT_MS", "soon")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidNumber {
                var: "RPC_TIMEOUT_MS",
                value: "soon".to_string()
            }
        );
    }

    #[test]
    fn test_validate_rejects_bad_peer_lists() {
        let config = ClusterConfig::new("a:1", vec!["b:1".to_string(), "a:1".to_string()]);
        assert_eq!(config.validate(), Err(ConfigError::SelfInPeers("a:1".to_string())));

        let config = ClusterConfig::new("a:1", vec!["b:1".to_string(), "b:1".to_string()]);
        assert_eq!(config.validate(), Err(ConfigError::DuplicatePeer("b:1".to_string())));
    }

    #[test]
    fn test_validate_rejects_bad_timings() {
        let mut config = ClusterConfig::new("a:1", vec![]);
        config.election.max_timeout_ms = 100;
        assert!(matches!(config.validate(), Err(ConfigError::EmptyTimeoutRange { .. })));

        let mut config = ClusterConfig::new("a:1", vec![]);
        config.election.heartbeat_interval_ms = 400;
        assert!(matches!(config.validate(), Err(ConfigError::HeartbeatTooSlow { .. })));
    }
}
