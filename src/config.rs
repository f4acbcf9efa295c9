//! Configuration for the DHT node, the metadata fetcher and the indexer.
//!
//! Every field has a default from [`crate::constants`]; override only what
//! you need:
//!
//! ```
//! use mlspider::config::DhtConfig;
//! use std::time::Duration;
//!
//! let config = DhtConfig {
//!     bind_addr: "0.0.0.0:7000".parse().unwrap(),
//!     rpc_timeout: Duration::from_secs(3),
//!     ..DhtConfig::default()
//! };
//! assert_eq!(config.k, 8);
//! ```

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

use crate::constants::*;
use crate::dht::NodeId;
use crate::peer::PeerId;

#[derive(Debug, Clone)]
pub struct DhtConfig {
    /// Overrides the generated node id (e.g. to reuse a persisted table).
    pub node_id: Option<NodeId>,
    pub bind_addr: SocketAddr,
    /// `host:port` entry points used only when the routing table is empty.
    pub bootstrap_nodes: Vec<String>,
    /// Contacts returned per `find_node`/`get_peers` and lookup width.
    pub k: usize,
    pub bucket_capacity: usize,
    pub alpha: usize,
    pub max_crawl_rounds: usize,
    pub rpc_timeout: Duration,
    pub max_pending_queries: usize,
    /// Bytes per second in each direction, 0 for unlimited.
    pub bandwidth: u64,
    pub latency_floor: Duration,
    pub token_interval: Duration,
    pub maintenance_interval: Duration,
    pub requery_cooldown: Duration,
    pub save_interval: Duration,
}

impl Default for DhtConfig {
    fn default() -> Self {
        Self {
            node_id: None,
            bind_addr: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, DEFAULT_DHT_PORT)),
            bootstrap_nodes: BOOTSTRAP_NODES.iter().map(|s| s.to_string()).collect(),
            k: K,
            bucket_capacity: CRAWL_BUCKET_CAPACITY,
            alpha: ALPHA,
            max_crawl_rounds: MAX_CRAWL_ROUNDS,
            rpc_timeout: RPC_TIMEOUT,
            max_pending_queries: MAX_PENDING_QUERIES,
            bandwidth: UDP_BANDWIDTH,
            latency_floor: UDP_LATENCY_FLOOR,
            token_interval: TOKEN_INTERVAL,
            maintenance_interval: MAINTENANCE_INTERVAL,
            requery_cooldown: REQUERY_COOLDOWN,
            save_interval: SAVE_ROUTING_TABLE_INTERVAL,
        }
    }
}

impl DhtConfig {
    /// A lookup-oriented node: K-sized buckets instead of the crawl-sized ones.
    pub fn lookup() -> Self {
        Self {
            bucket_capacity: K,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Overrides the generated peer id.
    pub peer_id: Option<PeerId>,
    pub connect_timeout: Duration,
    pub idle_timeout: Duration,
    /// Pause between consecutive piece requests.
    pub request_delay: Duration,
    pub max_metadata_size: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            peer_id: None,
            connect_timeout: PEER_CONNECT_TIMEOUT,
            idle_timeout: PEER_IDLE_TIMEOUT,
            request_delay: Duration::ZERO,
            max_metadata_size: MAX_METADATA_SIZE,
        }
    }
}

#[derive(Debug, Clone)]
pub struct IndexerConfig {
    pub batch_size: usize,
    /// Peers contacted at once while fetching one torrent's metadata.
    pub link_size: usize,
    pub max_attempts: u32,
    pub idle_delay: Duration,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            batch_size: INDEX_BATCH_SIZE,
            link_size: LINK_SIZE,
            max_attempts: MAX_INDEX_ATTEMPTS,
            idle_delay: INDEX_IDLE_DELAY,
        }
    }
}
