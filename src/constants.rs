//! Protocol constants and tuning parameters.
//!
//! Defaults follow the Mainline DHT ([BEP-5]) and metadata exchange
//! ([BEP-9]) conventions, with the bucket capacity and maintenance cadence
//! tuned for crawling rather than for lookup efficiency.
//!
//! [BEP-5]: http://bittorrent.org/beps/bep_0005.html
//! [BEP-9]: http://bittorrent.org/beps/bep_0009.html

use std::time::Duration;

// ============================================================================
// Client identification
// ============================================================================

/// Client ID prefix for peer ID generation (Azureus-style)
pub const CLIENT_PREFIX: &[u8; 8] = b"-ML0001-";

/// Client name advertised in the extended handshake (`v`)
pub const CLIENT_VERSION: &str = "mlspider/0.1.0";

// ============================================================================
// DHT
// ============================================================================

/// Default DHT listen port
pub const DEFAULT_DHT_PORT: u16 = 6881;

/// Well-known entry points used to seed an empty routing table
pub const BOOTSTRAP_NODES: &[&str] = &[
    "router.bittorrent.com:6881",
    "dht.transmissionbt.com:6881",
    "router.utorrent.com:6881",
];

/// Number of buckets, one per bit of the 160-bit id space
pub const NUM_BUCKETS: usize = 160;

/// Kademlia K: contacts returned by `find_node`/`get_peers`
pub const K: usize = 8;

/// Per-bucket capacity of the crawl-optimized routing table
pub const CRAWL_BUCKET_CAPACITY: usize = 1500;

/// Lookup parallelism
pub const ALPHA: usize = 3;

/// Upper bound on crawl rounds
pub const MAX_CRAWL_ROUNDS: usize = 16;

/// How long an outbound RPC waits for its response
pub const RPC_TIMEOUT: Duration = Duration::from_secs(5);

/// Cap on concurrently outstanding transactions
pub const MAX_PENDING_QUERIES: usize = 4096;

/// Tokens are pinned to time buckets of this width
pub const TOKEN_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Announced peers are forgotten after this long
pub const PEER_ANNOUNCE_LIFETIME: Duration = Duration::from_secs(30 * 60);

/// Upper bound on stored announced peers per info-hash
pub const MAX_PEERS_PER_TORRENT: usize = 1000;

/// Upper bound on distinct info-hashes with announced peers
pub const MAX_ANNOUNCED_TORRENTS: usize = 65536;

/// Maintenance loop tick
pub const MAINTENANCE_INTERVAL: Duration = Duration::from_secs(5);

/// Minimum delay between two maintenance queries to the same contact
pub const REQUERY_COOLDOWN: Duration = Duration::from_secs(10);

/// Routing table persistence interval
pub const SAVE_ROUTING_TABLE_INTERVAL: Duration = Duration::from_secs(120);

/// UDP transport budget, bytes per second in each direction (3 MB/s)
pub const UDP_BANDWIDTH: u64 = 3 * 1024 * 1024;

/// Minimum pause applied to every throttled datagram
pub const UDP_LATENCY_FLOOR: Duration = Duration::from_millis(1);

/// Largest datagram we read
pub const MAX_DATAGRAM_SIZE: usize = 65536;

/// Buffered DHT events before new ones are dropped
pub const EVENT_CHANNEL_SIZE: usize = 4096;

/// Overflow probes waiting for the maintenance loop
pub const PROBE_QUEUE_SIZE: usize = 1024;

// ============================================================================
// Peer wire / metadata
// ============================================================================

/// Size of a metadata piece (16 KiB)
pub const METADATA_PIECE_SIZE: usize = 16384;

/// Largest metadata we agree to fetch
pub const MAX_METADATA_SIZE: usize = 16 * 1024 * 1024;

/// Our local id for ut_metadata in the extended handshake
pub const LOCAL_UT_METADATA_ID: u8 = 1;

/// Outstanding request queue advertised to peers (`reqq`)
pub const REQUEST_QUEUE: i64 = 255;

/// TCP connect timeout
pub const PEER_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// A metadata connection idle for this long is abandoned
pub const PEER_IDLE_TIMEOUT: Duration = Duration::from_secs(10);

/// Peers per connection link
pub const LINK_SIZE: usize = 10;

// ============================================================================
// Indexer
// ============================================================================

/// Info-hashes fetched from the catalog per batch
pub const INDEX_BATCH_SIZE: usize = 10;

/// Attempts after which an info-hash is given up
pub const MAX_INDEX_ATTEMPTS: u32 = 10;

/// Pause when the catalog has nothing to index
pub const INDEX_IDLE_DELAY: Duration = Duration::from_secs(60);
