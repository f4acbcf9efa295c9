//! mlspider - A Mainline DHT spider and metadata fetcher
//!
//! This library crawls the BitTorrent Mainline DHT, collects the info-hashes
//! other nodes search for or announce, and downloads their info
//! dictionaries from peers using the metadata exchange extension.
//!
//! # Modules
//!
//! - [`bencode`] - BEP-3 Bencode encoding/decoding
//! - [`dht`] - BEP-5 DHT node, crawl-sized routing table and iterative lookups
//! - [`peer`] - BEP-3/9/10 handshake, extension protocol and ut_metadata fetch
//! - [`fanout`] - Concurrent metadata fetching across many peers
//! - [`indexer`] - Event harvesting and the metadata indexing loop
//! - [`storage`] - Routing table persistence and the torrent catalog
//! - [`bandwidth`] - Average byte-rate limiting for the UDP transport
//! - [`config`] - Runtime configuration with defaults from [`constants`]

pub mod bandwidth;
pub mod bencode;
pub mod config;
pub mod constants;
pub mod dht;
pub mod fanout;
pub mod indexer;
pub mod info_hash;
pub mod peer;
pub mod storage;

pub use bencode::{decode, encode, BencodeError, Value};
pub use config::{DhtConfig, FetchConfig, IndexerConfig};
pub use dht::{Contact, DhtError, DhtEvent, DhtNode, KrpcMessage, NodeId, RoutingTable, Spider};
pub use fanout::{ChainOutcome, ConnectionChain, ConnectionLink, LinkOutcome, MetadataFetch, PeerWireFetcher};
pub use indexer::{harvest, Indexer, PeerLookup};
pub use info_hash::InfoHash;
pub use peer::{fetch_metadata, MetadataError, PeerId, TorrentMetadata};
pub use storage::{MemoryStore, RoutingTableStore, StorageError, TorrentCatalog};
