use std::net::{IpAddr, SocketAddr};

use super::error::StorageError;
use crate::dht::{Contact, NodeId, RoutingTable};
use crate::peer::TorrentMetadata;

/// A routing table entry as stored: hex id plus endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedContact {
    pub node_id: String,
    pub ip: IpAddr,
    pub port: u16,
}

/// A routing table snapshot, keyed by the endpoint the node was bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedTable {
    pub node_id: String,
    pub host: String,
    pub port: u16,
    pub buckets: Vec<Vec<PersistedContact>>,
}

impl PersistedTable {
    pub fn from_table(table: &RoutingTable, host: impl Into<String>, port: u16) -> Self {
        let buckets = table
            .buckets()
            .iter()
            .map(|bucket| {
                bucket
                    .iter()
                    .map(|c| PersistedContact {
                        node_id: c.id.to_hex(),
                        ip: c.addr.ip(),
                        port: c.addr.port(),
                    })
                    .collect()
            })
            .collect();

        Self {
            node_id: table.our_id().to_hex(),
            host: host.into(),
            port,
            buckets,
        }
    }

    pub fn local_id(&self) -> Result<NodeId, StorageError> {
        NodeId::from_hex(&self.node_id).map_err(|_| StorageError::InvalidRecord(self.node_id.clone()))
    }

    /// Snapshot contacts grouped by bucket. Entries with an unreadable id
    /// are skipped.
    pub fn contact_buckets(&self) -> Vec<Vec<Contact>> {
        self.buckets
            .iter()
            .map(|bucket| {
                bucket
                    .iter()
                    .filter_map(|c| {
                        let id = NodeId::from_hex(&c.node_id).ok()?;
                        Some(Contact::new(id, SocketAddr::new(c.ip, c.port)))
                    })
                    .collect()
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.buckets.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Where a DHT node keeps its routing table between runs.
pub trait RoutingTableStore: Send + Sync {
    /// The table last saved for `host:port`, restricted to `node_id` when
    /// one is given.
    fn load_routing_table(
        &self,
        host: &str,
        port: u16,
        node_id: Option<&str>,
    ) -> Result<Option<PersistedTable>, StorageError>;

    fn store_routing_table(&self, table: &PersistedTable) -> Result<(), StorageError>;
}

/// The catalog of observed info-hashes and their fetched metadata.
pub trait TorrentCatalog: Send + Sync {
    /// Remembers an info-hash seen on the network. Recording a known hash
    /// again changes nothing.
    fn record_info_hash(&self, info_hash: &str) -> Result<(), StorageError>;

    /// Records a torrent, attaching `metadata` when given.
    ///
    /// Returns `true` when something new was stored. The first successful
    /// metadata for a hash wins; later calls for it are no-ops.
    fn record_or_update_torrent(
        &self,
        info_hash: &str,
        metadata: Option<&TorrentMetadata>,
    ) -> Result<bool, StorageError>;

    /// Up to `limit` hashes still lacking metadata. Each returned hash has
    /// its attempt count incremented; hashes that already used up
    /// `max_attempts` are forgotten instead of returned.
    fn fetch_unindexed_info_hashes(
        &self,
        limit: usize,
        max_attempts: u32,
    ) -> Result<Vec<String>, StorageError>;
}
