use std::collections::HashMap;

use indexmap::IndexMap;
use parking_lot::Mutex;
use tracing::trace;

use super::catalog::{PersistedTable, RoutingTableStore, TorrentCatalog};
use super::error::StorageError;
use crate::info_hash::InfoHash;
use crate::peer::TorrentMetadata;

#[derive(Debug, Default)]
struct CatalogEntry {
    attempts: u32,
    metadata: Option<TorrentMetadata>,
}

/// In-memory [`RoutingTableStore`] and [`TorrentCatalog`].
///
/// Info-hashes are handed out for indexing in the order they were first
/// recorded.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<HashMap<(String, u16), PersistedTable>>,
    catalog: Mutex<IndexMap<String, CatalogEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn info_hash_count(&self) -> usize {
        self.catalog.lock().len()
    }

    pub fn torrent(&self, info_hash: &str) -> Option<TorrentMetadata> {
        let key = normalize(info_hash).ok()?;
        self.catalog.lock().get(&key)?.metadata.clone()
    }

    pub fn attempts(&self, info_hash: &str) -> Option<u32> {
        let key = normalize(info_hash).ok()?;
        self.catalog.lock().get(&key).map(|e| e.attempts)
    }
}

fn normalize(info_hash: &str) -> Result<String, StorageError> {
    InfoHash::from_hex(info_hash)
        .map(|h| h.to_hex())
        .map_err(|_| StorageError::InvalidInfoHash(info_hash.to_string()))
}

impl RoutingTableStore for MemoryStore {
    fn load_routing_table(
        &self,
        host: &str,
        port: u16,
        node_id: Option<&str>,
    ) -> Result<Option<PersistedTable>, StorageError> {
        let tables = self.tables.lock();
        let table = tables
            .get(&(host.to_string(), port))
            .filter(|t| node_id.map_or(true, |id| t.node_id.eq_ignore_ascii_case(id)));
        Ok(table.cloned())
    }

    fn store_routing_table(&self, table: &PersistedTable) -> Result<(), StorageError> {
        trace!(host = %table.host, port = table.port, contacts = table.len(), "storing routing table");
        self.tables
            .lock()
            .insert((table.host.clone(), table.port), table.clone());
        Ok(())
    }
}

impl TorrentCatalog for MemoryStore {
    fn record_info_hash(&self, info_hash: &str) -> Result<(), StorageError> {
        let key = normalize(info_hash)?;
        self.catalog.lock().entry(key).or_default();
        Ok(())
    }

    fn record_or_update_torrent(
        &self,
        info_hash: &str,
        metadata: Option<&TorrentMetadata>,
    ) -> Result<bool, StorageError> {
        let key = normalize(info_hash)?;
        let mut catalog = self.catalog.lock();

        match (catalog.get_mut(&key), metadata) {
            (None, metadata) => {
                catalog.insert(
                    key,
                    CatalogEntry {
                        attempts: 0,
                        metadata: metadata.cloned(),
                    },
                );
                Ok(true)
            }
            (Some(entry), Some(metadata)) if entry.metadata.is_none() => {
                entry.metadata = Some(metadata.clone());
                Ok(true)
            }
            (Some(_), _) => Ok(false),
        }
    }

    fn fetch_unindexed_info_hashes(
        &self,
        limit: usize,
        max_attempts: u32,
    ) -> Result<Vec<String>, StorageError> {
        let mut catalog = self.catalog.lock();

        catalog.retain(|_, e| e.metadata.is_some() || e.attempts < max_attempts);

        let mut batch = Vec::with_capacity(limit);
        for (hash, entry) in catalog.iter_mut() {
            if batch.len() >= limit {
                break;
            }
            if entry.metadata.is_none() {
                entry.attempts += 1;
                batch.push(hash.clone());
            }
        }

        Ok(batch)
    }
}
