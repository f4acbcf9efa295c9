//! Crawl-to-catalog pipelines.
//!
//! [`harvest`] drains the DHT node's events into the catalog. The
//! [`Indexer`] then works through the info-hashes that still lack metadata:
//! it looks up peers for each, fans out to them and stores the first
//! verified metadata.

use std::net::SocketAddr;
use std::sync::Arc;

use futures::future::{join_all, BoxFuture};
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use crate::config::IndexerConfig;
use crate::dht::{DhtEvent, DhtNode};
use crate::fanout::{ChainOutcome, ConnectionChain, MetadataFetch};
use crate::info_hash::InfoHash;
use crate::storage::TorrentCatalog;

/// Finds peers serving an info-hash.
pub trait PeerLookup: Send + Sync {
    fn lookup_peers(&self, info_hash: InfoHash) -> BoxFuture<'_, Vec<SocketAddr>>;
}

impl PeerLookup for DhtNode {
    fn lookup_peers(&self, info_hash: InfoHash) -> BoxFuture<'_, Vec<SocketAddr>> {
        Box::pin(DhtNode::lookup_peers(self, info_hash))
    }
}

/// Records every info-hash seen in `events` until the channel closes.
/// Returns the number of events recorded.
pub async fn harvest(mut events: mpsc::Receiver<DhtEvent>, catalog: Arc<dyn TorrentCatalog>) -> usize {
    let mut recorded = 0;

    while let Some(event) = events.recv().await {
        let info_hash = match &event {
            DhtEvent::GetPeers { info_hash, from } => {
                trace!(%info_hash, %from, "get_peers observed");
                *info_hash
            }
            DhtEvent::Announce { info_hash, addr } => {
                debug!(%info_hash, %addr, "announce observed");
                *info_hash
            }
        };

        match catalog.record_info_hash(&info_hash.to_hex()) {
            Ok(()) => recorded += 1,
            Err(e) => warn!(%info_hash, error = %e, "failed to record info-hash"),
        }
    }

    recorded
}

/// Counts from one pass over the catalog.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexStats {
    pub attempted: usize,
    pub indexed: usize,
}

pub struct Indexer {
    lookup: Arc<dyn PeerLookup>,
    fetcher: Arc<dyn MetadataFetch>,
    catalog: Arc<dyn TorrentCatalog>,
    config: IndexerConfig,
}

impl Indexer {
    pub fn new(
        lookup: Arc<dyn PeerLookup>,
        fetcher: Arc<dyn MetadataFetch>,
        catalog: Arc<dyn TorrentCatalog>,
        config: IndexerConfig,
    ) -> Self {
        Self {
            lookup,
            fetcher,
            catalog,
            config,
        }
    }

    pub fn config(&self) -> &IndexerConfig {
        &self.config
    }

    /// Fetches metadata for `info_hash` and stores it. Returns whether the
    /// catalog took the new metadata.
    pub async fn index(&self, info_hash: InfoHash) -> bool {
        let peers = self.lookup.lookup_peers(info_hash).await;
        if peers.is_empty() {
            debug!(%info_hash, "no peers found");
            return false;
        }

        let chain = ConnectionChain::new(self.fetcher.clone(), info_hash, peers, self.config.link_size);
        let ChainOutcome::Found { peer, metadata, .. } = chain.run().await else {
            return false;
        };

        match self
            .catalog
            .record_or_update_torrent(&info_hash.to_hex(), Some(&metadata))
        {
            Ok(inserted) => {
                if inserted {
                    info!(%info_hash, %peer, name = %metadata.name, size = metadata.total_length(), "indexed torrent");
                }
                inserted
            }
            Err(e) => {
                warn!(%info_hash, error = %e, "failed to store metadata");
                false
            }
        }
    }

    /// One batch: every pending info-hash is indexed concurrently.
    pub async fn index_once(&self) -> Result<IndexStats, crate::storage::StorageError> {
        let batch = self
            .catalog
            .fetch_unindexed_info_hashes(self.config.batch_size, self.config.max_attempts)?;

        let info_hashes: Vec<InfoHash> = batch
            .iter()
            .filter_map(|hex| match InfoHash::from_hex(hex) {
                Ok(h) => Some(h),
                Err(_) => {
                    warn!(info_hash = %hex, "skipping malformed info-hash");
                    None
                }
            })
            .collect();

        let results = join_all(info_hashes.iter().map(|h| self.index(*h))).await;

        Ok(IndexStats {
            attempted: info_hashes.len(),
            indexed: results.into_iter().filter(|inserted| *inserted).count(),
        })
    }

    /// Indexes forever, idling whenever the catalog has nothing pending.
    pub async fn run(&self) {
        loop {
            match self.index_once().await {
                Ok(stats) if stats.attempted > 0 => {
                    debug!(attempted = stats.attempted, indexed = stats.indexed, "index batch done");
                    continue;
                }
                Ok(_) => trace!("nothing to index"),
                Err(e) => warn!(error = %e, "failed to fetch pending info-hashes"),
            }
            tokio::time::sleep(self.config.idle_delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bencode::{encode, Value};
    use crate::peer::{MetadataError, TorrentMetadata};
    use crate::storage::MemoryStore;
    use bytes::Bytes;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::time::Duration;

    fn metadata_named(name: &str) -> TorrentMetadata {
        let raw = Bytes::from(
            encode(&Value::dict([
                ("length", Value::Integer(7)),
                ("name", Value::string(name)),
                ("piece length", Value::Integer(16384)),
                ("pieces", Value::bytes(&[0u8; 20])),
            ]))
            .unwrap(),
        );
        TorrentMetadata::from_info_bytes(InfoHash::of(&raw), raw).unwrap()
    }

    struct FakeLookup(HashMap<InfoHash, Vec<SocketAddr>>);

    impl PeerLookup for FakeLookup {
        fn lookup_peers(&self, info_hash: InfoHash) -> BoxFuture<'_, Vec<SocketAddr>> {
            let peers = self.0.get(&info_hash).cloned().unwrap_or_default();
            Box::pin(async move { peers })
        }
    }

    /// Serves metadata from a fixed set of peers; everyone else refuses.
    struct FakeFetcher {
        serves: HashMap<SocketAddr, TorrentMetadata>,
        contacted: Mutex<Vec<SocketAddr>>,
    }

    impl FakeFetcher {
        fn new(serves: HashMap<SocketAddr, TorrentMetadata>) -> Self {
            Self {
                serves,
                contacted: Mutex::new(Vec::new()),
            }
        }
    }

    impl MetadataFetch for FakeFetcher {
        fn fetch(
            &self,
            peer: SocketAddr,
            info_hash: InfoHash,
        ) -> BoxFuture<'static, Result<TorrentMetadata, MetadataError>> {
            self.contacted.lock().push(peer);
            let found = self
                .serves
                .get(&peer)
                .filter(|m| m.info_hash == info_hash)
                .cloned();
            Box::pin(async move { found.ok_or(MetadataError::ConnectionClosed) })
        }
    }

    fn peer(n: u8) -> SocketAddr {
        SocketAddr::from(([192, 0, 2, n], 51413))
    }

    #[tokio::test]
    async fn test_harvest_records_events() {
        let store = Arc::new(MemoryStore::new());
        let (tx, rx) = mpsc::channel(16);

        let a = InfoHash([0xaa; 20]);
        let b = InfoHash([0xbb; 20]);
        tx.send(DhtEvent::GetPeers { info_hash: a, from: peer(1) }).await.unwrap();
        tx.send(DhtEvent::Announce { info_hash: b, addr: peer(2) }).await.unwrap();
        tx.send(DhtEvent::GetPeers { info_hash: a, from: peer(3) }).await.unwrap();
        drop(tx);

        let recorded = harvest(rx, store.clone()).await;
        assert_eq!(recorded, 3);
        assert_eq!(store.info_hash_count(), 2);
        assert_eq!(store.attempts(&a.to_hex()), Some(0));
    }

    #[tokio::test]
    async fn test_index_once_stores_metadata() {
        let found = metadata_named("found");
        let found_hash = found.info_hash;
        let missing = InfoHash([0x11; 20]);

        let store = Arc::new(MemoryStore::new());
        store.record_info_hash(&found_hash.to_hex()).unwrap();
        store.record_info_hash(&missing.to_hex()).unwrap();

        let lookup = FakeLookup(HashMap::from([
            (found_hash, vec![peer(1), peer(2), peer(3)]),
            (missing, vec![peer(4)]),
        ]));
        let fetcher = FakeFetcher::new(HashMap::from([(peer(3), found.clone())]));

        let config = IndexerConfig {
            link_size: 2,
            ..IndexerConfig::default()
        };
        let indexer = Indexer::new(Arc::new(lookup), Arc::new(fetcher), store.clone(), config);

        let stats = indexer.index_once().await.unwrap();
        assert_eq!(stats, IndexStats { attempted: 2, indexed: 1 });
        assert_eq!(store.torrent(&found_hash.to_hex()), Some(found));
        assert_eq!(store.torrent(&missing.to_hex()), None);

        // only the unresolved hash comes back
        let stats = indexer.index_once().await.unwrap();
        assert_eq!(stats, IndexStats { attempted: 1, indexed: 0 });
        assert_eq!(store.attempts(&missing.to_hex()), Some(2));
    }

    #[tokio::test]
    async fn test_index_contacts_one_link_at_a_time() {
        let found = metadata_named("linked");
        let info_hash = found.info_hash;
        let peers = vec![peer(1), peer(2), peer(3), peer(4), peer(5)];

        for (link_size, contacted) in [(1, vec![peer(1)]), (3, vec![peer(1), peer(2), peer(3)])] {
            let store = Arc::new(MemoryStore::new());
            let fetcher = Arc::new(FakeFetcher::new(HashMap::from([(peer(1), found.clone())])));
            let config = IndexerConfig {
                link_size,
                ..IndexerConfig::default()
            };
            let indexer = Indexer::new(
                Arc::new(FakeLookup(HashMap::from([(info_hash, peers.clone())]))),
                fetcher.clone(),
                store.clone(),
                config,
            );

            assert!(indexer.index(info_hash).await);
            let mut seen = fetcher.contacted.lock().clone();
            seen.sort();
            assert_eq!(seen, contacted, "link_size {link_size}");
        }
    }

    #[tokio::test]
    async fn test_index_gives_up_after_max_attempts() {
        let missing = InfoHash([0x22; 20]);
        let store = Arc::new(MemoryStore::new());
        store.record_info_hash(&missing.to_hex()).unwrap();

        let config = IndexerConfig {
            max_attempts: 2,
            ..IndexerConfig::default()
        };
        let indexer = Indexer::new(
            Arc::new(FakeLookup(HashMap::new())),
            Arc::new(FakeFetcher::new(HashMap::new())),
            store.clone(),
            config,
        );

        assert_eq!(indexer.index_once().await.unwrap().attempted, 1);
        assert_eq!(indexer.index_once().await.unwrap().attempted, 1);
        assert_eq!(indexer.index_once().await.unwrap().attempted, 0);
        assert_eq!(store.info_hash_count(), 0);
    }

    #[tokio::test]
    async fn test_second_load_is_ignored() {
        let first = metadata_named("first");
        let info_hash = first.info_hash;
        let store = Arc::new(MemoryStore::new());

        let indexer = Indexer::new(
            Arc::new(FakeLookup(HashMap::from([(info_hash, vec![peer(1)])]))),
            Arc::new(FakeFetcher::new(HashMap::from([(peer(1), first.clone())]))),
            store.clone(),
            IndexerConfig::default(),
        );

        assert!(indexer.index(info_hash).await);
        assert!(!indexer.index(info_hash).await);
        assert_eq!(store.torrent(&info_hash.to_hex()), Some(first));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_idles_when_empty() {
        let store = Arc::new(MemoryStore::new());
        let config = IndexerConfig {
            idle_delay: Duration::from_secs(30),
            ..IndexerConfig::default()
        };
        let indexer = Indexer::new(
            Arc::new(FakeLookup(HashMap::new())),
            Arc::new(FakeFetcher::new(HashMap::new())),
            store.clone(),
            config,
        );

        let finished = tokio::time::timeout(Duration::from_secs(120), indexer.run()).await;
        assert!(finished.is_err());
    }
}
