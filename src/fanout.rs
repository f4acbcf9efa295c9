//! Multi-peer metadata fan-out.
//!
//! Peers that claim to have a torrent are split into links. All peers in a
//! link are contacted at once and the first verified metadata wins; the
//! remaining attempts are cancelled. Links of a [`ConnectionChain`] run
//! strictly one after another until one of them succeeds.

use std::net::SocketAddr;
use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::task::JoinSet;
use tracing::{debug, trace};

use crate::config::FetchConfig;
use crate::info_hash::InfoHash;
use crate::peer::{fetch_metadata, MetadataError, PeerId, TorrentMetadata};

/// Something that can download the metadata of `info_hash` from one peer.
pub trait MetadataFetch: Send + Sync {
    fn fetch(
        &self,
        peer: SocketAddr,
        info_hash: InfoHash,
    ) -> BoxFuture<'static, Result<TorrentMetadata, MetadataError>>;
}

/// Fetches over the peer wire protocol.
#[derive(Debug, Clone)]
pub struct PeerWireFetcher {
    config: Arc<FetchConfig>,
    peer_id: PeerId,
}

impl PeerWireFetcher {
    pub fn new(config: FetchConfig) -> Self {
        let peer_id = config.peer_id.unwrap_or_else(PeerId::generate);
        Self {
            config: Arc::new(config),
            peer_id,
        }
    }

    pub fn peer_id(&self) -> PeerId {
        self.peer_id
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }
}

impl MetadataFetch for PeerWireFetcher {
    fn fetch(
        &self,
        peer: SocketAddr,
        info_hash: InfoHash,
    ) -> BoxFuture<'static, Result<TorrentMetadata, MetadataError>> {
        let config = self.config.clone();
        let peer_id = self.peer_id;
        Box::pin(async move { fetch_metadata(peer, info_hash, peer_id, &config).await })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkOutcome {
    Found {
        peer: SocketAddr,
        metadata: TorrentMetadata,
    },
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainOutcome {
    Found {
        peer: SocketAddr,
        /// Index of the link that succeeded.
        link: usize,
        metadata: TorrentMetadata,
    },
    NotFound {
        /// Peers contacted across all links.
        attempted: usize,
    },
}

impl ChainOutcome {
    pub fn metadata(&self) -> Option<&TorrentMetadata> {
        match self {
            ChainOutcome::Found { metadata, .. } => Some(metadata),
            ChainOutcome::NotFound { .. } => None,
        }
    }

    pub fn into_metadata(self) -> Option<TorrentMetadata> {
        match self {
            ChainOutcome::Found { metadata, .. } => Some(metadata),
            ChainOutcome::NotFound { .. } => None,
        }
    }
}

/// A group of peers contacted concurrently.
pub struct ConnectionLink {
    fetcher: Arc<dyn MetadataFetch>,
    info_hash: InfoHash,
    peers: Vec<SocketAddr>,
}

impl ConnectionLink {
    pub fn new(fetcher: Arc<dyn MetadataFetch>, info_hash: InfoHash, peers: Vec<SocketAddr>) -> Self {
        Self {
            fetcher,
            info_hash,
            peers,
        }
    }

    pub fn peers(&self) -> &[SocketAddr] {
        &self.peers
    }

    /// Races every peer of the link. The first success aborts the others.
    pub async fn run(self) -> LinkOutcome {
        let mut attempts = JoinSet::new();
        for peer in self.peers {
            let fetch = self.fetcher.fetch(peer, self.info_hash);
            attempts.spawn(async move { (peer, fetch.await) });
        }

        while let Some(joined) = attempts.join_next().await {
            let (peer, result) = match joined {
                Ok(v) => v,
                Err(e) => {
                    trace!(error = %e, "metadata attempt did not finish");
                    continue;
                }
            };

            match result {
                Ok(metadata) => {
                    attempts.abort_all();
                    return LinkOutcome::Found { peer, metadata };
                }
                Err(e) => {
                    trace!(info_hash = %self.info_hash, %peer, error = %e, "peer failed");
                }
            }
        }

        LinkOutcome::NotFound
    }
}

/// Links tried in order until one yields the metadata.
pub struct ConnectionChain {
    info_hash: InfoHash,
    links: Vec<ConnectionLink>,
}

impl ConnectionChain {
    /// Splits `peers` into links of at most `link_size` peers, keeping
    /// their order.
    pub fn new(
        fetcher: Arc<dyn MetadataFetch>,
        info_hash: InfoHash,
        peers: Vec<SocketAddr>,
        link_size: usize,
    ) -> Self {
        let links = peers
            .chunks(link_size.max(1))
            .map(|chunk| ConnectionLink::new(fetcher.clone(), info_hash, chunk.to_vec()))
            .collect();

        Self { info_hash, links }
    }

    pub fn links(&self) -> &[ConnectionLink] {
        &self.links
    }

    pub async fn run(self) -> ChainOutcome {
        let mut attempted = 0;

        for (index, link) in self.links.into_iter().enumerate() {
            attempted += link.peers().len();
            trace!(info_hash = %self.info_hash, link = index, peers = link.peers().len(), "starting link");

            if let LinkOutcome::Found { peer, metadata } = link.run().await {
                debug!(info_hash = %self.info_hash, %peer, link = index, "metadata found");
                return ChainOutcome::Found {
                    peer,
                    link: index,
                    metadata,
                };
            }
        }

        debug!(info_hash = %self.info_hash, attempted, "metadata not found");
        ChainOutcome::NotFound { attempted }
    }

    /// Runs the chain and hands the outcome to `on_result`.
    pub async fn run_with<F>(self, on_result: F)
    where
        F: FnOnce(ChainOutcome),
    {
        on_result(self.run().await);
    }
}
