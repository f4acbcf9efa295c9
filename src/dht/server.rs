use super::error::DhtError;
use super::message::{transaction_id, Body, KrpcMessage, Query, Response, TransactionId, ERROR_PROTOCOL};
use super::node::{Contact, NodeId};
use super::routing::{InsertOutcome, RoutingTable};
use super::spider::{Lookup, Spider};
use super::token::TokenManager;
use crate::bandwidth::ThrottledSocket;
use crate::bencode::decode;
use crate::config::DhtConfig;
use crate::constants::{
    EVENT_CHANNEL_SIZE, MAX_ANNOUNCED_TORRENTS, MAX_DATAGRAM_SIZE, MAX_PEERS_PER_TORRENT,
    PEER_ANNOUNCE_LIFETIME, PROBE_QUEUE_SIZE,
};
use crate::info_hash::InfoHash;
use crate::storage::{PersistedTable, RoutingTableStore};
use bytes::Bytes;
use futures::future::join_all;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval, timeout, Instant, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

/// Something the node observed about an info-hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DhtEvent {
    /// A remote node asked us for peers of `info_hash`.
    GetPeers { info_hash: InfoHash, from: SocketAddr },
    /// A remote peer announced, with a valid token, that it serves `info_hash`.
    Announce { info_hash: InfoHash, addr: SocketAddr },
}

struct AnnouncedPeer {
    addr: SocketAddr,
    announced_at: Instant,
}

struct PeerStore {
    peers: HashMap<InfoHash, Vec<AnnouncedPeer>>,
    max_torrents: usize,
}

fn is_live(peer: &AnnouncedPeer, now: Instant) -> bool {
    now.duration_since(peer.announced_at) < PEER_ANNOUNCE_LIFETIME
}

impl PeerStore {
    fn new(max_torrents: usize) -> Self {
        Self {
            peers: HashMap::new(),
            max_torrents,
        }
    }

    fn add_peer(&mut self, info_hash: InfoHash, addr: SocketAddr) {
        let now = Instant::now();

        if !self.peers.contains_key(&info_hash) && self.peers.len() >= self.max_torrents {
            self.expire(now);
            if self.peers.len() >= self.max_torrents {
                trace!(%info_hash, "announce store full, dropping announce");
                return;
            }
        }

        let peers = self.peers.entry(info_hash).or_default();
        peers.retain(|p| is_live(p, now) && p.addr != addr);

        if peers.len() < MAX_PEERS_PER_TORRENT {
            peers.push(AnnouncedPeer {
                addr,
                announced_at: now,
            });
        }
    }

    fn get_peers(&mut self, info_hash: &InfoHash) -> Vec<SocketAddr> {
        let now = Instant::now();
        let Some(peers) = self.peers.get_mut(info_hash) else {
            return Vec::new();
        };

        peers.retain(|p| is_live(p, now));
        let addrs: Vec<_> = peers.iter().map(|p| p.addr).collect();
        if addrs.is_empty() {
            self.peers.remove(info_hash);
        }
        addrs
    }

    /// Drops expired announces and the info-hashes left without any.
    fn expire(&mut self, now: Instant) -> usize {
        let before = self.peers.len();
        self.peers.retain(|_, peers| {
            peers.retain(|p| is_live(p, now));
            !peers.is_empty()
        });
        before - self.peers.len()
    }

    fn len(&self) -> usize {
        self.peers.len()
    }
}

struct Pending {
    addr: SocketAddr,
    tx: oneshot::Sender<Result<Response, DhtError>>,
}

struct Transactions {
    next_id: u16,
    pending: HashMap<TransactionId, Pending>,
}

/// Removes a transaction when its call finishes, however it finishes.
struct PendingGuard<'a> {
    transactions: &'a Mutex<Transactions>,
    tid: TransactionId,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.transactions.lock().pending.remove(&self.tid);
    }
}

/// A Mainline DHT node speaking KRPC over a throttled UDP socket.
///
/// The node answers `ping`, `find_node`, `get_peers` and `announce_peer`,
/// reports the info-hashes it sees as [`DhtEvent`]s and keeps its routing
/// table populated through a maintenance loop.
///
/// # Examples
///
/// ```no_run
/// use mlspider::config::DhtConfig;
/// use mlspider::dht::DhtNode;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let (node, mut events) = DhtNode::bind(DhtConfig::default()).await?;
///
/// let runner = node.clone();
/// tokio::spawn(async move { runner.run().await });
///
/// node.bootstrap().await?;
///
/// while let Some(event) = events.recv().await {
///     println!("{event:?}");
/// }
/// # Ok(())
/// # }
/// ```
pub struct DhtNode {
    socket: ThrottledSocket,
    our_id: NodeId,
    config: DhtConfig,
    table: RwLock<RoutingTable>,
    transactions: Mutex<Transactions>,
    last_queried: Mutex<HashMap<NodeId, Instant>>,
    tokens: TokenManager,
    peer_store: Mutex<PeerStore>,
    events: mpsc::Sender<DhtEvent>,
    probe_tx: mpsc::Sender<Contact>,
    probe_rx: tokio::sync::Mutex<mpsc::Receiver<Contact>>,
    store: Option<Arc<dyn RoutingTableStore>>,
}

impl DhtNode {
    pub async fn bind(config: DhtConfig) -> Result<(Arc<Self>, mpsc::Receiver<DhtEvent>), DhtError> {
        Self::bind_with_store(config, None).await
    }

    /// Binds the node and, when a store is given, restores the routing table
    /// last saved for this endpoint. A persisted node id is adopted unless
    /// the configuration pins one.
    pub async fn bind_with_store(
        config: DhtConfig,
        store: Option<Arc<dyn RoutingTableStore>>,
    ) -> Result<(Arc<Self>, mpsc::Receiver<DhtEvent>), DhtError> {
        let socket = ThrottledSocket::bind(config.bind_addr, config.bandwidth, config.latency_floor).await?;
        let local_addr = socket.local_addr()?;
        let host = config.bind_addr.ip().to_string();

        let persisted = store.as_ref().and_then(|store| {
            let wanted = config.node_id.map(|id| id.to_hex());
            match store.load_routing_table(&host, local_addr.port(), wanted.as_deref()) {
                Ok(table) => table,
                Err(e) => {
                    warn!(error = %e, "failed to load routing table");
                    None
                }
            }
        });

        let our_id = config
            .node_id
            .or_else(|| persisted.as_ref().and_then(|t| t.local_id().ok()))
            .unwrap_or_else(NodeId::generate);

        let table = match &persisted {
            Some(snapshot) => {
                RoutingTable::from_buckets(our_id, config.bucket_capacity, snapshot.contact_buckets())
            }
            None => RoutingTable::new(our_id, config.bucket_capacity),
        };

        info!(%local_addr, id = %our_id, contacts = table.len(), "DHT node bound");

        let (events, events_rx) = mpsc::channel(EVENT_CHANNEL_SIZE);
        let (probe_tx, probe_rx) = mpsc::channel(PROBE_QUEUE_SIZE);

        let node = Arc::new(Self {
            socket,
            our_id,
            tokens: TokenManager::new(config.token_interval),
            config,
            table: RwLock::new(table),
            transactions: Mutex::new(Transactions {
                next_id: 0,
                pending: HashMap::new(),
            }),
            last_queried: Mutex::new(HashMap::new()),
            peer_store: Mutex::new(PeerStore::new(MAX_ANNOUNCED_TORRENTS)),
            events,
            probe_tx,
            probe_rx: tokio::sync::Mutex::new(probe_rx),
            store,
        });

        Ok((node, events_rx))
    }

    pub fn our_id(&self) -> &NodeId {
        &self.our_id
    }

    pub fn local_addr(&self) -> Result<SocketAddr, DhtError> {
        Ok(self.socket.local_addr()?)
    }

    pub fn config(&self) -> &DhtConfig {
        &self.config
    }

    /// A snapshot of the routing table.
    pub fn routing_table(&self) -> RoutingTable {
        self.table.read().clone()
    }

    pub fn table_len(&self) -> usize {
        self.table.read().len()
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.table.read().contains(id)
    }

    pub fn nearest(&self, target: &NodeId, count: usize) -> Vec<Contact> {
        self.table.read().nearest(target, count)
    }

    /// Info-hashes with at least one announced peer on record.
    pub fn announced_torrents(&self) -> usize {
        self.peer_store.lock().len()
    }

    /// Outstanding outbound transactions.
    pub fn pending_count(&self) -> usize {
        self.transactions.lock().pending.len()
    }

    /// Offers a contact to the routing table. An overflowing bucket may ask
    /// for one of its members to be probed; the probe is queued for the
    /// maintenance loop.
    pub fn add_contact(&self, contact: Contact) -> InsertOutcome {
        let outcome = self.table.write().insert(contact);

        match outcome {
            InsertOutcome::Replaced { evicted } => {
                trace!(evicted = %evicted.id, "bucket full, replaced member");
                self.last_queried.lock().remove(&evicted.id);
            }
            InsertOutcome::Probe { member } => {
                if self.probe_tx.try_send(member).is_err() {
                    trace!(member = %member.id, "probe queue full");
                }
            }
            _ => {}
        }

        outcome
    }

    fn forget(&self, id: &NodeId) {
        if self.table.write().remove(id).is_some() {
            trace!(%id, "removed unresponsive contact");
        }
        self.last_queried.lock().remove(id);
    }

    pub async fn ping(&self, addr: SocketAddr) -> Result<NodeId, DhtError> {
        let response = self.request(addr, None, Query::Ping).await?;
        Ok(response.id)
    }

    pub async fn find_node(&self, contact: &Contact, target: NodeId) -> Result<Vec<Contact>, DhtError> {
        let response = self
            .request(contact.addr, Some(contact.id), Query::FindNode { target })
            .await?;
        Ok(response.nodes)
    }

    pub async fn get_peers(&self, contact: &Contact, info_hash: InfoHash) -> Result<Response, DhtError> {
        self.request(contact.addr, Some(contact.id), Query::GetPeers { info_hash })
            .await
    }

    pub async fn announce_peer(
        &self,
        contact: &Contact,
        info_hash: InfoHash,
        port: u16,
        token: Bytes,
    ) -> Result<(), DhtError> {
        let query = Query::AnnouncePeer {
            info_hash,
            port,
            token,
            implied_port: false,
        };
        self.request(contact.addr, Some(contact.id), query).await?;
        Ok(())
    }

    fn register(&self, addr: SocketAddr) -> Result<(TransactionId, oneshot::Receiver<Result<Response, DhtError>>), DhtError> {
        let mut transactions = self.transactions.lock();
        if transactions.pending.len() >= self.config.max_pending_queries {
            return Err(DhtError::RateLimited);
        }

        // one pass over the id space at most
        let tid = (0..=u16::MAX)
            .find_map(|_| {
                transactions.next_id = transactions.next_id.wrapping_add(1);
                let tid = Bytes::copy_from_slice(&transactions.next_id.to_be_bytes());
                (!transactions.pending.contains_key(&tid)).then_some(tid)
            })
            .ok_or(DhtError::RateLimited)?;

        let (tx, rx) = oneshot::channel();
        transactions.pending.insert(tid.clone(), Pending { addr, tx });
        Ok((tid, rx))
    }

    /// Sends one query and waits for its reply.
    ///
    /// A reply welcomes the responder and every contact it lists into the
    /// routing table. A timeout removes `id` from it.
    pub(crate) async fn request(
        &self,
        addr: SocketAddr,
        id: Option<NodeId>,
        query: Query,
    ) -> Result<Response, DhtError> {
        let (tid, rx) = self.register(addr)?;
        let _guard = PendingGuard {
            transactions: &self.transactions,
            tid: tid.clone(),
        };

        if let Some(id) = id {
            self.last_queried.lock().insert(id, Instant::now());
        }

        let name = query.name();
        let data = KrpcMessage::query(tid, self.our_id, query).encode()?;
        self.socket.send_to(&data, addr).await;

        match timeout(self.config.rpc_timeout, rx).await {
            Ok(Ok(Ok(response))) => {
                self.add_contact(Contact::new(response.id, addr));
                for contact in &response.nodes {
                    self.add_contact(*contact);
                }
                Ok(response)
            }
            Ok(Ok(Err(e))) => Err(e),
            Ok(Err(_)) | Err(_) => {
                trace!(%addr, query = name, "query timed out");
                if let Some(id) = id {
                    self.forget(&id);
                }
                Err(DhtError::Timeout)
            }
        }
    }

    fn resolve(&self, tid: &TransactionId, from: SocketAddr, result: Result<Response, DhtError>) {
        let pending = {
            let mut transactions = self.transactions.lock();
            match transactions.pending.get(tid) {
                Some(p) if p.addr == from => transactions.pending.remove(tid),
                _ => None,
            }
        };

        match pending {
            Some(p) => {
                let _ = p.tx.send(result);
            }
            None => trace!(%from, "reply matches no pending transaction"),
        }
    }

    async fn send(&self, msg: KrpcMessage, addr: SocketAddr) {
        match msg.encode() {
            Ok(data) => self.socket.send_to(&data, addr).await,
            Err(e) => debug!(%addr, error = %e, "failed to encode reply"),
        }
    }

    async fn handle_datagram(&self, data: &[u8], from: SocketAddr) {
        let value = match decode(data) {
            Ok(value) => value,
            Err(e) => {
                trace!(%from, error = %e, "dropping undecodable datagram");
                return;
            }
        };

        let tid = match transaction_id(&value) {
            Ok(tid) => tid,
            Err(e) => {
                trace!(%from, error = %e, "dropping datagram");
                return;
            }
        };

        match KrpcMessage::from_value(tid.clone(), &value) {
            Ok(KrpcMessage { body, .. }) => match body {
                Body::Query { sender, query } => {
                    self.add_contact(Contact::new(sender, from));
                    let reply = self.handle_query(tid, from, query);
                    self.send(reply, from).await;
                }
                Body::Response(response) => self.resolve(&tid, from, Ok(response)),
                Body::Error { code, message } => {
                    self.resolve(&tid, from, Err(DhtError::Remote { code, message }))
                }
            },
            Err(DhtError::Protocol { code, message }) => {
                debug!(%from, code, %message, "rejecting query");
                self.send(KrpcMessage::error(tid, code, message), from).await;
            }
            Err(e) => trace!(%from, error = %e, "dropping datagram"),
        }
    }

    fn handle_query(&self, tid: TransactionId, from: SocketAddr, query: Query) -> KrpcMessage {
        match query {
            Query::Ping => KrpcMessage::response(tid, Response::new(self.our_id)),
            Query::FindNode { target } => {
                let nodes = {
                    let table = self.table.read();
                    match table.get(&target) {
                        Some(exact) => vec![exact],
                        None => table.nearest(&target, self.config.k),
                    }
                };
                KrpcMessage::response(tid, Response::new(self.our_id).with_nodes(nodes))
            }
            Query::GetPeers { info_hash } => {
                self.emit(DhtEvent::GetPeers { info_hash, from });

                let nodes = self.nearest(&NodeId::from(info_hash), self.config.k);
                let values = self.peer_store.lock().get_peers(&info_hash);

                let mut response = Response::new(self.our_id).with_nodes(nodes);
                response.token = Some(self.tokens.generate(&from));
                response.values = (!values.is_empty()).then_some(values);
                KrpcMessage::response(tid, response)
            }
            Query::AnnouncePeer {
                info_hash,
                port,
                token,
                implied_port,
            } => {
                if !self.tokens.verify(&from, &token) {
                    debug!(%from, %info_hash, "announce with bad token");
                    return KrpcMessage::error(tid, ERROR_PROTOCOL, "bad token");
                }

                let port = if implied_port { from.port() } else { port };
                let addr = SocketAddr::new(from.ip(), port);
                self.peer_store.lock().add_peer(info_hash, addr);
                self.emit(DhtEvent::Announce { info_hash, addr });

                KrpcMessage::response(tid, Response::new(self.our_id))
            }
        }
    }

    fn emit(&self, event: DhtEvent) {
        if self.events.try_send(event).is_err() {
            trace!("event channel full or closed, dropping event");
        }
    }

    /// Reads and answers datagrams until the task is dropped.
    pub async fn listen(&self) {
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
        loop {
            if let Some((n, from)) = self.socket.recv_from(&mut buf).await {
                self.handle_datagram(&buf[..n], from).await;
            }
        }
    }

    /// Keeps the routing table fresh: periodically queries every contact
    /// not queried recently, probes members of overflowing buckets and
    /// saves the table.
    pub async fn maintain(self: &Arc<Self>) {
        let mut refresh = interval(self.config.maintenance_interval);
        let mut save = interval(self.config.save_interval);
        refresh.set_missed_tick_behavior(MissedTickBehavior::Skip);
        save.set_missed_tick_behavior(MissedTickBehavior::Skip);

        save.tick().await;
        let mut probes = self.probe_rx.lock().await;

        loop {
            tokio::select! {
                _ = refresh.tick() => self.refresh_contacts(),
                _ = save.tick() => self.save_routing_table(),
                Some(member) = probes.recv() => self.spawn_find_node(member),
            }
        }
    }

    /// Runs [`listen`](Self::listen) and [`maintain`](Self::maintain)
    /// together.
    pub async fn run(self: &Arc<Self>) {
        tokio::select! {
            _ = self.listen() => {}
            _ = self.maintain() => {}
        }
    }

    fn refresh_contacts(self: &Arc<Self>) {
        let now = Instant::now();
        let cooldown = self.config.requery_cooldown;

        let due: Vec<Contact> = {
            let table = self.table.read();
            let mut last_queried = self.last_queried.lock();
            last_queried.retain(|id, _| table.contains(id));

            table
                .contacts()
                .into_iter()
                .filter(|c| {
                    last_queried
                        .get(&c.id)
                        .map_or(true, |at| now.duration_since(*at) >= cooldown)
                })
                .collect()
        };

        if !due.is_empty() {
            debug!(count = due.len(), "refreshing contacts");
        }

        let expired = self.peer_store.lock().expire(now);
        if expired > 0 {
            trace!(expired, "expired announced torrents");
        }

        for contact in due {
            self.spawn_find_node(contact);
        }
    }

    fn spawn_find_node(self: &Arc<Self>, contact: Contact) {
        self.last_queried.lock().insert(contact.id, Instant::now());

        let node = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = node.find_node(&contact, NodeId::generate()).await {
                trace!(contact = %contact.addr, error = %e, "maintenance query failed");
            }
        });
    }

    /// Hands the routing table to the store, if one is configured. Failures
    /// are logged only.
    pub fn save_routing_table(&self) {
        let Some(store) = &self.store else {
            return;
        };

        let port = match self.socket.local_addr() {
            Ok(addr) => addr.port(),
            Err(e) => {
                warn!(error = %e, "cannot save routing table");
                return;
            }
        };

        let snapshot = {
            let table = self.table.read();
            PersistedTable::from_table(&table, self.config.bind_addr.ip().to_string(), port)
        };

        match store.store_routing_table(&snapshot) {
            Ok(()) => debug!(contacts = snapshot.len(), "routing table saved"),
            Err(e) => warn!(error = %e, "failed to save routing table"),
        }
    }

    /// Seeds an empty table from the configured entry points, then crawls
    /// toward our own id. Returns the resulting table size.
    pub async fn bootstrap(&self) -> Result<usize, DhtError> {
        if self.table.read().is_empty() {
            let seeds = resolve_all(&self.config.bootstrap_nodes).await;
            if seeds.is_empty() {
                return Err(DhtError::BootstrapFailure(
                    "no bootstrap node could be resolved".into(),
                ));
            }

            let answered = join_all(seeds.iter().map(|addr| self.ping(*addr)))
                .await
                .into_iter()
                .filter(Result::is_ok)
                .count();

            if answered == 0 {
                return Err(DhtError::BootstrapFailure(format!(
                    "none of {} bootstrap nodes answered",
                    seeds.len()
                )));
            }

            debug!(answered, "bootstrap nodes answered");
        }

        self.crawl(self.our_id).await;

        let size = self.table_len();
        info!(contacts = size, "DHT bootstrap complete");
        Ok(size)
    }

    /// Iteratively looks up the contacts nearest to `target`.
    pub async fn crawl(&self, target: NodeId) -> Vec<Contact> {
        match self.spider(target).find_nodes(self).await {
            Lookup::Nodes(nodes) => nodes,
            Lookup::Peers { nodes, .. } => nodes,
        }
    }

    /// Iteratively looks for peers serving `info_hash`; empty when the
    /// lookup ends without finding any.
    pub async fn lookup_peers(&self, info_hash: InfoHash) -> Vec<SocketAddr> {
        match self.spider(NodeId::from(info_hash)).find_peers(self, info_hash).await {
            Lookup::Peers { peers, .. } => peers,
            Lookup::Nodes(_) => Vec::new(),
        }
    }

    fn spider(&self, target: NodeId) -> Spider {
        Spider::new(
            target,
            self.nearest(&target, self.config.k),
            self.config.k,
            self.config.alpha,
            self.config.max_crawl_rounds,
        )
        .exclude(self.our_id)
    }
}

async fn resolve_all(entries: &[String]) -> Vec<SocketAddr> {
    let lookups = entries.iter().map(|entry| async move {
        match tokio::net::lookup_host(entry.as_str()).await {
            Ok(mut addrs) => addrs.find(SocketAddr::is_ipv4),
            Err(e) => {
                warn!(entry = %entry, error = %e, "failed to resolve bootstrap node");
                None
            }
        }
    });

    join_all(lookups).await.into_iter().flatten().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn addr(n: u16) -> SocketAddr {
        SocketAddr::from(([192, 0, 2, 1], n))
    }

    fn hash(n: u32) -> InfoHash {
        let mut bytes = [0u8; 20];
        bytes[..4].copy_from_slice(&n.to_be_bytes());
        InfoHash(bytes)
    }

    #[tokio::test(start_paused = true)]
    async fn test_peer_store_forgets_expired_torrents() {
        let mut store = PeerStore::new(MAX_ANNOUNCED_TORRENTS);
        for n in 0..5000 {
            store.add_peer(hash(n), addr(6881));
        }
        assert_eq!(store.len(), 5000);

        tokio::time::advance(PEER_ANNOUNCE_LIFETIME * 2).await;
        store.add_peer(hash(9999), addr(6881));
        assert_eq!(store.expire(Instant::now()), 5000);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get_peers(&hash(9999)), vec![addr(6881)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_peer_store_caps_distinct_torrents() {
        let mut store = PeerStore::new(3);
        for n in 0..3 {
            store.add_peer(hash(n), addr(1));
        }
        store.add_peer(hash(3), addr(1));
        assert_eq!(store.len(), 3);
        assert!(store.get_peers(&hash(3)).is_empty());

        // known torrents still take new peers
        store.add_peer(hash(0), addr(2));
        assert_eq!(store.get_peers(&hash(0)).len(), 2);

        // expired torrents make room
        tokio::time::advance(PEER_ANNOUNCE_LIFETIME + Duration::from_secs(1)).await;
        store.add_peer(hash(3), addr(1));
        assert_eq!(store.len(), 1);
        assert_eq!(store.get_peers(&hash(3)), vec![addr(1)]);
    }

    #[tokio::test]
    async fn test_register_fails_when_every_id_is_in_flight() {
        let config = DhtConfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            bootstrap_nodes: Vec::new(),
            bandwidth: 0,
            max_pending_queries: usize::MAX,
            ..DhtConfig::default()
        };
        let (node, _) = DhtNode::bind(config).await.unwrap();

        let mut receivers = Vec::new();
        {
            let mut transactions = node.transactions.lock();
            for id in 0..=u16::MAX {
                let (tx, rx) = oneshot::channel();
                receivers.push(rx);
                transactions.pending.insert(
                    Bytes::copy_from_slice(&id.to_be_bytes()),
                    Pending { addr: addr(1), tx },
                );
            }
        }

        assert!(matches!(node.register(addr(1)), Err(DhtError::RateLimited)));

        node.transactions.lock().pending.remove(&Bytes::from_static(&[0x12, 0x34]));
        let Ok((tid, _rx)) = node.register(addr(1)) else {
            panic!("freed id was not reused");
        };
        assert_eq!(&tid[..], &[0x12, 0x34]);
    }
}
