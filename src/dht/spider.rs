use super::error::DhtError;
use super::message::{Query, Response};
use super::node::{Contact, Distance, NodeId};
use super::server::DhtNode;
use crate::info_hash::InfoHash;
use futures::future::join_all;
use indexmap::IndexSet;
use std::net::SocketAddr;
use tracing::{debug, trace};

/// Result of an iterative lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// The nearest contacts found, closest first.
    Nodes(Vec<Contact>),
    /// A node answered `get_peers` with peer addresses.
    Peers {
        peers: Vec<SocketAddr>,
        nodes: Vec<Contact>,
    },
}

/// State of one iterative lookup toward `target`.
///
/// Each round queries up to `alpha` not-yet-queried contacts among the `k`
/// nearest known ones and merges what they return. The lookup stops when a
/// round brings nothing closer than the best contact known before it, when
/// `k` contacts have answered, when nobody is left to ask, or after
/// `max_rounds`.
#[derive(Debug, Clone)]
pub struct Spider {
    target: NodeId,
    k: usize,
    alpha: usize,
    max_rounds: usize,
    nearest: Vec<Contact>,
    queried: IndexSet<NodeId>,
    responded: usize,
}

impl Spider {
    pub fn new(target: NodeId, seeds: Vec<Contact>, k: usize, alpha: usize, max_rounds: usize) -> Self {
        let mut spider = Self {
            target,
            k: k.max(1),
            alpha: alpha.max(1),
            max_rounds,
            nearest: Vec::new(),
            queried: IndexSet::new(),
            responded: 0,
        };
        spider.merge(seeds);
        spider
    }

    /// Never queries or returns `id`; used to keep the local node out of
    /// its own lookups.
    pub fn exclude(mut self, id: NodeId) -> Self {
        self.queried.insert(id);
        self.discard(&id);
        self
    }

    pub fn target(&self) -> &NodeId {
        &self.target
    }

    pub fn nearest(&self) -> &[Contact] {
        &self.nearest
    }

    pub fn queried(&self) -> usize {
        self.queried.len()
    }

    pub fn responded(&self) -> usize {
        self.responded
    }

    fn best_distance(&self) -> Option<Distance> {
        self.nearest.first().map(|c| c.id.distance(&self.target))
    }

    /// Picks the next contacts to query and marks them as queried.
    pub fn next_batch(&mut self) -> Vec<Contact> {
        let batch: Vec<Contact> = self
            .nearest
            .iter()
            .filter(|c| !self.queried.contains(&c.id))
            .take(self.alpha)
            .copied()
            .collect();

        self.queried.extend(batch.iter().map(|c| c.id));
        batch
    }

    /// Merges contacts into the nearest set, keeping it sorted and at most
    /// `k` long. Contacts already queried are not re-added.
    pub fn merge(&mut self, found: Vec<Contact>) {
        for contact in found {
            if self.queried.contains(&contact.id)
                || self.nearest.iter().any(|c| c.id == contact.id)
            {
                continue;
            }
            self.nearest.push(contact);
        }

        let target = self.target;
        self.nearest.sort_by_key(|c| c.id.distance(&target));
        self.nearest.truncate(self.k);
    }

    /// Drops a contact that failed to answer.
    pub fn discard(&mut self, id: &NodeId) {
        self.nearest.retain(|c| &c.id != id);
    }

    pub async fn find_nodes(self, node: &DhtNode) -> Lookup {
        let target = self.target;
        self.run(node, Query::FindNode { target }).await
    }

    pub async fn find_peers(self, node: &DhtNode, info_hash: InfoHash) -> Lookup {
        self.run(node, Query::GetPeers { info_hash }).await
    }

    async fn run(mut self, node: &DhtNode, query: Query) -> Lookup {
        for round in 0..self.max_rounds {
            let batch = self.next_batch();
            if batch.is_empty() {
                break;
            }

            let best_before = self.best_distance();
            let results: Vec<Result<Response, DhtError>> = join_all(
                batch
                    .iter()
                    .map(|c| node.request(c.addr, Some(c.id), query.clone())),
            )
            .await;

            for (contact, result) in batch.iter().zip(results) {
                match result {
                    Ok(response) => {
                        self.responded += 1;

                        if let Some(peers) = response.values.filter(|v| !v.is_empty()) {
                            debug!(lookup = %self.target, peers = peers.len(), round, "lookup found peers");
                            self.merge(response.nodes);
                            return Lookup::Peers {
                                peers,
                                nodes: self.nearest,
                            };
                        }

                        self.merge(response.nodes);
                    }
                    Err(e) => {
                        trace!(contact = %contact.addr, error = %e, "lookup query failed");
                        self.discard(&contact.id);
                    }
                }
            }

            let improved = match (best_before, self.best_distance()) {
                (Some(before), Some(after)) => after < before,
                (None, Some(_)) => true,
                _ => false,
            };

            if !improved || self.responded >= self.k {
                break;
            }
        }

        debug!(
            lookup = %self.target,
            queried = self.queried.len(),
            responded = self.responded,
            found = self.nearest.len(),
            "lookup finished"
        );
        Lookup::Nodes(self.nearest)
    }
}
