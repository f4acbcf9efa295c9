use rand::Rng;

use super::node::{Contact, NodeId};
use crate::constants::NUM_BUCKETS;

/// What [`RoutingTable::insert`] did with a contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// Appended to a bucket with room.
    Inserted,
    /// Already known; its address was refreshed.
    AlreadyPresent,
    /// The bucket was full and a random member made room for the newcomer.
    Replaced { evicted: Contact },
    /// The bucket was full and left untouched; `member` should be probed with
    /// `find_node` so a timeout can free its slot.
    Probe { member: Contact },
    /// The contact carries our own id.
    Ignored,
}

/// XOR-metric bucket table of known contacts.
///
/// Bucket `i` holds contacts whose distance to the local id has its highest
/// set bit at position `i`. The table is a plain value; share it behind a
/// single lock.
#[derive(Debug, Clone)]
pub struct RoutingTable {
    our_id: NodeId,
    capacity: usize,
    buckets: Vec<Vec<Contact>>,
}

impl RoutingTable {
    pub fn new(our_id: NodeId, capacity: usize) -> Self {
        Self {
            our_id,
            capacity: capacity.max(1),
            buckets: vec![Vec::new(); NUM_BUCKETS],
        }
    }

    pub fn our_id(&self) -> &NodeId {
        &self.our_id
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn insert(&mut self, contact: Contact) -> InsertOutcome {
        self.insert_with(contact, &mut rand::rng())
    }

    pub fn insert_with<R: Rng + ?Sized>(&mut self, contact: Contact, rng: &mut R) -> InsertOutcome {
        if contact.id == self.our_id {
            return InsertOutcome::Ignored;
        }

        let capacity = self.capacity;
        let bucket = &mut self.buckets[self.our_id.bucket_index(&contact.id)];

        if let Some(existing) = bucket.iter_mut().find(|c| c.id == contact.id) {
            existing.addr = contact.addr;
            return InsertOutcome::AlreadyPresent;
        }

        if bucket.len() < capacity {
            bucket.push(contact);
            return InsertOutcome::Inserted;
        }

        let victim = rng.random_range(0..bucket.len());
        if rng.random_bool(0.5) {
            let evicted = std::mem::replace(&mut bucket[victim], contact);
            InsertOutcome::Replaced { evicted }
        } else {
            InsertOutcome::Probe {
                member: bucket[victim],
            }
        }
    }

    pub fn remove(&mut self, id: &NodeId) -> Option<Contact> {
        let bucket = &mut self.buckets[self.our_id.bucket_index(id)];
        let pos = bucket.iter().position(|c| &c.id == id)?;
        Some(bucket.swap_remove(pos))
    }

    pub fn get(&self, id: &NodeId) -> Option<Contact> {
        self.buckets[self.our_id.bucket_index(id)]
            .iter()
            .find(|c| &c.id == id)
            .copied()
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.get(id).is_some()
    }

    /// Up to `count` contacts nearest to `target`.
    ///
    /// Starts at the bucket the target falls into, then walks toward lower
    /// buckets (closer to us and, for this target, no farther than the
    /// starting bucket) and finally toward higher ones, stopping once enough
    /// candidates are gathered. The candidates are then ranked by their XOR
    /// distance to the target.
    pub fn nearest(&self, target: &NodeId, count: usize) -> Vec<Contact> {
        if count == 0 {
            return Vec::new();
        }

        let start = self.our_id.bucket_index(target);
        let order = (0..=start).rev().chain(start + 1..NUM_BUCKETS);

        let mut candidates = Vec::new();
        for idx in order {
            candidates.extend_from_slice(&self.buckets[idx]);
            if candidates.len() >= count {
                break;
            }
        }

        candidates.sort_by_key(|c| c.id.distance(target));
        candidates.truncate(count);
        candidates
    }

    pub fn len(&self) -> usize {
        self.buckets.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(Vec::is_empty)
    }

    pub fn bucket(&self, index: usize) -> &[Contact] {
        self.buckets.get(index).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn buckets(&self) -> &[Vec<Contact>] {
        &self.buckets
    }

    pub fn contacts(&self) -> Vec<Contact> {
        self.buckets.iter().flatten().copied().collect()
    }

    /// Rebuilds a table from a bucket snapshot. Contacts are re-bucketed
    /// against `our_id`, so a snapshot taken under another id still loads.
    pub fn from_buckets(our_id: NodeId, capacity: usize, buckets: Vec<Vec<Contact>>) -> Self {
        let mut table = Self::new(our_id, capacity);
        table.restore(buckets.into_iter().flatten());
        table
    }

    /// Re-adds previously persisted contacts, skipping any that would
    /// overflow a bucket.
    pub fn restore<I: IntoIterator<Item = Contact>>(&mut self, contacts: I) -> usize {
        let mut restored = 0;
        for contact in contacts {
            if contact.id == self.our_id {
                continue;
            }
            let bucket = &mut self.buckets[self.our_id.bucket_index(&contact.id)];
            if bucket.len() < self.capacity && !bucket.iter().any(|c| c.id == contact.id) {
                bucket.push(contact);
                restored += 1;
            }
        }
        restored
    }
}
