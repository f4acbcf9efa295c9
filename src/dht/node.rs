use super::error::DhtError;
use crate::info_hash::{hex_decode, hex_encode, InfoHash};
use rand::Rng as _;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, SocketAddrV4};

pub const COMPACT_NODE_LEN: usize = 26;
pub const COMPACT_PEER_LEN: usize = 6;

/// A 160-bit DHT node identifier, ordered as a big-endian unsigned integer.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub [u8; 20]);

impl NodeId {
    pub fn generate() -> Self {
        let mut id = [0u8; 20];
        rand::rng().fill(&mut id);
        Self(id)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DhtError> {
        let id: [u8; 20] = bytes.try_into().map_err(|_| DhtError::InvalidNodeId)?;
        Ok(Self(id))
    }

    pub fn from_hex(s: &str) -> Result<Self, DhtError> {
        let bytes = hex_decode(s).ok_or(DhtError::InvalidNodeId)?;
        Self::from_bytes(&bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex_encode(&self.0)
    }

    pub fn distance(&self, other: &NodeId) -> Distance {
        let mut dist = [0u8; 20];
        for (i, d) in dist.iter_mut().enumerate() {
            *d = self.0[i] ^ other.0[i];
        }
        Distance(dist)
    }

    /// Index of the bucket `other` falls into relative to `self`.
    pub fn bucket_index(&self, other: &NodeId) -> usize {
        self.distance(other).bucket_index()
    }
}

impl From<InfoHash> for NodeId {
    fn from(hash: InfoHash) -> Self {
        Self(hash.0)
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({:02x}{:02x}..)", self.0[0], self.0[1])
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// XOR distance between two ids. Derived ordering is big-endian numeric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Distance(pub [u8; 20]);

impl Distance {
    pub const ZERO: Distance = Distance([0u8; 20]);

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|&b| b == 0)
    }

    /// `floor(log2(distance))`, or 0 for a zero distance.
    ///
    /// ```
    /// use mlspider::dht::Distance;
    ///
    /// let mut d = [0u8; 20];
    /// d[19] = 0b0000_0101;
    /// assert_eq!(Distance(d).bucket_index(), 2);
    /// assert_eq!(Distance::ZERO.bucket_index(), 0);
    /// ```
    pub fn bucket_index(&self) -> usize {
        for (i, &byte) in self.0.iter().enumerate() {
            if byte != 0 {
                let bit_from_top = i * 8 + byte.leading_zeros() as usize;
                return 159 - bit_from_top;
            }
        }

        0
    }
}

/// A known DHT node: identity plus UDP endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Contact {
    pub id: NodeId,
    pub addr: SocketAddr,
}

impl Contact {
    pub fn new(id: NodeId, addr: SocketAddr) -> Self {
        Self { id, addr }
    }

    pub fn from_compact(data: &[u8]) -> Option<Self> {
        if data.len() != COMPACT_NODE_LEN {
            return None;
        }

        let id = NodeId::from_bytes(&data[..20]).ok()?;
        let addr = decode_compact_peer(&data[20..])?;

        Some(Self::new(id, addr))
    }

    /// The 26-byte compact form; `None` for IPv6 contacts.
    pub fn to_compact(&self) -> Option<[u8; COMPACT_NODE_LEN]> {
        let mut compact = [0u8; COMPACT_NODE_LEN];
        compact[..20].copy_from_slice(&self.id.0);
        compact[20..].copy_from_slice(&encode_compact_peer(&self.addr)?);
        Some(compact)
    }
}

pub fn decode_compact_peer(data: &[u8]) -> Option<SocketAddr> {
    if data.len() != COMPACT_PEER_LEN {
        return None;
    }

    let ip = Ipv4Addr::new(data[0], data[1], data[2], data[3]);
    let port = u16::from_be_bytes([data[4], data[5]]);
    Some(SocketAddr::new(IpAddr::V4(ip), port))
}

pub fn encode_compact_peer(addr: &SocketAddr) -> Option<[u8; COMPACT_PEER_LEN]> {
    match addr {
        SocketAddr::V4(v4) => Some(compact_v4(v4)),
        SocketAddr::V6(_) => None,
    }
}

fn compact_v4(addr: &SocketAddrV4) -> [u8; COMPACT_PEER_LEN] {
    let mut data = [0u8; COMPACT_PEER_LEN];
    data[..4].copy_from_slice(&addr.ip().octets());
    data[4..].copy_from_slice(&addr.port().to_be_bytes());
    data
}

/// Concatenated compact forms of every IPv4 contact.
pub fn encode_compact_nodes(contacts: &[Contact]) -> Vec<u8> {
    contacts
        .iter()
        .filter_map(|c| c.to_compact())
        .flatten()
        .collect()
}

/// Parses a `nodes` string; a length that is not a multiple of 26 yields
/// nothing.
pub fn decode_compact_nodes(data: &[u8]) -> Vec<Contact> {
    if data.len() % COMPACT_NODE_LEN != 0 {
        return Vec::new();
    }

    data.chunks_exact(COMPACT_NODE_LEN)
        .filter_map(Contact::from_compact)
        .collect()
}
