//! Mainline DHT ([BEP-5]).
//!
//! [`DhtNode`] speaks KRPC over a bandwidth-limited UDP socket, answers the
//! four standard queries, and reports the info-hashes other nodes ask about
//! or announce. Its [`RoutingTable`] is sized for crawling: buckets hold
//! many more contacts than Kademlia's usual eight, and a full bucket makes
//! room by coin flip rather than by pinging its oldest member.
//!
//! Iterative lookups are driven by a [`Spider`].
//!
//! [BEP-5]: http://bittorrent.org/beps/bep_0005.html

mod error;
mod message;
mod node;
mod routing;
mod server;
mod spider;
mod token;

pub use error::DhtError;
pub use message::{
    Body, KrpcMessage, Query, Response, TransactionId, ERROR_GENERIC, ERROR_METHOD_UNKNOWN,
    ERROR_PROTOCOL, ERROR_SERVER,
};
pub use node::{
    decode_compact_nodes, decode_compact_peer, encode_compact_nodes, encode_compact_peer, Contact,
    Distance, NodeId, COMPACT_NODE_LEN, COMPACT_PEER_LEN,
};
pub use routing::{InsertOutcome, RoutingTable};
pub use server::{DhtEvent, DhtNode};
pub use spider::{Lookup, Spider};
pub use token::TokenManager;
