//! Metadata download over the peer wire protocol (BEP-3, BEP-9, BEP-10).
//!
//! Only the slice of the protocol needed to obtain an info dictionary is
//! spoken here: the opening handshake, the extension handshake and the
//! ut_metadata piece exchange. Every other peer message is read and
//! skipped.
//!
//! ```no_run
//! use mlspider::config::FetchConfig;
//! use mlspider::info_hash::InfoHash;
//! use mlspider::peer::{fetch_metadata, PeerId};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let info_hash = InfoHash::from_hex("c12fe1c06bba254a9dc9f519b335aa7c1367a88a")?;
//! let metadata = fetch_metadata(
//!     "203.0.113.7:51413".parse()?,
//!     info_hash,
//!     PeerId::generate(),
//!     &FetchConfig::default(),
//! )
//! .await?;
//! println!("{} ({} bytes)", metadata.name, metadata.total_length());
//! # Ok(())
//! # }
//! ```

mod error;
mod extension;
mod fetch;
mod message;
mod metadata;
mod peer_id;
mod transport;

pub use error::MetadataError;
pub use extension::{ExtensionHandshake, EXTENSION_HANDSHAKE_ID, UT_METADATA};
pub use fetch::{fetch_metadata, FetchState};
pub use message::{Handshake, Message, EXTENDED_ID, HANDSHAKE_LEN, PROTOCOL};
pub use metadata::{
    metadata_piece_count, FileEntry, MetadataAssembly, MetadataMessage, MetadataMessageType,
    TorrentMetadata,
};
pub use peer_id::PeerId;
pub use transport::PeerTransport;

#[cfg(test)]
mod tests;
