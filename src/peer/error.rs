use thiserror::Error;

/// Why a metadata fetch from one peer failed.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Connecting, or waiting for the next message, took too long.
    #[error("timeout")]
    Timeout,

    #[error("connection closed")]
    ConnectionClosed,

    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// The peer does not offer ut_metadata or did not say how large the
    /// metadata is.
    #[error("peer does not support metadata exchange")]
    UnsupportedExtension,

    /// The assembled metadata does not hash to the requested info-hash.
    #[error("metadata hash mismatch")]
    HashMismatch,

    /// The peer refused to send a piece.
    #[error("peer rejected metadata piece {0}")]
    Rejected(u32),

    /// Verified bytes that do not form a usable info dictionary.
    #[error("invalid metadata: {0}")]
    InvalidMetadata(String),

    #[error("bencode error: {0}")]
    Bencode(#[from] crate::bencode::BencodeError),
}
