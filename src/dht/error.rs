use thiserror::Error;

#[derive(Debug, Error)]
pub enum DhtError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Undecodable or structurally invalid datagram; dropped without reply.
    #[error("malformed message: {0}")]
    MalformedMessage(String),

    /// A well-formed query we refuse; answered with a KRPC error.
    #[error("protocol error {code}: {message}")]
    Protocol { code: i64, message: String },

    /// The remote node answered our query with a KRPC error.
    #[error("remote error {code}: {message}")]
    Remote { code: i64, message: String },

    #[error("invalid node id length")]
    InvalidNodeId,

    #[error("timeout")]
    Timeout,

    #[error("rate limited")]
    RateLimited,

    #[error("bootstrap failed: {0}")]
    BootstrapFailure(String),
}

impl From<crate::bencode::BencodeError> for DhtError {
    fn from(e: crate::bencode::BencodeError) -> Self {
        DhtError::MalformedMessage(e.to_string())
    }
}
