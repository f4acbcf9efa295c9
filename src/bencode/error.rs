use thiserror::Error;

/// Why a byte sequence is not valid bencode.
///
/// Offsets count from the start of the decoded input.
#[derive(Debug, Error)]
pub enum BencodeError {
    #[error("input ends before the value is complete")]
    UnexpectedEof,

    #[error("malformed integer: {0}")]
    InvalidInteger(String),

    #[error("byte string length is not a number")]
    InvalidStringLength,

    #[error("unexpected byte {byte:?} at offset {offset}")]
    UnexpectedChar { byte: char, offset: usize },

    #[error("{0} bytes left after the value")]
    TrailingData(usize),

    #[error("more than {0} nested containers")]
    NestingTooDeep(usize),

    #[error("write failed: {0}")]
    Io(#[from] std::io::Error),
}
