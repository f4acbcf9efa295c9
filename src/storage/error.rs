use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid info hash: {0}")]
    InvalidInfoHash(String),

    #[error("invalid record: {0}")]
    InvalidRecord(String),
}
