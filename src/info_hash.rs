//! Torrent info-hashes.

use std::fmt;

use sha1::{Digest, Sha1};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("invalid info hash: expected 20 bytes or 40 hex characters")]
pub struct InvalidInfoHash;

/// The SHA-1 of a torrent's bencoded info dictionary.
///
/// Doubles as a DHT lookup target and as the checksum that fetched metadata
/// must match.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InfoHash(pub [u8; 20]);

impl InfoHash {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, InvalidInfoHash> {
        let arr: [u8; 20] = bytes.try_into().map_err(|_| InvalidInfoHash)?;
        Ok(Self(arr))
    }

    /// Parses a 40-character hex string, case-insensitive.
    ///
    /// ```
    /// use mlspider::InfoHash;
    ///
    /// let hash = InfoHash::from_hex("0123456789ABCDEF0123456789abcdef01234567").unwrap();
    /// assert_eq!(hash.to_hex(), "0123456789abcdef0123456789abcdef01234567");
    /// assert!(InfoHash::from_hex("abcd").is_err());
    /// ```
    pub fn from_hex(s: &str) -> Result<Self, InvalidInfoHash> {
        let bytes = hex_decode(s).ok_or(InvalidInfoHash)?;
        Self::from_bytes(&bytes)
    }

    /// Hashes raw metadata bytes.
    pub fn of(data: &[u8]) -> Self {
        Self(Sha1::digest(data).into())
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex_encode(&self.0)
    }
}

impl fmt::Debug for InfoHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InfoHash({})", self.to_hex())
    }
}

impl fmt::Display for InfoHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl From<[u8; 20]> for InfoHash {
    fn from(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }
}

pub(crate) fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut s, b| {
        use std::fmt::Write;
        let _ = write!(s, "{:02x}", b);
        s
    })
}

pub(crate) fn hex_decode(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 || !s.is_ascii() {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).ok())
        .collect()
}
