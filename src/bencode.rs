//! Bencode encoding and decoding ([BEP-3]).
//!
//! Bencode is the serialization format of both KRPC datagrams on the DHT and
//! the extension messages exchanged on the peer wire.
//!
//! # Data Types
//!
//! | Type | Format | Example |
//! |------|--------|---------|
//! | Integer | `i<number>e` | `i42e` → 42 |
//! | Byte String | `<length>:<data>` | `4:spam` → "spam" |
//! | List | `l<items>e` | `l4:spami42ee` → ["spam", 42] |
//! | Dictionary | `d<key><value>...e` | `d3:foo3:bare` → {"foo": "bar"} |
//!
//! Dictionaries decode in the order their keys appear on the wire and are
//! always encoded with their keys sorted.
//!
//! # Examples
//!
//! ```
//! use mlspider::bencode::{decode, encode, Value};
//!
//! let value = decode(b"d1:y1:q1:t2:aae").unwrap();
//! assert_eq!(value.get(b"y").and_then(|v| v.as_str()), Some("q"));
//!
//! // Keys come back out sorted.
//! assert_eq!(encode(&value).unwrap(), b"d1:t2:aa1:y1:qe");
//! ```
//!
//! # Error Handling
//!
//! Decoding never panics on hostile input. A datagram that fails to decode
//! is simply dropped by the DHT node; the error says where it went wrong:
//!
//! - [`BencodeError::UnexpectedEof`] - truncated string, list or dictionary
//! - [`BencodeError::InvalidInteger`] - empty, non-numeric or non-canonical (`i03e`, `i-0e`)
//! - [`BencodeError::InvalidStringLength`] - non-numeric length prefix
//! - [`BencodeError::UnexpectedChar`] - a byte that cannot start a value, or a non-string key
//! - [`BencodeError::NestingTooDeep`] - more than 64 nested containers
//! - [`BencodeError::TrailingData`] - bytes left after a complete value
//!
//! [BEP-3]: http://bittorrent.org/beps/bep_0003.html

mod decode;
mod encode;
mod error;
mod value;

pub use decode::{decode, decode_prefix};
pub use encode::{encode, encode_to};
pub use error::BencodeError;
pub use value::{Dict, Value};

#[cfg(test)]
mod tests;
