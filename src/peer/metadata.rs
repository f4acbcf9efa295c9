//! Metadata exchange (ut_metadata, [BEP-9]).
//!
//! Metadata travels in 16 KiB pieces. A data message is a bencoded
//! dictionary immediately followed by the raw piece bytes. Pieces are
//! collected in a [`MetadataAssembly`] until the announced size is reached,
//! then the whole is checked against the info-hash and parsed into
//! [`TorrentMetadata`].
//!
//! [BEP-9]: http://bittorrent.org/beps/bep_0009.html

use std::collections::BTreeMap;

use bytes::{Bytes, BytesMut};
use tracing::trace;

use super::error::MetadataError;
use crate::bencode::{decode, decode_prefix, encode, Value};
use crate::constants::METADATA_PIECE_SIZE;
use crate::info_hash::InfoHash;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataMessageType {
    Request = 0,
    Data = 1,
    Reject = 2,
}

impl MetadataMessageType {
    pub fn from_integer(v: i64) -> Option<Self> {
        match v {
            0 => Some(MetadataMessageType::Request),
            1 => Some(MetadataMessageType::Data),
            2 => Some(MetadataMessageType::Reject),
            _ => None,
        }
    }
}

/// A ut_metadata message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataMessage {
    pub msg_type: MetadataMessageType,
    pub piece: u32,
    /// Only in data messages.
    pub total_size: Option<i64>,
    /// Only in data messages.
    pub data: Option<Bytes>,
}

impl MetadataMessage {
    pub fn request(piece: u32) -> Self {
        Self {
            msg_type: MetadataMessageType::Request,
            piece,
            total_size: None,
            data: None,
        }
    }

    pub fn data(piece: u32, total_size: i64, data: Bytes) -> Self {
        Self {
            msg_type: MetadataMessageType::Data,
            piece,
            total_size: Some(total_size),
            data: Some(data),
        }
    }

    pub fn reject(piece: u32) -> Self {
        Self {
            msg_type: MetadataMessageType::Reject,
            piece,
            total_size: None,
            data: None,
        }
    }

    pub fn encode(&self) -> Result<Bytes, MetadataError> {
        let mut fields = vec![
            ("msg_type", Value::Integer(self.msg_type as i64)),
            ("piece", Value::Integer(i64::from(self.piece))),
        ];
        if let Some(total_size) = self.total_size {
            fields.push(("total_size", Value::Integer(total_size)));
        }

        let dict = encode(&Value::dict(fields))?;
        let mut buf = BytesMut::with_capacity(dict.len() + self.data.as_ref().map_or(0, Bytes::len));
        buf.extend_from_slice(&dict);
        if let Some(data) = &self.data {
            buf.extend_from_slice(data);
        }
        Ok(buf.freeze())
    }

    pub fn decode(payload: &Bytes) -> Result<Self, MetadataError> {
        let (value, consumed) = decode_prefix(payload)?;

        let field = |key: &[u8]| value.get(key).and_then(Value::as_integer);

        let msg_type = field(b"msg_type")
            .and_then(MetadataMessageType::from_integer)
            .ok_or_else(|| MetadataError::InvalidMessage("missing or unknown msg_type".into()))?;

        let piece = field(b"piece")
            .and_then(|p| u32::try_from(p).ok())
            .ok_or_else(|| MetadataError::InvalidMessage("missing piece".into()))?;

        let data = (msg_type == MetadataMessageType::Data).then(|| payload.slice(consumed..));

        Ok(Self {
            msg_type,
            piece,
            total_size: field(b"total_size"),
            data,
        })
    }
}

pub fn metadata_piece_count(metadata_size: usize) -> usize {
    metadata_size.div_ceil(METADATA_PIECE_SIZE)
}

/// Metadata pieces collected so far, keyed by piece index.
#[derive(Debug, Clone)]
pub struct MetadataAssembly {
    expected_size: usize,
    pieces: BTreeMap<u32, Bytes>,
    received: usize,
}

impl MetadataAssembly {
    pub fn new(expected_size: usize) -> Self {
        Self {
            expected_size,
            pieces: BTreeMap::new(),
            received: 0,
        }
    }

    pub fn expected_size(&self) -> usize {
        self.expected_size
    }

    pub fn piece_count(&self) -> usize {
        metadata_piece_count(self.expected_size)
    }

    pub fn received_size(&self) -> usize {
        self.received
    }

    /// Stores a piece. Indexes outside the announced size and repeated
    /// pieces are ignored.
    pub fn insert(&mut self, piece: u32, data: Bytes) -> bool {
        if piece as usize >= self.piece_count() || self.pieces.contains_key(&piece) {
            trace!(piece, "ignoring metadata piece");
            return false;
        }

        self.received += data.len();
        self.pieces.insert(piece, data);
        true
    }

    pub fn is_complete(&self) -> bool {
        self.received >= self.expected_size
    }

    /// The pieces concatenated in index order.
    pub fn assemble(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.received);
        for data in self.pieces.values() {
            buf.extend_from_slice(data);
        }
        buf.freeze()
    }

    /// Checks the assembled bytes against `info_hash` and parses them.
    pub fn verify(&self, info_hash: &InfoHash) -> Result<TorrentMetadata, MetadataError> {
        let raw = self.assemble();
        if InfoHash::of(&raw) != *info_hash {
            return Err(MetadataError::HashMismatch);
        }
        TorrentMetadata::from_info_bytes(*info_hash, raw)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub path: Vec<String>,
    pub length: u64,
}

/// A verified info dictionary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TorrentMetadata {
    pub info_hash: InfoHash,
    pub name: String,
    /// For a single-file torrent, one entry whose path is `[name]`.
    pub files: Vec<FileEntry>,
    pub piece_length: u64,
    pub info: Value,
    pub raw: Bytes,
}

impl TorrentMetadata {
    pub fn from_info_bytes(info_hash: InfoHash, raw: Bytes) -> Result<Self, MetadataError> {
        let info = decode(&raw).map_err(|e| MetadataError::InvalidMetadata(e.to_string()))?;
        if info.as_dict().is_none() {
            return Err(invalid("info is not a dictionary"));
        }

        let name = text(&info, b"name").ok_or_else(|| invalid("missing name"))?;

        let piece_length = info
            .get(b"piece length")
            .and_then(Value::as_integer)
            .and_then(|l| u64::try_from(l).ok())
            .ok_or_else(|| invalid("missing piece length"))?;

        let files = match info.get(b"files").and_then(Value::as_list) {
            Some(list) => list.iter().map(parse_file).collect::<Result<Vec<_>, _>>()?,
            None => {
                let length = length_of(&info).ok_or_else(|| invalid("missing length"))?;
                vec![FileEntry {
                    path: vec![name.clone()],
                    length,
                }]
            }
        };

        Ok(Self {
            info_hash,
            name,
            files,
            piece_length,
            info,
            raw,
        })
    }

    pub fn total_length(&self) -> u64 {
        self.files.iter().map(|f| f.length).sum()
    }
}

fn invalid(msg: &str) -> MetadataError {
    MetadataError::InvalidMetadata(msg.to_string())
}

/// Reads `key`, preferring its `.utf-8` variant when present.
fn text(value: &Value, key: &[u8]) -> Option<String> {
    let mut utf8_key = key.to_vec();
    utf8_key.extend_from_slice(b".utf-8");

    value
        .get(&utf8_key)
        .or_else(|| value.get(key))
        .and_then(Value::as_bytes)
        .map(|b| String::from_utf8_lossy(b).into_owned())
}

fn length_of(value: &Value) -> Option<u64> {
    value
        .get(b"length")
        .and_then(Value::as_integer)
        .and_then(|l| u64::try_from(l).ok())
}

fn parse_file(entry: &Value) -> Result<FileEntry, MetadataError> {
    let length = length_of(entry).ok_or_else(|| invalid("file without length"))?;

    let path = entry
        .get(b"path.utf-8")
        .or_else(|| entry.get(b"path"))
        .and_then(Value::as_list)
        .ok_or_else(|| invalid("file without path"))?
        .iter()
        .map(|part| {
            part.as_bytes()
                .map(|b| String::from_utf8_lossy(b).into_owned())
                .ok_or_else(|| invalid("path component is not a string"))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(FileEntry { path, length })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_file_info() -> Bytes {
        Bytes::from(
            encode(&Value::dict([
                ("length", Value::Integer(1024)),
                ("name", Value::string("song.flac")),
                ("piece length", Value::Integer(16384)),
                ("pieces", Value::bytes(&[0u8; 20])),
            ]))
            .unwrap(),
        )
    }

    #[test]
    fn test_data_message_keeps_trailing_bytes() {
        let msg = MetadataMessage::data(2, 40000, Bytes::from_static(b"raw piece"));
        let encoded = msg.encode().unwrap();
        assert!(encoded.starts_with(b"d8:msg_typei1e5:piecei2e10:total_sizei40000ee"));

        let decoded = MetadataMessage::decode(&encoded).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn test_request_and_reject() {
        let request = MetadataMessage::request(5).encode().unwrap();
        assert_eq!(&request[..], b"d8:msg_typei0e5:piecei5ee");

        let reject = MetadataMessage::decode(&MetadataMessage::reject(3).encode().unwrap()).unwrap();
        assert_eq!(reject.msg_type, MetadataMessageType::Reject);
        assert_eq!(reject.piece, 3);
        assert!(reject.data.is_none());
    }

    #[test]
    fn test_unknown_msg_type() {
        let payload = Bytes::from_static(b"d8:msg_typei7e5:piecei0ee");
        assert!(matches!(
            MetadataMessage::decode(&payload),
            Err(MetadataError::InvalidMessage(_))
        ));
    }

    #[test]
    fn test_metadata_piece_count() {
        assert_eq!(metadata_piece_count(0), 0);
        assert_eq!(metadata_piece_count(1), 1);
        assert_eq!(metadata_piece_count(16384), 1);
        assert_eq!(metadata_piece_count(16385), 2);
        assert_eq!(metadata_piece_count(50000), 4);
    }

    #[test]
    fn test_assembly_orders_pieces() {
        let mut assembly = MetadataAssembly::new(16384 + 3);
        assert_eq!(assembly.piece_count(), 2);

        assert!(assembly.insert(1, Bytes::from_static(b"end")));
        assert!(!assembly.is_complete());
        assert!(assembly.insert(0, Bytes::from(vec![b'a'; 16384])));
        assert!(assembly.is_complete());

        let whole = assembly.assemble();
        assert_eq!(whole.len(), 16387);
        assert!(whole.ends_with(b"end"));
    }

    #[test]
    fn test_assembly_ignores_out_of_range_and_repeats() {
        let mut assembly = MetadataAssembly::new(10);
        assert!(!assembly.insert(1, Bytes::from_static(b"xx")));
        assert!(assembly.insert(0, Bytes::from_static(b"12345")));
        assert!(!assembly.insert(0, Bytes::from_static(b"12345")));
        assert_eq!(assembly.received_size(), 5);
    }

    #[test]
    fn test_verify_single_file() {
        let info = single_file_info();
        let info_hash = InfoHash::of(&info);

        let mut assembly = MetadataAssembly::new(info.len());
        assembly.insert(0, info.clone());
        let metadata = assembly.verify(&info_hash).unwrap();

        assert_eq!(metadata.info_hash, info_hash);
        assert_eq!(metadata.name, "song.flac");
        assert_eq!(metadata.piece_length, 16384);
        assert_eq!(
            metadata.files,
            vec![FileEntry {
                path: vec!["song.flac".into()],
                length: 1024
            }]
        );
        assert_eq!(metadata.raw, info);
    }

    #[test]
    fn test_verify_detects_altered_byte() {
        let info = single_file_info();
        let info_hash = InfoHash::of(&info);

        let mut altered = info.to_vec();
        let last = altered.len() - 2;
        altered[last] ^= 0xff;

        let mut assembly = MetadataAssembly::new(altered.len());
        assembly.insert(0, Bytes::from(altered));
        assert!(matches!(assembly.verify(&info_hash), Err(MetadataError::HashMismatch)));
    }

    #[test]
    fn test_multi_file_info() {
        let file = |len: i64, path: &[&str]| {
            Value::dict([
                ("length", Value::Integer(len)),
                ("path", Value::List(path.iter().map(|p| Value::string(p)).collect())),
            ])
        };
        let info = encode(&Value::dict([
            ("files", Value::List(vec![file(10, &["a", "b.txt"]), file(20, &["c.txt"])])),
            ("name", Value::string("album")),
            ("piece length", Value::Integer(32768)),
        ]))
        .unwrap();

        let metadata = TorrentMetadata::from_info_bytes(InfoHash::of(&info), Bytes::from(info)).unwrap();
        assert_eq!(metadata.files.len(), 2);
        assert_eq!(metadata.files[0].path, vec!["a".to_string(), "b.txt".to_string()]);
        assert_eq!(metadata.total_length(), 30);
    }

    #[test]
    fn test_undecodable_info_is_invalid_metadata() {
        let raw = Bytes::from_static(b"d4:name");
        assert!(matches!(
            TorrentMetadata::from_info_bytes(InfoHash::of(&raw), raw),
            Err(MetadataError::InvalidMetadata(_))
        ));
    }
}
