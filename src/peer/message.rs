use super::error::MetadataError;
use super::peer_id::PeerId;
use crate::info_hash::InfoHash;
use bytes::{Buf, BufMut, Bytes, BytesMut};

pub const PROTOCOL: &[u8] = b"BitTorrent protocol";
pub const HANDSHAKE_LEN: usize = 68;

/// Message id of BEP-10 extension messages.
pub const EXTENDED_ID: u8 = 20;

/// The fixed 68-byte opening of a peer-wire connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    pub info_hash: InfoHash,
    pub peer_id: PeerId,
    pub reserved: [u8; 8],
}

impl Handshake {
    /// A handshake advertising the extension protocol.
    pub fn new(info_hash: InfoHash, peer_id: PeerId) -> Self {
        let mut reserved = [0u8; 8];
        reserved[5] |= 0x10;
        Self {
            info_hash,
            peer_id,
            reserved,
        }
    }

    pub fn supports_extension_protocol(&self) -> bool {
        (self.reserved[5] & 0x10) != 0
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(HANDSHAKE_LEN);
        buf.put_u8(PROTOCOL.len() as u8);
        buf.put_slice(PROTOCOL);
        buf.put_slice(&self.reserved);
        buf.put_slice(self.info_hash.as_bytes());
        buf.put_slice(self.peer_id.as_bytes());
        buf.freeze()
    }

    pub fn decode(data: &[u8]) -> Result<Self, MetadataError> {
        if data.len() < HANDSHAKE_LEN || data[0] != 19 || &data[1..20] != PROTOCOL {
            return Err(MetadataError::InvalidMessage("invalid handshake".into()));
        }

        let mut reserved = [0u8; 8];
        reserved.copy_from_slice(&data[20..28]);

        let mut info_hash = [0u8; 20];
        info_hash.copy_from_slice(&data[28..48]);

        let mut peer_id = [0u8; 20];
        peer_id.copy_from_slice(&data[48..68]);

        Ok(Self {
            info_hash: InfoHash(info_hash),
            peer_id: PeerId(peer_id),
            reserved,
        })
    }
}

/// A framed peer-wire message.
///
/// Only extension messages matter for metadata exchange; every other
/// message is carried opaquely so it can be skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    KeepAlive,
    Extended { id: u8, payload: Bytes },
    Other { id: u8, payload: Bytes },
}

impl Message {
    pub fn extended(id: u8, payload: Bytes) -> Self {
        Message::Extended { id, payload }
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::new();

        match self {
            Message::KeepAlive => buf.put_u32(0),
            Message::Extended { id, payload } => {
                buf.put_u32(2 + payload.len() as u32);
                buf.put_u8(EXTENDED_ID);
                buf.put_u8(*id);
                buf.put_slice(payload);
            }
            Message::Other { id, payload } => {
                buf.put_u32(1 + payload.len() as u32);
                buf.put_u8(*id);
                buf.put_slice(payload);
            }
        }

        buf.freeze()
    }

    /// Decodes one whole frame, length prefix included.
    pub fn decode(mut data: Bytes) -> Result<Self, MetadataError> {
        if data.len() < 4 {
            return Err(MetadataError::InvalidMessage("frame too short".into()));
        }

        let length = data.get_u32() as usize;
        if length != data.len() {
            return Err(MetadataError::InvalidMessage(format!(
                "frame length {} does not match {} bytes",
                length,
                data.len()
            )));
        }

        if length == 0 {
            return Ok(Message::KeepAlive);
        }

        let id = data.get_u8();
        if id != EXTENDED_ID {
            return Ok(Message::Other { id, payload: data });
        }

        if data.is_empty() {
            return Err(MetadataError::InvalidMessage("empty extended message".into()));
        }

        let ext_id = data.get_u8();
        Ok(Message::Extended {
            id: ext_id,
            payload: data,
        })
    }
}
