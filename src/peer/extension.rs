use super::error::MetadataError;
use crate::bencode::{decode, encode, Value};
use crate::constants::{CLIENT_VERSION, LOCAL_UT_METADATA_ID, REQUEST_QUEUE};
use bytes::Bytes;
use std::collections::BTreeMap;

/// Extended message id of the BEP-10 handshake.
pub const EXTENSION_HANDSHAKE_ID: u8 = 0;

pub const UT_METADATA: &str = "ut_metadata";

/// The BEP-10 extension handshake.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtensionHandshake {
    /// Extension name to the message id the sender wants to receive it on.
    pub extensions: BTreeMap<String, u8>,
    pub client: Option<String>,
    pub reqq: Option<i64>,
    pub metadata_size: Option<i64>,
}

impl ExtensionHandshake {
    pub fn new() -> Self {
        Self::default()
    }

    /// Our handshake for a metadata fetch: ut_metadata on the local id,
    /// echoing the size the peer announced.
    pub fn for_metadata(metadata_size: i64) -> Self {
        let mut hs = Self::new();
        hs.extensions
            .insert(UT_METADATA.to_string(), LOCAL_UT_METADATA_ID);
        hs.client = Some(CLIENT_VERSION.to_string());
        hs.reqq = Some(REQUEST_QUEUE);
        hs.metadata_size = Some(metadata_size);
        hs
    }

    pub fn extension_id(&self, name: &str) -> Option<u8> {
        self.extensions.get(name).copied()
    }

    /// The id the peer wants ut_metadata messages sent on.
    pub fn ut_metadata(&self) -> Option<u8> {
        self.extension_id(UT_METADATA)
    }

    pub fn encode(&self) -> Result<Bytes, MetadataError> {
        let m = self
            .extensions
            .iter()
            .map(|(name, id)| {
                (
                    Bytes::copy_from_slice(name.as_bytes()),
                    Value::Integer(i64::from(*id)),
                )
            })
            .collect();

        let mut fields = vec![("m", Value::Dict(m))];
        if let Some(client) = &self.client {
            fields.push(("v", Value::string(client)));
        }
        if let Some(reqq) = self.reqq {
            fields.push(("reqq", Value::Integer(reqq)));
        }
        if let Some(size) = self.metadata_size {
            fields.push(("metadata_size", Value::Integer(size)));
        }

        Ok(Bytes::from(encode(&Value::dict(fields))?))
    }

    pub fn decode(data: &[u8]) -> Result<Self, MetadataError> {
        let value = decode(data)?;
        let dict = value
            .as_dict()
            .ok_or_else(|| MetadataError::InvalidMessage("extension handshake is not a dict".into()))?;

        let mut hs = Self::new();

        if let Some(m) = dict.get(b"m".as_slice()).and_then(|v| v.as_dict()) {
            for (key, val) in m {
                let id = val.as_integer().and_then(|id| u8::try_from(id).ok());
                if let (Ok(name), Some(id)) = (std::str::from_utf8(key), id) {
                    // id 0 disables an extension
                    if id > 0 {
                        hs.extensions.insert(name.to_string(), id);
                    }
                }
            }
        }

        hs.client = dict
            .get(b"v".as_slice())
            .and_then(|v| v.as_str())
            .map(String::from);

        hs.reqq = dict.get(b"reqq".as_slice()).and_then(|v| v.as_integer());

        hs.metadata_size = dict
            .get(b"metadata_size".as_slice())
            .and_then(|v| v.as_integer());

        Ok(hs)
    }
}
