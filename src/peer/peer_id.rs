use std::fmt;

use rand::Rng as _;

use crate::constants::CLIENT_PREFIX;
use crate::info_hash::hex_encode;

/// The 20-byte id we present in peer-wire handshakes.
///
/// Generated ids are Azureus-style: the client prefix followed by twelve
/// random bytes.
///
/// ```
/// use mlspider::peer::PeerId;
///
/// let id = PeerId::generate();
/// assert_eq!(id.client_id(), Some("ML0001"));
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PeerId(pub [u8; 20]);

impl PeerId {
    pub fn generate() -> Self {
        let mut id = [0u8; 20];
        id[..CLIENT_PREFIX.len()].copy_from_slice(CLIENT_PREFIX);
        rand::rng().fill(&mut id[CLIENT_PREFIX.len()..]);
        Self(id)
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        bytes.try_into().ok().map(Self)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// The six-character client tag of an Azureus-style id.
    pub fn client_id(&self) -> Option<&str> {
        if self.0[0] == b'-' && self.0[7] == b'-' {
            std::str::from_utf8(&self.0[1..7]).ok()
        } else {
            None
        }
    }
}

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.client_id() {
            Some(client) => write!(f, "PeerId({client})"),
            None => write!(f, "PeerId({})", hex_encode(&self.0[..8])),
        }
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex_encode(&self.0))
    }
}
