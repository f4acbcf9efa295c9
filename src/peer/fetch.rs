use std::net::SocketAddr;

use tracing::{debug, trace};

use super::error::MetadataError;
use super::extension::{ExtensionHandshake, EXTENSION_HANDSHAKE_ID};
use super::message::{Handshake, Message};
use super::metadata::{MetadataAssembly, MetadataMessage, MetadataMessageType, TorrentMetadata};
use super::peer_id::PeerId;
use super::transport::PeerTransport;
use crate::config::FetchConfig;
use crate::constants::{LOCAL_UT_METADATA_ID, METADATA_PIECE_SIZE};
use crate::info_hash::InfoHash;

/// Progress of one metadata fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchState {
    Connecting,
    AwaitingHandshakeEcho,
    AwaitingExtendedHandshake,
    RequestingPieces,
    Verifying,
    Complete,
    Failed,
}

struct MetadataSession<'a> {
    addr: SocketAddr,
    info_hash: InfoHash,
    config: &'a FetchConfig,
    state: FetchState,
    assembly: Option<MetadataAssembly>,
}

impl MetadataSession<'_> {
    fn enter(&mut self, state: FetchState) {
        trace!(addr = %self.addr, from = ?self.state, to = ?state, "metadata fetch state");
        self.state = state;
    }

    async fn run(&mut self, peer_id: PeerId) -> Result<TorrentMetadata, MetadataError> {
        let mut transport = PeerTransport::connect(
            self.addr,
            self.config.connect_timeout,
            self.config.idle_timeout,
            self.config.max_metadata_size + METADATA_PIECE_SIZE,
        )
        .await?;

        transport
            .send_handshake(&Handshake::new(self.info_hash, peer_id))
            .await?;
        self.enter(FetchState::AwaitingHandshakeEcho);

        transport.skip_handshake().await?;
        self.enter(FetchState::AwaitingExtendedHandshake);

        loop {
            let (id, payload) = match transport.receive_message().await? {
                Message::Extended { id, payload } => (id, payload),
                other => {
                    trace!(addr = %self.addr, message = ?message_kind(&other), "skipping message");
                    continue;
                }
            };

            match (self.state, id) {
                (FetchState::AwaitingExtendedHandshake, EXTENSION_HANDSHAKE_ID) => {
                    let handshake = ExtensionHandshake::decode(&payload)?;
                    self.start_requests(&mut transport, &handshake).await?;
                }
                (FetchState::RequestingPieces, LOCAL_UT_METADATA_ID) => {
                    if let Some(metadata) = self.on_metadata_message(&payload)? {
                        return Ok(metadata);
                    }
                }
                (state, id) => trace!(addr = %self.addr, ?state, id, "ignoring extended message"),
            }
        }
    }

    async fn start_requests(
        &mut self,
        transport: &mut PeerTransport,
        handshake: &ExtensionHandshake,
    ) -> Result<(), MetadataError> {
        let (ut_metadata, metadata_size) = match (handshake.ut_metadata(), handshake.metadata_size) {
            (Some(id), Some(size)) if size > 0 => (id, size),
            _ => return Err(MetadataError::UnsupportedExtension),
        };

        let expected_size = usize::try_from(metadata_size)
            .ok()
            .filter(|size| *size <= self.config.max_metadata_size)
            .ok_or_else(|| {
                MetadataError::InvalidMessage(format!("metadata size {metadata_size} out of range"))
            })?;

        let ours = ExtensionHandshake::for_metadata(metadata_size);
        transport
            .send_message(&Message::extended(EXTENSION_HANDSHAKE_ID, ours.encode()?))
            .await?;

        let assembly = MetadataAssembly::new(expected_size);
        let pieces = assembly.piece_count() as u32;
        self.assembly = Some(assembly);
        self.enter(FetchState::RequestingPieces);

        debug!(addr = %self.addr, size = expected_size, pieces, "requesting metadata");

        for piece in 0..pieces {
            if piece > 0 && !self.config.request_delay.is_zero() {
                tokio::time::sleep(self.config.request_delay).await;
            }
            let request = MetadataMessage::request(piece).encode()?;
            transport
                .send_message(&Message::extended(ut_metadata, request))
                .await?;
        }

        Ok(())
    }

    fn on_metadata_message(
        &mut self,
        payload: &bytes::Bytes,
    ) -> Result<Option<TorrentMetadata>, MetadataError> {
        let message = MetadataMessage::decode(payload)?;

        match message.msg_type {
            MetadataMessageType::Reject => Err(MetadataError::Rejected(message.piece)),
            MetadataMessageType::Request => {
                // nothing to share
                Ok(None)
            }
            MetadataMessageType::Data => {
                let Some(assembly) = self.assembly.as_mut() else {
                    return Ok(None);
                };

                assembly.insert(message.piece, message.data.unwrap_or_default());
                if !assembly.is_complete() {
                    return Ok(None);
                }

                self.enter(FetchState::Verifying);
                let assembly = self.assembly.take();
                match assembly {
                    Some(assembly) => assembly.verify(&self.info_hash).map(Some),
                    None => Ok(None),
                }
            }
        }
    }
}

fn message_kind(message: &Message) -> Option<u8> {
    match message {
        Message::KeepAlive => None,
        Message::Extended { .. } => Some(super::message::EXTENDED_ID),
        Message::Other { id, .. } => Some(*id),
    }
}

/// Fetches and verifies the metadata for `info_hash` from one peer.
///
/// Connects, performs the handshake pair, waits for the peer's extension
/// handshake and then requests every metadata piece. Returns once the
/// assembled metadata matches the info-hash.
pub async fn fetch_metadata(
    addr: SocketAddr,
    info_hash: InfoHash,
    peer_id: PeerId,
    config: &FetchConfig,
) -> Result<TorrentMetadata, MetadataError> {
    let mut session = MetadataSession {
        addr,
        info_hash,
        config,
        state: FetchState::Connecting,
        assembly: None,
    };

    let result = session.run(peer_id).await;
    match &result {
        Ok(metadata) => {
            session.enter(FetchState::Complete);
            debug!(%addr, %info_hash, name = %metadata.name, "metadata fetched");
        }
        Err(e) => {
            session.enter(FetchState::Failed);
            debug!(%addr, %info_hash, error = %e, "metadata fetch failed");
        }
    }
    result
}
