use super::*;
use crate::bencode::{encode, Value};
use crate::config::FetchConfig;
use crate::constants::{LOCAL_UT_METADATA_ID, METADATA_PIECE_SIZE};
use crate::info_hash::InfoHash;
use bytes::Bytes;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

#[test]
fn test_peer_id_generate() {
    let id1 = PeerId::generate();
    let id2 = PeerId::generate();
    assert_ne!(id1.0, id2.0);
    assert_eq!(id1.client_id(), Some("ML0001"));
}

#[test]
fn test_handshake_encode_decode() {
    let info_hash = InfoHash([1u8; 20]);
    let peer_id = PeerId([2u8; 20]);

    let handshake = Handshake::new(info_hash, peer_id);
    let encoded = handshake.encode();
    assert_eq!(encoded.len(), HANDSHAKE_LEN);
    assert_eq!(encoded[0], 19);
    assert_eq!(&encoded[1..20], PROTOCOL);
    assert_eq!(&encoded[20..28], &[0, 0, 0, 0, 0, 0x10, 0, 0]);

    let decoded = Handshake::decode(&encoded).unwrap();
    assert_eq!(decoded.info_hash, info_hash);
    assert_eq!(decoded.peer_id, peer_id);
    assert!(decoded.supports_extension_protocol());
}

#[test]
fn test_handshake_rejects_other_protocols() {
    let mut encoded = Handshake::new(InfoHash([1u8; 20]), PeerId([2u8; 20]))
        .encode()
        .to_vec();
    encoded[1] = b'b';
    assert!(Handshake::decode(&encoded).is_err());
    assert!(Handshake::decode(&encoded[..40]).is_err());
}

#[test]
fn test_message_frames() {
    assert_eq!(&Message::KeepAlive.encode()[..], &[0, 0, 0, 0]);

    let ext = Message::extended(3, Bytes::from_static(b"de"));
    let encoded = ext.encode();
    assert_eq!(&encoded[..], &[0, 0, 0, 4, 20, 3, b'd', b'e']);
    assert_eq!(Message::decode(encoded).unwrap(), ext);

    // a bitfield is carried opaquely
    let other = Message::decode(Bytes::from_static(&[0, 0, 0, 2, 5, 0xff])).unwrap();
    assert_eq!(
        other,
        Message::Other {
            id: 5,
            payload: Bytes::from_static(&[0xff])
        }
    );
    assert_eq!(Message::decode(Bytes::from_static(&[0, 0, 0, 0])).unwrap(), Message::KeepAlive);
}

#[test]
fn test_message_length_mismatch() {
    assert!(matches!(
        Message::decode(Bytes::from_static(&[0, 0, 0, 5, 20, 0])),
        Err(MetadataError::InvalidMessage(_))
    ));
    assert!(Message::decode(Bytes::from_static(&[0, 0, 0, 1, 20])).is_err());
    assert!(Message::decode(Bytes::from_static(&[0, 0])).is_err());
}

#[test]
fn test_extension_handshake_for_metadata() {
    let ours = ExtensionHandshake::for_metadata(31235);
    let encoded = ours.encode().unwrap();
    assert!(encoded.starts_with(b"d1:md11:ut_metadatai1ee"));

    let decoded = ExtensionHandshake::decode(&encoded).unwrap();
    assert_eq!(decoded.ut_metadata(), Some(LOCAL_UT_METADATA_ID));
    assert_eq!(decoded.metadata_size, Some(31235));
    assert_eq!(decoded.client.as_deref(), Some(crate::constants::CLIENT_VERSION));
}

#[test]
fn test_extension_handshake_disabled_extension() {
    let decoded = ExtensionHandshake::decode(b"d1:md11:ut_metadatai0e6:ut_pexi2eee").unwrap();
    assert_eq!(decoded.ut_metadata(), None);
    assert_eq!(decoded.extension_id("ut_pex"), Some(2));
    assert_eq!(decoded.metadata_size, None);

    assert!(ExtensionHandshake::decode(b"li1ee").is_err());
}

// ============================================================================
// Loopback metadata fetches
// ============================================================================

/// Large enough to need two metadata pieces.
fn sample_info() -> Bytes {
    Bytes::from(
        encode(&Value::dict([
            ("length", Value::Integer(1 << 30)),
            ("name", Value::string("ubuntu.iso")),
            ("piece length", Value::Integer(1 << 20)),
            ("pieces", Value::bytes(&vec![7u8; 20 * 1024])),
        ]))
        .unwrap(),
    )
}

/// The peer's ut_metadata id, deliberately different from ours.
const REMOTE_UT_METADATA: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Behaviour {
    Honest,
    Corrupt,
    Reject,
    NoMetadata,
    Oversized,
    Silent,
}

/// Serves one connection and returns the extended messages it received.
async fn fake_peer(info: Bytes, behaviour: Behaviour) -> (SocketAddr, JoinHandle<Vec<(u8, Bytes)>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut transport = PeerTransport::new(stream, Duration::from_secs(5), 1 << 20);
        let mut received = Vec::new();

        transport.skip_handshake().await.unwrap();
        if behaviour == Behaviour::Silent {
            tokio::time::sleep(Duration::from_secs(2)).await;
            return received;
        }

        let info_hash = InfoHash::of(&info);
        transport
            .send_handshake(&Handshake::new(info_hash, PeerId::generate()))
            .await
            .unwrap();

        // noise the fetcher has to skip
        transport.send_message(&Message::KeepAlive).await.unwrap();
        transport
            .send_message(&Message::Other {
                id: 5,
                payload: Bytes::from_static(&[0xff]),
            })
            .await
            .unwrap();

        let mut hs = ExtensionHandshake::new();
        hs.client = Some("fake".into());
        match behaviour {
            Behaviour::NoMetadata => {}
            Behaviour::Oversized => {
                hs.extensions.insert(UT_METADATA.into(), REMOTE_UT_METADATA);
                hs.metadata_size = Some(64 * 1024 * 1024);
            }
            _ => {
                hs.extensions.insert(UT_METADATA.into(), REMOTE_UT_METADATA);
                hs.metadata_size = Some(info.len() as i64);
            }
        }
        transport
            .send_message(&Message::extended(EXTENSION_HANDSHAKE_ID, hs.encode().unwrap()))
            .await
            .unwrap();

        let mut reply_id = LOCAL_UT_METADATA_ID;
        while let Ok(message) = transport.receive_message().await {
            let Message::Extended { id, payload } = message else {
                continue;
            };
            received.push((id, payload.clone()));

            if id == EXTENSION_HANDSHAKE_ID {
                let theirs = ExtensionHandshake::decode(&payload).unwrap();
                reply_id = theirs.ut_metadata().unwrap();
                continue;
            }

            let request = MetadataMessage::decode(&payload).unwrap();
            assert_eq!(request.msg_type, MetadataMessageType::Request);

            let reply = match behaviour {
                Behaviour::Reject => MetadataMessage::reject(request.piece),
                _ => {
                    let start = request.piece as usize * METADATA_PIECE_SIZE;
                    let end = (start + METADATA_PIECE_SIZE).min(info.len());
                    let mut piece = info.slice(start..end).to_vec();
                    if behaviour == Behaviour::Corrupt && end == info.len() {
                        piece[end - start - 2] ^= 0xff;
                    }
                    MetadataMessage::data(request.piece, info.len() as i64, Bytes::from(piece))
                }
            };
            transport
                .send_message(&Message::extended(reply_id, reply.encode().unwrap()))
                .await
                .unwrap();
        }

        received
    });

    (addr, handle)
}

fn fetch_config() -> FetchConfig {
    FetchConfig {
        connect_timeout: Duration::from_secs(2),
        idle_timeout: Duration::from_millis(500),
        ..FetchConfig::default()
    }
}

#[tokio::test]
async fn test_fetch_metadata_from_honest_peer() {
    let info = sample_info();
    let info_hash = InfoHash::of(&info);
    assert_eq!(metadata_piece_count(info.len()), 2);

    let (addr, peer) = fake_peer(info.clone(), Behaviour::Honest).await;
    let metadata = fetch_metadata(addr, info_hash, PeerId::generate(), &fetch_config())
        .await
        .unwrap();

    assert_eq!(metadata.info_hash, info_hash);
    assert_eq!(metadata.name, "ubuntu.iso");
    assert_eq!(metadata.total_length(), 1 << 30);
    assert_eq!(metadata.raw, info);

    let received = peer.await.unwrap();
    let ids: Vec<u8> = received.iter().map(|(id, _)| *id).collect();
    assert_eq!(ids, vec![EXTENSION_HANDSHAKE_ID, REMOTE_UT_METADATA, REMOTE_UT_METADATA]);

    let ours = ExtensionHandshake::decode(&received[0].1).unwrap();
    assert_eq!(ours.metadata_size, Some(info.len() as i64));
    let pieces: Vec<u32> = received[1..]
        .iter()
        .map(|(_, p)| MetadataMessage::decode(p).unwrap().piece)
        .collect();
    assert_eq!(pieces, vec![0, 1]);
}

#[tokio::test]
async fn test_fetch_metadata_detects_corruption() {
    let info = sample_info();
    let (addr, _peer) = fake_peer(info.clone(), Behaviour::Corrupt).await;

    let result = fetch_metadata(addr, InfoHash::of(&info), PeerId::generate(), &fetch_config()).await;
    assert!(matches!(result, Err(MetadataError::HashMismatch)));
}

#[tokio::test]
async fn test_fetch_metadata_rejected() {
    let info = sample_info();
    let (addr, _peer) = fake_peer(info.clone(), Behaviour::Reject).await;

    let result = fetch_metadata(addr, InfoHash::of(&info), PeerId::generate(), &fetch_config()).await;
    assert!(matches!(result, Err(MetadataError::Rejected(0))));
}

#[tokio::test]
async fn test_fetch_metadata_without_ut_metadata_sends_nothing() {
    let info = sample_info();
    let (addr, peer) = fake_peer(info.clone(), Behaviour::NoMetadata).await;

    let result = fetch_metadata(addr, InfoHash::of(&info), PeerId::generate(), &fetch_config()).await;
    assert!(matches!(result, Err(MetadataError::UnsupportedExtension)));

    // the connection closes with nothing sent after our handshake
    assert!(peer.await.unwrap().is_empty());
}

#[tokio::test]
async fn test_fetch_metadata_refuses_oversized() {
    let info = sample_info();
    let (addr, peer) = fake_peer(info.clone(), Behaviour::Oversized).await;

    let result = fetch_metadata(addr, InfoHash::of(&info), PeerId::generate(), &fetch_config()).await;
    assert!(matches!(result, Err(MetadataError::InvalidMessage(_))));
    assert!(peer.await.unwrap().is_empty());
}

#[tokio::test]
async fn test_fetch_metadata_idle_timeout() {
    let info = sample_info();
    let (addr, _peer) = fake_peer(info.clone(), Behaviour::Silent).await;

    let config = FetchConfig {
        idle_timeout: Duration::from_millis(200),
        ..fetch_config()
    };
    let result = fetch_metadata(addr, InfoHash::of(&info), PeerId::generate(), &config).await;
    assert!(matches!(result, Err(MetadataError::Timeout)));
}

#[tokio::test]
async fn test_fetch_metadata_connection_refused() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let result = fetch_metadata(addr, InfoHash([9u8; 20]), PeerId::generate(), &fetch_config()).await;
    assert!(matches!(result, Err(MetadataError::Io(_))));
}
