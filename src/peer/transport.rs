use super::error::MetadataError;
use super::message::{Handshake, Message, HANDSHAKE_LEN};
use bytes::BytesMut;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

/// A peer-wire TCP connection. Every read is bounded by the idle timeout.
pub struct PeerTransport {
    stream: TcpStream,
    read_buf: BytesMut,
    idle_timeout: Duration,
    max_message_size: usize,
}

impl PeerTransport {
    pub fn new(stream: TcpStream, idle_timeout: Duration, max_message_size: usize) -> Self {
        Self {
            stream,
            read_buf: BytesMut::with_capacity(32 * 1024),
            idle_timeout,
            max_message_size,
        }
    }

    pub async fn connect(
        addr: SocketAddr,
        connect_timeout: Duration,
        idle_timeout: Duration,
        max_message_size: usize,
    ) -> Result<Self, MetadataError> {
        let stream = timeout(connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| MetadataError::Timeout)??;
        Ok(Self::new(stream, idle_timeout, max_message_size))
    }

    pub async fn send_handshake(&mut self, handshake: &Handshake) -> Result<(), MetadataError> {
        self.write(&handshake.encode()).await
    }

    /// Consumes the peer's 68-byte handshake without looking at it.
    pub async fn skip_handshake(&mut self) -> Result<(), MetadataError> {
        self.fill(HANDSHAKE_LEN).await?;
        let _ = self.read_buf.split_to(HANDSHAKE_LEN);
        Ok(())
    }

    pub async fn send_message(&mut self, message: &Message) -> Result<(), MetadataError> {
        self.write(&message.encode()).await
    }

    pub async fn receive_message(&mut self) -> Result<Message, MetadataError> {
        self.fill(4).await?;

        let length = u32::from_be_bytes([
            self.read_buf[0],
            self.read_buf[1],
            self.read_buf[2],
            self.read_buf[3],
        ]) as usize;

        if length > self.max_message_size {
            return Err(MetadataError::InvalidMessage(format!(
                "message too large: {}",
                length
            )));
        }

        let total_len = 4 + length;
        self.fill(total_len).await?;

        let data = self.read_buf.split_to(total_len);
        Message::decode(data.freeze())
    }

    async fn write(&mut self, data: &[u8]) -> Result<(), MetadataError> {
        timeout(self.idle_timeout, self.stream.write_all(data))
            .await
            .map_err(|_| MetadataError::Timeout)??;
        Ok(())
    }

    async fn fill(&mut self, len: usize) -> Result<(), MetadataError> {
        while self.read_buf.len() < len {
            let n = timeout(self.idle_timeout, self.stream.read_buf(&mut self.read_buf))
                .await
                .map_err(|_| MetadataError::Timeout)??;

            if n == 0 {
                return Err(MetadataError::ConnectionClosed);
            }
        }
        Ok(())
    }

    pub fn peer_addr(&self) -> std::io::Result<SocketAddr> {
        self.stream.peer_addr()
    }
}
