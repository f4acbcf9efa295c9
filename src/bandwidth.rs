//! Bandwidth-limited UDP transport.
//!
//! Each direction keeps a running total of bytes moved since the socket was
//! opened. Before a datagram leaves (or after one arrives) the limiter
//! compares `total / bandwidth` with the time actually elapsed and sleeps off
//! the difference, never less than a small per-call latency floor. Over any
//! window the socket therefore averages at most the configured byte rate.
//!
//! # Example
//!
//! ```
//! use mlspider::bandwidth::ThrottledSocket;
//! use std::time::Duration;
//!
//! # async fn example() -> std::io::Result<()> {
//! // 3 MB/s in each direction
//! let socket = ThrottledSocket::bind("0.0.0.0:0".parse().unwrap(), 3 * 1024 * 1024, Duration::from_millis(1)).await?;
//! let mut buf = vec![0u8; 65536];
//! if let Some((n, from)) = socket.recv_from(&mut buf).await {
//!     socket.send_to(&buf[..n], from).await;
//! }
//! # Ok(())
//! # }
//! ```

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::net::UdpSocket;
use tokio::time::Instant;
use tracing::debug;

/// Computes how long a caller must wait so that `total_bytes` moved over
/// `elapsed` stays within `bytes_per_sec`.
///
/// A rate of 0 means unlimited and never waits.
pub fn required_delay(
    total_bytes: u64,
    bytes_per_sec: u64,
    elapsed: Duration,
    latency_floor: Duration,
) -> Duration {
    if bytes_per_sec == 0 {
        return Duration::ZERO;
    }

    let required = Duration::from_secs_f64(total_bytes as f64 / bytes_per_sec as f64);
    required.saturating_sub(elapsed).max(latency_floor)
}

/// A cumulative byte-rate limiter for one traffic direction.
pub struct BandwidthLimiter {
    bytes_per_sec: u64,
    latency_floor: Duration,
    opened_at: Instant,
    total: Mutex<u64>,
}

impl BandwidthLimiter {
    /// Creates a limiter averaging at most `bytes_per_sec`. A limit of 0 means
    /// unlimited.
    pub fn new(bytes_per_sec: u64, latency_floor: Duration) -> Self {
        Self {
            bytes_per_sec,
            latency_floor,
            opened_at: Instant::now(),
            total: Mutex::new(0),
        }
    }

    /// Creates a limiter that never blocks.
    pub fn unlimited() -> Self {
        Self::new(0, Duration::ZERO)
    }

    pub fn total_bytes(&self) -> u64 {
        *self.total.lock()
    }

    /// Accounts `bytes` and returns how long the caller must wait.
    pub fn account(&self, bytes: usize) -> Duration {
        let total = {
            let mut total = self.total.lock();
            *total += bytes as u64;
            *total
        };

        required_delay(
            total,
            self.bytes_per_sec,
            self.opened_at.elapsed(),
            self.latency_floor,
        )
    }

    /// Accounts `bytes` and sleeps until the average rate is back within the
    /// budget.
    pub async fn acquire(&self, bytes: usize) {
        let wait = self.account(bytes);
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }
    }
}

impl Default for BandwidthLimiter {
    fn default() -> Self {
        Self::unlimited()
    }
}

/// A UDP socket whose sends and receives are throttled to a byte rate.
///
/// I/O errors never reach the caller: a failed send is dropped and a failed
/// receive yields `None`.
pub struct ThrottledSocket {
    socket: UdpSocket,
    upload: BandwidthLimiter,
    download: BandwidthLimiter,
}

impl ThrottledSocket {
    pub async fn bind(
        addr: SocketAddr,
        bytes_per_sec: u64,
        latency_floor: Duration,
    ) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        Ok(Self {
            socket,
            upload: BandwidthLimiter::new(bytes_per_sec, latency_floor),
            download: BandwidthLimiter::new(bytes_per_sec, latency_floor),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub async fn send_to(&self, data: &[u8], addr: SocketAddr) {
        self.upload.acquire(data.len()).await;

        if let Err(e) = self.socket.send_to(data, addr).await {
            debug!(%addr, error = %e, "udp send failed");
        }
    }

    pub async fn recv_from(&self, buf: &mut [u8]) -> Option<(usize, SocketAddr)> {
        match self.socket.recv_from(buf).await {
            Ok((n, addr)) => {
                self.download.acquire(n).await;
                Some((n, addr))
            }
            Err(e) => {
                debug!(error = %e, "udp receive failed");
                None
            }
        }
    }

    pub fn bytes_sent(&self) -> u64 {
        self.upload.total_bytes()
    }

    pub fn bytes_received(&self) -> u64 {
        self.download.total_bytes()
    }
}
