use bytes::Bytes;
use rand::Rng as _;
use sha1::{Digest, Sha1};
use std::net::{IpAddr, SocketAddr};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Issues and checks `announce_peer` tokens.
///
/// A token is `sha1(salt || bucket || ip || port)` where `bucket` is the
/// current time rounded up to the next multiple of the interval. Tokens from
/// the current and the preceding bucket are accepted, so a token handed out
/// just before a boundary stays usable for at least one full interval.
pub struct TokenManager {
    salt: [u8; 16],
    interval: u64,
}

impl TokenManager {
    pub fn new(interval: Duration) -> Self {
        let mut salt = [0u8; 16];
        rand::rng().fill(&mut salt);
        Self::with_salt(salt, interval)
    }

    pub fn with_salt(salt: [u8; 16], interval: Duration) -> Self {
        Self {
            salt,
            interval: interval.as_secs().max(1),
        }
    }

    pub fn generate(&self, addr: &SocketAddr) -> Bytes {
        self.generate_at(addr, unix_now())
    }

    pub fn verify(&self, addr: &SocketAddr, token: &[u8]) -> bool {
        self.verify_at(addr, token, unix_now())
    }

    pub fn generate_at(&self, addr: &SocketAddr, now: u64) -> Bytes {
        self.token_for_bucket(addr, self.bucket(now))
    }

    pub fn verify_at(&self, addr: &SocketAddr, token: &[u8], now: u64) -> bool {
        let current = self.bucket(now);
        let previous = current.saturating_sub(self.interval);

        token == self.token_for_bucket(addr, current).as_ref()
            || token == self.token_for_bucket(addr, previous).as_ref()
    }

    fn bucket(&self, now: u64) -> u64 {
        now.div_ceil(self.interval) * self.interval
    }

    fn token_for_bucket(&self, addr: &SocketAddr, bucket: u64) -> Bytes {
        let mut hasher = Sha1::new();
        hasher.update(self.salt);
        hasher.update(bucket.to_be_bytes());
        match addr.ip() {
            IpAddr::V4(ip) => hasher.update(ip.octets()),
            IpAddr::V6(ip) => hasher.update(ip.octets()),
        }
        hasher.update(addr.port().to_be_bytes());

        Bytes::copy_from_slice(&hasher.finalize())
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([10, 0, 0, 1], port))
    }

    #[test]
    fn test_token_verifies_within_interval() {
        let tokens = TokenManager::with_salt([7; 16], Duration::from_secs(300));
        let token = tokens.generate_at(&addr(6881), 1_000);

        assert_eq!(token.len(), 20);
        assert!(tokens.verify_at(&addr(6881), &token, 1_000));
        assert!(tokens.verify_at(&addr(6881), &token, 1_200));
    }

    #[test]
    fn test_token_accepts_previous_bucket_only() {
        let tokens = TokenManager::with_salt([7; 16], Duration::from_secs(300));
        // 1_000 rounds up to 1_200
        let token = tokens.generate_at(&addr(6881), 1_000);

        assert!(tokens.verify_at(&addr(6881), &token, 1_201));
        assert!(tokens.verify_at(&addr(6881), &token, 1_500));
        assert!(!tokens.verify_at(&addr(6881), &token, 1_501));
    }

    #[test]
    fn test_token_bound_to_endpoint() {
        let tokens = TokenManager::with_salt([7; 16], Duration::from_secs(300));
        let token = tokens.generate_at(&addr(6881), 1_000);

        assert!(!tokens.verify_at(&addr(6882), &token, 1_000));
        assert!(!tokens.verify_at(&SocketAddr::from(([10, 0, 0, 2], 6881)), &token, 1_000));
    }

    #[test]
    fn test_token_depends_on_salt() {
        let a = TokenManager::with_salt([1; 16], Duration::from_secs(300));
        let b = TokenManager::with_salt([2; 16], Duration::from_secs(300));

        let token = a.generate_at(&addr(6881), 1_000);
        assert!(!b.verify_at(&addr(6881), &token, 1_000));
    }
}
