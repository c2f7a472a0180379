//! In-memory lease lock.
//!
//! Backs single-process deployments and tests. The map is guarded by one
//! async mutex, which makes acquire's check-then-set atomic the same way the
//! store-backed implementation serializes through its write gate.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::Result;
use crate::LeaseLock;

struct Lease {
    token: String,
    expires_at: Instant,
}

/// Process-local [`LeaseLock`] over a `HashMap`.
#[derive(Default)]
pub struct MemoryLeaseLock {
    leases: Mutex<HashMap<String, Lease>>,
}

impl MemoryLeaseLock {
    /// Create an empty lock table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LeaseLock for MemoryLeaseLock {
    async fn acquire(&self, key: &str, token: &str, ttl: Duration) -> Result<bool> {
        let mut leases = self.leases.lock().await;
        let now = Instant::now();

        if let Some(lease) = leases.get(key) {
            if lease.expires_at > now {
                return Ok(false);
            }
        }

        leases.insert(
            key.to_string(),
            Lease {
                token: token.to_string(),
                expires_at: now + ttl,
            },
        );
        Ok(true)
    }

    async fn release(&self, key: &str, token: &str) -> Result<bool> {
        let mut leases = self.leases.lock().await;

        match leases.get(key) {
            Some(lease) if lease.token == token => {
                leases.remove(key);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn acquire_is_exclusive_until_released() {
        let lock = MemoryLeaseLock::new();
        let ttl = Duration::from_secs(5);

        assert!(lock.acquire("k", "a", ttl).await.unwrap());
        assert!(!lock.acquire("k", "b", ttl).await.unwrap());

        assert!(lock.release("k", "a").await.unwrap());
        assert!(lock.acquire("k", "b", ttl).await.unwrap());
    }

    #[tokio::test]
    async fn expired_lease_can_be_taken_over() {
        let lock = MemoryLeaseLock::new();

        assert!(lock.acquire("k", "a", Duration::from_millis(10)).await.unwrap());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(lock.acquire("k", "b", Duration::from_secs(5)).await.unwrap());
    }

    #[tokio::test]
    async fn release_refuses_foreign_token() {
        let lock = MemoryLeaseLock::new();
        let ttl = Duration::from_secs(5);

        assert!(lock.acquire("k", "a", ttl).await.unwrap());
        assert!(!lock.release("k", "b").await.unwrap());
        // still held by "a"
        assert!(!lock.acquire("k", "c", ttl).await.unwrap());
        assert!(lock.release("k", "a").await.unwrap());
    }

    #[tokio::test]
    async fn release_of_absent_key_is_false() {
        let lock = MemoryLeaseLock::new();
        assert!(!lock.release("missing", "a").await.unwrap());
    }
}
