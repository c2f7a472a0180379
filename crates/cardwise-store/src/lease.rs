//! Durable lease lock backed by the `leases` column family.
//!
//! Every service instance opening the same database contends on the same
//! key space, which is what makes the coordinator's mutual exclusion hold
//! across instances. An in-process mutex serializes the read-check-write
//! sequence so two local tasks cannot both observe an absent key.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rocksdb::{BoundColumnFamily, DBWithThreadMode, MultiThreaded};
use serde::{Deserialize, Serialize};

use cardwise_lock::{LeaseLock, LockError};

use crate::keys;
use crate::schema::cf;

/// Stored lease row: who holds the key and until when.
#[derive(Debug, Serialize, Deserialize)]
struct LeaseRecord {
    token: String,
    expires_at_ms: i64,
}

impl LeaseRecord {
    fn is_expired(&self, now_ms: i64) -> bool {
        self.expires_at_ms <= now_ms
    }
}

/// `RocksDB`-backed [`LeaseLock`].
pub struct RocksLeaseLock {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
    gate: Mutex<()>,
}

impl RocksLeaseLock {
    pub(crate) fn new(db: Arc<DBWithThreadMode<MultiThreaded>>) -> Self {
        Self {
            db,
            gate: Mutex::new(()),
        }
    }

    fn cf(&self) -> cardwise_lock::Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(cf::LEASES)
            .ok_or_else(|| LockError::Backend("leases column family missing".into()))
    }

    fn read(&self, key: &[u8]) -> cardwise_lock::Result<Option<LeaseRecord>> {
        let cf = self.cf()?;
        let Some(data) = self
            .db
            .get_cf(&cf, key)
            .map_err(|e| LockError::Backend(e.to_string()))?
        else {
            return Ok(None);
        };
        ciborium::from_reader(data.as_slice())
            .map(Some)
            .map_err(|e| LockError::Backend(e.to_string()))
    }

    fn write(&self, key: &[u8], record: &LeaseRecord) -> cardwise_lock::Result<()> {
        let cf = self.cf()?;
        let mut buf = Vec::new();
        ciborium::into_writer(record, &mut buf).map_err(|e| LockError::Backend(e.to_string()))?;
        self.db
            .put_cf(&cf, key, buf)
            .map_err(|e| LockError::Backend(e.to_string()))
    }

    fn delete(&self, key: &[u8]) -> cardwise_lock::Result<()> {
        let cf = self.cf()?;
        self.db
            .delete_cf(&cf, key)
            .map_err(|e| LockError::Backend(e.to_string()))
    }
}

#[async_trait]
impl LeaseLock for RocksLeaseLock {
    async fn acquire(&self, key: &str, token: &str, ttl: Duration) -> cardwise_lock::Result<bool> {
        let _guard = self
            .gate
            .lock()
            .map_err(|_| LockError::Backend("lease gate poisoned".into()))?;

        let db_key = keys::lease_key(key);
        let now_ms = Utc::now().timestamp_millis();

        if let Some(existing) = self.read(&db_key)? {
            if !existing.is_expired(now_ms) {
                return Ok(false);
            }
            tracing::debug!(key, "taking over expired lease");
        }

        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        self.write(
            &db_key,
            &LeaseRecord {
                token: token.to_owned(),
                expires_at_ms: now_ms.saturating_add(ttl_ms),
            },
        )?;
        Ok(true)
    }

    async fn release(&self, key: &str, token: &str) -> cardwise_lock::Result<bool> {
        let _guard = self
            .gate
            .lock()
            .map_err(|_| LockError::Backend("lease gate poisoned".into()))?;

        let db_key = keys::lease_key(key);
        let now_ms = Utc::now().timestamp_millis();

        match self.read(&db_key)? {
            Some(existing) if existing.token == token && !existing.is_expired(now_ms) => {
                self.delete(&db_key)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rocks::RocksStore;
    use tempfile::TempDir;

    fn create_lease() -> (RocksLeaseLock, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = RocksStore::open(dir.path()).unwrap();
        (store.lease_lock(), dir)
    }

    #[tokio::test]
    async fn second_acquire_is_refused_until_release() {
        let (lease, _dir) = create_lease();
        let ttl = Duration::from_secs(10);

        assert!(lease.acquire("expense:a", "t1", ttl).await.unwrap());
        assert!(!lease.acquire("expense:a", "t2", ttl).await.unwrap());

        assert!(lease.release("expense:a", "t1").await.unwrap());
        assert!(lease.acquire("expense:a", "t2", ttl).await.unwrap());
    }

    #[tokio::test]
    async fn expired_lease_can_be_taken_over() {
        let (lease, _dir) = create_lease();

        assert!(lease
            .acquire("perf:u:c", "t1", Duration::from_millis(20))
            .await
            .unwrap());
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(lease
            .acquire("perf:u:c", "t2", Duration::from_secs(5))
            .await
            .unwrap());

        // the original holder's release must not free the new owner's lease
        assert!(!lease.release("perf:u:c", "t1").await.unwrap());
        assert!(lease.release("perf:u:c", "t2").await.unwrap());
    }

    #[tokio::test]
    async fn release_of_absent_key_is_a_noop() {
        let (lease, _dir) = create_lease();
        assert!(!lease.release("benefit:u:c:POINT", "t1").await.unwrap());
    }

    #[tokio::test]
    async fn keys_are_independent() {
        let (lease, _dir) = create_lease();
        let ttl = Duration::from_secs(10);

        assert!(lease.acquire("benefit:u:c:POINT", "t1", ttl).await.unwrap());
        assert!(lease.acquire("benefit:u:c:DISCOUNT", "t2", ttl).await.unwrap());
    }
}
