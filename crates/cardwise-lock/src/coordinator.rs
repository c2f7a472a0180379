//! Spin-retry coordination over a [`LeaseLock`].
//!
//! The coordinator turns the raw set-if-absent primitive into a scoped
//! critical section: bounded retries with jittered backoff, a typed failure
//! when the budget is exhausted, and a guaranteed release after the body
//! runs — whether the body's own result is success or failure.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;

use crate::error::{LockError, Result};
use crate::LeaseLock;

/// Tuning for one lock scope.
#[derive(Debug, Clone, Copy)]
pub struct LockOptions {
    /// Lease TTL. The mutual-exclusion guarantee only holds while the body
    /// completes within this window; an overrunning body silently loses the
    /// lease to the next acquirer.
    pub ttl: Duration,

    /// Maximum acquisition attempts before giving up.
    pub max_retries: u32,

    /// Base sleep between attempts; actual sleeps add up to 50% jitter to
    /// spread out contending spinners.
    pub retry_interval: Duration,
}

impl Default for LockOptions {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(10),
            max_retries: 10,
            retry_interval: Duration::from_millis(100),
        }
    }
}

/// Coordinates critical sections keyed by string scopes.
#[derive(Clone)]
pub struct LockCoordinator {
    lease: Arc<dyn LeaseLock>,
}

impl LockCoordinator {
    /// Create a coordinator over a lease backend.
    #[must_use]
    pub fn new(lease: Arc<dyn LeaseLock>) -> Self {
        Self { lease }
    }

    /// Run `body` while holding the lease for `key`.
    ///
    /// Spins up to `opts.max_retries` acquisition attempts, sleeping a
    /// jittered `opts.retry_interval` between them. Backend errors count as
    /// failed attempts (fail-closed). Once acquired, `body` runs exactly
    /// once and the lease is released afterwards regardless of what `body`
    /// produced; a failed release is logged and swallowed since the TTL
    /// bounds the damage.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::AcquireTimeout`] when every attempt fails; in
    /// that case `body` was never invoked.
    pub async fn with_lock<T, F, Fut>(&self, key: &str, opts: LockOptions, body: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let token = uuid::Uuid::new_v4().to_string();
        let mut attempts: u32 = 0;

        let acquired = loop {
            attempts += 1;

            match self.lease.acquire(key, &token, opts.ttl).await {
                Ok(true) => {
                    tracing::debug!(key, attempts, "lock acquired");
                    break true;
                }
                Ok(false) => {
                    tracing::debug!(key, attempts, "lock busy");
                }
                Err(e) => {
                    tracing::warn!(key, attempts, error = %e, "lease backend error on acquire");
                }
            }

            if attempts >= opts.max_retries {
                break false;
            }
            tokio::time::sleep(jittered(opts.retry_interval)).await;
        };

        if !acquired {
            return Err(LockError::AcquireTimeout {
                key: key.to_string(),
                attempts,
            });
        }

        let result = body().await;

        match self.lease.release(key, &token).await {
            Ok(true) => tracing::debug!(key, "lock released"),
            Ok(false) => {
                // Lease expired mid-body and may have been taken over; the
                // body just ran without mutual exclusion for its tail end.
                tracing::warn!(key, "lease no longer owned at release");
            }
            Err(e) => tracing::warn!(key, error = %e, "lease backend error on release"),
        }

        Ok(result)
    }
}

/// Base interval plus up to 50% random jitter.
#[allow(clippy::cast_possible_truncation)]
fn jittered(base: Duration) -> Duration {
    let base_ms = base.as_millis().min(u128::from(u64::MAX)) as u64;
    if base_ms == 0 {
        return base;
    }
    let jitter = rand::thread_rng().gen_range(0..=base_ms / 2);
    Duration::from_millis(base_ms + jitter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryLeaseLock;
    use std::sync::atomic::{AtomicI64, Ordering};

    fn coordinator() -> LockCoordinator {
        LockCoordinator::new(Arc::new(MemoryLeaseLock::new()))
    }

    fn fast_opts() -> LockOptions {
        LockOptions {
            ttl: Duration::from_secs(5),
            max_retries: 50,
            retry_interval: Duration::from_millis(5),
        }
    }

    #[tokio::test]
    async fn body_runs_and_result_passes_through() {
        let coord = coordinator();
        let out = coord
            .with_lock("scope", fast_opts(), || async { 41 + 1 })
            .await
            .unwrap();
        assert_eq!(out, 42);
    }

    #[tokio::test]
    async fn serializes_read_modify_write_races() {
        let coord = coordinator();
        let counter = Arc::new(AtomicI64::new(0));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let coord = coord.clone();
            let counter = Arc::clone(&counter);
            handles.push(tokio::spawn(async move {
                coord
                    .with_lock("counter", fast_opts(), || async {
                        // deliberate read-sleep-write to expose lost updates
                        let read = counter.load(Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(2)).await;
                        counter.store(read + 1, Ordering::SeqCst);
                    })
                    .await
                    .unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        assert_eq!(counter.load(Ordering::SeqCst), 16);
    }

    #[tokio::test]
    async fn exhausted_retries_never_run_body() {
        let lease = Arc::new(MemoryLeaseLock::new());
        assert!(lease
            .acquire("held", "other-owner", Duration::from_secs(30))
            .await
            .unwrap());

        let coord = LockCoordinator::new(lease);
        let ran = Arc::new(AtomicI64::new(0));
        let ran2 = Arc::clone(&ran);

        let err = coord
            .with_lock(
                "held",
                LockOptions {
                    ttl: Duration::from_secs(1),
                    max_retries: 3,
                    retry_interval: Duration::from_millis(1),
                },
                || async move {
                    ran2.fetch_add(1, Ordering::SeqCst);
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            LockError::AcquireTimeout { attempts: 3, .. }
        ));
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn releases_even_when_body_result_is_error() {
        let lease = Arc::new(MemoryLeaseLock::new());
        let coord = LockCoordinator::new(Arc::clone(&lease) as Arc<dyn LeaseLock>);

        let out: Result<std::result::Result<(), &str>> = coord
            .with_lock("scope", fast_opts(), || async { Err("body failed") })
            .await;
        assert_eq!(out.unwrap(), Err("body failed"));

        // the scope must be free again immediately
        assert!(lease
            .acquire("scope", "next", Duration::from_secs(1))
            .await
            .unwrap());
    }
}
