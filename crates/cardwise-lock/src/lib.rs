//! Lease-based distributed locking for cardwise.
//!
//! The only cross-instance coordination primitive in the system is a lease:
//! a key that can be set if absent, carries an owner token, and self-expires
//! after a TTL so a crashed holder cannot deadlock the scope. The
//! [`LockCoordinator`] layers bounded spin-retry with jittered backoff on
//! top and guarantees release-on-exit.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use cardwise_lock::{LockCoordinator, LockOptions, MemoryLeaseLock};
//!
//! # async fn example() -> Result<(), cardwise_lock::LockError> {
//! let coordinator = LockCoordinator::new(Arc::new(MemoryLeaseLock::new()));
//!
//! let total = coordinator
//!     .with_lock("performance:user:card", LockOptions::default(), || async {
//!         // read-modify-write that must not interleave
//!         1 + 1
//!     })
//!     .await?;
//! assert_eq!(total, 2);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod coordinator;
pub mod error;
pub mod memory;

pub use coordinator::{LockCoordinator, LockOptions};
pub use error::{LockError, Result};
pub use memory::MemoryLeaseLock;

use async_trait::async_trait;
use std::time::Duration;

/// The lease primitive: atomic set-if-absent with TTL plus token-checked
/// release.
///
/// `acquire` succeeds only when `key` is currently unheld (absent or
/// expired); the stored value embeds the caller's owner `token`. `release`
/// deletes the key only when the stored token matches, so one holder can
/// never free a lease that has since been taken over by another.
#[async_trait]
pub trait LeaseLock: Send + Sync {
    /// Try to take the lease for `key`, expiring after `ttl`.
    ///
    /// Returns `Ok(true)` when the lease was taken, `Ok(false)` when it is
    /// held by someone else.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::Backend`] when the backing store fails; callers
    /// must treat that as a failed acquisition (fail-closed).
    async fn acquire(&self, key: &str, token: &str, ttl: Duration) -> Result<bool>;

    /// Release the lease for `key` if it is still owned by `token`.
    ///
    /// Returns `Ok(true)` when the key was deleted, `Ok(false)` when the
    /// key was absent or owned by a different token.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::Backend`] when the backing store fails.
    async fn release(&self, key: &str, token: &str) -> Result<bool>;
}
