//! Error types for the lock crate.

/// Result type for lock operations.
pub type Result<T> = std::result::Result<T, LockError>;

/// Errors that can occur while coordinating a lease lock.
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    /// Every acquisition attempt failed within the retry budget.
    ///
    /// Callers should surface this as a retryable condition, not a hard
    /// error: the scope was busy, nothing is broken.
    #[error("failed to acquire lock {key} after {attempts} attempts")]
    AcquireTimeout {
        /// The contended lock key.
        key: String,
        /// Attempts made before giving up.
        attempts: u32,
    },

    /// The lease backend failed. Treated as a failed attempt on acquire
    /// (fail-closed) and logged on release.
    #[error("lease backend error: {0}")]
    Backend(String),
}
