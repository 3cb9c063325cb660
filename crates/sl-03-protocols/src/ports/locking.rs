//! # Locking Port
//!
//! Named exclusive locks serializing protocol execution per channel.
//! Callers acquiring multiple names must do so in sorted order; the
//! helper below enforces it.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Errors from the locking collaborator.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LockError {
    /// The lock was not acquired within the wait budget. Fatal to this
    /// attempt; the caller may retry the whole protocol.
    #[error("Timed out acquiring lock {name}")]
    AcquireTimeout { name: String },

    #[error("Unknown or already released lock token {token}")]
    UnknownToken { token: Uuid },
}

/// Proof of lock ownership, surrendered on release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockToken {
    pub name: String,
    pub token: Uuid,
}

/// Named exclusive locks.
#[async_trait]
pub trait LockService: Send + Sync {
    /// Acquire the named lock, waiting at most `timeout`.
    async fn acquire(&self, name: &str, timeout: Duration) -> Result<LockToken, LockError>;

    /// Release a previously acquired lock.
    async fn release(&self, token: LockToken) -> Result<(), LockError>;
}

/// Acquire several named locks in deterministic (sorted) global order,
/// preventing deadlock between callers that touch overlapping name sets.
/// On any failure the already-acquired locks are released in reverse
/// order before the error surfaces.
pub async fn acquire_all(
    locks: &dyn LockService,
    names: &mut [String],
    timeout: Duration,
) -> Result<Vec<LockToken>, LockError> {
    names.sort();
    let mut held = Vec::with_capacity(names.len());
    for name in names.iter() {
        match locks.acquire(name, timeout).await {
            Ok(token) => held.push(token),
            Err(err) => {
                while let Some(token) = held.pop() {
                    let _ = locks.release(token).await;
                }
                return Err(err);
            }
        }
    }
    Ok(held)
}
