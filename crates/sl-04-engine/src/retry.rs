//! # Bounded Retry
//!
//! Transient store I/O is retried a bounded number of times with a short
//! linear backoff. Everything else fails the attempt immediately.
//!
//! Callers pass a closure producing an owned future (clone cheap handles
//! into it) so each attempt is independent.

use std::future::Future;
use std::time::Duration;
use tracing::warn;

use sl_03_protocols::ports::StoreError;

/// Retry `operation` up to `attempts` times while it fails with
/// `StoreError::TransientIo`. Any other error, or exhaustion, surfaces.
pub async fn retry_transient<T, F, Fut>(attempts: u32, mut operation: F) -> Result<T, StoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Err(StoreError::TransientIo(detail)) if attempt + 1 < attempts.max(1) => {
                attempt += 1;
                warn!(attempt, detail, "Transient store failure, retrying");
                tokio::time::sleep(Duration::from_millis(u64::from(attempt) * 20)).await;
            }
            other => return other,
        }
    }
}
