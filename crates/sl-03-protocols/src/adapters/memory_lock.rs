//! # In-Memory Lock Adapter
//!
//! Named exclusive locks backed by per-name tokio mutexes. Lock guards
//! are parked under their token until release, so ownership survives
//! across await points without tying the lock to a task.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OwnedMutexGuard;
use uuid::Uuid;

use crate::ports::{LockError, LockService, LockToken};

/// In-memory named locks for one node.
#[derive(Default)]
pub struct InMemoryLockService {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    held: Mutex<HashMap<Uuid, OwnedMutexGuard<()>>>,
}

impl InMemoryLockService {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LockService for InMemoryLockService {
    async fn acquire(&self, name: &str, timeout: Duration) -> Result<LockToken, LockError> {
        let mutex = {
            let mut locks = self.locks.lock();
            Arc::clone(
                locks
                    .entry(name.to_string())
                    .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))),
            )
        };

        let guard = tokio::time::timeout(timeout, mutex.lock_owned())
            .await
            .map_err(|_| LockError::AcquireTimeout {
                name: name.to_string(),
            })?;

        let token = Uuid::new_v4();
        self.held.lock().insert(token, guard);
        Ok(LockToken {
            name: name.to_string(),
            token,
        })
    }

    async fn release(&self, token: LockToken) -> Result<(), LockError> {
        self.held
            .lock()
            .remove(&token.token)
            .map(drop)
            .ok_or(LockError::UnknownToken { token: token.token })
    }
}
