//! Keyed mutual exclusion for ARM resources
//!
//! Operations that must not overlap on the same Azure resource (slot swaps
//! on one App, plan changes on one service plan) take the lock for that
//! resource's ID. The lock is released when the guard is dropped.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tfplug::context::{Cancellation, Context};
use tokio::sync::OwnedMutexGuard;

#[derive(Default)]
pub struct ResourceLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

/// Held lock on one resource ID
pub struct ResourceLockGuard {
    key: String,
    _guard: OwnedMutexGuard<()>,
}

impl Drop for ResourceLockGuard {
    fn drop(&mut self) {
        tracing::debug!("Released lock on {}", self.key);
    }
}

impl ResourceLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for and take the lock on `id`. IDs are compared case-insensitively.
    pub async fn lock(&self, id: &str) -> ResourceLockGuard {
        let key = id.to_ascii_lowercase();
        let mutex = {
            // A poisoned map only means another task panicked mid-insert;
            // the entries themselves are still usable.
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            locks.entry(key.clone()).or_default().clone()
        };

        tracing::debug!("Waiting for lock on {}", key);
        let guard = mutex.lock_owned().await;
        tracing::debug!("Acquired lock on {}", key);

        ResourceLockGuard { key, _guard: guard }
    }

    /// Lock several IDs at once, in a stable order so two callers locking
    /// the same set cannot deadlock
    pub async fn lock_all(&self, ids: &[&str]) -> Vec<ResourceLockGuard> {
        let mut keys: Vec<String> = ids.iter().map(|id| id.to_ascii_lowercase()).collect();
        keys.sort();
        keys.dedup();

        let mut guards = Vec::with_capacity(keys.len());
        for key in keys {
            guards.push(self.lock(&key).await);
        }
        guards
    }

    /// [`lock`](Self::lock), giving up once `ctx` is done
    pub async fn lock_within(
        &self,
        ctx: &Context,
        id: &str,
    ) -> Result<ResourceLockGuard, Cancellation> {
        tokio::select! {
            guard = self.lock(id) => Ok(guard),
            reason = ctx.cancelled() => {
                tracing::debug!("Gave up waiting for lock on {}: {}", id, reason);
                Err(reason)
            }
        }
    }

    /// [`lock_all`](Self::lock_all), giving up once `ctx` is done. Guards
    /// already taken are released.
    pub async fn lock_all_within(
        &self,
        ctx: &Context,
        ids: &[&str],
    ) -> Result<Vec<ResourceLockGuard>, Cancellation> {
        tokio::select! {
            guards = self.lock_all(ids) => Ok(guards),
            reason = ctx.cancelled() => {
                tracing::debug!("Gave up waiting for locks on {:?}: {}", ids, reason);
                Err(reason)
            }
        }
    }
}
