//! Per-order exclusive locks.
//!
//! One async mutex per order id, created on demand and dropped from the
//! registry once nobody holds or waits on it.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::services::error::OrderError;

#[derive(Clone, Default)]
pub struct OrderLocks {
    locks: Arc<DashMap<Uuid, Arc<Mutex<()>>>>,
}

impl OrderLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait up to `timeout` for exclusive access to `order_id`.
    ///
    /// On timeout nothing has been read or written yet, so the caller may
    /// simply retry.
    pub async fn acquire(&self, order_id: Uuid, timeout: Duration) -> Result<OrderLockGuard, OrderError> {
        let mutex = self
            .locks
            .entry(order_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        match tokio::time::timeout(timeout, mutex.lock_owned()).await {
            Ok(guard) => Ok(OrderLockGuard {
                order_id,
                guard: Some(guard),
                locks: self.locks.clone(),
            }),
            Err(_) => {
                self.release_if_idle(order_id);
                metrics::counter!("order_lock_timeouts_total").increment(1);
                tracing::warn!(order_id = %order_id, "Timed out waiting for order lock");
                Err(OrderError::LockTimeout(order_id))
            }
        }
    }

    /// Number of orders that currently have a lock entry.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }

    fn release_if_idle(&self, order_id: Uuid) {
        self.locks
            .remove_if(&order_id, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}

/// Holds the lock for one order until dropped.
pub struct OrderLockGuard {
    order_id: Uuid,
    guard: Option<OwnedMutexGuard<()>>,
    locks: Arc<DashMap<Uuid, Arc<Mutex<()>>>>,
}

impl Drop for OrderLockGuard {
    fn drop(&mut self) {
        // Release the mutex before checking whether the entry is idle.
        self.guard.take();
        self.locks
            .remove_if(&self.order_id, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}
