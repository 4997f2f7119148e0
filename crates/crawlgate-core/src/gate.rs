//! Counting admission gate that bounds concurrent crawls.
//!
//! A fixed number of slots is created up front. A caller waits (up to a
//! deadline) for a free slot and gets back a [`Slot`] guard; dropping the
//! guard returns the slot, so release happens on every exit path including
//! errors and panics.
//!
//! Waiters are served in FIFO order because the underlying
//! [`tokio::sync::Semaphore`] is fair. Callers must not rely on that.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};

use crate::error::AppError;

/// Fixed-capacity slot pool, cheap to clone.
#[derive(Debug, Clone)]
pub struct AdmissionGate {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

/// One held slot. The slot goes back to the gate when this is dropped.
#[derive(Debug)]
#[must_use = "dropping a Slot releases it immediately"]
pub struct Slot {
    _permit: OwnedSemaphorePermit,
}

impl AdmissionGate {
    /// Create a gate with `capacity` slots (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.clamp(1, Semaphore::MAX_PERMITS);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots not currently held.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Slots currently held.
    pub fn in_use(&self) -> usize {
        self.capacity - self.available()
    }

    /// Wait up to `max_wait` for a slot.
    ///
    /// A zero `max_wait` is a non-blocking attempt. The waiting task holds no
    /// slot, so a timed-out caller leaves the gate untouched.
    pub async fn acquire(&self, max_wait: Duration) -> Result<Slot, AppError> {
        if max_wait.is_zero() {
            return self.try_acquire().ok_or(AppError::QueueTimeout(max_wait));
        }

        match tokio::time::timeout(max_wait, self.semaphore.clone().acquire_owned()).await {
            Ok(Ok(permit)) => Ok(Slot { _permit: permit }),
            Ok(Err(_)) => Err(AppError::Generic("admission gate closed".to_string())),
            Err(_) => Err(AppError::QueueTimeout(max_wait)),
        }
    }

    /// Take a slot only if one is free right now.
    pub fn try_acquire(&self) -> Option<Slot> {
        match self.semaphore.clone().try_acquire_owned() {
            Ok(permit) => Some(Slot { _permit: permit }),
            Err(TryAcquireError::NoPermits) | Err(TryAcquireError::Closed) => None,
        }
    }
}
