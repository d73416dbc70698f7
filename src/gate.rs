//! Admission control for crawl runs
//!
//! The gate bounds how many runs execute at once. Callers over the limit wait
//! in arrival order; nothing is rejected.

use crate::KumoError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Bounded, FIFO admission for crawl runs
#[derive(Debug, Clone)]
pub struct ConcurrencyGate {
    permits: Arc<Semaphore>,
    capacity: usize,
    active: Arc<AtomicUsize>,
    waiting: Arc<AtomicUsize>,
}

/// Proof of admission; the slot is released when this is dropped
#[derive(Debug)]
pub struct GatePass {
    _permit: OwnedSemaphorePermit,
    active: Arc<AtomicUsize>,
}

impl Drop for GatePass {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Keeps the waiting count honest if an `admit` future is dropped mid-wait
struct WaitingGuard(Arc<AtomicUsize>);

impl Drop for WaitingGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ConcurrencyGate {
    /// Creates a gate admitting at most `capacity` runs at a time
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            permits: Arc::new(Semaphore::new(capacity)),
            capacity,
            active: Arc::new(AtomicUsize::new(0)),
            waiting: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Waits for a free slot
    ///
    /// Waiters are admitted in the order they called `admit`. Fails only once
    /// the gate has been closed.
    pub async fn admit(&self) -> crate::Result<GatePass> {
        self.waiting.fetch_add(1, Ordering::SeqCst);
        let guard = WaitingGuard(self.waiting.clone());
        let permit = self.permits.clone().acquire_owned().await;
        drop(guard);

        let permit = permit.map_err(|_| KumoError::GateClosed)?;
        self.active.fetch_add(1, Ordering::SeqCst);
        Ok(GatePass {
            _permit: permit,
            active: self.active.clone(),
        })
    }

    /// Stops admitting; current and future waiters get [`KumoError::GateClosed`]
    pub fn close(&self) {
        self.permits.close();
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Runs currently holding a slot
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Callers currently blocked in [`admit`](Self::admit)
    pub fn waiting(&self) -> usize {
        self.waiting.load(Ordering::SeqCst)
    }
}
