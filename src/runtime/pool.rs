//! Fixed-size resource pool for generation-call slots.
//!
//! The pool is a single counted-permit abstraction: a bounded semaphore
//! whose permits *are* the slots. There is no second free-list to keep in
//! sync, so a slot can never be double-booked or reported free while held.
//! Releases are RAII: dropping the guard returns the slot even when the
//! holder errors out.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Pool of execution slots guarding calls to the generation collaborator.
#[derive(Debug)]
pub struct ResourcePool {
    semaphore: Arc<Semaphore>,
    size: usize,
    in_use: Arc<AtomicUsize>,
    peak_in_use: Arc<AtomicUsize>,
}

/// RAII handle to one acquired slot. Dropping it releases the slot.
#[derive(Debug)]
pub struct SlotGuard {
    _permit: OwnedSemaphorePermit,
    in_use: Arc<AtomicUsize>,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.in_use.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ResourcePool {
    /// Create a pool with `size` slots.
    pub fn new(size: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(size)),
            size,
            in_use: Arc::new(AtomicUsize::new(0)),
            peak_in_use: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Acquire one slot, waiting until one is free.
    pub async fn acquire(&self) -> SlotGuard {
        // The semaphore is never closed, so acquire cannot fail.
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .expect("resource pool semaphore closed");

        let now = self.in_use.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_use.fetch_max(now, Ordering::SeqCst);

        SlotGuard {
            _permit: permit,
            in_use: Arc::clone(&self.in_use),
        }
    }

    /// Acquire a slot only if one is immediately free.
    pub fn try_acquire(&self) -> Option<SlotGuard> {
        let permit = Arc::clone(&self.semaphore).try_acquire_owned().ok()?;
        let now = self.in_use.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_use.fetch_max(now, Ordering::SeqCst);
        Some(SlotGuard {
            _permit: permit,
            in_use: Arc::clone(&self.in_use),
        })
    }

    /// Total number of slots.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Slots currently free.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Slots currently held.
    pub fn in_use(&self) -> usize {
        self.in_use.load(Ordering::SeqCst)
    }

    /// High-water mark of concurrently held slots.
    pub fn peak_in_use(&self) -> usize {
        self.peak_in_use.load(Ordering::SeqCst)
    }

    /// Fraction of slots currently held, in [0,1].
    pub fn utilization(&self) -> f64 {
        if self.size == 0 {
            return 0.0;
        }
        self.in_use() as f64 / self.size as f64
    }
}
