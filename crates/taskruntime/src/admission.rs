use std::sync::atomic::{AtomicUsize, Ordering};

/// Lock-free bound on the number of executions in flight
#[derive(Debug)]
pub struct AdmissionControl {
    active: AtomicUsize,
    max: usize,
}

impl AdmissionControl {
    pub fn new(max: usize) -> Self {
        Self {
            active: AtomicUsize::new(0),
            max,
        }
    }

    /// Reserve one slot. Returns `false` when at capacity; the caller decides
    /// how to retry.
    pub fn try_reserve(&self) -> bool {
        let mut current = self.active.load(Ordering::Acquire);
        loop {
            if current >= self.max {
                return false;
            }
            match self.active.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(observed) => current = observed,
            }
        }
    }

    /// Give back a slot taken by [`try_reserve`](Self::try_reserve)
    pub fn release(&self) {
        let released = self
            .active
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| current.checked_sub(1));
        if released.is_err() {
            tracing::warn!("Admission slot released without a matching reservation");
        }
    }

    pub fn active(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    pub fn max(&self) -> usize {
        self.max
    }
}
