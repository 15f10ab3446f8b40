//! `pthread_spinlock`, a plain atomic spin.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::errno::{EBUSY, Errno};

/// A POSIX spin lock. No owner tracking and no blocking; contended waiters
/// burn cycles, exactly as the API promises.
pub struct SpinLock {
    locked: AtomicBool,
}

impl SpinLock {
    #[must_use]
    pub fn new() -> Self {
        Self {
            locked: AtomicBool::new(false),
        }
    }

    pub fn lock(&self) {
        while self
            .locked
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            std::hint::spin_loop();
        }
    }

    pub fn try_lock(&self) -> Result<(), Errno> {
        if self
            .locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
        {
            Ok(())
        } else {
            Err(EBUSY)
        }
    }

    pub fn unlock(&self) {
        self.locked.store(false, Ordering::Release);
    }

    /// `pthread_spin_destroy`: `EBUSY` while held.
    pub fn destroy(&self) -> Result<(), Errno> {
        if self.locked.load(Ordering::Acquire) {
            Err(EBUSY)
        } else {
            Ok(())
        }
    }
}

impl Default for SpinLock {
    fn default() -> Self {
        Self::new()
    }
}
