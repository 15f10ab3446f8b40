//! `pthread_rwlock` over the native reader/writer semaphore.

use okos_kernel::{KernelError, time::ClockId};

use crate::{
    errno::{self, EPERM, ETIMEDOUT, Errno},
    time::TimeSpec,
};

/// A POSIX reader/writer lock.
///
/// `try_read` mirrors `try_write`: it fails `EBUSY` exactly when a blocking
/// read would have to wait, i.e. while a writer holds the lock.
pub struct RwLock {
    raw: okos_kernel::sync::RwLock,
}

impl RwLock {
    #[must_use]
    pub fn new() -> Self {
        Self {
            raw: okos_kernel::sync::RwLock::new(),
        }
    }

    pub fn read_lock(&self) -> Result<(), Errno> {
        let _errno = errno::preserve();
        self.raw.read_lock().map_err(Errno::from)
    }

    pub fn try_read_lock(&self) -> Result<(), Errno> {
        let _errno = errno::preserve();
        self.raw.try_read_lock().map_err(Errno::from)
    }

    /// Read-locks with an absolute deadline; the fast path means an expired
    /// deadline still succeeds when no writer is in.
    pub fn timed_read_lock(&self, abstime: &TimeSpec) -> Result<(), Errno> {
        let _errno = errno::preserve();
        match self.raw.try_read_lock() {
            Ok(()) => return Ok(()),
            Err(KernelError::Busy) => {}
            Err(e) => return Err(e.into()),
        }
        let Some(ms) = abstime.delta_ms(ClockId::Monotonic)? else {
            return Err(ETIMEDOUT);
        };
        self.raw.read_lock_timed(ms).map_err(Errno::from)
    }

    pub fn write_lock(&self) -> Result<(), Errno> {
        let _errno = errno::preserve();
        self.raw.write_lock().map_err(Errno::from)
    }

    pub fn try_write_lock(&self) -> Result<(), Errno> {
        let _errno = errno::preserve();
        self.raw.try_write_lock().map_err(Errno::from)
    }

    pub fn timed_write_lock(&self, abstime: &TimeSpec) -> Result<(), Errno> {
        let _errno = errno::preserve();
        match self.raw.try_write_lock() {
            Ok(()) => return Ok(()),
            Err(KernelError::Busy) => {}
            Err(e) => return Err(e.into()),
        }
        let Some(ms) = abstime.delta_ms(ClockId::Monotonic)? else {
            return Err(ETIMEDOUT);
        };
        self.raw.write_lock_timed(ms).map_err(Errno::from)
    }

    /// The single POSIX unlock: releases whichever side the calling thread
    /// holds. Unlocking a lock the caller does not hold is `EPERM`.
    pub fn unlock(&self) -> Result<(), Errno> {
        let _errno = errno::preserve();
        match self.raw.write_unlock() {
            Ok(()) => Ok(()),
            Err(KernelError::NotOwner) => match self.raw.read_unlock() {
                Ok(()) => Ok(()),
                Err(_) => Err(EPERM),
            },
            Err(e) => Err(e.into()),
        }
    }
}

impl Default for RwLock {
    fn default() -> Self {
        Self::new()
    }
}
