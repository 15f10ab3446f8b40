//! `pthread_mutex` over the native kernel mutex.

use okos_kernel::sync::{MutexKind, RawMutex};

use crate::{
    errno::{self, EINVAL, ETIMEDOUT, Errno},
    time::TimeSpec,
};

/// POSIX mutex type, `PTHREAD_MUTEX_*`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MutexType {
    #[default]
    Normal,
    ErrorCheck,
    Recursive,
}

/// The only robustness value the layer accepts (`PTHREAD_MUTEX_STALLED`);
/// robust mutexes are not provided.
pub const PTHREAD_MUTEX_STALLED: i32 = 0;

#[derive(Debug, Clone, Copy, Default)]
pub struct MutexAttr {
    mutex_type: MutexType,
}

impl MutexAttr {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_type(&mut self, mutex_type: MutexType) {
        self.mutex_type = mutex_type;
    }

    #[must_use]
    pub fn mutex_type(&self) -> MutexType {
        self.mutex_type
    }

    /// Accepts only [`PTHREAD_MUTEX_STALLED`]; anything else is `EINVAL`.
    pub fn set_robust(&mut self, robust: i32) -> Result<(), Errno> {
        if robust == PTHREAD_MUTEX_STALLED {
            Ok(())
        } else {
            Err(EINVAL)
        }
    }
}

/// A POSIX mutex.
pub struct Mutex {
    raw: RawMutex,
}

impl Mutex {
    #[must_use]
    pub fn new(attr: &MutexAttr) -> Self {
        let kind = match attr.mutex_type {
            MutexType::Normal => MutexKind::Normal,
            MutexType::ErrorCheck => MutexKind::ErrorCheck,
            MutexType::Recursive => MutexKind::Recursive,
        };
        Self {
            raw: RawMutex::new(kind),
        }
    }

    pub(crate) fn raw(&self) -> &RawMutex {
        &self.raw
    }

    pub fn lock(&self) -> Result<(), Errno> {
        let _errno = errno::preserve();
        self.raw.lock().map_err(Errno::from)
    }

    pub fn try_lock(&self) -> Result<(), Errno> {
        let _errno = errno::preserve();
        self.raw.try_lock().map_err(Errno::from)
    }

    /// Locks with an absolute deadline.
    ///
    /// The lock is tried first, so an expired deadline still succeeds when
    /// the mutex is free; only a held mutex makes the deadline meaningful.
    pub fn timed_lock(&self, abstime: &TimeSpec) -> Result<(), Errno> {
        let _errno = errno::preserve();
        match self.raw.try_lock() {
            Ok(()) => return Ok(()),
            Err(okos_kernel::KernelError::Busy) => {}
            Err(e) => return Err(e.into()),
        }
        let Some(ms) = abstime.delta_ms(okos_kernel::time::ClockId::Monotonic)? else {
            return Err(ETIMEDOUT);
        };
        self.raw.lock_timed(ms).map_err(Errno::from)
    }

    pub fn unlock(&self) -> Result<(), Errno> {
        let _errno = errno::preserve();
        self.raw.unlock().map_err(Errno::from)
    }

    /// `pthread_mutex_consistent`: with no robust mutexes there is never a
    /// mutex in need of recovery.
    pub fn consistent(&self) -> Result<(), Errno> {
        Err(EINVAL)
    }
}
