//! `pthread_barrier`, a thin veneer over the native barrier.

use okos_kernel::sync::{self, BarrierWaitResult};

use crate::errno::{self, Errno};

/// Returned from [`Barrier::wait`] to exactly one thread per generation.
pub const PTHREAD_BARRIER_SERIAL_THREAD: i32 = -1;

/// A POSIX barrier.
pub struct Barrier {
    inner: sync::Barrier,
}

impl Barrier {
    /// Creates a barrier for `count` threads; zero is `EINVAL`.
    pub fn new(count: u32) -> Result<Self, Errno> {
        let _errno = errno::preserve();
        Ok(Self {
            inner: sync::Barrier::new(count)?,
        })
    }

    /// Blocks until `count` threads have arrived. One waiter per generation
    /// gets [`PTHREAD_BARRIER_SERIAL_THREAD`], the rest get zero.
    pub fn wait(&self) -> Result<i32, Errno> {
        let _errno = errno::preserve();
        match self.inner.wait()? {
            BarrierWaitResult::Serial => Ok(PTHREAD_BARRIER_SERIAL_THREAD),
            BarrierWaitResult::Released => Ok(0),
        }
    }

    /// Destroys the barrier; `EBUSY` while threads are waiting at it.
    pub fn destroy(&self) -> Result<(), Errno> {
        let _errno = errno::preserve();
        self.inner.destroy().map_err(Errno::from)
    }
}
