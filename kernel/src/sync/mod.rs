//! Kernel synchronization primitives.
//!
//! Two lock families, split by what context may take them:
//!
//! * [`SpinLock`] — short critical sections, usable from interrupt
//!   handlers.
//! * [`RawMutex`]/[`Mutex`] — suspending locks for thread context, with the
//!   owner-tracked [`RawMutex::unlock_as`] handoff used by DMA completion
//!   handlers.
//!
//! On top of those: [`Condvar`], [`Barrier`], [`Semaphore`], [`RwLock`],
//! and the address-keyed [`genwait`] sleep/wake facility.

mod barrier;
mod condvar;
pub mod genwait;
mod mutex;
mod rwlock;
mod semaphore;
mod spin_lock;

pub use self::{
    barrier::{Barrier, BarrierWaitResult},
    condvar::Condvar,
    mutex::{Mutex, MutexGuard, MutexKind, RawMutex},
    rwlock::RwLock,
    semaphore::Semaphore,
    spin_lock::{SpinLock, SpinLockGuard},
};
