//! POSIX threads compatibility layer over the native kernel primitives.
//!
//! Each POSIX object wraps the corresponding native one and translates
//! between POSIX error codes and [`okos_kernel`] errors. The layer follows
//! two house rules throughout:
//!
//! - Functions return error codes, they never touch the caller's `errno`:
//!   every entry point saves it and restores it on all return paths.
//! - Timed acquisitions try the fast path first, so an already-expired
//!   deadline still succeeds when the resource is free.

pub mod barrier;
pub mod cond;
pub mod errno;
pub mod mutex;
pub mod rwlock;
pub mod spin;
pub mod thread;
pub mod time;
pub mod tsd;

pub use self::{
    barrier::{Barrier, PTHREAD_BARRIER_SERIAL_THREAD},
    cond::{Cond, CondAttr},
    errno::Errno,
    mutex::{Mutex, MutexAttr, MutexType},
    rwlock::RwLock,
    spin::SpinLock,
    thread::Thread,
    time::TimeSpec,
};
