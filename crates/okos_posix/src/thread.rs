//! `pthread_create`/`join`/`detach`/`exit` over host threads, plus
//! `pthread_once` and the unimplemented cancellation surface.

use std::{
    panic::{self, AssertUnwindSafe},
    sync::{Arc, Mutex as StdMutex, Once},
    thread::{self, JoinHandle, ThreadId},
};

use crate::{
    errno::{self, EDEADLK, EINVAL, ENOSYS, Errno},
    tsd,
};

/// Thread exit value, the `void *` of `pthread_exit`/`pthread_join`.
pub type ExitValue = usize;

/// Private unwind payload delivering a [`exit`] value to the spawn wrapper.
struct ExitPayload(ExitValue);

/// A thread handle, `pthread_t`.
///
/// Handles compare equal exactly when they name the same thread. The join
/// handle lives behind a shared slot so clones of the same `Thread` agree
/// on whether it has been joined or detached.
#[derive(Clone)]
pub struct Thread {
    id: ThreadId,
    handle: Arc<StdMutex<Option<JoinHandle<ExitValue>>>>,
}

impl Thread {
    /// Waits for the thread to finish and returns its exit value.
    ///
    /// Joining yourself is `EDEADLK`; joining a detached or already-joined
    /// thread is `EINVAL`. A thread that died of a real panic (not
    /// [`exit`]) propagates that panic to the joiner.
    pub fn join(&self) -> Result<ExitValue, Errno> {
        let _errno = errno::preserve();
        if self.id == thread::current().id() {
            return Err(EDEADLK);
        }
        let handle = self.handle.lock().unwrap().take().ok_or(EINVAL)?;
        match handle.join() {
            Ok(value) => Ok(value),
            Err(payload) => panic::resume_unwind(payload),
        }
    }

    /// Relinquishes the join handle; the thread cleans itself up.
    pub fn detach(&self) -> Result<(), Errno> {
        let _errno = errno::preserve();
        self.handle.lock().unwrap().take().map(drop).ok_or(EINVAL)
    }

    #[must_use]
    pub fn id(&self) -> ThreadId {
        self.id
    }
}

/// `pthread_equal`.
#[must_use]
pub fn equal(a: &Thread, b: &Thread) -> bool {
    a.id == b.id
}

/// A handle for the calling thread, `pthread_self`.
///
/// The handle is not joinable (join handles belong to the creator), which
/// matches a self-join being an error anyway.
#[must_use]
pub fn current() -> Thread {
    Thread {
        id: thread::current().id(),
        handle: Arc::new(StdMutex::new(None)),
    }
}

/// Spawns a thread running `f`, `pthread_create`.
///
/// The wrapper catches the [`exit`] unwind and runs thread-specific-data
/// destructors on every exit path.
pub fn create<F>(f: F) -> Result<Thread, Errno>
where
    F: FnOnce() -> ExitValue + Send + 'static,
{
    let _errno = errno::preserve();
    let handle = thread::spawn(move || {
        let result = panic::catch_unwind(AssertUnwindSafe(f));
        tsd::run_destructors();
        match result {
            Ok(value) => value,
            Err(payload) => match payload.downcast::<ExitPayload>() {
                Ok(exit) => exit.0,
                Err(other) => panic::resume_unwind(other),
            },
        }
    });
    Ok(Thread {
        id: handle.thread().id(),
        handle: Arc::new(StdMutex::new(Some(handle))),
    })
}

/// Terminates the calling thread with `value`, `pthread_exit`.
///
/// Implemented as an unwind so stack objects are dropped on the way out;
/// only threads started by [`create`] translate the payload into an exit
/// value.
pub fn exit(value: ExitValue) -> ! {
    panic::panic_any(ExitPayload(value))
}

/// Yields the processor, `sched_yield`.
pub fn yield_now() {
    okos_kernel::task::pass();
}

/// One-time initialization control, `pthread_once_t`.
pub struct OnceControl {
    once: Once,
}

impl OnceControl {
    #[must_use]
    pub const fn new() -> Self {
        Self { once: Once::new() }
    }

    /// Runs `init` the first time any thread calls this; later calls return
    /// once that first call has completed.
    pub fn call(&self, init: fn()) {
        self.once.call_once(init);
    }
}

impl Default for OnceControl {
    fn default() -> Self {
        Self::new()
    }
}

pub const PTHREAD_CANCEL_ENABLE: i32 = 0;
pub const PTHREAD_CANCEL_DISABLE: i32 = 1;
pub const PTHREAD_CANCEL_DEFERRED: i32 = 0;
pub const PTHREAD_CANCEL_ASYNCHRONOUS: i32 = 1;

/// Cancellation is not provided; the call always fails.
pub fn cancel(_thread: &Thread) -> Result<(), Errno> {
    Err(ENOSYS)
}

/// Reports the fixed default state in `old_state`, then fails: threads are
/// always cancel-enabled in the sense that nothing ever cancels them.
pub fn set_cancel_state(_state: i32, old_state: Option<&mut i32>) -> Result<(), Errno> {
    if let Some(old) = old_state {
        *old = PTHREAD_CANCEL_ENABLE;
    }
    Err(ENOSYS)
}

/// Reports the fixed default type in `old_type`, then fails.
pub fn set_cancel_type(_cancel_type: i32, old_type: Option<&mut i32>) -> Result<(), Errno> {
    if let Some(old) = old_type {
        *old = PTHREAD_CANCEL_DEFERRED;
    }
    Err(ENOSYS)
}
