use std::{
    cell::UnsafeCell,
    ops::{Deref, DerefMut},
    sync,
    thread::ThreadId,
    time::{Duration, Instant},
};

use crate::{error::KernelError, interrupt, task};

/// Locking discipline of a [`RawMutex`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MutexKind {
    /// Self-relock is reported as a deadlock, unlock by a non-owner is an
    /// error.
    #[default]
    Normal,
    /// Same checks as `Normal`; exists so the POSIX shim can distinguish
    /// the two attribute values.
    ErrorCheck,
    /// The owner may relock; the mutex is released when the depth returns
    /// to zero.
    Recursive,
}

#[derive(Debug, Default)]
struct OwnerState {
    owner: Option<ThreadId>,
    depth: u32,
}

/// A standalone blocking kernel mutex with explicit owner tracking.
///
/// This is the suspending lock of the core (the KOS `mutex_t`): acquiring
/// it may block, so it is forbidden in interrupt context. Owner tracking is
/// part of the contract, not a debug aid — the DMA chain hands a held mutex
/// from the issuing thread to the interrupt handler that finishes the chain,
/// and the handler releases it on the owner's behalf via [`unlock_as`].
///
/// [`unlock_as`]: RawMutex::unlock_as
pub struct RawMutex {
    kind: MutexKind,
    state: sync::Mutex<OwnerState>,
    released: sync::Condvar,
}

impl RawMutex {
    #[must_use]
    pub fn new(kind: MutexKind) -> Self {
        Self {
            kind,
            state: sync::Mutex::new(OwnerState::default()),
            released: sync::Condvar::new(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> MutexKind {
        self.kind
    }

    /// Acquires the mutex, blocking until it is free.
    pub fn lock(&self) -> Result<(), KernelError> {
        interrupt::assert_thread_context()?;
        let me = task::current();
        let mut state = self.state.lock().unwrap();
        if state.owner == Some(me) {
            return self.relock(&mut state);
        }
        while state.owner.is_some() {
            state = self.released.wait(state).unwrap();
        }
        state.owner = Some(me);
        state.depth = 1;
        Ok(())
    }

    /// Acquires the mutex without blocking.
    ///
    /// Unlike [`lock`], this is allowed from interrupt context.
    ///
    /// [`lock`]: RawMutex::lock
    pub fn try_lock(&self) -> Result<(), KernelError> {
        let me = task::current();
        let mut state = self.state.lock().unwrap();
        if state.owner == Some(me) {
            return self.relock(&mut state);
        }
        if state.owner.is_some() {
            return Err(KernelError::Busy);
        }
        state.owner = Some(me);
        state.depth = 1;
        Ok(())
    }

    /// Acquires the mutex, giving up after `ms` milliseconds.
    pub fn lock_timed(&self, ms: u64) -> Result<(), KernelError> {
        interrupt::assert_thread_context()?;
        let me = task::current();
        let deadline = Instant::now() + Duration::from_millis(ms);
        let mut state = self.state.lock().unwrap();
        if state.owner == Some(me) {
            return self.relock(&mut state);
        }
        while state.owner.is_some() {
            let now = Instant::now();
            if now >= deadline {
                return Err(KernelError::TimedOut);
            }
            let (next, timeout) = self
                .released
                .wait_timeout(state, deadline - now)
                .unwrap();
            state = next;
            if timeout.timed_out() && state.owner.is_some() {
                return Err(KernelError::TimedOut);
            }
        }
        state.owner = Some(me);
        state.depth = 1;
        Ok(())
    }

    fn relock(&self, state: &mut OwnerState) -> Result<(), KernelError> {
        match self.kind {
            MutexKind::Recursive => {
                state.depth += 1;
                Ok(())
            }
            MutexKind::Normal | MutexKind::ErrorCheck => Err(KernelError::Deadlock),
        }
    }

    /// Releases the mutex. The caller must be the owner.
    pub fn unlock(&self) -> Result<(), KernelError> {
        let me = task::current();
        let mut state = self.state.lock().unwrap();
        if state.owner != Some(me) {
            return Err(KernelError::NotOwner);
        }
        state.depth -= 1;
        if state.depth == 0 {
            state.owner = None;
            self.released.notify_one();
        }
        Ok(())
    }

    /// Releases the mutex on behalf of `owner`, from a thread (or interrupt
    /// handler) that is not the owner.
    ///
    /// This exists for exactly one pattern: a thread starts a multi-step
    /// hardware chain while holding the mutex, and the interrupt handler that
    /// observes the final completion releases it for that thread. It is
    /// interrupt-context-only by convention.
    ///
    /// # Safety
    ///
    /// The caller must guarantee that `owner` is the logical owner of the
    /// mutex and has ceded the release to the caller — i.e. `owner` will not
    /// itself unlock, and no longer touches the data the mutex protects
    /// until it reacquires it.
    pub unsafe fn unlock_as(&self, owner: ThreadId) -> Result<(), KernelError> {
        let mut state = self.state.lock().unwrap();
        if state.owner != Some(owner) {
            return Err(KernelError::NotOwner);
        }
        state.depth -= 1;
        if state.depth == 0 {
            state.owner = None;
            self.released.notify_one();
        }
        Ok(())
    }

    /// Current owner, if the mutex is held.
    #[must_use]
    pub fn owner(&self) -> Option<ThreadId> {
        self.state.lock().unwrap().owner
    }

    /// Whether the calling thread holds the mutex.
    #[must_use]
    pub fn held_by_current(&self) -> bool {
        self.owner() == Some(task::current())
    }

    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.owner().is_some()
    }
}

impl Default for RawMutex {
    fn default() -> Self {
        Self::new(MutexKind::Normal)
    }
}

/// Data-owning wrapper over [`RawMutex`].
pub struct Mutex<T> {
    raw: RawMutex,
    value: UnsafeCell<T>,
}

unsafe impl<T: Send> Sync for Mutex<T> {}
unsafe impl<T: Send> Send for Mutex<T> {}

impl<T> Mutex<T> {
    #[must_use]
    pub fn new(value: T) -> Self {
        Self {
            raw: RawMutex::new(MutexKind::Normal),
            value: UnsafeCell::new(value),
        }
    }

    /// Acquires the lock, blocking until it is free.
    pub fn lock(&self) -> Result<MutexGuard<'_, T>, KernelError> {
        self.raw.lock()?;
        Ok(MutexGuard { lock: self })
    }

    pub fn try_lock(&self) -> Result<MutexGuard<'_, T>, KernelError> {
        self.raw.try_lock()?;
        Ok(MutexGuard { lock: self })
    }

    /// The underlying raw mutex, for condition-variable plumbing.
    #[must_use]
    pub fn raw(&self) -> &RawMutex {
        &self.raw
    }
}

pub struct MutexGuard<'a, T> {
    lock: &'a Mutex<T>,
}

unsafe impl<T: Send> Send for MutexGuard<'_, T> {}

impl<'a, T> MutexGuard<'a, T> {
    /// The mutex this guard locks, used by [`Condvar::wait`] to relock
    /// after sleeping.
    ///
    /// [`Condvar::wait`]: crate::sync::Condvar::wait
    #[must_use]
    pub fn mutex(&self) -> &'a Mutex<T> {
        self.lock
    }
}

impl<T> Drop for MutexGuard<'_, T> {
    fn drop(&mut self) {
        // The guard's existence proves ownership.
        let _ = self.lock.raw.unlock();
    }
}

impl<T> Deref for MutexGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        unsafe { &*self.lock.value.get() }
    }
}

impl<T> DerefMut for MutexGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        unsafe { &mut *self.lock.value.get() }
    }
}
