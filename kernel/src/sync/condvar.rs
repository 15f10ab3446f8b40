use std::{
    sync,
    time::{Duration, Instant},
};

use crate::{
    error::KernelError,
    interrupt,
    sync::{Mutex, MutexGuard, RawMutex},
    time::ClockId,
};

/// Condition variable paired with a [`RawMutex`] or [`Mutex`].
///
/// Wakeups are tracked with a generation counter: a waiter records the
/// counter before releasing the mutex and sleeps until it changes, so a
/// wakeup can never be lost between the release and the sleep, and a stale
/// notification from before the wait began never satisfies it.
///
/// The clock id is fixed at creation and is only meaningful to callers that
/// convert absolute deadlines into the relative timeouts taken by
/// [`wait_timed`]; the condvar itself waits on relative time.
///
/// [`wait_timed`]: Condvar::wait_timed
pub struct Condvar {
    clock: ClockId,
    seq: sync::Mutex<u64>,
    cv: sync::Condvar,
}

impl Condvar {
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(ClockId::Monotonic)
    }

    #[must_use]
    pub fn with_clock(clock: ClockId) -> Self {
        Self {
            clock,
            seq: sync::Mutex::new(0),
            cv: sync::Condvar::new(),
        }
    }

    #[must_use]
    pub fn clock(&self) -> ClockId {
        self.clock
    }

    /// Atomically releases `mutex` and sleeps until signaled, then
    /// reacquires it.
    ///
    /// The caller must hold `mutex`. Spurious returns are possible; callers
    /// re-check their predicate in a loop.
    pub fn wait_raw(&self, mutex: &RawMutex) -> Result<(), KernelError> {
        interrupt::assert_thread_context()?;
        if !mutex.held_by_current() {
            return Err(KernelError::NotOwner);
        }
        let mut seq = self.seq.lock().unwrap();
        let start = *seq;
        // Release order matters: the generation is latched before the mutex
        // drops, so a signal racing with this release still changes the
        // counter we compare against.
        mutex.unlock()?;
        while *seq == start {
            seq = self.cv.wait(seq).unwrap();
        }
        drop(seq);
        mutex.lock()
    }

    /// Like [`wait_raw`] with a relative timeout in milliseconds.
    ///
    /// The mutex is reacquired before returning even when the wait timed
    /// out.
    ///
    /// [`wait_raw`]: Condvar::wait_raw
    pub fn wait_raw_timed(&self, mutex: &RawMutex, ms: u64) -> Result<(), KernelError> {
        interrupt::assert_thread_context()?;
        if !mutex.held_by_current() {
            return Err(KernelError::NotOwner);
        }
        let deadline = Instant::now() + Duration::from_millis(ms);
        let mut seq = self.seq.lock().unwrap();
        let start = *seq;
        mutex.unlock()?;
        let mut timed_out = false;
        while *seq == start {
            let now = Instant::now();
            if now >= deadline {
                timed_out = true;
                break;
            }
            seq = self.cv.wait_timeout(seq, deadline - now).unwrap().0;
        }
        drop(seq);
        mutex.lock()?;
        if timed_out {
            return Err(KernelError::TimedOut);
        }
        Ok(())
    }

    /// Guard-based wait over a [`Mutex`].
    ///
    /// On error the guard has been consumed and the mutex released.
    pub fn wait<'a, T>(
        &self,
        guard: MutexGuard<'a, T>,
    ) -> Result<MutexGuard<'a, T>, KernelError> {
        interrupt::assert_thread_context()?;
        let mutex: &'a Mutex<T> = guard.mutex();
        let mut seq = self.seq.lock().unwrap();
        let start = *seq;
        drop(guard);
        while *seq == start {
            seq = self.cv.wait(seq).unwrap();
        }
        drop(seq);
        mutex.lock()
    }

    /// Wakes one waiter. Safe from interrupt context.
    pub fn signal(&self) {
        let mut seq = self.seq.lock().unwrap();
        *seq += 1;
        self.cv.notify_one();
    }

    /// Wakes every waiter. Safe from interrupt context.
    pub fn broadcast(&self) {
        let mut seq = self.seq.lock().unwrap();
        *seq += 1;
        self.cv.notify_all();
    }
}

impl Default for Condvar {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, thread, time::Duration};

    use super::*;
    use crate::sync::MutexKind;

    #[test]
    fn signal_wakes_raw_waiter() {
        let m = Arc::new(RawMutex::new(MutexKind::Normal));
        let cv = Arc::new(Condvar::new());
        let (m2, cv2) = (Arc::clone(&m), Arc::clone(&cv));
        let h = thread::spawn(move || {
            m2.lock().unwrap();
            cv2.wait_raw(&m2).unwrap();
            m2.unlock().unwrap();
        });
        // Signal until the waiter is gone; a signal before the wait starts
        // must not satisfy it, which the generation latch guarantees only
        // for signals preceding the waiter's registration.
        while !h.is_finished() {
            cv.signal();
            thread::sleep(Duration::from_millis(1));
        }
        h.join().unwrap();
    }

    #[test]
    fn timed_wait_reacquires_mutex() {
        let m = RawMutex::new(MutexKind::Normal);
        let cv = Condvar::new();
        m.lock().unwrap();
        assert_eq!(cv.wait_raw_timed(&m, 10), Err(KernelError::TimedOut));
        // Still owned by us after the timeout.
        assert!(m.held_by_current());
        m.unlock().unwrap();
    }

    #[test]
    fn wait_requires_held_mutex() {
        let m = RawMutex::new(MutexKind::Normal);
        let cv = Condvar::new();
        assert_eq!(cv.wait_raw(&m), Err(KernelError::NotOwner));
    }
}
