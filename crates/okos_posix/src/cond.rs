//! `pthread_cond` over the native condition variable.

use okos_kernel::{sync::Condvar, time::ClockId};

use crate::{
    errno::{self, ETIMEDOUT, Errno},
    mutex::Mutex,
    time::TimeSpec,
};

/// Condition-variable attributes; the clock is fixed at creation and is the
/// one `timed_wait` deadlines are measured against.
#[derive(Debug, Clone, Copy, Default)]
pub struct CondAttr {
    clock: ClockId,
}

impl CondAttr {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_clock(&mut self, clock: ClockId) {
        self.clock = clock;
    }

    #[must_use]
    pub fn clock(&self) -> ClockId {
        self.clock
    }
}

/// A POSIX condition variable.
pub struct Cond {
    cv: Condvar,
}

impl Cond {
    #[must_use]
    pub fn new(attr: &CondAttr) -> Self {
        Self {
            cv: Condvar::with_clock(attr.clock),
        }
    }

    /// Releases `mutex`, sleeps until signaled, reacquires `mutex`.
    pub fn wait(&self, mutex: &Mutex) -> Result<(), Errno> {
        let _errno = errno::preserve();
        self.cv.wait_raw(mutex.raw()).map_err(Errno::from)
    }

    /// [`wait`](Cond::wait) with an absolute deadline on the attribute
    /// clock. On timeout the mutex is still reacquired before returning.
    pub fn timed_wait(&self, mutex: &Mutex, abstime: &TimeSpec) -> Result<(), Errno> {
        let _errno = errno::preserve();
        let Some(ms) = abstime.delta_ms(self.cv.clock())? else {
            return Err(ETIMEDOUT);
        };
        self.cv.wait_raw_timed(mutex.raw(), ms).map_err(Errno::from)
    }

    pub fn signal(&self) {
        self.cv.signal();
    }

    pub fn broadcast(&self) {
        self.cv.broadcast();
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, thread, time::Duration};

    use super::*;
    use crate::{errno::EPERM, mutex::MutexAttr};

    #[test]
    fn timed_wait_expires_and_keeps_the_mutex() {
        let m = Mutex::new(&MutexAttr::new());
        let cv = Cond::new(&CondAttr::new());
        m.lock().unwrap();
        let soon = TimeSpec::after_ms(ClockId::Monotonic, 20);
        assert_eq!(cv.timed_wait(&m, &soon), Err(ETIMEDOUT));
        // Unlock succeeding proves the mutex came back to us.
        m.unlock().unwrap();
    }

    #[test]
    fn past_deadline_returns_immediately() {
        let m = Mutex::new(&MutexAttr::new());
        let cv = Cond::new(&CondAttr::new());
        m.lock().unwrap();
        let past = TimeSpec { sec: 0, nsec: 0 };
        assert_eq!(cv.timed_wait(&m, &past), Err(ETIMEDOUT));
        m.unlock().unwrap();
    }

    #[test]
    fn wait_without_the_mutex_is_eperm() {
        let m = Mutex::new(&MutexAttr::new());
        let cv = Cond::new(&CondAttr::new());
        assert_eq!(cv.wait(&m), Err(EPERM));
    }

    #[test]
    fn broadcast_releases_all_waiters() {
        let m = Arc::new(Mutex::new(&MutexAttr::new()));
        let cv = Arc::new(Cond::new(&CondAttr::new()));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let (m, cv) = (Arc::clone(&m), Arc::clone(&cv));
                thread::spawn(move || {
                    m.lock().unwrap();
                    cv.wait(&m).unwrap();
                    m.unlock().unwrap();
                })
            })
            .collect();
        // Spurious wakeups are allowed, so keep broadcasting until all
        // waiters are through.
        while handles.iter().any(|h| !h.is_finished()) {
            cv.broadcast();
            thread::sleep(Duration::from_millis(1));
        }
        for h in handles {
            h.join().unwrap();
        }
    }

    #[test]
    fn realtime_clock_attribute_is_honored() {
        let mut attr = CondAttr::new();
        attr.set_clock(ClockId::Realtime);
        let m = Mutex::new(&MutexAttr::new());
        let cv = Cond::new(&attr);
        m.lock().unwrap();
        // A monotonic timestamp is far in the past on the realtime clock.
        let mono_now = TimeSpec::now(ClockId::Monotonic);
        assert_eq!(cv.timed_wait(&m, &mono_now), Err(ETIMEDOUT));
        m.unlock().unwrap();
    }
}
