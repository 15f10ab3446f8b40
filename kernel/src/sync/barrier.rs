use crate::{
    error::KernelError,
    interrupt,
    sync::{Condvar, Mutex},
};

/// Poison sentinel written into every counter by a completed destroy.
const POISONED: u32 = u32::MAX;
/// `cleanup` value while a destroy is draining waiters.
const CLEANUP_IN_PROGRESS: u32 = 1;

/// Outcome of a successful [`Barrier::wait`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarrierWaitResult {
    /// This thread's arrival completed the rendezvous. Exactly one thread
    /// per generation observes this; it runs "alone" at that instant and is
    /// conventionally given the post-rendezvous housekeeping.
    Serial,
    /// Released as an ordinary participant of the generation.
    Released,
}

impl BarrierWaitResult {
    #[must_use]
    pub fn is_serial(&self) -> bool {
        matches!(self, Self::Serial)
    }
}

#[derive(Debug)]
struct BarrierState {
    /// Required number of arrivals; immutable until destroy poisons it.
    count: u32,
    /// Arrivals in the active generation; returns to 0 inside the same
    /// critical section in which it reaches `count`.
    waiting: u32,
    /// Generation counter, bumped exactly once per completed rendezvous.
    /// Waiters sleep until it moves so a broadcast from generation N can
    /// never release a thread that registered for N+1.
    pass: u32,
    /// Threads currently blocked inside `wait`; destroy drains this to 0.
    refcnt: u32,
    /// 0 normal, 1 destroy in progress, `u32::MAX` destroyed.
    cleanup: u32,
}

/// N-party rendezvous built from a mutex, a condvar, and a generation
/// counter.
///
/// All `count` participants must arrive at [`wait`] before any of them
/// proceeds; the arrival that completes the set is reported as the
/// [serial thread](BarrierWaitResult::Serial). The barrier is reusable: the
/// generation counter keeps consecutive rendezvous from interfering.
///
/// [`wait`]: Barrier::wait
pub struct Barrier {
    state: Mutex<BarrierState>,
    cond: Condvar,
}

impl Barrier {
    /// Creates a barrier for `count` participants.
    ///
    /// Fails with [`KernelError::InvalidArgument`] if `count` is zero or
    /// not representable.
    pub fn new(count: u32) -> Result<Self, KernelError> {
        if count == 0 || count >= POISONED {
            return Err(KernelError::InvalidArgument);
        }
        Ok(Self {
            state: Mutex::new(BarrierState {
                count,
                waiting: 0,
                pass: 0,
                refcnt: 0,
                cleanup: 0,
            }),
            cond: Condvar::new(),
        })
    }

    /// Arrives at the barrier and blocks until all participants have
    /// arrived.
    ///
    /// Fails with [`KernelError::InterruptContext`] from an interrupt
    /// handler (the rendezvous requires blocking) and with
    /// [`KernelError::InvalidArgument`] on a destroyed barrier or one with
    /// a destroy in progress. No arrival is recorded on any failure path.
    pub fn wait(&self) -> Result<BarrierWaitResult, KernelError> {
        interrupt::assert_thread_context()?;

        let mut state = self.state.lock()?;
        if state.cleanup != 0 || state.count == 0 || state.count == POISONED {
            return Err(KernelError::InvalidArgument);
        }

        state.waiting += 1;
        if state.waiting == state.count {
            // Last arrival: this thread completes the rendezvous and opens
            // the next generation before anyone it wakes can re-enter.
            state.waiting = 0;
            state.pass += 1;
            self.cond.broadcast();
            return Ok(BarrierWaitResult::Serial);
        }

        let pass = state.pass;
        state.refcnt += 1;
        while state.pass == pass {
            state = self.cond.wait(state)?;
        }
        state.refcnt -= 1;
        if state.cleanup == CLEANUP_IN_PROGRESS && state.refcnt == 0 {
            // Last straggler out; release the thread parked in destroy().
            self.cond.broadcast();
        }
        Ok(BarrierWaitResult::Released)
    }

    /// Tears the barrier down.
    ///
    /// Permitted while threads are still draining out of a completed
    /// rendezvous (`refcnt > 0`): blocks until they leave. Fails with
    /// [`KernelError::Busy`] while a generation is mid-arrival
    /// (`waiting != 0`) or another destroy is already in progress, and with
    /// [`KernelError::InvalidArgument`] on an already-destroyed barrier or
    /// from interrupt context.
    ///
    /// After success every counter is poisoned so straggling use fails
    /// loudly instead of corrupting a rendezvous.
    pub fn destroy(&self) -> Result<(), KernelError> {
        interrupt::assert_thread_context()?;

        let mut state = self.state.lock()?;
        if state.cleanup == POISONED || state.count == POISONED {
            return Err(KernelError::InvalidArgument);
        }
        if state.cleanup != 0 || state.waiting != 0 {
            return Err(KernelError::Busy);
        }

        state.cleanup = CLEANUP_IN_PROGRESS;
        while state.refcnt != 0 {
            state = self.cond.wait(state)?;
        }

        state.count = POISONED;
        state.waiting = POISONED;
        state.pass = POISONED;
        state.refcnt = POISONED;
        state.cleanup = POISONED;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, thread, time::Duration};

    use super::*;

    #[test]
    fn zero_count_rejected() {
        assert!(matches!(Barrier::new(0), Err(KernelError::InvalidArgument)));
    }

    #[test]
    fn single_party_is_serial() {
        let b = Barrier::new(1).unwrap();
        assert_eq!(b.wait().unwrap(), BarrierWaitResult::Serial);
        assert_eq!(b.wait().unwrap(), BarrierWaitResult::Serial);
    }

    #[test]
    fn wait_fails_in_interrupt_context() {
        let b = Barrier::new(2).unwrap();
        let _irq = interrupt::enter();
        assert_eq!(b.wait(), Err(KernelError::InterruptContext));
    }

    #[test]
    fn use_after_destroy_fails() {
        let b = Barrier::new(3).unwrap();
        b.destroy().unwrap();
        assert_eq!(b.wait(), Err(KernelError::InvalidArgument));
        assert_eq!(b.destroy(), Err(KernelError::InvalidArgument));
    }

    #[test]
    fn destroy_busy_during_arrival_phase() {
        let b = Arc::new(Barrier::new(2).unwrap());
        let b2 = Arc::clone(&b);
        let h = thread::spawn(move || b2.wait());
        // Let the first arrival park itself.
        thread::sleep(Duration::from_millis(50));
        assert_eq!(b.destroy(), Err(KernelError::Busy));
        assert_eq!(b.wait().unwrap(), BarrierWaitResult::Serial);
        assert_eq!(h.join().unwrap().unwrap(), BarrierWaitResult::Released);
        b.destroy().unwrap();
    }
}
