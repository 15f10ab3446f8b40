use std::{
    sync,
    time::{Duration, Instant},
};

use crate::{error::KernelError, interrupt};

/// Counting semaphore.
///
/// [`post`] is non-blocking and safe from interrupt context; the GD-ROM DMA
/// completion handler posts the transfer-done semaphore that the issuing
/// thread waits on.
///
/// [`post`]: Semaphore::post
pub struct Semaphore {
    count: sync::Mutex<u32>,
    posted: sync::Condvar,
}

impl Semaphore {
    #[must_use]
    pub fn new(initial: u32) -> Self {
        Self {
            count: sync::Mutex::new(initial),
            posted: sync::Condvar::new(),
        }
    }

    /// Blocks until the count is positive, then decrements it.
    pub fn wait(&self) -> Result<(), KernelError> {
        interrupt::assert_thread_context()?;
        let mut count = self.count.lock().unwrap();
        while *count == 0 {
            count = self.posted.wait(count).unwrap();
        }
        *count -= 1;
        Ok(())
    }

    /// Like [`wait`] with a relative timeout in milliseconds.
    ///
    /// [`wait`]: Semaphore::wait
    pub fn wait_timed(&self, ms: u64) -> Result<(), KernelError> {
        interrupt::assert_thread_context()?;
        let deadline = Instant::now() + Duration::from_millis(ms);
        let mut count = self.count.lock().unwrap();
        while *count == 0 {
            let now = Instant::now();
            if now >= deadline {
                return Err(KernelError::TimedOut);
            }
            count = self.posted.wait_timeout(count, deadline - now).unwrap().0;
        }
        *count -= 1;
        Ok(())
    }

    /// Decrements the count without blocking.
    pub fn try_wait(&self) -> Result<(), KernelError> {
        let mut count = self.count.lock().unwrap();
        if *count == 0 {
            return Err(KernelError::Busy);
        }
        *count -= 1;
        Ok(())
    }

    /// Increments the count and wakes one waiter.
    pub fn post(&self) {
        let mut count = self.count.lock().unwrap();
        *count += 1;
        self.posted.notify_one();
    }

    #[must_use]
    pub fn count(&self) -> u32 {
        *self.count.lock().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, thread};

    use super::*;

    #[test]
    fn post_releases_waiter() {
        let sem = Arc::new(Semaphore::new(0));
        let sem2 = Arc::clone(&sem);
        let h = thread::spawn(move || sem2.wait());
        sem.post();
        h.join().unwrap().unwrap();
        assert_eq!(sem.count(), 0);
    }

    #[test]
    fn timed_wait_expires() {
        let sem = Semaphore::new(0);
        assert_eq!(sem.wait_timed(10), Err(KernelError::TimedOut));
    }

    #[test]
    fn try_wait_on_empty() {
        let sem = Semaphore::new(1);
        sem.try_wait().unwrap();
        assert_eq!(sem.try_wait(), Err(KernelError::Busy));
    }
}
