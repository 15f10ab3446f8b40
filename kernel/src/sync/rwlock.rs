use std::{
    sync,
    thread::ThreadId,
    time::{Duration, Instant},
};

use crate::{error::KernelError, interrupt, task};

#[derive(Debug, Default)]
struct RwState {
    readers: u32,
    writer: Option<ThreadId>,
}

/// Reader/writer semaphore (the KOS `rw_semaphore_t`).
///
/// Standalone like [`RawMutex`](crate::sync::RawMutex) so the POSIX shim
/// can wrap it one-to-one. No fairness policy: a writer waits for the
/// reader count to drain, new readers wait only for a writer.
pub struct RwLock {
    state: sync::Mutex<RwState>,
    changed: sync::Condvar,
}

impl RwLock {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: sync::Mutex::new(RwState::default()),
            changed: sync::Condvar::new(),
        }
    }

    pub fn read_lock(&self) -> Result<(), KernelError> {
        interrupt::assert_thread_context()?;
        let mut state = self.state.lock().unwrap();
        while state.writer.is_some() {
            state = self.changed.wait(state).unwrap();
        }
        state.readers += 1;
        Ok(())
    }

    pub fn try_read_lock(&self) -> Result<(), KernelError> {
        let mut state = self.state.lock().unwrap();
        if state.writer.is_some() {
            return Err(KernelError::Busy);
        }
        state.readers += 1;
        Ok(())
    }

    pub fn read_lock_timed(&self, ms: u64) -> Result<(), KernelError> {
        interrupt::assert_thread_context()?;
        let deadline = Instant::now() + Duration::from_millis(ms);
        let mut state = self.state.lock().unwrap();
        while state.writer.is_some() {
            let now = Instant::now();
            if now >= deadline {
                return Err(KernelError::TimedOut);
            }
            state = self.changed.wait_timeout(state, deadline - now).unwrap().0;
        }
        state.readers += 1;
        Ok(())
    }

    pub fn read_unlock(&self) -> Result<(), KernelError> {
        let mut state = self.state.lock().unwrap();
        if state.readers == 0 {
            return Err(KernelError::NotOwner);
        }
        state.readers -= 1;
        if state.readers == 0 {
            self.changed.notify_all();
        }
        Ok(())
    }

    pub fn write_lock(&self) -> Result<(), KernelError> {
        interrupt::assert_thread_context()?;
        let me = task::current();
        let mut state = self.state.lock().unwrap();
        if state.writer == Some(me) {
            return Err(KernelError::Deadlock);
        }
        while state.writer.is_some() || state.readers != 0 {
            state = self.changed.wait(state).unwrap();
        }
        state.writer = Some(me);
        Ok(())
    }

    pub fn try_write_lock(&self) -> Result<(), KernelError> {
        let me = task::current();
        let mut state = self.state.lock().unwrap();
        if state.writer.is_some() || state.readers != 0 {
            return Err(KernelError::Busy);
        }
        state.writer = Some(me);
        Ok(())
    }

    pub fn write_lock_timed(&self, ms: u64) -> Result<(), KernelError> {
        interrupt::assert_thread_context()?;
        let me = task::current();
        let deadline = Instant::now() + Duration::from_millis(ms);
        let mut state = self.state.lock().unwrap();
        if state.writer == Some(me) {
            return Err(KernelError::Deadlock);
        }
        while state.writer.is_some() || state.readers != 0 {
            let now = Instant::now();
            if now >= deadline {
                return Err(KernelError::TimedOut);
            }
            state = self.changed.wait_timeout(state, deadline - now).unwrap().0;
        }
        state.writer = Some(me);
        Ok(())
    }

    pub fn write_unlock(&self) -> Result<(), KernelError> {
        let mut state = self.state.lock().unwrap();
        if state.writer != Some(task::current()) {
            return Err(KernelError::NotOwner);
        }
        state.writer = None;
        self.changed.notify_all();
        Ok(())
    }
}

impl Default for RwLock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, thread};

    use super::*;

    #[test]
    fn readers_share() {
        let rw = RwLock::new();
        rw.read_lock().unwrap();
        rw.read_lock().unwrap();
        assert_eq!(rw.try_write_lock(), Err(KernelError::Busy));
        rw.read_unlock().unwrap();
        rw.read_unlock().unwrap();
        rw.try_write_lock().unwrap();
        rw.write_unlock().unwrap();
    }

    #[test]
    fn writer_excludes_readers() {
        let rw = Arc::new(RwLock::new());
        rw.write_lock().unwrap();
        assert_eq!(rw.try_read_lock(), Err(KernelError::Busy));
        let rw2 = Arc::clone(&rw);
        let h = thread::spawn(move || {
            rw2.read_lock().unwrap();
            rw2.read_unlock().unwrap();
        });
        rw.write_unlock().unwrap();
        h.join().unwrap();
    }

    #[test]
    fn unbalanced_read_unlock_fails() {
        let rw = RwLock::new();
        assert_eq!(rw.read_unlock(), Err(KernelError::NotOwner));
    }

    #[test]
    fn write_lock_timed_expires() {
        let rw = Arc::new(RwLock::new());
        rw.read_lock().unwrap();
        let rw2 = Arc::clone(&rw);
        let h = thread::spawn(move || rw2.write_lock_timed(20));
        assert_eq!(h.join().unwrap(), Err(KernelError::TimedOut));
        rw.read_unlock().unwrap();
    }
}
