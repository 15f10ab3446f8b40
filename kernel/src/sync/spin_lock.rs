use std::{
    ops::{Deref, DerefMut},
    sync,
};

/// A short-hold lock that may be taken from both thread and interrupt
/// context.
///
/// On the Dreamcast's single CPU this is a disable-interrupts critical
/// section; on the hosted port it is a plain host mutex held only for
/// non-blocking critical sections. Handlers rely on the hold times being
/// bounded: nothing inside a `SpinLock` critical section may suspend.
pub struct SpinLock<T> {
    value: sync::Mutex<T>,
}

impl<T> SpinLock<T> {
    pub const fn new(value: T) -> Self {
        Self {
            value: sync::Mutex::new(value),
        }
    }

    /// Acquires the lock.
    pub fn lock(&self) -> SpinLockGuard<'_, T> {
        // A poisoned host mutex means a handler panicked while holding the
        // lock; the state is unrecoverable either way.
        SpinLockGuard {
            guard: self.value.lock().unwrap(),
        }
    }
}

impl<T: Default> Default for SpinLock<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

pub struct SpinLockGuard<'a, T> {
    guard: sync::MutexGuard<'a, T>,
}

impl<T> Deref for SpinLockGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

impl<T> DerefMut for SpinLockGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.guard
    }
}
