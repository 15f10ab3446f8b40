//! Thread identity and voluntary scheduling hooks.
//!
//! The underlying scheduler is out of scope for this core; these are the
//! only pieces of it the synchronization layer consumes.

use std::thread::{self, ThreadId};

/// Identity of the calling kernel thread.
#[must_use]
pub fn current() -> ThreadId {
    thread::current().id()
}

/// Voluntarily gives up the CPU (KOS `thd_pass`).
pub fn pass() {
    thread::yield_now();
}

/// Requests a reschedule. With `immediate` the caller hints that a newly
/// woken thread should run promptly; the hosted scheduler treats both the
/// same.
pub fn schedule(_immediate: bool) {
    thread::yield_now();
}
