//! Generic address-keyed sleep/wake (the KOS `genwait` facility).
//!
//! A thread sleeps on an arbitrary `usize` key — conventionally the address
//! of the flag it is waiting on — and any context, including an interrupt
//! handler, wakes every sleeper on that key. Lost wakeups are prevented the
//! same way as in [`Condvar`](crate::sync::Condvar): [`prepare`] latches the
//! key's wake generation *before* the caller re-checks its predicate and
//! sleeps, so a wake that lands in between still terminates the sleep.

use std::{
    collections::HashMap,
    sync::{self, Arc, OnceLock},
    time::{Duration, Instant},
};

use arrayvec::ArrayString;

use crate::{error::KernelError, interrupt, kernel_dbg, param::GENWAIT_DESC_LEN};

struct WaitQueue {
    generation: sync::Mutex<u64>,
    woken: sync::Condvar,
}

fn queue(key: usize) -> Arc<WaitQueue> {
    static QUEUES: OnceLock<sync::Mutex<HashMap<usize, Arc<WaitQueue>>>> = OnceLock::new();
    let map = QUEUES.get_or_init(|| sync::Mutex::new(HashMap::new()));
    Arc::clone(map.lock().unwrap().entry(key).or_insert_with(|| {
        Arc::new(WaitQueue {
            generation: sync::Mutex::new(0),
            woken: sync::Condvar::new(),
        })
    }))
}

/// Wake-generation token for `key`, to pass to [`wait_prepared`].
#[must_use]
pub fn prepare(key: usize) -> u64 {
    *queue(key).generation.lock().unwrap()
}

/// Sleeps on `key` until its generation moves past `seen` or the timeout
/// expires. `desc` names the wait for diagnostics.
pub fn wait_prepared(
    key: usize,
    seen: u64,
    desc: &str,
    timeout_ms: Option<u64>,
) -> Result<(), KernelError> {
    interrupt::assert_thread_context()?;
    let mut label = ArrayString::<GENWAIT_DESC_LEN>::new();
    let _ = label.try_push_str(desc);
    kernel_dbg!("genwait: sleep on {key:#x} ({label})");

    let q = queue(key);
    let mut generation = q.generation.lock().unwrap();
    match timeout_ms {
        None => {
            while *generation == seen {
                generation = q.woken.wait(generation).unwrap();
            }
        }
        Some(ms) => {
            let deadline = Instant::now() + Duration::from_millis(ms);
            while *generation == seen {
                let now = Instant::now();
                if now >= deadline {
                    return Err(KernelError::TimedOut);
                }
                generation = q.woken.wait_timeout(generation, deadline - now).unwrap().0;
            }
        }
    }
    Ok(())
}

/// One-shot sleep: latch the generation and wait for the next wake.
pub fn wait(key: usize, desc: &str, timeout_ms: Option<u64>) -> Result<(), KernelError> {
    let seen = prepare(key);
    wait_prepared(key, seen, desc, timeout_ms)
}

/// Wakes every sleeper on `key`. Safe from interrupt context.
pub fn wake_all(key: usize) {
    let q = queue(key);
    let mut generation = q.generation.lock().unwrap();
    *generation += 1;
    q.woken.notify_all();
}
