//! Thread-specific data keys (`pthread_key_*`).

use std::{
    cell::RefCell,
    collections::HashMap,
    sync::{Mutex as StdMutex, OnceLock},
};

use crate::errno::{self, EINVAL, Errno};

/// Destructor passes made at thread exit, `PTHREAD_DESTRUCTOR_ITERATIONS`.
pub const DESTRUCTOR_ITERATIONS: usize = 4;

/// Per-slot destructor; receives the thread's non-zero value.
pub type Destructor = fn(usize);

/// A thread-specific data key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Key(usize);

#[derive(Clone, Copy)]
struct Slot {
    live: bool,
    dtor: Option<Destructor>,
}

fn slots() -> &'static StdMutex<Vec<Slot>> {
    static SLOTS: OnceLock<StdMutex<Vec<Slot>>> = OnceLock::new();
    SLOTS.get_or_init(|| StdMutex::new(Vec::new()))
}

thread_local! {
    static VALUES: RefCell<HashMap<Key, usize>> = RefCell::new(HashMap::new());
}

/// Allocates a key, optionally with a destructor run at thread exit.
pub fn key_create(dtor: Option<Destructor>) -> Result<Key, Errno> {
    let _errno = errno::preserve();
    let mut slots = slots().lock().unwrap();
    let slot = Slot { live: true, dtor };
    if let Some(idx) = slots.iter().position(|s| !s.live) {
        slots[idx] = slot;
        return Ok(Key(idx));
    }
    slots.push(slot);
    Ok(Key(slots.len() - 1))
}

/// Frees a key. Values stored under it are dropped without running the
/// destructor, as POSIX specifies.
pub fn key_delete(key: Key) -> Result<(), Errno> {
    let _errno = errno::preserve();
    let mut slots = slots().lock().unwrap();
    match slots.get_mut(key.0) {
        Some(slot) if slot.live => {
            slot.live = false;
            Ok(())
        }
        _ => Err(EINVAL),
    }
}

/// Stores `value` under `key` for the calling thread; zero clears the slot.
pub fn set_specific(key: Key, value: usize) -> Result<(), Errno> {
    let _errno = errno::preserve();
    if !key_is_live(key) {
        return Err(EINVAL);
    }
    VALUES.with_borrow_mut(|values| {
        if value == 0 {
            values.remove(&key);
        } else {
            values.insert(key, value);
        }
    });
    Ok(())
}

/// The calling thread's value for `key`; zero when unset or the key is
/// dead (`pthread_getspecific` cannot fail).
#[must_use]
pub fn get_specific(key: Key) -> usize {
    if !key_is_live(key) {
        return 0;
    }
    VALUES.with_borrow(|values| values.get(&key).copied().unwrap_or(0))
}

fn key_is_live(key: Key) -> bool {
    slots()
        .lock()
        .unwrap()
        .get(key.0)
        .is_some_and(|slot| slot.live)
}

/// Runs destructors for the exiting thread's non-zero values.
///
/// A destructor may store new values; passes repeat until the map is clean
/// or the iteration cap is hit.
pub(crate) fn run_destructors() {
    for _ in 0..DESTRUCTOR_ITERATIONS {
        let pending: Vec<(Key, usize)> =
            VALUES.with_borrow_mut(|values| values.drain().collect());
        if pending.is_empty() {
            return;
        }
        let slots = slots().lock().unwrap().clone();
        for (key, value) in pending {
            let Some(slot) = slots.get(key.0) else {
                continue;
            };
            if !slot.live {
                continue;
            }
            if let Some(dtor) = slot.dtor {
                dtor(value);
            }
        }
    }
}
