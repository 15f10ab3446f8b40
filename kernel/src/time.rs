//! Clock sources for deadline-based waits.

use std::{
    sync::OnceLock,
    time::{Instant, SystemTime, UNIX_EPOCH},
};

/// Clock against which an absolute deadline is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClockId {
    /// Monotonic since an arbitrary epoch; immune to wall-clock steps.
    #[default]
    Monotonic,
    /// Wall-clock time since the Unix epoch.
    Realtime,
}

fn monotonic_base() -> Instant {
    static BASE: OnceLock<Instant> = OnceLock::new();
    *BASE.get_or_init(Instant::now)
}

/// Current time in milliseconds on the given clock.
#[must_use]
pub fn now_ms(clock: ClockId) -> u64 {
    match clock {
        ClockId::Monotonic => monotonic_base().elapsed().as_millis() as u64,
        ClockId::Realtime => SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64,
    }
}
