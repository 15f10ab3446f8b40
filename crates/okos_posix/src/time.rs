//! Absolute deadlines for the `timed*` entry points.

use okos_kernel::time::{ClockId, now_ms};

use crate::errno::{EINVAL, Errno};

const NANOS_PER_SEC: i64 = 1_000_000_000;
const NANOS_PER_MILLI: i64 = 1_000_000;

/// An absolute point in time on some clock, POSIX `struct timespec`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSpec {
    pub sec: i64,
    pub nsec: i64,
}

impl TimeSpec {
    /// The current time on `clock`.
    #[must_use]
    pub fn now(clock: ClockId) -> Self {
        Self::from_ms(now_ms(clock))
    }

    /// A deadline `ms` milliseconds from now on `clock`.
    #[must_use]
    pub fn after_ms(clock: ClockId, ms: u64) -> Self {
        Self::from_ms(now_ms(clock) + ms)
    }

    fn from_ms(ms: u64) -> Self {
        let ms = i64::try_from(ms).unwrap_or(i64::MAX);
        Self {
            sec: ms / 1000,
            nsec: (ms % 1000) * NANOS_PER_MILLI,
        }
    }

    /// Milliseconds remaining until this deadline on `clock`, computed once.
    ///
    /// `None` means the deadline has already passed. A malformed timespec is
    /// `EINVAL`.
    pub(crate) fn delta_ms(&self, clock: ClockId) -> Result<Option<u64>, Errno> {
        if self.sec < 0 || !(0..NANOS_PER_SEC).contains(&self.nsec) {
            return Err(EINVAL);
        }
        let target = self.sec as u64 * 1000 + (self.nsec / NANOS_PER_MILLI) as u64;
        let now = now_ms(clock);
        if target <= now {
            return Ok(None);
        }
        Ok(Some(target - now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_nsec_is_rejected() {
        let ts = TimeSpec { sec: 1, nsec: NANOS_PER_SEC };
        assert_eq!(ts.delta_ms(ClockId::Monotonic), Err(EINVAL));
        let ts = TimeSpec { sec: 1, nsec: -1 };
        assert_eq!(ts.delta_ms(ClockId::Monotonic), Err(EINVAL));
    }

    #[test]
    fn past_deadline_yields_none() {
        let ts = TimeSpec { sec: 0, nsec: 0 };
        assert_eq!(ts.delta_ms(ClockId::Monotonic), Ok(None));
    }

    #[test]
    fn future_deadline_yields_delta() {
        let ts = TimeSpec::after_ms(ClockId::Monotonic, 5000);
        let delta = ts.delta_ms(ClockId::Monotonic).unwrap().unwrap();
        assert!(delta > 4000 && delta <= 5000);
    }
}
