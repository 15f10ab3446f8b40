//! POSIX error codes and the thread-local `errno` cell.

use std::cell::Cell;

use okos_kernel::KernelError;

/// A POSIX error number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("{}", self.name())]
pub struct Errno(pub i32);

pub const EPERM: Errno = Errno(1);
pub const EAGAIN: Errno = Errno(11);
pub const EFAULT: Errno = Errno(14);
pub const EBUSY: Errno = Errno(16);
pub const EINVAL: Errno = Errno(22);
pub const EDEADLK: Errno = Errno(35);
pub const ENOSYS: Errno = Errno(38);
pub const ETIMEDOUT: Errno = Errno(110);

impl Errno {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            EPERM => "EPERM",
            EAGAIN => "EAGAIN",
            EFAULT => "EFAULT",
            EBUSY => "EBUSY",
            EINVAL => "EINVAL",
            EDEADLK => "EDEADLK",
            ENOSYS => "ENOSYS",
            ETIMEDOUT => "ETIMEDOUT",
            Errno(_) => "unknown errno",
        }
    }
}

impl From<KernelError> for Errno {
    fn from(err: KernelError) -> Self {
        match err {
            KernelError::InvalidArgument | KernelError::InvalidState => EINVAL,
            KernelError::Busy => EBUSY,
            KernelError::TimedOut => ETIMEDOUT,
            KernelError::Deadlock => EDEADLK,
            KernelError::NotOwner | KernelError::InterruptContext => EPERM,
            KernelError::Unsupported => ENOSYS,
            KernelError::Cdrom(_) => EFAULT,
        }
    }
}

thread_local! {
    static ERRNO: Cell<i32> = const { Cell::new(0) };
}

/// Reads the calling thread's `errno`.
#[must_use]
pub fn get() -> i32 {
    ERRNO.with(Cell::get)
}

/// Sets the calling thread's `errno`.
pub fn set(value: i32) {
    ERRNO.with(|e| e.set(value));
}

/// Guard that restores the caller's `errno` when dropped.
///
/// Every shim entry point takes one first thing, so whatever the layered
/// native calls do to `errno` is invisible to the application on every
/// return path.
pub(crate) struct Preserved {
    saved: i32,
}

impl Drop for Preserved {
    fn drop(&mut self) {
        set(self.saved);
    }
}

pub(crate) fn preserve() -> Preserved {
    Preserved { saved: get() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preserve_restores_on_drop() {
        set(7);
        {
            let _guard = preserve();
            set(99);
        }
        assert_eq!(get(), 7);
        set(0);
    }

    #[test]
    fn kernel_errors_map_to_posix_codes() {
        assert_eq!(Errno::from(KernelError::Busy), EBUSY);
        assert_eq!(Errno::from(KernelError::Deadlock), EDEADLK);
        assert_eq!(Errno::from(KernelError::TimedOut), ETIMEDOUT);
        assert_eq!(Errno::from(KernelError::NotOwner), EPERM);
    }
}
