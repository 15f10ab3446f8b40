use crate::cdrom::CdStatus;

/// Errors returned by the kernel primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum KernelError {
    /// A handle, count, or argument was invalid, or the object was
    /// destroyed.
    #[error("invalid argument")]
    InvalidArgument,
    /// The object is in use and cannot service the request right now.
    #[error("resource busy")]
    Busy,
    /// A deadline-based wait expired.
    #[error("timed out")]
    TimedOut,
    /// The calling thread already owns the lock.
    #[error("deadlock detected")]
    Deadlock,
    /// The calling thread does not own the lock it tried to release.
    #[error("not the lock owner")]
    NotOwner,
    /// A blocking operation was attempted from interrupt context.
    #[error("would block in interrupt context")]
    InterruptContext,
    /// The requested feature is not implemented.
    #[error("not supported")]
    Unsupported,
    /// The operation requires state the caller has not set up.
    #[error("invalid state")]
    InvalidState,
    /// A GD-ROM command failed with a drive status code.
    #[error("cdrom error: {0}")]
    Cdrom(CdStatus),
}
