//! Interrupt-context discipline.
//!
//! Interrupt handlers run to completion and must never block. On real
//! hardware this is enforced by the CPU mode; on the hosted port the
//! dispatcher that delivers device events marks the current thread as being
//! "inside an interrupt" for the duration of the handler, and every blocking
//! primitive checks [`inside`] and fails fast with
//! [`KernelError::InterruptContext`] instead of deadlocking.

use std::cell::Cell;

use crate::error::KernelError;

thread_local! {
    static IN_IRQ: Cell<u32> = const { Cell::new(0) };
}

/// Returns `true` if the calling thread is currently executing an interrupt
/// handler.
#[must_use]
pub fn inside() -> bool {
    IN_IRQ.with(|c| c.get() != 0)
}

/// Fails with [`KernelError::InterruptContext`] if called from an interrupt
/// handler. Used as the entry check of every suspending primitive.
pub fn assert_thread_context() -> Result<(), KernelError> {
    if inside() {
        return Err(KernelError::InterruptContext);
    }
    Ok(())
}

/// Marks the calling thread as running in interrupt context until the
/// returned guard is dropped. Nesting is allowed (an interrupt handler may
/// dispatch a nested event).
#[must_use]
pub fn enter() -> IrqScope {
    IN_IRQ.with(|c| c.set(c.get() + 1));
    IrqScope { _priv: () }
}

/// Scope token produced by [`enter`].
pub struct IrqScope {
    _priv: (),
}

impl Drop for IrqScope {
    fn drop(&mut self) {
        IN_IRQ.with(|c| c.set(c.get() - 1));
    }
}

/// Previous interrupt-enable state, as returned by [`disable`].
///
/// The hosted port has no global interrupt-enable bit to mask; the token
/// pair exists so the algorithms keep the same shape as on hardware.
#[derive(Debug, Clone, Copy)]
pub struct IrqState(());

/// Disables interrupts, returning the previous state.
#[must_use]
pub fn disable() -> IrqState {
    IrqState(())
}

/// Restores the interrupt-enable state returned by a prior [`disable`].
pub fn restore(_state: IrqState) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_nests() {
        assert!(!inside());
        {
            let _outer = enter();
            assert!(inside());
            {
                let _inner = enter();
                assert!(inside());
            }
            assert!(inside());
        }
        assert!(!inside());
    }

    #[test]
    fn thread_context_check() {
        assert!(assert_thread_context().is_ok());
        let _scope = enter();
        assert_eq!(
            assert_thread_context(),
            Err(KernelError::InterruptContext)
        );
    }
}
