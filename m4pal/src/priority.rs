//! Type-level proof of execution priority.
//!
//! Configuring the driver has to happen outside any interrupt handler: the
//! line timer ISR must not be able to observe half-built state. Operations that
//! need that guarantee take a `Thread` token, which can only be obtained while
//! actually running in thread mode.

use core::marker::PhantomData;

/// Zero-sized proof that the holder runs in thread mode. Neither `Send` nor
/// `Sync`, so it can't be smuggled into an interrupt handler.
#[derive(Copy, Clone, Debug)]
pub struct Thread(PhantomData<*mut ()>);

impl Thread {
    /// Produces a token without checking.
    ///
    /// # Safety
    ///
    /// The caller must be running in thread mode.
    pub unsafe fn new_unchecked() -> Self {
        Thread(PhantomData)
    }
}

#[cfg(target_os = "none")]
impl Thread {
    /// Returns a `Thread` token only if called from thread mode.
    pub fn new_checked() -> Option<Self> {
        // VECTACTIVE in the ICSR is zero only in thread mode. Reading the ICSR
        // has no side effects.
        let icsr = unsafe { &(*cortex_m::peripheral::SCB::ptr()).icsr }.read();
        if icsr & 0x1FF == 0 {
            Some(unsafe { Self::new_unchecked() })
        } else {
            None
        }
    }
}
