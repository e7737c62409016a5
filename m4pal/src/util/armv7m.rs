//! ARMv7-M interrupt control with stronger guarantees than `cortex_m`.
//!
//! `cortex_m`'s NVIC operations don't include barriers, so an interrupt can
//! still fire for a few instructions after it's been "disabled". Everything
//! here is followed by `dmb; isb`, after the ARM *Cortex-M Programming Guide
//! to Memory Barrier Instructions*. When one of these returns, the change has
//! taken effect.
//!
//! `mask_irq` and `unmask_irq` do the same job as `disable_irq` and
//! `enable_irq` but go straight to the NVIC registers, so an ISR can use them
//! on its own interrupt without owning the `NVIC` peripheral.

use cortex_m::interrupt::Nr;
use cortex_m::peripheral::NVIC;

fn barrier() {
    cortex_m::asm::dmb();
    cortex_m::asm::isb();
}

/// Enables `i`. If it's pending, it will have had its chance to run (priority
/// permitting) by the time this returns.
pub fn enable_irq(nvic: &mut NVIC, i: impl Nr) {
    nvic.enable(i);
    barrier();
}

/// Disables `i`. Nothing after this call can be preempted by it.
pub fn disable_irq(nvic: &mut NVIC, i: impl Nr) {
    nvic.disable(i);
    barrier();
}

/// Ensures `i` isn't pending. It may pend again right away if the hardware
/// keeps asking.
pub fn clear_pending_irq(i: impl Nr) {
    NVIC::unpend(i);
    barrier();
}

/// Word index and bit for `i` in the NVIC's banked set/clear registers.
fn bank(i: &impl Nr) -> (usize, u32) {
    let n = i.nr();
    (usize::from(n / 32), 1 << (n % 32))
}

/// Like `disable_irq`, without needing the `NVIC`.
pub fn mask_irq(i: impl Nr) {
    let (word, bit) = bank(&i);
    // Safety: ICER writes only affect the interrupts whose bits are set.
    unsafe { (*NVIC::ptr()).icer[word].write(bit) }
    barrier();
}

/// Like `enable_irq`, without needing the `NVIC`.
pub fn unmask_irq(i: impl Nr) {
    let (word, bit) = bank(&i);
    // Safety: ISER writes only affect the interrupts whose bits are set. Only
    // used to re-enable an interrupt its owner had enabled.
    unsafe { (*NVIC::ptr()).iser[word].write(bit) }
    barrier();
}
