//! Timing measurement using GPIOs, compiled out unless the `measurement`
//! feature is set.
//!
//! This is a debug facility and ignores hardware ownership entirely. If your
//! application uses C8 or C9 for anything else, don't turn the feature on.
//!
//! Signals:
//!
//! - A (C8): high while the line timer ISR runs.
//! - B (C9): high while a scanline transfer is being armed.
//!
//! On the host every function here does nothing.

/// Sets up the measurement pins.
///
/// With the `measurement` feature on target, this powers GPIOC and makes C8
/// and C9 fast push-pull outputs.
///
/// # Safety
///
/// Read-modify-writes RCC and GPIOC without any locking. Call it early in
/// `main`, before anything that could preempt it and touch those registers.
pub unsafe fn init() {
    #[cfg(all(feature = "measurement", target_os = "none"))]
    {
        use stm32f4::stm32f407 as device;
        let rcc = &*device::RCC::ptr();
        let gpioc = &*device::GPIOC::ptr();

        rcc.ahb1enr.modify(|_, w| w.gpiocen().set_bit());

        gpioc
            .pupdr
            .modify(|_, w| w.pupdr8().floating().pupdr9().floating());
        gpioc.ospeedr.modify(|_, w| {
            w.ospeedr8().very_high_speed().ospeedr9().very_high_speed()
        });
        gpioc.moder.modify(|_, w| w.moder8().output().moder9().output());
    }
}

cfg_if::cfg_if! {
    if #[cfg(all(target_os = "none", feature = "measurement"))] {
        use stm32f4::stm32f407 as device;

        fn bsrr(op: impl FnOnce(&mut device::gpioi::bsrr::W)
                    -> &mut device::gpioi::bsrr::W) {
            // Safety: BSRR writes are atomic and only touch the named pins.
            unsafe { &*device::GPIOC::ptr() }.bsrr.write(op);
        }
    }
}

/// Raises signal A.
pub fn sig_a_set() {
    #[cfg(all(target_os = "none", feature = "measurement"))]
    bsrr(|w| w.bs8().set_bit());
}

/// Lowers signal A.
pub fn sig_a_clear() {
    #[cfg(all(target_os = "none", feature = "measurement"))]
    bsrr(|w| w.br8().set_bit());
}

/// Raises signal B.
pub fn sig_b_set() {
    #[cfg(all(target_os = "none", feature = "measurement"))]
    bsrr(|w| w.bs9().set_bit());
}

/// Lowers signal B.
pub fn sig_b_clear() {
    #[cfg(all(target_os = "none", feature = "measurement"))]
    bsrr(|w| w.br9().set_bit());
}
