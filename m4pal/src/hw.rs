//! Interfaces to the hardware the session drives.
//!
//! The session is written against these traits rather than against particular
//! registers, so that the whole interrupt path can run on the host against
//! recording fakes. The STM32F407 implementations live in the driver.
//!
//! All methods on the per-expiry path (`LineTimer::set_period`,
//! `OutputPins::*`, `Shifter::arm`, ...) are expected to be a handful of
//! register writes. None of them may block.

use crate::fb::{BitOrder, FrameBuffer, Geometry};

/// Logic level of an output pin.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Level {
    Low,
    High,
}

/// What is driving the video pin.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum VideoMode {
    /// Plain output holding whatever level was last set.
    Logic,
    /// Alternate function: the serial shifter drives the pin.
    Shift,
}

/// The two outputs making up the composite signal.
pub trait OutputPins {
    fn set_sync(&mut self, level: Level);
    fn set_video(&mut self, level: Level);
    fn set_video_mode(&mut self, mode: VideoMode);
}

/// A free-running timer with a rewritable period, raising an interrupt at
/// each expiry.
pub trait LineTimer {
    /// Rate at which the counter counts, in Hz.
    fn tick_hz(&self) -> u32;
    /// Sets the period that applies from the next expiry onward.
    fn set_period(&mut self, ticks: u16);
    /// Clears the pending expiry condition.
    fn acknowledge(&mut self);
    /// Prevents the expiry interrupt from preempting whatever runs next.
    fn mask(&mut self);
    /// Undoes `mask`.
    fn unmask(&mut self);
    /// Programs an initial period and starts counting, with the expiry
    /// interrupt enabled at the timer.
    fn start(&mut self, ticks: u16);
    /// Stops counting and disables the expiry interrupt at the timer.
    fn stop(&mut self);
}

/// Source of line timers.
pub trait TimerPool {
    type Timer: LineTimer;

    /// Reserves a timer able to run at `rate_hz` expiries per second, if one
    /// is free. Must not touch the hardware.
    fn reserve(&mut self, rate_hz: u32) -> Option<Self::Timer>;
    /// Returns a timer reserved earlier.
    fn release(&mut self, timer: Self::Timer);
}

/// Serial shifter fed by one-shot DMA.
pub trait Shifter {
    /// Fastest bit rate the shifter can produce.
    fn max_bit_hz(&self) -> u32;
    /// Sets the shifter up to emit at least `min_bit_hz` in `order`. Called
    /// once, after `max_bit_hz` has been checked.
    fn configure(&mut self, min_bit_hz: u32, order: BitOrder);
    /// Starts a one-shot transfer of `len` bytes from `source`, replacing any
    /// transfer still in flight.
    fn arm(&mut self, source: *const u8, len: u16);
    /// Stops shifting and any transfer.
    fn shutdown(&mut self);
}

/// Hands out pixel memory.
pub trait FramebufferProvider {
    fn allocate(
        &mut self,
        geometry: Geometry,
        order: BitOrder,
    ) -> Option<FrameBuffer>;

    /// Takes back a buffer. The default does nothing, for providers that never
    /// reuse memory.
    fn release(&mut self, fb: FrameBuffer) {
        let _ = fb;
    }
}
