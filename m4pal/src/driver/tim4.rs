//! TIM4 as the line timer.

use stm32f4::stm32f407 as device;

use crate::hw::{LineTimer, TimerPool};
use crate::util::armv7m::{mask_irq, unmask_irq};
use crate::util::stm32::AllWriteExt;

/// TIM4, counting at its kernel clock, raising an update interrupt on every
/// expiry.
pub struct LineTim4 {
    tim: device::TIM4,
    tick_hz: u32,
}

impl LineTim4 {
    fn set_arr(&mut self, ticks: u16) {
        // The counter runs 0..=ARR.
        let arr = u32::from(ticks.max(1) - 1);
        self.tim.arr.write(|w| w.arr().bits(arr));
    }
}

impl LineTimer for LineTim4 {
    fn tick_hz(&self) -> u32 {
        self.tick_hz
    }

    fn set_period(&mut self, ticks: u16) {
        // No ARR preload: this takes effect for the count already under way,
        // which started at the expiry we're handling.
        self.set_arr(ticks);
    }

    fn acknowledge(&mut self) {
        self.tim.sr.modify(|_, w| w.uif().clear_bit());
    }

    fn mask(&mut self) {
        mask_irq(device::Interrupt::TIM4);
    }

    fn unmask(&mut self) {
        unmask_irq(device::Interrupt::TIM4);
    }

    fn start(&mut self, ticks: u16) {
        self.tim.cr1.write(|w| w.urs().counter_only());
        // Divide by 1.
        self.tim.psc.write(|w| w.psc().bits_ext(0));
        self.set_arr(ticks);
        self.tim.cnt.reset();
        // Load the prescaler. URS keeps this from looking like an expiry.
        self.tim.egr.write(|w| w.ug().set_bit());
        self.tim.sr.reset();
        self.tim.dier.write(|w| w.uie().set_bit());
        self.tim.cr1.write(|w| w.urs().counter_only().cen().set_bit());
    }

    fn stop(&mut self) {
        self.tim.cr1.write(|w| w.cen().clear_bit());
        self.tim.dier.reset();
        self.tim.sr.reset();
    }
}

/// Holds TIM4 while nobody is using it.
pub struct TimerSlot {
    tim: Option<device::TIM4>,
    tick_hz: u32,
}

impl TimerSlot {
    pub fn new(tim: device::TIM4) -> Self {
        TimerSlot {
            tim: Some(tim),
            tick_hz: 0,
        }
    }

    /// Records the kernel clock the timer will run at once reserved.
    pub fn set_tick_hz(&mut self, hz: u32) {
        self.tick_hz = hz;
    }
}

impl TimerPool for TimerSlot {
    type Timer = LineTim4;

    fn reserve(&mut self, _rate_hz: u32) -> Option<LineTim4> {
        let tick_hz = self.tick_hz;
        self.tim.take().map(|tim| LineTim4 { tim, tick_hz })
    }

    fn release(&mut self, timer: LineTim4) {
        self.tim = Some(timer.tim);
    }
}
