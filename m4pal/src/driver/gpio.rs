//! Sync and video outputs on GPIOB.
//!
//! Video is always PB5, SPI1's MOSI, and uses the field accessors. Sync can
//! be any other pin on the port, picked at runtime, so its fields are set by
//! index.

use stm32f4::stm32f407 as device;

use crate::hw::{Level, OutputPins, VideoMode};
use crate::util::stm32::AllWriteExt;

const MODE_OUTPUT: u32 = 0b01;
const SPEED_VERY_HIGH: u32 = 0b11;

/// Sets the `width`-bit field for pin `n` in a register with one such field
/// per pin.
fn field(reg: u32, n: u8, width: u32, value: u32) -> u32 {
    let shift = u32::from(n) * width;
    let mask = ((1 << width) - 1) << shift;
    (reg & !mask) | (value << shift)
}

/// BSRR pattern driving pin `n` to `level`.
fn bsrr_bit(n: u8, level: Level) -> u32 {
    match level {
        Level::High => 1 << n,
        Level::Low => 1 << (n + 16),
    }
}

pub struct SignalPins {
    gpio: device::GPIOB,
    sync: u8,
}

impl SignalPins {
    /// Makes both pins fast push-pull outputs, video with its alternate
    /// function routed to SPI1 but not yet selected.
    pub fn new(gpio: device::GPIOB, sync: u8) -> Self {
        gpio.pupdr.modify(|_, w| w.pupdr5().floating());
        gpio.ospeedr.modify(|_, w| w.ospeedr5().very_high_speed());
        gpio.otyper.modify(|_, w| w.ot5().clear_bit());
        gpio.afrl.modify(|_, w| w.afrl5().af5());

        // Safety: the writes change only the fields belonging to `sync`,
        // and every value written is a valid encoding for its field.
        unsafe {
            gpio.pupdr
                .modify(|r, w| w.bits(field(r.bits(), sync, 2, 0)));
            gpio.ospeedr.modify(|r, w| {
                w.bits(field(r.bits(), sync, 2, SPEED_VERY_HIGH))
            });
            gpio.otyper
                .modify(|r, w| w.bits(field(r.bits(), sync, 1, 0)));
            gpio.moder
                .modify(|r, w| w.bits(field(r.bits(), sync, 2, MODE_OUTPUT)));
        }
        gpio.moder.modify(|_, w| w.moder5().output());

        SignalPins { gpio, sync }
    }

    /// Gives the port back. The pins stay outputs, driven low.
    pub fn free(self) -> device::GPIOB {
        self.gpio
    }
}

impl OutputPins for SignalPins {
    fn set_sync(&mut self, level: Level) {
        let bit = bsrr_bit(self.sync, level);
        self.gpio.bsrr.write(|w| w.bits_ext(bit));
    }

    fn set_video(&mut self, level: Level) {
        match level {
            Level::High => self.gpio.bsrr.write(|w| w.bs5().set_bit()),
            Level::Low => self.gpio.bsrr.write(|w| w.br5().set_bit()),
        }
    }

    fn set_video_mode(&mut self, mode: VideoMode) {
        match mode {
            VideoMode::Logic => {
                self.gpio.moder.modify(|_, w| w.moder5().output())
            }
            VideoMode::Shift => {
                self.gpio.moder.modify(|_, w| w.moder5().alternate())
            }
        }
    }
}
