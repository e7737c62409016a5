//! PAL composite video from an STM32F4, one bit per pixel.
//!
//! Two pins and a resistor network make the signal: one pin carries sync, the
//! other carries picture data shifted out of SPI by DMA. A timer interrupt
//! walks a small state machine through each scanline, changing the timer's
//! period as it goes, toggling sync, and kicking off one DMA transfer per
//! visible line.
//!
//! Everything except the STM32 driver itself is plain `no_std` code written
//! against the traits in [`hw`], and is tested on the host.
//!
//! [`hw`]: hw/index.html

#![cfg_attr(not(test), no_std)]

pub mod error;
pub mod fb;
pub mod hstate;
pub mod hw;
pub mod line;
pub mod pin;
pub mod priority;
pub mod scanout;
pub mod session;
pub mod timing;
pub mod util;

pub use crate::error::Error;
pub use crate::fb::{BitOrder, FrameBuffer, Geometry, StaticBuffer};
pub use crate::session::Config;

cfg_if::cfg_if! {
    if #[cfg(target_os = "none")] {
        // re-export driver bits
        mod driver;
        pub use driver::*;
    }
}
