//! Naming GPIO pins, and checking a pair of them can carry the signal.
//!
//! The video pin has to be one the serial shifter can drive directly; on the
//! STM32F407 driver that's SPI1 MOSI on PB5. Sync is plain output and can go
//! on any other pin of the same port.

use crate::Error;

/// GPIO port.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Port {
    A,
    B,
    C,
    D,
    E,
}

/// One pin of one port.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Pin {
    port: Port,
    index: u8,
}

impl Pin {
    /// Names pin `index` of `port`. There are 16 to a port.
    pub fn new(port: Port, index: u8) -> Option<Self> {
        if index < 16 {
            Some(Pin { port, index })
        } else {
            None
        }
    }

    pub fn port(self) -> Port {
        self.port
    }

    pub fn index(self) -> u8 {
        self.index
    }
}

/// The pin wired to the shifter's serial output.
pub const SHIFT_OUT: Pin = Pin {
    port: Port::B,
    index: 5,
};

/// Port every signal pin has to be on.
pub const SIGNAL_PORT: Port = Port::B;

/// Checks that `video` and `sync` can be used together.
pub fn check(video: Pin, sync: Pin) -> Result<(), Error> {
    if video != SHIFT_OUT || sync.port != SIGNAL_PORT || sync == video {
        Err(Error::PinUnsupported)
    } else {
        Ok(())
    }
}
