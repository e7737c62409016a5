use core::fmt;

/// Reasons configuration can fail.
///
/// Once a session is running there is nothing left to go wrong that the driver
/// could report: a missed deadline just shows up as a torn picture.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Error {
    /// Zero width or height, or a row too long for one DMA transfer.
    BadGeometry,
    /// The line timer is taken, or runs at a rate that can't express a PAL
    /// line in its 16-bit reload register.
    TimerUnavailable,
    /// The serial shifter can't clock pixels out fast enough to fit a row into
    /// the active part of a line.
    ShiftClockTooSlow,
    /// The framebuffer provider had nothing to give.
    FramebufferUnavailable,
    /// The requested pins can't do the job: the video pin has no serial output
    /// function, or both signals were put on the same pin.
    PinUnsupported,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Error::BadGeometry => "framebuffer geometry not supported",
            Error::TimerUnavailable => "line timer unavailable",
            Error::ShiftClockTooSlow => "shift clock too slow for width",
            Error::FramebufferUnavailable => "no framebuffer available",
            Error::PinUnsupported => "pin cannot serve this signal",
        };
        f.write_str(s)
    }
}
