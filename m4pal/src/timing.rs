//! Definition of PAL line and frame timing.
//!
//! Horizontal timing is expressed in [`Span`]s, 64ths of a 64 µs line, which
//! conveniently makes one span equal to one microsecond. Spans get converted
//! to timer ticks once the line timer's running frequency is known; see
//! [`ticks_per_line`].
//!
//! [`Span`]: struct.Span.html
//! [`ticks_per_line`]: fn.ticks_per_line.html

/// Length of time measured in 64ths of a PAL line.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub struct Span(pub u8);

impl Span {
    /// A whole line.
    pub const LINE: Span = Span(64);
    /// Half a line. The sync pulse pairs on blanking lines repeat at this
    /// interval.
    pub const HALF_LINE: Span = Span(32);
    /// Normal (horizontal sync / equalizing) pulse.
    pub const SHORT_PULSE_ON: Span = Span(5);
    /// Broad (vertical sync) pulse.
    pub const LONG_PULSE_ON: Span = Span(27);
    /// Remainder of a half line after a short pulse.
    pub const SHORT_PULSE_OFF: Span = Span(Span::HALF_LINE.0 - 5);
    /// Remainder of a half line after a long pulse.
    pub const LONG_PULSE_OFF: Span = Span(Span::HALF_LINE.0 - 27);
    /// Quiet interval between the end of sync and the start of picture.
    pub const FRONT_PORCH: Span = Span(8);
    /// Quiet interval between the end of picture and the next sync.
    pub const BACK_PORCH: Span = Span(7);
    /// Whatever is left of a visible line once sync and both porches are
    /// accounted for.
    pub const ACTIVE: Span = Span(64 - (5 + 8 + 7));

    /// Converts this span into timer ticks, given the number of ticks in one
    /// full line.
    pub fn ticks(self, ticks_per_line: u16) -> u16 {
        // Cannot overflow: ticks_per_line * 64 / 64 fits in u16 and spans never
        // exceed a line.
        (u32::from(ticks_per_line) * u32::from(self.0) / 64) as u16
    }
}

/// Describes the line and field structure of an interlaced television
/// standard, numbered from the first broad pulse of field one.
#[derive(Clone, Debug)]
pub struct Standard {
    /// Line frequency in Hz.
    pub line_hz: u32,
    /// Total lines per frame, both fields.
    pub lines_per_frame: usize,
    /// First line of picture in field one.
    pub field1_start: usize,
    /// Last line belonging to field one when mapping picture rows.
    pub field1_end: usize,
    /// First line of picture in field two.
    pub field2_start: usize,
    /// Extra lines at the top of each field that are left blank, on top of
    /// those the sync pattern already needs.
    pub vblank_lines: usize,
    /// Number of lines per field onto which the framebuffer is stretched.
    pub picture_lines: usize,
    /// Length of the active picture in microseconds; sets the minimum shift
    /// clock.
    pub active_us: u32,
}

/// 625-line, 25 frame/s PAL.
pub static PAL_625: Standard = Standard {
    line_hz: 15_625,
    lines_per_frame: 625,
    field1_start: 5,
    field1_end: 313,
    field2_start: 317,
    vblank_lines: 25,
    picture_lines: 270,
    active_us: 52,
};

/// Computes the number of timer ticks in one PAL line for a timer running at
/// `timer_hz`.
///
/// Returns `None` if the timer is too slow to count a line at all, or too fast
/// for a 16-bit reload register to hold one.
pub fn ticks_per_line(timer_hz: u32) -> Option<u16> {
    let ticks = timer_hz / PAL_625.line_hz;
    if ticks == 0 || ticks > u32::from(u16::MAX) {
        None
    } else {
        Some(ticks as u16)
    }
}

/// A power-of-two clock divisor for the serial shifter, as used by the STM32
/// SPI `BR` field (`divisor = 2 << br`).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Prescaler {
    br: u8,
}

impl Prescaler {
    /// Largest `BR` encoding the hardware has.
    const MAX_BR: u8 = 0b111;

    /// Divide by two, as fast as the shifter goes.
    pub const FASTEST: Prescaler = Prescaler { br: 0 };

    /// Picks the *slowest* divisor of `bus_hz` that still shifts at least
    /// `min_hz` bits per second. Going slower than necessary stretches the
    /// picture across more of the line; going faster than necessary shrinks
    /// it, so we stay as close above the minimum as the divisor steps allow.
    ///
    /// Returns `None` if even the fastest divisor cannot keep up.
    pub fn for_rate(bus_hz: u32, min_hz: u32) -> Option<Self> {
        (0..=Self::MAX_BR)
            .rev()
            .map(|br| Prescaler { br })
            .find(|p| p.rate(bus_hz) >= min_hz)
    }

    /// The raw `BR` field value.
    pub fn bits(self) -> u8 {
        self.br
    }

    pub fn divisor(self) -> u32 {
        2 << self.br
    }

    /// Resulting shift rate in bits per second.
    pub fn rate(self, bus_hz: u32) -> u32 {
        bus_hz / self.divisor()
    }
}
