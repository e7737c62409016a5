//! The horizontal (pulse) state machine.
//!
//! Each scanline is cut into phases, and each phase ends with a timer expiry.
//! On each expiry we decide how long the *next* phase lasts and which levels
//! to drive. There are two shapes of line:
//!
//! ```text
//! visible:   Sync1Start -> Sync1End -> VidStart -> VidBackporch -> (next line)
//! blanking:  Sync1Start -> Sync1End -> Sync2Start -> Sync2End   -> (next line)
//! ```
//!
//! The decision is made by [`transition`], a pure function, so it can be
//! tested exhaustively without any hardware. [`HState`] wraps it with the line
//! counter.
//!
//! [`transition`]: fn.transition.html
//! [`HState`]: struct.HState.html

use crate::hw::Level;
use crate::line::Line;
use crate::timing::{Span, PAL_625};

/// Point reached within the current scanline.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Phase {
    /// Leading edge of the line's first sync pulse.
    Sync1Start,
    /// End of the first sync pulse.
    Sync1End,
    /// Start of picture; scanout begins here.
    VidStart,
    /// End of picture.
    VidBackporch,
    /// Leading edge of the mid-line pulse on blanking lines.
    Sync2Start,
    /// End of the mid-line pulse.
    Sync2End,
}

impl Default for Phase {
    fn default() -> Self {
        Phase::Sync1Start
    }
}

/// Something to do with the video pin during a transition.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum VideoAction {
    /// Shift out the picture row belonging to this line, if it has one.
    Scanout(Line),
    /// Take the pin back from the shifter so it idles at its resting level.
    Release,
}

/// Everything one timer expiry has to do to the hardware.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[must_use = "a step does nothing until applied to the hardware"]
pub struct Step {
    /// Duration until the next expiry.
    pub period: Span,
    /// New sync level, if it changes.
    pub sync: Option<Level>,
    /// Video pin work, if any.
    pub video: Option<VideoAction>,
}

/// Computes the phase following `phase` on `line`, and what to do on the way
/// there.
pub fn transition(phase: Phase, line: Line) -> (Phase, Step) {
    match phase {
        Phase::Sync1Start => {
            let period = if line.is_visible() || !line.sync1_long() {
                Span::SHORT_PULSE_ON
            } else {
                Span::LONG_PULSE_ON
            };
            (Phase::Sync1End, sync_step(period, Level::Low))
        }
        Phase::Sync1End => {
            if line.is_visible() {
                (
                    Phase::VidStart,
                    sync_step(Span::FRONT_PORCH, Level::High),
                )
            } else {
                (
                    Phase::Sync2Start,
                    sync_step(pulse_off(line.sync1_long()), Level::High),
                )
            }
        }
        Phase::VidStart => {
            let video = if line.index() > PAL_625.vblank_lines {
                Some(VideoAction::Scanout(line))
            } else {
                None
            };
            (
                Phase::VidBackporch,
                Step {
                    period: Span::ACTIVE,
                    sync: None,
                    video,
                },
            )
        }
        Phase::VidBackporch => (
            Phase::Sync1Start,
            Step {
                period: Span::BACK_PORCH,
                sync: None,
                video: Some(VideoAction::Release),
            },
        ),
        Phase::Sync2Start => {
            let period = if line.sync2_long() {
                Span::LONG_PULSE_ON
            } else {
                Span::SHORT_PULSE_ON
            };
            (Phase::Sync2End, sync_step(period, Level::Low))
        }
        // The closing gap is sized by the *first* pulse's class, not the
        // second's. Lines 2 and 312 come out off-length as a result.
        Phase::Sync2End => (
            Phase::Sync1Start,
            sync_step(pulse_off(line.sync1_long()), Level::High),
        ),
    }
}

fn sync_step(period: Span, level: Level) -> Step {
    Step {
        period,
        sync: Some(level),
        video: None,
    }
}

fn pulse_off(long: bool) -> Span {
    if long {
        Span::LONG_PULSE_OFF
    } else {
        Span::SHORT_PULSE_OFF
    }
}

/// Current position of the beam: which line, and which phase within it.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct HState {
    line: Line,
    phase: Phase,
}

impl HState {
    /// Starts at the top of field one, at the first sync pulse.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn line(&self) -> Line {
        self.line
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Handles one timer expiry: moves to the next phase, advancing the line
    /// when a line completes, and returns what the hardware should do.
    pub fn advance(&mut self) -> Step {
        let (next, step) = transition(self.phase, self.line);
        self.phase = next;
        if next == Phase::Sync1Start {
            self.line = self.line.next();
        }
        step
    }
}
