//! Position within the 625-line interlaced PAL frame.
//!
//! Everything the pulse state machine needs to know about the vertical
//! structure of the frame is answered here, as pure functions of the line
//! number.

use crate::timing::PAL_625;

/// Index of the last line in a frame.
const LAST_LINE: u16 = 624;

/// A scanline number, counted from the first broad pulse of field one.
///
/// Always in the range `0..=624`.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd)]
pub struct Line(u16);

/// One of the two interlaced fields making up a frame.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Field {
    First,
    Second,
}

impl Line {
    pub const FIRST: Line = Line(0);
    pub const LAST: Line = Line(LAST_LINE);

    /// Makes a `Line` from an index, if it's within the frame.
    pub fn new(index: usize) -> Option<Self> {
        if index <= usize::from(LAST_LINE) {
            Some(Line(index as u16))
        } else {
            None
        }
    }

    pub fn index(self) -> usize {
        usize::from(self.0)
    }

    /// The line after this one, wrapping to line 0 after the last line.
    #[must_use = "lines are values; this does not advance in place"]
    pub fn next(self) -> Self {
        if self.0 >= LAST_LINE {
            Line::FIRST
        } else {
            Line(self.0 + 1)
        }
    }

    /// Does this line carry picture (as opposed to sync and equalizing
    /// pulses)?
    pub fn is_visible(self) -> bool {
        match self.0 {
            5..=309 | 317..=622 => true,
            _ => false,
        }
    }

    /// Does the pulse at the start of the line need to be a broad one?
    pub fn sync1_long(self) -> bool {
        match self.0 {
            0..=2 | 313 | 314 => true,
            _ => false,
        }
    }

    /// Does the pulse at the middle of the line need to be a broad one?
    pub fn sync2_long(self) -> bool {
        match self.0 {
            0..=1 | 312..=314 => true,
            _ => false,
        }
    }

    /// Which field this line is attributed to when mapping picture rows.
    pub fn field(self) -> Field {
        if self.index() <= PAL_625.field1_end {
            Field::First
        } else {
            Field::Second
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_lines() -> impl Iterator<Item = Line> {
        (0..PAL_625.lines_per_frame).map(|i| Line::new(i).unwrap())
    }

    #[test]
    fn visible_ranges_exact() {
        for line in all_lines() {
            let i = line.index();
            let expected = (5 <= i && i <= 309) || (317 <= i && i <= 622);
            assert_eq!(line.is_visible(), expected, "line {}", i);
        }
        assert_eq!(all_lines().filter(|l| l.is_visible()).count(), 305 + 306);
    }

    #[test]
    fn visible_lines_never_get_long_pulses() {
        for line in all_lines().filter(|l| l.is_visible()) {
            assert!(!line.sync1_long(), "line {}", line.index());
            assert!(!line.sync2_long(), "line {}", line.index());
        }
    }

    #[test]
    fn long_pulse_lines() {
        let sync1: Vec<usize> = all_lines()
            .filter(|l| l.sync1_long())
            .map(Line::index)
            .collect();
        assert_eq!(sync1, [0, 1, 2, 313, 314]);

        let sync2: Vec<usize> = all_lines()
            .filter(|l| l.sync2_long())
            .map(Line::index)
            .collect();
        assert_eq!(sync2, [0, 1, 312, 313, 314]);
    }

    #[test]
    fn line_zero() {
        let l = Line::FIRST;
        assert!(l.sync1_long());
        assert!(l.sync2_long());
        assert!(!l.is_visible());
    }

    #[test]
    fn line_160() {
        let l = Line::new(160).unwrap();
        assert!(l.is_visible());
        assert!(!l.sync1_long());
        assert!(!l.sync2_long());
        assert_eq!(l.field(), Field::First);
    }

    #[test]
    fn wraps_after_last_line() {
        assert_eq!(Line::LAST.next(), Line::FIRST);
        assert_eq!(Line::new(623).unwrap().next(), Line::LAST);
    }

    #[test]
    fn full_frame_returns_to_start() {
        let mut l = Line::FIRST;
        for _ in 0..PAL_625.lines_per_frame {
            l = l.next();
        }
        assert_eq!(l, Line::FIRST);
    }

    #[test]
    fn out_of_frame_index_rejected() {
        assert!(Line::new(624).is_some());
        assert!(Line::new(625).is_none());
    }

    #[test]
    fn field_split() {
        assert_eq!(Line::new(313).unwrap().field(), Field::First);
        assert_eq!(Line::new(314).unwrap().field(), Field::Second);
        assert_eq!(Line::LAST.field(), Field::Second);
    }
}
