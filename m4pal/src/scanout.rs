//! Mapping scanlines onto framebuffer rows.
//!
//! Each field shows the same picture, stretched (or squashed) onto
//! `PAL_625.picture_lines` lines by nearest-neighbor row selection. Lines
//! before that range, after it, or in the blanking allowance at the top of a
//! field have no row and stay blank.

use crate::fb::Geometry;
use crate::line::{Field, Line};
use crate::timing::PAL_625;

/// Position of `line` within the picture area of its field, if it is in one.
pub fn line_in_field(line: Line) -> Option<usize> {
    let i = line.index();
    if i <= PAL_625.vblank_lines {
        return None;
    }
    let first = match line.field() {
        Field::First => PAL_625.field1_start,
        Field::Second => PAL_625.field2_start,
    } + PAL_625.vblank_lines;

    i.checked_sub(first).filter(|&n| n < PAL_625.picture_lines)
}

/// Framebuffer row shown on picture line `line_in_field` of a field, for a
/// framebuffer `height` rows tall.
pub fn map_row(line_in_field: usize, height: usize) -> usize {
    // n * h / P, split as n * (h / P) + n * (h % P) / P so that no
    // intermediate exceeds h for any n below P.
    let lines = PAL_625.picture_lines;
    let n = line_in_field.min(lines - 1);
    n * (height / lines) + n * (height % lines) / lines
}

/// Framebuffer row to scan out on `line`, if any.
pub fn row_for_line(line: Line, geometry: &Geometry) -> Option<usize> {
    line_in_field(line).map(|n| map_row(n, geometry.height()))
}

/// A one-shot transfer of one row to the shifter.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Transfer {
    /// Byte offset of the row within the framebuffer.
    pub offset: usize,
    /// Bytes to send.
    pub len: u16,
}

/// Works out the transfer for `line`, if it shows a row.
pub fn transfer_for(line: Line, geometry: &Geometry) -> Option<Transfer> {
    row_for_line(line, geometry).map(|row| Transfer {
        offset: row * geometry.stride(),
        // Geometry guarantees the stride fits.
        len: geometry.stride() as u16,
    })
}
