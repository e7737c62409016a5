//! Bilevel framebuffer: geometry, bit order, and the raw view the driver
//! scans out from.
//!
//! The framebuffer holds one bit per pixel, rows packed back to back with a
//! stride of `width / 8` bytes and no padding. Within each byte, the pixel
//! order follows the shifter's [`BitOrder`]: the first bit shifted out is the
//! leftmost pixel.
//!
//! The driver never owns this memory. It's handed a [`FrameBuffer`] by a
//! [`FramebufferProvider`] and only ever turns it into addresses for the DMA
//! controller.
//!
//! [`BitOrder`]: enum.BitOrder.html
//! [`FrameBuffer`]: struct.FrameBuffer.html
//! [`FramebufferProvider`]: ../hw/trait.FramebufferProvider.html

use core::ptr::NonNull;

use smart_default::SmartDefault;

use crate::timing::PAL_625;
use crate::Error;

/// Order in which the shifter emits the bits of each byte.
#[derive(Copy, Clone, Debug, Eq, PartialEq, SmartDefault)]
pub enum BitOrder {
    /// Least significant bit is the leftmost pixel.
    #[default]
    LsbFirst,
    /// Most significant bit is the leftmost pixel.
    MsbFirst,
}

impl BitOrder {
    /// Mask selecting pixel `x` within its byte.
    pub fn mask(self, x: usize) -> u8 {
        let bit = x % 8;
        match self {
            BitOrder::LsbFirst => 1 << bit,
            BitOrder::MsbFirst => 0x80 >> bit,
        }
    }
}

/// Dimensions of a framebuffer, with the width rounded up to whole bytes.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Geometry {
    width: usize,
    height: usize,
}

impl Geometry {
    /// Builds a geometry for a `width` x `height` picture. `width` is rounded
    /// up to the next multiple of 8, because the shifter works in bytes.
    ///
    /// Fails if either dimension is zero, if one row would be too long for a
    /// single DMA transfer, or if the buffer size or the row mapping would
    /// overflow.
    pub fn new(width: usize, height: usize) -> Result<Self, Error> {
        if width == 0 || height == 0 {
            return Err(Error::BadGeometry);
        }
        let width = width.checked_add(7).ok_or(Error::BadGeometry)? & !7;
        let stride = width / 8;
        if stride > usize::from(u16::MAX) {
            return Err(Error::BadGeometry);
        }
        stride.checked_mul(height).ok_or(Error::BadGeometry)?;
        height
            .checked_mul(PAL_625.picture_lines)
            .ok_or(Error::BadGeometry)?;
        Ok(Geometry { width, height })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Bytes per row, which is also the length of each scanline transfer.
    pub fn stride(&self) -> usize {
        self.width / 8
    }

    /// Total bytes of backing memory required.
    pub fn bytes(&self) -> usize {
        self.stride() * self.height
    }

    /// Slowest shift clock, in bits per second, that fits a whole row into the
    /// active part of a line.
    pub fn min_bit_hz(&self) -> u32 {
        let hz = self.width as u64 * 1_000_000 / u64::from(PAL_625.active_us);
        if hz > u64::from(u32::MAX) {
            u32::MAX
        } else {
            hz as u32
        }
    }
}

/// Non-owning view of bilevel pixel memory.
///
/// A `FrameBuffer` is a pointer plus a [`Geometry`]. It does not free anything
/// when dropped. What it *does* promise is that the memory it points to stays
/// put and stays valid for as long as video output might be reading it.
///
/// [`Geometry`]: struct.Geometry.html
#[derive(Debug)]
pub struct FrameBuffer {
    base: NonNull<u8>,
    geometry: Geometry,
    order: BitOrder,
}

// Safety: the buffer is only ever reached through this handle (and, as raw
// addresses, through the DMA controller), so it can move between contexts.
unsafe impl Send for FrameBuffer {}

impl FrameBuffer {
    /// Wraps externally managed memory.
    ///
    /// # Safety
    ///
    /// `base` must point to at least `geometry.bytes()` bytes that are valid
    /// for reads and writes, are not accessed through any other path, and will
    /// not be freed or moved until every session using this buffer has been
    /// torn down.
    pub unsafe fn from_raw_parts(
        base: NonNull<u8>,
        geometry: Geometry,
        order: BitOrder,
    ) -> Self {
        FrameBuffer {
            base,
            geometry,
            order,
        }
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn bit_order(&self) -> BitOrder {
        self.order
    }

    pub fn as_ptr(&self) -> *const u8 {
        self.base.as_ptr()
    }

    pub fn as_bytes(&self) -> &[u8] {
        // Safety: guaranteed by the constructor's contract.
        unsafe {
            core::slice::from_raw_parts(self.base.as_ptr(), self.geometry.bytes())
        }
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        // Safety: guaranteed by the constructor's contract; &mut self makes the
        // slice unique on the CPU side.
        unsafe {
            core::slice::from_raw_parts_mut(
                self.base.as_ptr(),
                self.geometry.bytes(),
            )
        }
    }

    /// Borrows row `y`.
    ///
    /// # Panics
    ///
    /// If `y` is not less than the height.
    pub fn row_mut(&mut self, y: usize) -> &mut [u8] {
        let stride = self.geometry.stride();
        &mut self.as_bytes_mut()[y * stride..(y + 1) * stride]
    }

    /// Sets every pixel to `on`.
    pub fn fill(&mut self, on: bool) {
        let v = if on { 0xFF } else { 0 };
        for b in self.as_bytes_mut() {
            *b = v;
        }
    }

    /// Reads the pixel at `(x, y)`, or `None` if it's off the edge.
    pub fn pixel(&self, x: usize, y: usize) -> Option<bool> {
        let (index, mask) = self.locate(x, y)?;
        Some(self.as_bytes()[index] & mask != 0)
    }

    /// Writes the pixel at `(x, y)`. Writes off the edge are ignored.
    pub fn set_pixel(&mut self, x: usize, y: usize, on: bool) {
        if let Some((index, mask)) = self.locate(x, y) {
            let byte = &mut self.as_bytes_mut()[index];
            if on {
                *byte |= mask;
            } else {
                *byte &= !mask;
            }
        }
    }

    fn locate(&self, x: usize, y: usize) -> Option<(usize, u8)> {
        if x < self.geometry.width && y < self.geometry.height {
            Some((y * self.geometry.stride() + x / 8, self.order.mask(x)))
        } else {
            None
        }
    }

    /// Produces the read-only address source used by the scanout path.
    pub(crate) fn rows(&self) -> RowSource {
        RowSource {
            base: self.base,
            last_row: self.geometry.bytes() - self.geometry.stride(),
        }
    }
}

/// Address arithmetic over a framebuffer, for handing rows to DMA. Never
/// dereferences anything.
#[derive(Copy, Clone, Debug)]
pub(crate) struct RowSource {
    base: NonNull<u8>,
    /// Offset of the start of the last row.
    last_row: usize,
}

// Safety: RowSource is just an address; it grants no access by itself.
unsafe impl Send for RowSource {}

impl RowSource {
    /// Address of the row starting `offset` bytes in, clamped to the last
    /// row.
    pub fn addr(&self, offset: usize) -> *const u8 {
        self.base.as_ptr().wrapping_add(offset.min(self.last_row)) as *const u8
    }
}

/// A [`FramebufferProvider`] lending out a single statically allocated
/// buffer.
///
/// [`FramebufferProvider`]: ../hw/trait.FramebufferProvider.html
#[derive(Debug)]
pub struct StaticBuffer {
    base: NonNull<u8>,
    len: usize,
    lent: bool,
}

// Safety: StaticBuffer holds the only path to its memory.
unsafe impl Send for StaticBuffer {}

impl StaticBuffer {
    pub fn new(memory: &'static mut [u8]) -> Self {
        StaticBuffer {
            // Safety: slice pointers are never null, even when empty.
            base: unsafe { NonNull::new_unchecked(memory.as_mut_ptr()) },
            len: memory.len(),
            lent: false,
        }
    }

    pub fn is_lent(&self) -> bool {
        self.lent
    }
}

impl crate::hw::FramebufferProvider for StaticBuffer {
    fn allocate(
        &mut self,
        geometry: Geometry,
        order: BitOrder,
    ) -> Option<FrameBuffer> {
        if self.lent || geometry.bytes() > self.len {
            return None;
        }
        self.lent = true;
        // Safety: the memory is 'static, exclusively ours, big enough, and
        // we won't hand it out again until it comes back.
        let mut fb =
            unsafe { FrameBuffer::from_raw_parts(self.base, geometry, order) };
        fb.fill(false);
        Some(fb)
    }

    fn release(&mut self, fb: FrameBuffer) {
        if fb.base == self.base {
            self.lent = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hw::FramebufferProvider;

    fn leak(len: usize) -> &'static mut [u8] {
        vec![0xAAu8; len].leak()
    }

    #[test]
    fn width_rounds_up_to_bytes() {
        assert_eq!(Geometry::new(128, 96).unwrap().width(), 128);
        assert_eq!(Geometry::new(121, 96).unwrap().width(), 128);
        assert_eq!(Geometry::new(1, 1).unwrap().width(), 8);
        assert_eq!(Geometry::new(129, 1).unwrap().stride(), 17);
    }

    #[test]
    fn degenerate_geometry() {
        assert_eq!(Geometry::new(0, 96), Err(Error::BadGeometry));
        assert_eq!(Geometry::new(128, 0), Err(Error::BadGeometry));
        assert_eq!(Geometry::new(usize::MAX, 1), Err(Error::BadGeometry));
        assert!(Geometry::new(65_535 * 8, 1).is_ok());
        assert_eq!(Geometry::new(65_535 * 8 + 1, 1), Err(Error::BadGeometry));

        // Buffer size overflows.
        assert_eq!(
            Geometry::new(128, usize::MAX / 2),
            Err(Error::BadGeometry)
        );
        // Buffer size fits, but mapping a picture line onto a row doesn't.
        let tall = usize::MAX / 200;
        assert_eq!(Geometry::new(8, tall), Err(Error::BadGeometry));
        assert!(Geometry::new(8, usize::MAX / 270).is_ok());
    }

    #[test]
    fn geometry_128_by_96() {
        let g = Geometry::new(128, 96).unwrap();
        assert_eq!(g.stride(), 16);
        assert_eq!(g.bytes(), 16 * 96);
        assert_eq!(g.min_bit_hz(), 2_461_538);
    }

    #[test]
    fn bit_order_masks() {
        assert_eq!(BitOrder::LsbFirst.mask(0), 0x01);
        assert_eq!(BitOrder::LsbFirst.mask(7), 0x80);
        assert_eq!(BitOrder::LsbFirst.mask(9), 0x02);
        assert_eq!(BitOrder::MsbFirst.mask(0), 0x80);
        assert_eq!(BitOrder::MsbFirst.mask(7), 0x01);
        assert_eq!(BitOrder::default(), BitOrder::LsbFirst);
    }

    #[test]
    fn pixels_land_in_the_right_byte() {
        let g = Geometry::new(16, 4).unwrap();
        let mut p = StaticBuffer::new(leak(g.bytes()));
        let mut fb = p.allocate(g, BitOrder::MsbFirst).unwrap();
        // Allocation clears the stale pattern.
        assert!(fb.as_bytes().iter().all(|&b| b == 0));

        fb.set_pixel(9, 2, true);
        assert_eq!(fb.as_bytes()[2 * 2 + 1], 0x40);
        assert_eq!(fb.pixel(9, 2), Some(true));
        assert_eq!(fb.pixel(8, 2), Some(false));

        fb.set_pixel(9, 2, false);
        assert_eq!(fb.as_bytes()[5], 0);

        // Off the edge: ignored.
        fb.set_pixel(16, 0, true);
        fb.set_pixel(0, 4, true);
        assert_eq!(fb.pixel(16, 0), None);
        assert!(fb.as_bytes().iter().all(|&b| b == 0));
    }

    #[test]
    fn row_access() {
        let g = Geometry::new(24, 3).unwrap();
        let mut p = StaticBuffer::new(leak(g.bytes()));
        let mut fb = p.allocate(g, BitOrder::LsbFirst).unwrap();
        fb.row_mut(1).copy_from_slice(&[1, 2, 3]);
        assert_eq!(fb.as_bytes(), &[0, 0, 0, 1, 2, 3, 0, 0, 0]);
        // Pixels 8..16 of row 1 come from the value 2: only pixel 9 is lit.
        assert_eq!(fb.pixel(8, 1), Some(false));
        assert_eq!(fb.pixel(9, 1), Some(true));
    }

    #[test]
    fn row_addresses() {
        let g = Geometry::new(128, 96).unwrap();
        let mut p = StaticBuffer::new(leak(g.bytes()));
        let fb = p.allocate(g, BitOrder::LsbFirst).unwrap();
        let rows = fb.rows();
        let base = fb.as_ptr() as usize;
        assert_eq!(rows.addr(0) as usize, base);
        assert_eq!(rows.addr(48 * 16) as usize, base + 48 * 16);
        assert_eq!(rows.addr(95 * 16) as usize, base + 95 * 16);
        // Clamped rather than running off the end.
        assert_eq!(rows.addr(500 * 16) as usize, base + 95 * 16);
    }

    #[test]
    fn static_buffer_lends_once() {
        let g = Geometry::new(128, 96).unwrap();
        let mut p = StaticBuffer::new(leak(g.bytes()));

        let fb = p.allocate(g, BitOrder::LsbFirst).unwrap();
        assert!(p.is_lent());
        assert!(p.allocate(g, BitOrder::LsbFirst).is_none());

        p.release(fb);
        assert!(!p.is_lent());
        assert!(p.allocate(g, BitOrder::LsbFirst).is_some());
    }

    #[test]
    fn static_buffer_too_small() {
        let mut p = StaticBuffer::new(leak(16 * 95));
        let g = Geometry::new(128, 96).unwrap();
        assert!(p.allocate(g, BitOrder::LsbFirst).is_none());
        assert!(!p.is_lent());
    }
}
