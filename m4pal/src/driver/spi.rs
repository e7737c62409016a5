//! SPI1 fed by DMA2 stream 3 as the pixel shifter.
//!
//! SPI1 runs as a transmit-only master with software slave select, so the
//! only pin it drives is MOSI. Each visible line gets one DMA transfer of one
//! framebuffer row into the data register. Between lines SPI idles and the
//! video pin is handed back to GPIO.

use stm32f4::stm32f407 as device;

use device::dma2::{lifcr, s3cr};

use crate::fb::BitOrder;
use crate::hw::Shifter;
use crate::timing::Prescaler;

/// DMA2 stream 3 setup for a byte-wide memory-to-SPI copy, minus the enable
/// bit.
fn stream_setup(w: &mut s3cr::W) -> &mut s3cr::W {
    w.chsel()
        .bits(3)
        .pl()
        .very_high()
        .pburst()
        .single()
        .mburst()
        .single()
        .msize()
        .byte()
        .psize()
        .byte()
        .minc()
        .set_bit()
        .pinc()
        .clear_bit()
        .dir()
        .memory_to_peripheral()
}

/// Clears all of stream 3's flags in DMA_LIFCR.
fn clear_stream_flags(w: &mut lifcr::W) -> &mut lifcr::W {
    w.cfeif3()
        .set_bit()
        .cdmeif3()
        .set_bit()
        .cteif3()
        .set_bit()
        .chtif3()
        .set_bit()
        .ctcif3()
        .set_bit()
}

pub struct SpiShifter {
    spi: device::SPI1,
    dma: device::DMA2,
    /// SPI1 kernel clock (PCLK2).
    bus_hz: u32,
}

impl SpiShifter {
    pub fn new(spi: device::SPI1, dma: device::DMA2, bus_hz: u32) -> Self {
        SpiShifter { spi, dma, bus_hz }
    }

    /// Gives the peripherals back.
    pub fn free(self) -> (device::SPI1, device::DMA2) {
        (self.spi, self.dma)
    }

    fn stop_stream(&mut self) {
        self.dma.s3cr.modify(|_, w| w.en().clear_bit());
        // EN reads back set until the current beat retires, which is at most
        // one byte.
        while self.dma.s3cr.read().en().bit_is_set() {}
    }
}

impl Shifter for SpiShifter {
    fn max_bit_hz(&self) -> u32 {
        Prescaler::FASTEST.rate(self.bus_hz)
    }

    fn configure(&mut self, min_bit_hz: u32, order: BitOrder) {
        let br = Prescaler::for_rate(self.bus_hz, min_bit_hz)
            .unwrap_or(Prescaler::FASTEST)
            .bits();
        let lsb_first = order == BitOrder::LsbFirst;

        // Transmit-only master: bidirectional mode with the output on, and
        // software slave select held inactive.
        self.spi.cr1.write(|w| {
            // Safety: only unsafe due to upstream bug.
            unsafe {
                w.br().bits(br);
            }
            w.bidimode()
                .set_bit()
                .bidioe()
                .set_bit()
                .ssm()
                .set_bit()
                .ssi()
                .set_bit()
                .mstr()
                .set_bit()
                .lsbfirst()
                .bit(lsb_first)
        });
        self.spi.cr2.write(|w| w.txdmaen().set_bit());
        self.spi.cr1.modify(|_, w| w.spe().set_bit());

        self.stop_stream();
        self.dma.s3cr.write(stream_setup);
        let dr = &self.spi.dr as *const _ as u32;
        self.dma.s3par.write(|w| unsafe { w.bits(dr) });
        // Direct mode: FIFO off.
        self.dma.s3fcr.write(|w| w.dmdis().clear_bit().feie().disabled());
        self.dma.lifcr.write(clear_stream_flags);
    }

    fn arm(&mut self, source: *const u8, len: u16) {
        self.stop_stream();
        self.dma.lifcr.write(clear_stream_flags);
        self.dma.s3ndtr.write(|w| w.ndt().bits(len));
        self.dma.s3m0ar.write(|w| unsafe { w.bits(source as u32) });
        self.dma.s3cr.write(|w| stream_setup(w).en().set_bit());
    }

    fn shutdown(&mut self) {
        self.stop_stream();
        self.dma.lifcr.write(clear_stream_flags);
        self.spi.cr2.reset();
        self.spi.cr1.reset();
    }
}
