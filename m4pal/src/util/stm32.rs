//! STM32F4 clock tree operations on top of the `stm32f4` crate, plus a few
//! extensions for fields it doesn't model usefully.

use stm32f4::stm32f407 as device;

use device::flash::acr::LATENCYW;
use device::rcc::cfgr::{HPREW, PPRE2W, SWSR, SWW};
use device::rcc::pllcfgr::{PLLPW, PLLSRCW};

use crate::util::clocks::{ClockConfig, Clocks};

macro_rules! block_while {
    ($condition:expr) => {
        while $condition {}
    };
}

macro_rules! block_until {
    ($condition:expr) => {
        block_while!(!$condition)
    };
}

/// Reads the clock tree as currently configured. `crystal_hz` is the HSE
/// frequency, which the hardware has no way of knowing.
pub fn current_clocks(rcc: &device::RCC, crystal_hz: u32) -> Clocks {
    Clocks::decode(
        rcc.cfgr.read().bits(),
        rcc.pllcfgr.read().bits(),
        crystal_hz,
    )
}

/// Switches the system clock to the PLL as described by `cfg`.
///
/// Works from any starting configuration by parking on HSI while the PLL is
/// reprogrammed. Flash wait states are raised before the switch, since the
/// flash controller has to keep up with the new rate.
pub fn configure_clocks(
    rcc: &device::RCC,
    flash: &device::FLASH,
    cfg: &ClockConfig,
) {
    rcc.cr.modify(|_, w| w.hsion().set_bit());
    block_until! { rcc.cr.read().hsirdy().bit() }
    rcc.cfgr.modify(|_, w| w.sw().variant(SWW::HSI));
    block_until! { rcc.cfgr.read().sws() == SWSR::HSI }

    rcc.cr.modify(|_, w| w.pllon().clear_bit());
    block_while! { rcc.cr.read().pllrdy().bit() }

    // Dividers before speeding up.
    rcc.cfgr.modify(|_, w| {
        w.hpre()
            .variant(hpre(cfg.ahb_divisor))
            .ppre1()
            .variant(ppre(cfg.apb1_divisor))
            .ppre2()
            .variant(ppre(cfg.apb2_divisor))
    });

    flash
        .acr
        .modify(|_, w| w.latency().variant(latency(cfg.flash_latency)));

    rcc.cr.modify(|_, w| w.hseon().set_bit());
    block_until! { rcc.cr.read().hserdy().bit() }

    rcc.pllcfgr.modify(|_, w| {
        // Safety: only unsafe due to upstream bug.
        unsafe {
            w.pllm().bits(cfg.pll_m);
            w.plln().bits(cfg.pll_n);
            w.pllq().bits(cfg.pll_q);
        }
        w.pllp()
            .variant(pllp(cfg.pll_p))
            .pllsrc()
            .variant(PLLSRCW::HSE)
    });

    rcc.cr.modify(|_, w| w.pllon().set_bit());
    block_until! { rcc.cr.read().pllrdy().bit() }

    rcc.cfgr.modify(|_, w| w.sw().variant(SWW::PLL));
    block_until! { rcc.cfgr.read().sws() == SWSR::PLL }
}

fn hpre(div: u32) -> HPREW {
    match div {
        2 => HPREW::DIV2,
        4 => HPREW::DIV4,
        8 => HPREW::DIV8,
        16 => HPREW::DIV16,
        64 => HPREW::DIV64,
        128 => HPREW::DIV128,
        256 => HPREW::DIV256,
        512 => HPREW::DIV512,
        _ => HPREW::DIV1,
    }
}

/// APB1 and APB2 share one divisor encoding, and the PAC models PPRE1 as an
/// alias of PPRE2.
fn ppre(div: u32) -> PPRE2W {
    match div {
        2 => PPRE2W::DIV2,
        4 => PPRE2W::DIV4,
        8 => PPRE2W::DIV8,
        16 => PPRE2W::DIV16,
        _ => PPRE2W::DIV1,
    }
}

fn pllp(div: u32) -> PLLPW {
    match div {
        4 => PLLPW::DIV4,
        6 => PLLPW::DIV6,
        8 => PLLPW::DIV8,
        _ => PLLPW::DIV2,
    }
}

fn latency(wait_states: u32) -> LATENCYW {
    match wait_states {
        0 => LATENCYW::WS0,
        1 => LATENCYW::WS1,
        2 => LATENCYW::WS2,
        3 => LATENCYW::WS3,
        4 => LATENCYW::WS4,
        5 => LATENCYW::WS5,
        6 => LATENCYW::WS6,
        _ => LATENCYW::WS7,
    }
}

/// Trait for welding arbitrary write support onto a register whose fields
/// are picked at runtime.
pub trait AllWriteExt<T> {
    type W;
    fn bits_ext(self, value: T) -> Self::W;
}

pub mod gpiob {
    pub mod bsrr {
        use stm32f4::stm32f407::gpiob::bsrr as device;

        impl<'a> crate::util::stm32::AllWriteExt<u32> for &'a mut device::W {
            type W = &'a mut device::W;
            fn bits_ext(self, value: u32) -> Self::W {
                // Safety: every BSRR bit pattern is valid; each set bit
                // sets or resets one pin and clear bits do nothing.
                unsafe { self.bits(value) }
            }
        }
    }
}

pub mod tim3 {
    pub mod psc {
        use stm32f4::stm32f407::tim3::psc as device;

        impl<'a> crate::util::stm32::AllWriteExt<u16> for device::_PSCW<'a> {
            type W = &'a mut device::W;
            fn bits_ext(self, value: u16) -> Self::W {
                // Safety: only unsafe due to upstream bug.
                unsafe { self.bits(value) }
            }
        }
    }
}
