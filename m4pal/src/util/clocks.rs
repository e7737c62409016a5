//! Working out bus and timer frequencies from the STM32F4 RCC registers.
//!
//! This works on raw register values so it can be tested off target; the
//! driver reads the registers and hands them over.

/// Frequency of the internal RC oscillator.
pub const HSI_HZ: u32 = 16_000_000;

/// A bit field within a 32-bit register.
#[derive(Copy, Clone, Debug)]
struct Field {
    shift: u32,
    width: u32,
}

impl Field {
    const fn new(shift: u32, width: u32) -> Self {
        Field { shift, width }
    }

    fn mask(self) -> u32 {
        (1 << self.width) - 1
    }

    fn get(self, reg: u32) -> u32 {
        (reg >> self.shift) & self.mask()
    }

    fn put(self, value: u32) -> u32 {
        (value & self.mask()) << self.shift
    }
}

/// `RCC_CFGR` fields.
mod cfgr {
    use super::Field;

    pub(super) const SWS: Field = Field::new(2, 2);
    pub(super) const HPRE: Field = Field::new(4, 4);
    pub(super) const PPRE1: Field = Field::new(10, 3);
    pub(super) const PPRE2: Field = Field::new(13, 3);

    pub(super) const SWS_HSE: u32 = 0b01;
    pub(super) const SWS_PLL: u32 = 0b10;
}

/// `RCC_PLLCFGR` fields.
mod pllcfgr {
    use super::Field;

    pub(super) const PLLM: Field = Field::new(0, 6);
    pub(super) const PLLN: Field = Field::new(6, 9);
    pub(super) const PLLP: Field = Field::new(16, 2);
    pub(super) const PLLSRC: Field = Field::new(22, 1);
    pub(super) const PLLQ: Field = Field::new(24, 4);
}

/// Bus frequencies in effect.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Clocks {
    pub sysclk_hz: u32,
    pub hclk_hz: u32,
    pub pclk1_hz: u32,
    pub pclk2_hz: u32,
    apb1_div: u32,
}

impl Clocks {
    /// Decodes the contents of `RCC_CFGR` and `RCC_PLLCFGR`, given the
    /// frequency of the external crystal (only consulted if in use).
    pub fn decode(cfgr: u32, pllcfgr: u32, hse_hz: u32) -> Self {
        let sysclk_hz = match cfgr::SWS.get(cfgr) {
            cfgr::SWS_HSE => hse_hz,
            cfgr::SWS_PLL => pll_hz(pllcfgr, hse_hz),
            _ => HSI_HZ,
        };
        let hclk_hz = sysclk_hz / ahb_divisor(cfgr::HPRE.get(cfgr));
        let apb1_div = apb_divisor(cfgr::PPRE1.get(cfgr));
        let apb2_div = apb_divisor(cfgr::PPRE2.get(cfgr));
        Clocks {
            sysclk_hz,
            hclk_hz,
            pclk1_hz: hclk_hz / apb1_div,
            pclk2_hz: hclk_hz / apb2_div,
            apb1_div,
        }
    }

    /// Kernel clock of the timers on APB1 (TIM2-7, TIM12-14). The timers run
    /// at twice the bus rate whenever the bus is divided down.
    pub fn apb1_timer_hz(&self) -> u32 {
        if self.apb1_div == 1 {
            self.pclk1_hz
        } else {
            self.pclk1_hz * 2
        }
    }
}

/// PLL and bus divider settings for running from an external crystal.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ClockConfig {
    pub crystal_hz: u32,
    /// Crystal divisor giving the VCO input (2..=63).
    pub pll_m: u8,
    /// VCO multiplier (50..=432).
    pub pll_n: u16,
    /// System clock divisor: 2, 4, 6 or 8.
    pub pll_p: u32,
    /// 48MHz domain divisor (2..=15).
    pub pll_q: u8,
    pub ahb_divisor: u32,
    pub apb1_divisor: u32,
    pub apb2_divisor: u32,
    /// Flash wait states.
    pub flash_latency: u32,
}

/// 168MHz from the 8MHz crystal on the STM32F4-Discovery, APB1 at 42MHz and
/// APB2 at 84MHz.
pub const DISCOVERY_168MHZ: ClockConfig = ClockConfig {
    crystal_hz: 8_000_000,
    pll_m: 8,
    pll_n: 336,
    pll_p: 2,
    pll_q: 7,
    ahb_divisor: 1,
    apb1_divisor: 4,
    apb2_divisor: 2,
    flash_latency: 5,
};

impl ClockConfig {
    /// What `Clocks::decode` will report once this is applied.
    pub fn expected(&self) -> Clocks {
        Clocks::decode(self.cfgr(), self.pllcfgr(), self.crystal_hz)
    }

    /// `RCC_PLLCFGR` contents, HSE selected as PLL input.
    fn pllcfgr(&self) -> u32 {
        pllcfgr::PLLM.put(u32::from(self.pll_m))
            | pllcfgr::PLLN.put(u32::from(self.pll_n))
            | pllcfgr::PLLP.put(self.pll_p / 2 - 1)
            | pllcfgr::PLLSRC.put(1)
            | pllcfgr::PLLQ.put(u32::from(self.pll_q))
    }

    /// `RCC_CFGR` contents with the PLL selected and running.
    fn cfgr(&self) -> u32 {
        cfgr::SWS.put(cfgr::SWS_PLL)
            | cfgr::HPRE.put(hpre_bits(self.ahb_divisor))
            | cfgr::PPRE1.put(ppre_bits(self.apb1_divisor))
            | cfgr::PPRE2.put(ppre_bits(self.apb2_divisor))
    }
}

impl Default for Clocks {
    /// The state out of reset: everything on HSI, undivided.
    fn default() -> Self {
        Clocks::decode(0, 0, 0)
    }
}

/// AHB prescaler encodings, divisor first.
const HPRE_TABLE: [(u32, u32); 8] = [
    (2, 0b1000),
    (4, 0b1001),
    (8, 0b1010),
    (16, 0b1011),
    (64, 0b1100),
    (128, 0b1101),
    (256, 0b1110),
    (512, 0b1111),
];

/// APB prescaler encodings, divisor first.
const PPRE_TABLE: [(u32, u32); 4] =
    [(2, 0b100), (4, 0b101), (8, 0b110), (16, 0b111)];

fn hpre_bits(div: u32) -> u32 {
    encode(&HPRE_TABLE, div)
}

fn ppre_bits(div: u32) -> u32 {
    encode(&PPRE_TABLE, div)
}

fn ahb_divisor(hpre: u32) -> u32 {
    decode(&HPRE_TABLE, hpre)
}

fn apb_divisor(ppre: u32) -> u32 {
    decode(&PPRE_TABLE, ppre)
}

/// Anything not in the table means "undivided".
fn encode(table: &[(u32, u32)], div: u32) -> u32 {
    table
        .iter()
        .find(|&&(d, _)| d == div)
        .map_or(0, |&(_, bits)| bits)
}

fn decode(table: &[(u32, u32)], bits: u32) -> u32 {
    table
        .iter()
        .find(|&&(_, b)| b == bits)
        .map_or(1, |&(d, _)| d)
}

fn pll_hz(reg: u32, hse_hz: u32) -> u32 {
    let input = if pllcfgr::PLLSRC.get(reg) != 0 {
        hse_hz
    } else {
        HSI_HZ
    };
    let m = pllcfgr::PLLM.get(reg);
    let n = pllcfgr::PLLN.get(reg);
    let p = (pllcfgr::PLLP.get(reg) + 1) * 2;
    if m == 0 {
        // Not a legal setting; the PLL can't be running like this.
        return 0;
    }
    // Divide first: the VCO input is a whole number of MHz in any sane
    // configuration, and this keeps VCO * N inside u32.
    input / m * n / p
}
