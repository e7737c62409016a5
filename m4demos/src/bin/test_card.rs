//! A test card: border, grid and a blinking center square at 128x96.
//!
//! Video on PB5, sync on PB6, on an STM32F4-Discovery.

#![no_std]
#![no_main]

#[cfg(feature = "panic-halt")]
extern crate panic_halt;
#[cfg(feature = "panic-itm")]
extern crate panic_itm;

use cortex_m::iprintln;
use stm32f4::stm32f407 as device;
use stm32f4::stm32f407::interrupt;

use m4pal::pin::{Pin, Port};
use m4pal::priority;
use m4pal::util::clocks::DISCOVERY_168MHZ;
use m4pal::{Config, FrameBuffer, StaticBuffer};

const WIDTH: usize = 128;
const HEIGHT: usize = 96;
const BUF_SIZE: usize = WIDTH / 8 * HEIGHT;

/// Frames per blink half-period: one second.
const BLINK_FRAMES: usize = 25;

#[cortex_m_rt::entry]
fn main() -> ! {
    let cp = cortex_m::Peripherals::take().unwrap();
    let p = device::Peripherals::take().unwrap();
    let mut itm = cp.ITM;
    let stim = &mut itm.stim[0];

    m4pal::util::stm32::configure_clocks(&p.RCC, &p.FLASH, &DISCOVERY_168MHZ);

    let pal = m4pal::init(
        cp.NVIC,
        &p.FLASH,
        &p.DBG,
        p.RCC,
        p.GPIOB,
        p.SPI1,
        p.TIM4,
        p.DMA2,
        DISCOVERY_168MHZ.crystal_hz,
    );
    let clocks = pal.clocks();
    iprintln!(stim, "clocks: {:?}", clocks);
    if clocks != DISCOVERY_168MHZ.expected() {
        iprintln!(stim, "clocks: PLL settings did not take");
    }

    let mut buffer = StaticBuffer::new({
        static mut BUF: [u8; BUF_SIZE] = [0; BUF_SIZE];
        // Safety: because of scoping this is clearly the only mutable
        // reference we generate to this static.
        unsafe { &mut BUF as &mut [_] }
    });

    let config = Config {
        width: WIDTH,
        height: HEIGHT,
        ..Config::default()
    };
    let video = Pin::new(Port::B, 5).unwrap();
    let sync = Pin::new(Port::B, 6).unwrap();
    let thread = priority::Thread::new_checked().unwrap();

    let mut pal =
        match pal.configure(video, sync, &config, &mut buffer, thread) {
            Ok(pal) => pal,
            Err((_, e)) => {
                iprintln!(stim, "video: {}", e);
                loop {
                    cortex_m::asm::wfi()
                }
            }
        };
    iprintln!(stim, "video: {}x{} running", WIDTH, HEIGHT);

    draw_card(pal.frame_buffer_mut());

    let mut frame = 0;
    loop {
        pal.sync_to_vblank();
        let on = (frame / BLINK_FRAMES) % 2 == 0;
        draw_square(pal.frame_buffer_mut(), on);
        frame += 1;
    }
}

fn draw_card(fb: &mut FrameBuffer) {
    let (w, h) = (fb.geometry().width(), fb.geometry().height());
    for y in 0..h {
        if y % 16 == 0 || y == h - 1 {
            // Solid rule.
            for b in fb.row_mut(y) {
                *b = 0xFF;
            }
            continue;
        }
        for x in 0..w {
            fb.set_pixel(x, y, x % 16 == 0 || x == w - 1);
        }
    }
}

fn draw_square(fb: &mut FrameBuffer, on: bool) {
    let (cx, cy) = (fb.geometry().width() / 2, fb.geometry().height() / 2);
    for y in cy - 6..cy + 6 {
        for x in cx - 6..cx + 6 {
            fb.set_pixel(x, y, on);
        }
    }
}

/// Wires up the TIM4 handler expected by the driver.
#[interrupt]
fn TIM4() {
    m4pal::tim4_pal_isr()
}
