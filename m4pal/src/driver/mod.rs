//! The STM32F407 driver: TIM4 paces the lines, SPI1 fed by DMA2 shifts out
//! pixels, GPIOB carries the signals.

mod gpio;
mod isr;
mod spi;
mod tim4;

pub use self::isr::tim4_pal_isr;

use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use cortex_m::peripheral as cm;
use stm32f4::stm32f407 as device;

use crate::fb::FrameBuffer;
use crate::hw::FramebufferProvider;
use crate::pin::{self, Pin};
use crate::priority;
use crate::session::{self, Config, Session};
use crate::util::armv7m::{clear_pending_irq, disable_irq, enable_irq};
use crate::util::clocks::Clocks;
use crate::util::measurement;
use crate::util::spin_lock::{SpinLock, SpinLockGuard};
use crate::util::stm32::current_clocks;
use crate::Error;

use self::gpio::SignalPins;
use self::spi::SpiShifter;
use self::tim4::{LineTim4, TimerSlot};

/// Driver handle.
///
/// Get one from [`init`] or [`take_hardware`]. There is only ever one; asking
/// for a second panics.
///
/// The handle uses the [typestate pattern] to keep operations in their
/// proper state:
///
/// - [`init`] and [`take_hardware`] give a `Pal<Idle>`, which owns the idle
///   peripherals.
/// - [`configure`] consumes it and starts output, giving a `Pal<Live>`.
/// - [`shutdown`] stops output and gives back a `Pal<Idle>`, which can be
///   configured again.
///
/// [`init`]: fn.init.html
/// [`take_hardware`]: fn.take_hardware.html
/// [`configure`]: #method.configure
/// [`shutdown`]: #method.shutdown
/// [typestate pattern]: https://yoric.github.io/post/rust-typestate/
pub struct Pal<S> {
    nvic: cm::NVIC,
    rcc: device::RCC,
    timers: TimerSlot,
    crystal_hz: u32,

    mode_state: S,
}

/// Driver state with no output running.
///
/// See [`Pal`] for discussion of this pattern.
///
/// [`Pal`]: struct.Pal.html
pub struct Idle {
    gpiob: device::GPIOB,
    spi1: device::SPI1,
    dma2: device::DMA2,
}

/// Driver state while video is being generated. The peripherals belong to the
/// line timer ISR; the handle keeps the framebuffer.
///
/// See [`Pal`] for discussion of this pattern.
///
/// [`Pal`]: struct.Pal.html
pub struct Live {
    fb: FrameBuffer,
}

/// Operations valid in any driver state.
impl<S> Pal<S> {
    /// Clock tree as currently configured.
    pub fn clocks(&self) -> Clocks {
        current_clocks(&self.rcc, self.crystal_hz)
    }
}

impl Pal<Idle> {
    /// Starts video output.
    ///
    /// `video` must be the SPI1 output pin, PB5; `sync` can be any other
    /// GPIOB pin. Everything that can fail is checked before any peripheral
    /// register is written, and on failure the idle driver comes back with
    /// the error.
    ///
    /// The line timer's rate is taken from the clock tree as it stands, so
    /// set up clocks before calling this.
    pub fn configure<F: FramebufferProvider>(
        self,
        video: Pin,
        sync: Pin,
        config: &Config,
        provider: &mut F,
        _: priority::Thread,
    ) -> Result<Pal<Live>, (Pal<Idle>, Error)> {
        if let Err(e) = pin::check(video, sync) {
            return Err((self, e));
        }

        let clocks = self.clocks();
        let Pal {
            mut nvic,
            rcc,
            mut timers,
            crystal_hz,
            mode_state: Idle { gpiob, spi1, dma2 },
        } = self;

        timers.set_tick_hz(clocks.apb1_timer_hz());
        let shifter = SpiShifter::new(spi1, dma2, clocks.pclk2_hz);

        let prepared =
            match session::prepare(config, &shifter, &mut timers, provider) {
                Ok(p) => p,
                Err(e) => {
                    let (spi1, dma2) = shifter.free();
                    let idle = Pal {
                        nvic,
                        rcc,
                        timers,
                        crystal_hz,
                        mode_state: Idle { gpiob, spi1, dma2 },
                    };
                    return Err((idle, e));
                }
            };

        let pins = SignalPins::new(gpiob, sync.index());
        let (session, fb) = prepared.start(pins, shifter);

        // Donate the hardware to the ISR, then let it run.
        LINE.store(0, Ordering::Relaxed);
        *SESSION.try_lock().expect("session lock held in thread mode") =
            Some(session);
        enable_irq(&mut nvic, device::Interrupt::TIM4);

        Ok(Pal {
            nvic,
            rcc,
            timers,
            crystal_hz,
            mode_state: Live { fb },
        })
    }
}

impl Pal<Live> {
    /// Busy-waits for the start of a frame, the transition from the last line
    /// to line 0. Called *on* line 0, this waits a whole frame.
    pub fn sync_to_vblank(&self) {
        // Leave line 0 first, so that calling this in a loop gets one
        // iteration per frame.
        while LINE.load(Ordering::Relaxed) == 0 {
            cortex_m::asm::wfi()
        }
        while LINE.load(Ordering::Relaxed) != 0 {
            cortex_m::asm::wfi()
        }
    }

    /// Line being sent, counted from the start of the frame.
    pub fn line(&self) -> usize {
        LINE.load(Ordering::Relaxed)
    }

    pub fn frame_buffer(&self) -> &FrameBuffer {
        &self.mode_state.fb
    }

    /// Drawing here is not synchronized with scanout; use `sync_to_vblank`
    /// to avoid tearing.
    pub fn frame_buffer_mut(&mut self) -> &mut FrameBuffer {
        &mut self.mode_state.fb
    }

    /// Stops output, wherever the beam happens to be, and returns the
    /// framebuffer to `provider`.
    pub fn shutdown<F: FramebufferProvider>(
        self,
        provider: &mut F,
    ) -> Pal<Idle> {
        let Pal {
            mut nvic,
            rcc,
            mut timers,
            crystal_hz,
            mode_state: Live { fb },
        } = self;

        // With the IRQ off, nobody else can be holding the lock.
        disable_irq(&mut nvic, device::Interrupt::TIM4);
        let session = SESSION
            .lock()
            .take()
            .expect("live driver without a session");
        let (pins, shifter) = session.teardown(fb, &mut timers, provider);
        clear_pending_irq(device::Interrupt::TIM4);

        let (spi1, dma2) = shifter.free();
        Pal {
            nvic,
            rcc,
            timers,
            crystal_hz,
            mode_state: Idle {
                gpiob: pins.free(),
                spi1,
                dma2,
            },
        }
    }
}

/// Initializes the driver using the given hardware.
///
/// `crystal_hz` is the frequency of the HSE crystal, used to work out clock
/// rates if the PLL is fed from it.
///
/// This form lets the application keep peripherals the driver doesn't use,
/// and set up clocks first (with `util::stm32::configure_clocks`). If that's
/// not needed, [`take_hardware`] is simpler.
///
/// [`take_hardware`]: fn.take_hardware.html
pub fn init(
    mut nvic: cm::NVIC,
    flash: &device::FLASH,
    dbg: &device::DBG,
    rcc: device::RCC,
    gpiob: device::GPIOB,
    spi1: device::SPI1,
    tim4: device::TIM4,
    dma2: device::DMA2,
    crystal_hz: u32,
) -> Pal<Idle> {
    unsafe {
        measurement::init();
    }

    let previous_instance = DRIVER_INIT_FLAG.swap(true, Ordering::SeqCst);
    assert_eq!(previous_instance, false);

    disable_irq(&mut nvic, device::Interrupt::TIM4);
    clear_pending_irq(device::Interrupt::TIM4);

    rcc.ahb1enr
        .modify(|_, w| w.gpioben().enabled().dma2en().enabled());
    rcc.apb1enr.modify(|_, w| w.tim4en().set_bit());
    rcc.apb2enr.modify(|_, w| w.spi1en().set_bit());
    cortex_m::asm::dsb(); // peripherals powered before anyone writes them

    // Safety: TIM4 is disabled, so its priority can't be changing under a
    // running handler.
    unsafe {
        nvic.set_priority(device::Interrupt::TIM4, 0x00);
    }

    // Caches and prefetch reduce ISR entry jitter.
    flash.acr.modify(|_, w| {
        w.dcen().enabled().icen().enabled().prften().enabled()
    });

    // Freeze the line timer when the debugger halts us.
    dbg.dbgmcu_apb1_fz
        .modify(|_, w| w.dbg_tim4_stop().set_bit());

    Pal {
        nvic,
        rcc,
        timers: TimerSlot::new(tim4),
        crystal_hz,
        mode_state: Idle { gpiob, spi1, dma2 },
    }
}

/// Starts up the driver, taking possession of all hardware peripherals.
///
/// ```ignore
/// let pal = m4pal::take_hardware(8_000_000);
/// ```
///
/// Shorthand for [`init`] when nothing but video output uses the hardware.
///
/// [`init`]: fn.init.html
pub fn take_hardware(crystal_hz: u32) -> Pal<Idle> {
    let cp = cortex_m::peripheral::Peripherals::take().unwrap();
    let p = device::Peripherals::take().unwrap();

    init(
        cp.NVIC, &p.FLASH, &p.DBG, p.RCC, p.GPIOB, p.SPI1, p.TIM4, p.DMA2,
        crystal_hz,
    )
}

/// Set once a driver instance exists.
static DRIVER_INIT_FLAG: AtomicBool = AtomicBool::new(false);

type PalSession = Session<LineTim4, SpiShifter, SignalPins>;

/// The running session, loaned to the TIM4 ISR.
static SESSION: SpinLock<Option<PalSession>> = SpinLock::new(None);

/// Line most recently started, published by the ISR for `sync_to_vblank`.
static LINE: AtomicUsize = AtomicUsize::new(0);

/// Pattern for acquiring hardware resources loaned to an ISR in a static.
///
/// # Panics
///
/// If the lock is held, meaning the IRQ was enabled while the session was
/// still being donated or leaked a guard; or if nothing has been donated,
/// meaning the IRQ was enabled too early.
fn acquire_hw<T: Send>(lock: &SpinLock<Option<T>>) -> SpinLockGuard<T> {
    SpinLockGuard::map(
        lock.try_lock().expect("HW lock held at ISR"),
        |o| o.as_mut().expect("ISR fired without HW available"),
    )
}
