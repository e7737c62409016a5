//! A running video output session.
//!
//! The session owns everything the timer interrupt touches: the line timer,
//! the shifter, the output pins, and the beam position. Configuration happens
//! in two halves:
//!
//! 1. [`prepare`] does everything that can fail -- geometry checks, reserving
//!    a timer, checking the shift clock, getting a framebuffer -- without
//!    writing to any hardware. On failure, whatever it reserved goes back.
//! 2. [`Prepared::start`] can't fail. It sets the pins to idle, configures the
//!    shifter, and starts the timer.
//!
//! After that, the only thing that happens is [`Session::on_expiry`], once per
//! timer expiry, from the interrupt handler.
//!
//! [`prepare`]: fn.prepare.html
//! [`Prepared::start`]: struct.Prepared.html#method.start
//! [`Session::on_expiry`]: struct.Session.html#method.on_expiry

use smart_default::SmartDefault;

use crate::fb::{BitOrder, FrameBuffer, Geometry, RowSource};
use crate::hstate::{HState, Phase, VideoAction};
use crate::hw::{
    FramebufferProvider, Level, LineTimer, OutputPins, Shifter, TimerPool,
    VideoMode,
};
use crate::line::Line;
use crate::scanout;
use crate::timing::{self, PAL_625};
use crate::util::measurement;
use crate::Error;

/// What the caller gets to choose about the picture.
#[derive(Clone, Debug, SmartDefault)]
pub struct Config {
    /// Width in pixels. Rounded up to a multiple of 8.
    #[default = 128]
    pub width: usize,
    /// Height in pixels.
    #[default = 96]
    pub height: usize,
    /// Order in which each byte's pixels are shifted out.
    pub bit_order: BitOrder,
}

/// Resources reserved by [`prepare`], not yet applied to the hardware.
///
/// [`prepare`]: fn.prepare.html
#[derive(Debug)]
pub struct Prepared<T> {
    timer: T,
    geometry: Geometry,
    ticks_per_line: u16,
    fb: FrameBuffer,
}

/// Checks `config` against the hardware on offer and reserves what a session
/// needs. Nothing is written to the hardware.
pub fn prepare<Q, F, S>(
    config: &Config,
    shifter: &S,
    pool: &mut Q,
    provider: &mut F,
) -> Result<Prepared<Q::Timer>, Error>
where
    Q: TimerPool,
    F: FramebufferProvider,
    S: Shifter,
{
    let geometry = Geometry::new(config.width, config.height)?;

    let timer = pool
        .reserve(PAL_625.line_hz)
        .ok_or(Error::TimerUnavailable)?;
    // From here on, failures must give the timer back.
    let timer = scopeguard::guard(timer, |t| pool.release(t));

    let ticks_per_line =
        timing::ticks_per_line(timer.tick_hz()).ok_or(Error::TimerUnavailable)?;

    if shifter.max_bit_hz() < geometry.min_bit_hz() {
        return Err(Error::ShiftClockTooSlow);
    }

    let fb = provider
        .allocate(geometry, config.bit_order)
        .ok_or(Error::FramebufferUnavailable)?;

    Ok(Prepared {
        timer: scopeguard::ScopeGuard::into_inner(timer),
        geometry,
        ticks_per_line,
        fb,
    })
}

impl<T: LineTimer> Prepared<T> {
    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn ticks_per_line(&self) -> u16 {
        self.ticks_per_line
    }

    /// Gives back everything reserved, without starting.
    pub fn abandon<Q, F>(self, pool: &mut Q, provider: &mut F)
    where
        Q: TimerPool<Timer = T>,
        F: FramebufferProvider,
    {
        pool.release(self.timer);
        provider.release(self.fb);
    }

    /// Puts the hardware into its idle state and starts generating sync.
    ///
    /// Returns the session, which belongs to the timer interrupt from now on,
    /// and the framebuffer, which belongs to the caller.
    pub fn start<S, P>(
        self,
        mut pins: P,
        mut shifter: S,
    ) -> (Session<T, S, P>, FrameBuffer)
    where
        S: Shifter,
        P: OutputPins,
    {
        let Prepared {
            mut timer,
            geometry,
            ticks_per_line,
            fb,
        } = self;

        pins.set_sync(Level::Low);
        pins.set_video(Level::Low);
        pins.set_video_mode(VideoMode::Logic);

        shifter.configure(geometry.min_bit_hz(), fb.bit_order());

        // The first expiry comes one whole line from now, and lands in
        // Sync1Start.
        timer.start(ticks_per_line);

        let session = Session {
            timer,
            shifter,
            pins,
            geometry,
            ticks_per_line,
            hstate: HState::new(),
            rows: fb.rows(),
            frames: 0,
        };
        (session, fb)
    }
}

/// Video output in progress.
#[derive(Debug)]
pub struct Session<T, S, P> {
    timer: T,
    shifter: S,
    pins: P,
    geometry: Geometry,
    ticks_per_line: u16,
    hstate: HState,
    rows: RowSource,
    frames: usize,
}

impl<T, S, P> Session<T, S, P>
where
    T: LineTimer,
    S: Shifter,
    P: OutputPins,
{
    /// Configuration entry point: [`prepare`] followed by
    /// [`Prepared::start`].
    ///
    /// On failure `pins` and `shifter` are dropped; use the two halves
    /// separately to keep them.
    ///
    /// [`prepare`]: fn.prepare.html
    /// [`Prepared::start`]: struct.Prepared.html#method.start
    pub fn configure<Q, F>(
        config: &Config,
        pins: P,
        shifter: S,
        pool: &mut Q,
        provider: &mut F,
    ) -> Result<(Self, FrameBuffer), Error>
    where
        Q: TimerPool<Timer = T>,
        F: FramebufferProvider,
    {
        let prepared = prepare(config, &shifter, pool, provider)?;
        Ok(prepared.start(pins, shifter))
    }

    /// Handles one timer expiry. Call this from the timer interrupt and
    /// nowhere else.
    pub fn on_expiry(&mut self) {
        // Our own interrupt stays masked until we've finished rewriting the
        // period and the DMA registers.
        let mut timer = scopeguard::guard(&mut self.timer, |t| t.unmask());
        timer.mask();
        timer.acknowledge();

        let step = self.hstate.advance();
        timer.set_period(step.period.ticks(self.ticks_per_line));

        if let Some(level) = step.sync {
            self.pins.set_sync(level);
        }

        match step.video {
            Some(VideoAction::Scanout(line)) => {
                if let Some(t) = scanout::transfer_for(line, &self.geometry) {
                    measurement::sig_b_set();
                    self.pins.set_video_mode(VideoMode::Shift);
                    self.shifter.arm(self.rows.addr(t.offset), t.len);
                    measurement::sig_b_clear();
                }
            }
            Some(VideoAction::Release) => {
                self.pins.set_video_mode(VideoMode::Logic);
            }
            None => (),
        }

        if self.hstate.phase() == Phase::Sync1Start
            && self.hstate.line() == Line::FIRST
        {
            self.frames = self.frames.wrapping_add(1);
        }
    }

    /// Line the beam is on.
    pub fn line(&self) -> Line {
        self.hstate.line()
    }

    pub fn phase(&self) -> Phase {
        self.hstate.phase()
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn ticks_per_line(&self) -> u16 {
        self.ticks_per_line
    }

    /// Bytes sent per scanline transfer.
    pub fn transfer_len(&self) -> usize {
        self.geometry.stride()
    }

    /// Number of complete frames sent, wrapping.
    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Stops output and gives everything back: the timer to `pool`, the
    /// framebuffer to `provider`, and the pins and shifter to the caller.
    pub fn teardown<Q, F>(
        self,
        fb: FrameBuffer,
        pool: &mut Q,
        provider: &mut F,
    ) -> (P, S)
    where
        Q: TimerPool<Timer = T>,
        F: FramebufferProvider,
    {
        let Session {
            mut timer,
            mut shifter,
            mut pins,
            ..
        } = self;

        timer.stop();
        shifter.shutdown();
        pins.set_video_mode(VideoMode::Logic);
        pins.set_video(Level::Low);
        pins.set_sync(Level::Low);

        pool.release(timer);
        provider.release(fb);
        (pins, shifter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fb::StaticBuffer;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Copy, Clone, Debug, PartialEq)]
    enum Ev {
        Mask,
        Unmask,
        Ack,
        Period(u16),
        Start(u16),
        Stop,
        Sync(Level),
        Video(Level),
        Mode(VideoMode),
        Configure(u32, BitOrder),
        Arm(usize, u16),
        Shutdown,
    }

    type Log = Rc<RefCell<Vec<Ev>>>;

    #[derive(Debug)]
    struct FakeTimer {
        hz: u32,
        log: Log,
    }

    impl LineTimer for FakeTimer {
        fn tick_hz(&self) -> u32 {
            self.hz
        }
        fn set_period(&mut self, ticks: u16) {
            self.log.borrow_mut().push(Ev::Period(ticks));
        }
        fn acknowledge(&mut self) {
            self.log.borrow_mut().push(Ev::Ack);
        }
        fn mask(&mut self) {
            self.log.borrow_mut().push(Ev::Mask);
        }
        fn unmask(&mut self) {
            self.log.borrow_mut().push(Ev::Unmask);
        }
        fn start(&mut self, ticks: u16) {
            self.log.borrow_mut().push(Ev::Start(ticks));
        }
        fn stop(&mut self) {
            self.log.borrow_mut().push(Ev::Stop);
        }
    }

    struct FakePool {
        hz: u32,
        free: bool,
        log: Log,
    }

    impl TimerPool for FakePool {
        type Timer = FakeTimer;
        fn reserve(&mut self, rate_hz: u32) -> Option<FakeTimer> {
            assert_eq!(rate_hz, 15_625);
            if self.free {
                self.free = false;
                Some(FakeTimer {
                    hz: self.hz,
                    log: self.log.clone(),
                })
            } else {
                None
            }
        }
        fn release(&mut self, _: FakeTimer) {
            assert!(!self.free, "released a timer nobody reserved");
            self.free = true;
        }
    }

    #[derive(Debug)]
    struct FakeShifter {
        max_hz: u32,
        log: Log,
    }

    impl Shifter for FakeShifter {
        fn max_bit_hz(&self) -> u32 {
            self.max_hz
        }
        fn configure(&mut self, min_bit_hz: u32, order: BitOrder) {
            self.log.borrow_mut().push(Ev::Configure(min_bit_hz, order));
        }
        fn arm(&mut self, source: *const u8, len: u16) {
            self.log.borrow_mut().push(Ev::Arm(source as usize, len));
        }
        fn shutdown(&mut self) {
            self.log.borrow_mut().push(Ev::Shutdown);
        }
    }

    #[derive(Debug)]
    struct FakePins {
        log: Log,
    }

    impl OutputPins for FakePins {
        fn set_sync(&mut self, level: Level) {
            self.log.borrow_mut().push(Ev::Sync(level));
        }
        fn set_video(&mut self, level: Level) {
            self.log.borrow_mut().push(Ev::Video(level));
        }
        fn set_video_mode(&mut self, mode: VideoMode) {
            self.log.borrow_mut().push(Ev::Mode(mode));
        }
    }

    struct Rig {
        log: Log,
        pool: FakePool,
        provider: StaticBuffer,
    }

    type TestSession = Session<FakeTimer, FakeShifter, FakePins>;

    impl Rig {
        fn new(timer_hz: u32, buffer: usize) -> Self {
            let log = Log::default();
            Rig {
                pool: FakePool {
                    hz: timer_hz,
                    free: true,
                    log: log.clone(),
                },
                provider: StaticBuffer::new(vec![0u8; buffer].leak()),
                log,
            }
        }

        fn parts(&self, shift_hz: u32) -> (FakePins, FakeShifter) {
            (
                FakePins {
                    log: self.log.clone(),
                },
                FakeShifter {
                    max_hz: shift_hz,
                    log: self.log.clone(),
                },
            )
        }

        fn configure(
            &mut self,
            config: &Config,
        ) -> Result<(TestSession, FrameBuffer), Error> {
            let (pins, shifter) = self.parts(42_000_000);
            Session::configure(
                config,
                pins,
                shifter,
                &mut self.pool,
                &mut self.provider,
            )
        }

        fn take_log(&self) -> Vec<Ev> {
            self.log.borrow_mut().drain(..).collect()
        }
    }

    fn run_to_line(s: &mut TestSession, line: usize) {
        while s.line().index() != line || s.phase() != Phase::Sync1Start {
            s.on_expiry();
        }
    }

    #[test]
    fn default_config() {
        let c = Config::default();
        assert_eq!(c.width, 128);
        assert_eq!(c.height, 96);
        assert_eq!(c.bit_order, BitOrder::LsbFirst);
    }

    #[test]
    fn configure_128_by_96() {
        let mut rig = Rig::new(84_000_000, 16 * 96);
        let (s, fb) = rig.configure(&Config::default()).unwrap();

        assert_eq!(s.geometry().width(), 128);
        assert_eq!(s.transfer_len(), 16);
        assert_eq!(s.ticks_per_line(), 5376);
        assert_eq!(s.line(), Line::FIRST);
        assert_eq!(s.phase(), Phase::Sync1Start);
        assert_eq!(fb.geometry().bytes(), 16 * 96);

        assert_eq!(
            rig.take_log(),
            [
                Ev::Sync(Level::Low),
                Ev::Video(Level::Low),
                Ev::Mode(VideoMode::Logic),
                Ev::Configure(2_461_538, BitOrder::LsbFirst),
                Ev::Start(5376),
            ]
        );
    }

    #[test]
    fn odd_width_is_rounded() {
        let mut rig = Rig::new(84_000_000, 16 * 96);
        let config = Config {
            width: 121,
            ..Config::default()
        };
        let (s, fb) = rig.configure(&config).unwrap();
        assert_eq!(s.geometry().width(), 128);
        assert_eq!(fb.geometry().width(), 128);
        assert_eq!(s.transfer_len(), 16);
    }

    #[test]
    fn reconfigure_after_teardown_is_identical() {
        let mut rig = Rig::new(84_000_000, 16 * 96);
        let config = Config::default();

        let (s, fb) = rig.configure(&config).unwrap();
        let first = (s.ticks_per_line(), s.transfer_len());
        let _ = s.teardown(fb, &mut rig.pool, &mut rig.provider);
        assert!(rig.pool.free);
        assert!(!rig.provider.is_lent());

        let (s, _fb) = rig.configure(&config).unwrap();
        assert_eq!((s.ticks_per_line(), s.transfer_len()), first);
    }

    #[test]
    fn teardown_quiets_everything() {
        let mut rig = Rig::new(84_000_000, 16 * 96);
        let (s, fb) = rig.configure(&Config::default()).unwrap();
        rig.take_log();
        let _ = s.teardown(fb, &mut rig.pool, &mut rig.provider);
        assert_eq!(
            rig.take_log(),
            [
                Ev::Stop,
                Ev::Shutdown,
                Ev::Mode(VideoMode::Logic),
                Ev::Video(Level::Low),
                Ev::Sync(Level::Low),
            ]
        );
    }

    #[test]
    fn timer_taken() {
        let mut rig = Rig::new(84_000_000, 16 * 96);
        rig.pool.free = false;
        let err = rig.configure(&Config::default()).unwrap_err();
        assert_eq!(err, Error::TimerUnavailable);
        assert!(rig.take_log().is_empty());
        assert!(!rig.provider.is_lent());
    }

    #[test]
    fn timer_too_slow_is_released() {
        let mut rig = Rig::new(10_000, 16 * 96);
        let err = rig.configure(&Config::default()).unwrap_err();
        assert_eq!(err, Error::TimerUnavailable);
        assert!(rig.pool.free);
        assert!(rig.take_log().is_empty());
    }

    #[test]
    fn shifter_too_slow() {
        let mut rig = Rig::new(84_000_000, 16 * 96);
        let (pins, shifter) = rig.parts(2_000_000);
        let err = Session::configure(
            &Config::default(),
            pins,
            shifter,
            &mut rig.pool,
            &mut rig.provider,
        )
        .unwrap_err();
        assert_eq!(err, Error::ShiftClockTooSlow);
        assert!(rig.pool.free);
        assert!(!rig.provider.is_lent());
        assert!(rig.take_log().is_empty());
    }

    #[test]
    fn no_framebuffer() {
        let mut rig = Rig::new(84_000_000, 16 * 95);
        let err = rig.configure(&Config::default()).unwrap_err();
        assert_eq!(err, Error::FramebufferUnavailable);
        assert!(rig.pool.free);
        assert!(rig.take_log().is_empty());
    }

    #[test]
    fn bad_geometry_reserves_nothing() {
        let mut rig = Rig::new(84_000_000, 16 * 96);
        let config = Config {
            height: 0,
            ..Config::default()
        };
        assert_eq!(rig.configure(&config).unwrap_err(), Error::BadGeometry);
        assert!(rig.pool.free);
        assert!(!rig.provider.is_lent());
    }

    #[test]
    fn oversized_geometry_is_an_error() {
        let mut rig = Rig::new(84_000_000, 16 * 96);
        for &height in &[usize::MAX / 2, usize::MAX / 200] {
            let config = Config {
                height,
                ..Config::default()
            };
            assert_eq!(
                rig.configure(&config).unwrap_err(),
                Error::BadGeometry
            );
            assert!(rig.pool.free);
            assert!(!rig.provider.is_lent());
        }
    }

    #[test]
    fn prepare_then_abandon() {
        let mut rig = Rig::new(84_000_000, 16 * 96);
        let (_, shifter) = rig.parts(42_000_000);
        let p = prepare(
            &Config::default(),
            &shifter,
            &mut rig.pool,
            &mut rig.provider,
        )
        .unwrap();
        assert_eq!(p.ticks_per_line(), 5376);
        assert_eq!(p.geometry().stride(), 16);
        assert!(!rig.pool.free);
        assert!(rig.provider.is_lent());

        p.abandon(&mut rig.pool, &mut rig.provider);
        assert!(rig.pool.free);
        assert!(!rig.provider.is_lent());
        assert!(rig.take_log().is_empty());
    }

    #[test]
    fn expiry_is_bracketed_by_mask() {
        let mut rig = Rig::new(84_000_000, 16 * 96);
        let (mut s, _fb) = rig.configure(&Config::default()).unwrap();
        rig.take_log();

        for _ in 0..2500 {
            s.on_expiry();
            let log = rig.take_log();
            assert_eq!(log[0], Ev::Mask);
            assert_eq!(log[1], Ev::Ack);
            assert_eq!(*log.last().unwrap(), Ev::Unmask);
            let periods = log
                .iter()
                .filter(|e| match e {
                    Ev::Period(_) => true,
                    _ => false,
                })
                .count();
            assert_eq!(periods, 1);
        }
    }

    #[test]
    fn line_zero_first_expiry() {
        let mut rig = Rig::new(84_000_000, 16 * 96);
        let (mut s, _fb) = rig.configure(&Config::default()).unwrap();
        rig.take_log();

        s.on_expiry();
        assert_eq!(
            rig.take_log(),
            [
                Ev::Mask,
                Ev::Ack,
                Ev::Period(2268),
                Ev::Sync(Level::Low),
                Ev::Unmask,
            ]
        );
        assert_eq!(s.phase(), Phase::Sync1End);
    }

    #[test]
    fn visible_line_scans_out_its_row() {
        let mut rig = Rig::new(84_000_000, 16 * 96);
        let (mut s, fb) = rig.configure(&Config::default()).unwrap();
        let base = fb.as_ptr() as usize;

        run_to_line(&mut s, 165);
        rig.take_log();

        s.on_expiry(); // Sync1Start
        s.on_expiry(); // Sync1End
        rig.take_log();

        s.on_expiry(); // VidStart
        assert_eq!(
            rig.take_log(),
            [
                Ev::Mask,
                Ev::Ack,
                Ev::Period(3696),
                Ev::Mode(VideoMode::Shift),
                Ev::Arm(base + 48 * 16, 16),
                Ev::Unmask,
            ]
        );

        s.on_expiry(); // VidBackporch
        assert_eq!(
            rig.take_log(),
            [
                Ev::Mask,
                Ev::Ack,
                Ev::Period(588),
                Ev::Mode(VideoMode::Logic),
                Ev::Unmask,
            ]
        );
        assert_eq!(s.line().index(), 166);
    }

    #[test]
    fn blank_visible_line_does_not_arm() {
        let mut rig = Rig::new(84_000_000, 16 * 96);
        let (mut s, _fb) = rig.configure(&Config::default()).unwrap();
        // Visible (porches and all) but inside the blanking allowance.
        run_to_line(&mut s, 20);
        rig.take_log();
        for _ in 0..4 {
            s.on_expiry();
        }
        let log = rig.take_log();
        assert!(!log.iter().any(|e| match e {
            Ev::Arm(..) | Ev::Mode(VideoMode::Shift) => true,
            _ => false,
        }));
        assert!(log.contains(&Ev::Mode(VideoMode::Logic)));
    }

    #[test]
    fn full_frame() {
        let mut rig = Rig::new(84_000_000, 16 * 96);
        let (mut s, fb) = rig.configure(&Config::default()).unwrap();
        let base = fb.as_ptr() as usize;
        rig.take_log();

        for _ in 0..625 {
            for _ in 0..4 {
                s.on_expiry();
            }
        }
        assert_eq!(s.line(), Line::FIRST);
        assert_eq!(s.phase(), Phase::Sync1Start);
        assert_eq!(s.frames(), 1);

        let rows: Vec<usize> = rig
            .take_log()
            .iter()
            .filter_map(|e| match *e {
                Ev::Arm(addr, len) => {
                    assert_eq!(len, 16);
                    Some((addr - base) / 16)
                }
                _ => None,
            })
            .collect();
        // Both fields show the whole picture, top to bottom.
        assert_eq!(rows.len(), 2 * 270);
        assert_eq!(rows[..270], rows[270..]);
        assert_eq!(rows[0], 0);
        assert_eq!(rows[269], 95);
        assert!(rows[..270].windows(2).all(|w| w[0] <= w[1]));
    }
}
