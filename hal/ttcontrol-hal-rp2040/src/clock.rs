//! System clock and project clock output
//!
//! - [`Rp2040SystemClock`] relocks PLL_SYS at a new frequency
//! - [`PwmClockPin`] drives GPIO0 from PWM slice 0, channel A
//! - [`SoftSquareWave`] toggles the same pin from an embassy task for
//!   frequencies below the PWM range

use core::cell::RefCell;

use embassy_futures::select::{select, Either};
use embassy_rp::pac;
use embassy_rp::pac::clocks::vals::{ClkSysCtrlAuxsrc, ClkSysCtrlSrc};
use embassy_rp::peripherals::{PIN_0, PWM_SLICE0};
use embassy_rp::pwm::{Config as PwmConfig, Pwm};
use embassy_rp::Peri;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::signal::Signal;
use embassy_time::Timer;
use fixed::types::extra::U4;
use fixed::FixedU16;

use ttcontrol_core::clock::{pll_settings, ClockError, PllSettings};
use ttcontrol_hal::{ClockPin, PwmSettings, SquareWaveGenerator, SystemClock};

// ============================================================================
// System clock
// ============================================================================

/// PLL_SYS-driven system clock
pub struct Rp2040SystemClock {
    hz: u32,
}

impl Rp2040SystemClock {
    /// Take over the system clock as configured by `embassy_rp::init`
    pub fn new() -> Self {
        Self {
            hz: embassy_rp::clocks::clk_sys_freq(),
        }
    }
}

impl Default for Rp2040SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemClock for Rp2040SystemClock {
    type Error = ClockError;

    fn set_frequency(&mut self, hz: u32) -> Result<(), Self::Error> {
        let settings = pll_settings(hz)?;
        cortex_m::interrupt::free(|_| relock_pll_sys(&settings));
        self.hz = hz;
        #[cfg(feature = "defmt")]
        defmt::debug!(
            "clk_sys {} Hz (refdiv {} fbdiv {} post {}/{})",
            hz,
            settings.refdiv,
            settings.fbdiv,
            settings.postdiv1,
            settings.postdiv2
        );
        Ok(())
    }

    fn frequency(&self) -> u32 {
        self.hz
    }
}

/// Park clk_sys on clk_ref, relock PLL_SYS, switch back
fn relock_pll_sys(settings: &PllSettings) {
    let clocks = pac::CLOCKS;
    let pll = pac::PLL_SYS;

    // clk_sys must not run from the PLL while it relocks
    clocks
        .clk_sys_ctrl()
        .modify(|w| w.set_src(ClkSysCtrlSrc::CLK_REF));
    while clocks.clk_sys_selected().read() != 1 << ClkSysCtrlSrc::CLK_REF as u32 {}

    pll.pwr().write(|w| {
        w.set_pd(true);
        w.set_vcopd(true);
        w.set_postdivpd(true);
        w.set_dsmpd(true);
    });
    pll.fbdiv_int().write(|w| w.set_fbdiv_int(0));

    pll.cs().write(|w| w.set_refdiv(settings.refdiv));
    pll.fbdiv_int().write(|w| w.set_fbdiv_int(settings.fbdiv));
    pll.pwr().modify(|w| {
        w.set_pd(false);
        w.set_vcopd(false);
    });
    while !pll.cs().read().lock() {}

    pll.prim().write(|w| {
        w.set_postdiv1(settings.postdiv1);
        w.set_postdiv2(settings.postdiv2);
    });
    pll.pwr().modify(|w| w.set_postdivpd(false));

    clocks.clk_sys_ctrl().modify(|w| {
        w.set_auxsrc(ClkSysCtrlAuxsrc::CLKSRC_PLL_SYS);
        w.set_src(ClkSysCtrlSrc::CLKSRC_CLK_SYS_AUX);
    });
    while clocks.clk_sys_selected().read() != 1 << ClkSysCtrlSrc::CLKSRC_CLK_SYS_AUX as u32 {}
}

// ============================================================================
// Clock pin
// ============================================================================

/// The clock PWM, shared between the controller and the square wave task
static CLOCK_PWM: Mutex<CriticalSectionRawMutex, RefCell<Option<Pwm<'static>>>> =
    Mutex::new(RefCell::new(None));

fn level_config(high: bool) -> PwmConfig {
    let mut config = PwmConfig::default();
    // Counter stuck at 0: output is high iff 0 < compare
    config.top = 0;
    config.compare_a = high as u16;
    config
}

fn with_pwm(f: impl FnOnce(&mut Pwm<'static>)) {
    CLOCK_PWM.lock(|cell| {
        if let Some(pwm) = cell.borrow_mut().as_mut() {
            f(pwm);
        }
    });
}

/// Handle to the project clock output
///
/// Every handle drives the same PWM channel.
#[derive(Clone, Copy)]
pub struct PwmClockPin {
    _private: (),
}

impl PwmClockPin {
    /// Claim GPIO0 for PWM slice 0 and hold it low
    pub fn new(slice: Peri<'static, PWM_SLICE0>, pin: Peri<'static, PIN_0>) -> Self {
        let pwm = Pwm::new_output_a(slice, pin, level_config(false));
        CLOCK_PWM.lock(|cell| cell.replace(Some(pwm)));
        Self { _private: () }
    }
}

impl ClockPin for PwmClockPin {
    fn set_pwm(&mut self, settings: PwmSettings) {
        let mut config = PwmConfig::default();
        config.divider = FixedU16::<U4>::from_bits(settings.divider_bits());
        config.top = settings.top;
        config.compare_a = settings.compare;
        with_pwm(|pwm| pwm.set_config(&config));
    }

    fn set_level(&mut self, high: bool) {
        let config = level_config(high);
        with_pwm(|pwm| pwm.set_config(&config));
    }
}

// ============================================================================
// Software square wave
// ============================================================================

/// Requested half period, `None` to stop
static WAVE_REQUEST: Signal<CriticalSectionRawMutex, Option<u32>> = Signal::new();

/// Controller side of the software square wave
///
/// The edges are produced by [`run_square_wave`], which must be running
/// in its own task.
#[derive(Default)]
pub struct SoftSquareWave {
    running: bool,
}

impl SoftSquareWave {
    pub fn new() -> Self {
        Self { running: false }
    }
}

impl SquareWaveGenerator for SoftSquareWave {
    fn start(&mut self, half_period_us: u32) {
        WAVE_REQUEST.signal(Some(half_period_us));
        self.running = true;
    }

    fn stop(&mut self) {
        WAVE_REQUEST.signal(None);
        self.running = false;
    }

    fn is_running(&self) -> bool {
        self.running
    }
}

/// Toggle the clock pin as requested through [`SoftSquareWave`]
///
/// A stop request leaves the pin alone: by the time it is seen, the
/// controller may already have handed the pin to the PWM.
pub async fn run_square_wave(mut pin: PwmClockPin) -> ! {
    let mut half_period_us: Option<u32> = None;
    let mut high = false;

    loop {
        let Some(us) = half_period_us else {
            half_period_us = WAVE_REQUEST.wait().await;
            high = false;
            continue;
        };

        match select(WAVE_REQUEST.wait(), Timer::after_micros(us as u64)).await {
            Either::First(request) => {
                half_period_us = request;
                high = false;
            }
            Either::Second(()) => {
                high = !high;
                pin.set_level(high);
            }
        }
    }
}
