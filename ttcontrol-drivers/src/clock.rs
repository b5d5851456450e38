//! Project clock controller
//!
//! Owns the system clock, the clock output pin and the software square
//! wave, and keeps them consistent: at most one source drives the pin.
//!
//! | Request       | Source                                   |
//! |---------------|------------------------------------------|
//! | 0 Hz          | none, pin held low                       |
//! | 1..=2 Hz      | software square wave                     |
//! | 3 Hz and up   | PWM from a retuned system clock          |

use embedded_hal::delay::DelayNs;
use ttcontrol_core::clock::{plan, pwm_settings, ClockError, MIN_PWM_FREQUENCY_HZ};
use ttcontrol_hal::{ClockPin, SquareWaveGenerator, SystemClock};

/// Half a manual clock cycle
const PULSE_HALF_PERIOD_US: u32 = 10;

/// Microseconds in half a second
const HALF_SECOND_US: u32 = 500_000;

/// What currently drives the clock pin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClockMode {
    /// Pin held low; only manual pulses
    Stopped,
    /// Hardware PWM
    Pwm,
    /// Software square wave
    Software,
}

/// Result of a successful frequency change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AppliedClock {
    /// Frequency now on the pin, 0 when stopped
    pub hz: u32,
    /// Evenly dividing alternative when `hz` is only approximated
    pub jitter_free_hz: Option<u32>,
}

/// Clock controller errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ControllerError<E> {
    /// No plan for the requested frequency
    Clock(ClockError),
    /// The system clock refused the new frequency
    System(E),
}

impl<E> From<ClockError> for ControllerError<E> {
    fn from(e: ClockError) -> Self {
        ControllerError::Clock(e)
    }
}

impl<E> ControllerError<E> {
    pub fn as_str(&self) -> &'static str {
        match self {
            ControllerError::Clock(e) => e.as_str(),
            ControllerError::System(_) => "system_clock",
        }
    }
}

/// Drives the project clock pin
pub struct ClockController<S, P, W> {
    system: S,
    pin: P,
    wave: W,
    max_system_hz: u32,
    hz: u32,
    mode: ClockMode,
}

impl<S, P, W> ClockController<S, P, W>
where
    S: SystemClock,
    P: ClockPin,
    W: SquareWaveGenerator,
{
    /// Create a stopped controller
    pub fn new(system: S, mut pin: P, mut wave: W, max_system_hz: u32) -> Self {
        wave.stop();
        pin.set_level(false);
        Self {
            system,
            pin,
            wave,
            max_system_hz,
            hz: 0,
            mode: ClockMode::Stopped,
        }
    }

    /// Frequency currently applied by the automatic clock, 0 when stopped
    pub fn frequency(&self) -> u32 {
        self.hz
    }

    pub fn mode(&self) -> ClockMode {
        self.mode
    }

    pub fn system_clock_hz(&self) -> u32 {
        self.system.frequency()
    }

    pub fn max_system_hz(&self) -> u32 {
        self.max_system_hz
    }

    /// Give back the system clock, pin and square wave generator
    pub fn release(self) -> (S, P, W) {
        (self.system, self.pin, self.wave)
    }

    /// Run the project clock at `hz`
    ///
    /// The request is planned before anything changes; an impossible
    /// frequency leaves the running clock untouched.
    pub fn set_frequency(&mut self, hz: u32) -> Result<AppliedClock, ControllerError<S::Error>> {
        if hz == 0 {
            self.stop();
            return Ok(AppliedClock {
                hz: 0,
                jitter_free_hz: None,
            });
        }

        if hz < MIN_PWM_FREQUENCY_HZ {
            self.pin.set_level(false);
            self.wave.start(HALF_SECOND_US / hz);
            self.hz = hz;
            self.mode = ClockMode::Software;
            debug!("clock {} Hz (software)", hz);
            return Ok(AppliedClock {
                hz,
                jitter_free_hz: None,
            });
        }

        let plan = plan(hz, self.max_system_hz)?;

        if self.wave.is_running() {
            self.wave.stop();
        }
        if self.system.frequency() != plan.system_clock_hz {
            if let Err(e) = self.system.set_frequency(plan.system_clock_hz) {
                warn!("system clock change to {} Hz failed", plan.system_clock_hz);
                self.pin.set_level(false);
                self.hz = 0;
                self.mode = ClockMode::Stopped;
                return Err(ControllerError::System(e));
            }
        }
        self.pin.set_pwm(pwm_settings(plan.divisor));

        self.hz = plan.achieved_hz();
        self.mode = ClockMode::Pwm;
        debug!(
            "clock {} Hz = {} / {}",
            self.hz,
            plan.system_clock_hz,
            plan.divisor
        );

        Ok(AppliedClock {
            hz: self.hz,
            jitter_free_hz: plan.jitter_free_hz,
        })
    }

    /// Stop automatic clocking and hold the pin low
    pub fn stop(&mut self) {
        if self.wave.is_running() {
            self.wave.stop();
        }
        self.pin.set_level(false);
        self.hz = 0;
        self.mode = ClockMode::Stopped;
    }

    /// Emit one full clock cycle, stopping automatic clocking first
    pub fn pulse<D: DelayNs>(&mut self, delay: &mut D) {
        if self.mode != ClockMode::Stopped {
            self.stop();
        }
        self.pin.set_level(true);
        delay.delay_us(PULSE_HALF_PERIOD_US);
        self.pin.set_level(false);
        delay.delay_us(PULSE_HALF_PERIOD_US);
    }
}
