//! Project clock abstractions
//!
//! The project clock is produced in one of three ways:
//! - a PWM slice dividing the system clock (the normal case),
//! - a software square wave for frequencies the PWM cannot reach,
//! - single manual pulses driven by the controller.
//!
//! Reaching a requested PWM frequency usually means retuning the system
//! clock as well, so that capability is exposed here too.

/// System clock control
///
/// Reprogramming the system clock affects every peripheral clocked from it.
/// Callers must not reconfigure the clock concurrently.
pub trait SystemClock {
    /// Error type for clock reconfiguration
    type Error;

    /// Switch the system clock to `hz`
    fn set_frequency(&mut self, hz: u32) -> Result<(), Self::Error>;

    /// Current system clock frequency in Hz
    fn frequency(&self) -> u32;
}

/// PWM register settings for the clock output
///
/// The output period in system clock cycles is
/// `(top + 1) * (div_int + div_frac / 16)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PwmSettings {
    /// Integer part of the clock divider (1-255)
    pub div_int: u8,
    /// Fractional part of the clock divider in sixteenths (0-15)
    pub div_frac: u8,
    /// Counter wrap value
    pub top: u16,
    /// Compare value (output high while counter < compare)
    pub compare: u16,
}

impl PwmSettings {
    /// Divider as a 8.4 fixed-point value
    pub fn divider_bits(&self) -> u16 {
        ((self.div_int as u16) << 4) | (self.div_frac as u16 & 0x0F)
    }

    /// Output period in sixteenths of a system clock cycle
    pub fn period_x16(&self) -> u64 {
        (self.top as u64 + 1) * self.divider_bits() as u64
    }
}

/// Output pin carrying the project clock
pub trait ClockPin {
    /// Drive the pin from the PWM with the given settings
    fn set_pwm(&mut self, settings: PwmSettings);

    /// Hold the pin at a static level (PWM output disabled)
    fn set_level(&mut self, high: bool);
}

impl<T: ClockPin + ?Sized> ClockPin for &mut T {
    fn set_pwm(&mut self, settings: PwmSettings) {
        T::set_pwm(self, settings)
    }

    fn set_level(&mut self, high: bool) {
        T::set_level(self, high)
    }
}

/// Software-timed square wave on the clock pin
///
/// Used for frequencies below what the PWM can represent. The generator
/// owns the timing; the period is given as half a cycle so that the
/// implementation only ever waits a fixed time between edges.
pub trait SquareWaveGenerator {
    /// Start toggling with `half_period_us` between edges
    ///
    /// Replaces any wave already running.
    fn start(&mut self, half_period_us: u32);

    /// Stop toggling and leave the pin low
    fn stop(&mut self);

    /// Check if a wave is currently being generated
    fn is_running(&self) -> bool;
}

impl<T: SquareWaveGenerator + ?Sized> SquareWaveGenerator for &mut T {
    fn start(&mut self, half_period_us: u32) {
        T::start(self, half_period_us)
    }

    fn stop(&mut self) {
        T::stop(self)
    }

    fn is_running(&self) -> bool {
        T::is_running(self)
    }
}
