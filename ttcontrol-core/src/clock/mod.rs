//! Project clock synthesis
//!
//! A project clock of `f` Hz is produced by running the system clock at
//! `s` Hz and dividing it by an even divisor `d` in a PWM slice, so that
//! `f = s / d`. The synthesizer searches the legal system clocks for the
//! pair that hits the target exactly, or as closely as possible.
//!
//! - [`synth`] picks the system clock and divisor
//! - [`pll`] finds the PLL register settings for a system clock
//! - [`pwm`] maps a divisor onto the PWM divider and wrap registers

pub mod pll;
pub mod pwm;
pub mod synth;

pub use pll::{pll_settings, PllSettings, XOSC_HZ};
pub use pwm::pwm_settings;
pub use synth::{
    plan, FrequencyPlan, MAX_DIVISOR, MIN_PWM_FREQUENCY_HZ, MIN_SYSTEM_CLOCK_HZ,
};

/// Clock synthesis errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClockError {
    /// Target frequency cannot be produced from the allowed system clocks
    FrequencyOutOfRange,
    /// Maximum system clock is below the lowest usable system clock
    SystemClockOutOfRange,
    /// No PLL configuration produces the requested system clock
    PllUnreachable,
}

impl ClockError {
    /// Short name used in `error=` reports
    pub fn as_str(&self) -> &'static str {
        match self {
            ClockError::FrequencyOutOfRange => "frequency_out_of_range",
            ClockError::SystemClockOutOfRange => "system_clock_out_of_range",
            ClockError::PllUnreachable => "pll_unreachable",
        }
    }
}
