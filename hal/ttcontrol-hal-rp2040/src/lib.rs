//! RP2040-specific HAL for the demo board firmware
//!
//! This crate provides RP2040 implementations of the shared
//! `ttcontrol-hal` traits, plus RP2040-specific functionality:
//!
//! - GPIO allocation by number for config-driven setup
//! - GPIO wrappers implementing the pin traits
//! - System PLL reprogramming
//! - PWM project clock output and the software square wave
//! - Host interrupt character flag
//! - Configuration record store in the boot flash

#![no_std]

pub mod clock;
pub mod flash;
pub mod gpio;
pub mod interrupt;
pub mod pins;

pub use clock::{run_square_wave, PwmClockPin, Rp2040SystemClock, SoftSquareWave};
pub use flash::Rp2040ConfigStore;
pub use gpio::{FlexIo, InputIo, OutputIo};
pub use interrupt::HostInterruptFlag;
pub use pins::{PinBank, PinError, RemainingPeripherals};
