//! Hardware driver implementations
//!
//! This crate provides concrete implementations of the traits defined
//! in ttcontrol-core, written against the ttcontrol-hal traits:
//!
//! - SPI NOR flash device with chip-select framing and busy polling
//! - Bit-banged SPI master over GPIO
//! - Project clock controller (PLL + PWM, software square wave, manual)
//! - Design mux sequencing
//! - Project I/O pin groups

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

#[macro_use]
mod log;

pub mod bitbang;
pub mod clock;
pub mod mux;
pub mod project;
pub mod spi_nor;

#[cfg(test)]
mod mock;

pub use bitbang::BitBangSpi;
pub use clock::{AppliedClock, ClockController, ClockMode, ControllerError};
pub use mux::DesignMux;
pub use project::{FlashPins, InputState, ProjectPins};
pub use spi_nor::{ChipSelectGuard, FlashDevice};
