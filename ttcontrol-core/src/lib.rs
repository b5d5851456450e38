//! Board-agnostic core logic for the demo board controller
//!
//! This crate contains all application logic that does not depend on
//! specific hardware implementations:
//!
//! - Project clock synthesis (system clock, PLL and PWM divider math)
//! - SPI NOR flash geometry, command encoding and the streamed
//!   programming session
//! - Chip ROM decoding
//! - Driver traits the firmware wires to real hardware
//! - Configuration type definitions

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

pub mod clock;
pub mod config;
pub mod flash;
pub mod rom;
pub mod traits;
