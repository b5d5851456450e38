//! ttcontrol Hardware Abstraction Layer
//!
//! This crate defines the hardware-access traits the rest of the workspace
//! is written against. Chip-specific HALs implement them, host tests mock
//! them.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  ttcontrol-firmware                     │
//! └─────────────────────────────────────────┘
//!                     │
//!         ┌───────────┴───────────┐
//!         ▼                       ▼
//! ┌───────────────┐       ┌───────────────┐
//! │ ttcontrol-    │       │ ttcontrol-    │
//! │   drivers     │──────▶│    core       │
//! └───────────────┘       └───────────────┘
//!         │                       │
//!         ▼                       ▼
//! ┌─────────────────────────────────────────┐
//! │  ttcontrol-hal (this crate - traits)    │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  ttcontrol-hal-rp2040                   │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Traits
//!
//! - [`gpio::OutputPin`], [`gpio::InputPin`], [`gpio::FlexPin`] - Digital I/O
//! - [`spi::SpiBus`] - Synchronous serial bus
//! - [`clock::SystemClock`], [`clock::ClockPin`],
//!   [`clock::SquareWaveGenerator`] - Project clock generation
//! - [`interrupt::HostInterrupt`] - Host cancel-character masking
//! - [`flash::ConfigStore`] - Saved board configuration records

#![no_std]
#![deny(unsafe_code)]

pub mod clock;
pub mod flash;
pub mod gpio;
pub mod interrupt;
pub mod spi;

// Re-export key traits at crate root for convenience
pub use clock::{ClockPin, PwmSettings, SquareWaveGenerator, SystemClock};
pub use flash::{ConfigRecord, ConfigStore, StorageError};
pub use gpio::{FlexPin, InputPin, IoPin, OutputPin};
pub use interrupt::HostInterrupt;
pub use spi::SpiBus;
