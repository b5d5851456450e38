//! Driver traits
//!
//! These traits define the interface between the application logic
//! and the drivers the firmware wires to real hardware.

pub mod flash;
pub mod project;

pub use flash::SpiFlash;
pub use project::ProjectIo;
