//! Configuration types
//!
//! Board-agnostic configuration structures. The firmware builds them from
//! `board.toml` and may persist them as postcard binary data.

pub mod hardware;

pub use hardware::*;
