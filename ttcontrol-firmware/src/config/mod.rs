//! Configuration loading and parsing
//!
//! Loads the board configuration from flash or the embedded `board.toml`.
//! Uses TOML format parsed by a custom no_std parser.

pub mod loader;
pub mod toml;

pub use loader::{ConfigError, ConfigPersistence};
pub use toml::parse_config;
