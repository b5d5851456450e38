//! Simple TOML parser for the board configuration
//!
//! This is a minimal TOML parser that handles only the subset needed for
//! `board.toml`. It does NOT support full TOML syntax.
//!
//! Supported features:
//! - Key = value pairs (string, integer, boolean)
//! - Integers with `_` separators or a `0x` prefix
//! - [section] headers
//! - Single-line arrays of strings for the pin buses
//! - Comments (# ...)
//!
//! NOT supported:
//! - Multi-line strings or arrays
//! - Nested tables
//! - Dotted keys

use alloc::vec::Vec;
use heapless::String as HString;

use ttcontrol_core::config::{BoardConfig, PinConfig, BUS_WIDTH, MAX_GPIO};

/// Parse error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ParseError {
    /// Unknown section header
    InvalidSection,
    /// Unknown key in a known section
    UnknownKey,
    /// Invalid value type
    InvalidValue,
    /// Invalid pin string
    InvalidPin,
}

/// Current parsing context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Root,
    Board,
    Pins,
    Clock,
    Project,
    Flash,
}

/// Parse TOML configuration into BoardConfig
///
/// Keys that are not present keep their defaults. The result is not
/// validated; call [`BoardConfig::validate`] on it.
pub fn parse_config(input: &str) -> Result<BoardConfig, ParseError> {
    let mut config = BoardConfig::new();
    let mut section = Section::Root;

    for line in input.lines() {
        let line = strip_comment(line).trim();

        if line.is_empty() {
            continue;
        }

        if line.starts_with('[') && line.ends_with(']') {
            section = parse_section_header(&line[1..line.len() - 1])?;
            continue;
        }

        if let Some((key, value)) = parse_key_value(line) {
            apply_value(section, key, value, &mut config)?;
        }
    }

    Ok(config)
}

fn parse_section_header(header: &str) -> Result<Section, ParseError> {
    match header.trim() {
        "board" => Ok(Section::Board),
        "pins" => Ok(Section::Pins),
        "clock" => Ok(Section::Clock),
        "project" => Ok(Section::Project),
        "flash" => Ok(Section::Flash),
        _ => Err(ParseError::InvalidSection),
    }
}

/// Drop a trailing `# comment`, leaving `#` inside strings alone
fn strip_comment(line: &str) -> &str {
    let mut in_string = false;
    for (i, c) in line.char_indices() {
        match c {
            '"' => in_string = !in_string,
            '#' if !in_string => return &line[..i],
            _ => {}
        }
    }
    line
}

/// Split "key = value"
fn parse_key_value(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.split_once('=')?;
    let key = key.trim();
    let value = value.trim();
    if key.is_empty() || value.is_empty() {
        return None;
    }
    Some((key, value))
}

/// Parse a string value (removes quotes)
fn parse_string(value: &str) -> Result<&str, ParseError> {
    if value.starts_with('"') && value.ends_with('"') && value.len() >= 2 {
        Ok(&value[1..value.len() - 1])
    } else {
        // Allow unquoted strings for simple values
        Ok(value)
    }
}

/// Parse an integer value, decimal or `0x` hex, `_` separators allowed
fn parse_int<T: TryFrom<u32>>(value: &str) -> Result<T, ParseError> {
    let mut digits: HString<24> = HString::new();
    for c in value.chars().filter(|&c| c != '_') {
        digits.push(c).map_err(|_| ParseError::InvalidValue)?;
    }

    let parsed = match digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => digits.parse::<u32>(),
    }
    .map_err(|_| ParseError::InvalidValue)?;

    T::try_from(parsed).map_err(|_| ParseError::InvalidValue)
}

/// Parse a boolean value
fn parse_bool(value: &str) -> Result<bool, ParseError> {
    match value {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(ParseError::InvalidValue),
    }
}

/// Parse a pin string like "gpio11", "!gpio12", "^gpio4"
fn parse_pin(value: &str) -> Result<PinConfig, ParseError> {
    let mut s = parse_string(value)?;
    let mut inverted = false;
    let mut pull_up = false;

    // Check for modifiers
    loop {
        if let Some(rest) = s.strip_prefix('!') {
            inverted = true;
            s = rest;
        } else if let Some(rest) = s.strip_prefix('^') {
            pull_up = true;
            s = rest;
        } else {
            break;
        }
    }

    let number = s.strip_prefix("gpio").ok_or(ParseError::InvalidPin)?;
    let pin: u8 = number.parse().map_err(|_| ParseError::InvalidPin)?;

    Ok(PinConfig {
        pin,
        inverted,
        pull_up,
    })
}

/// Parse a bus: the first of eight consecutive GPIOs, or a list of eight
fn parse_bus(value: &str) -> Result<[PinConfig; BUS_WIDTH], ParseError> {
    let Some(inner) = value.strip_prefix('[').and_then(|v| v.strip_suffix(']')) else {
        let first = parse_pin(value)?;
        if first.pin > MAX_GPIO {
            return Err(ParseError::InvalidPin);
        }
        let mut bus = PinConfig::bus(first.pin);
        for pin in bus.iter_mut() {
            pin.inverted = first.inverted;
            pin.pull_up = first.pull_up;
        }
        return Ok(bus);
    };

    let pins: Vec<&str> = inner
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    if pins.len() != BUS_WIDTH {
        return Err(ParseError::InvalidValue);
    }

    let mut bus = [PinConfig::default(); BUS_WIDTH];
    for (slot, text) in bus.iter_mut().zip(pins) {
        *slot = parse_pin(text)?;
    }
    Ok(bus)
}

/// Apply a key-value pair to the current section
fn apply_value(
    section: Section,
    key: &str,
    value: &str,
    config: &mut BoardConfig,
) -> Result<(), ParseError> {
    match section {
        Section::Root => return Err(ParseError::UnknownKey),
        Section::Board => match key {
            "name" => {
                config.name =
                    HString::try_from(parse_string(value)?).map_err(|_| ParseError::InvalidValue)?;
            }
            _ => return Err(ParseError::UnknownKey),
        },
        Section::Pins => {
            let pins = &mut config.pins;
            match key {
                "clk" => pins.clk = parse_pin(value)?,
                "rst_n" => pins.rst_n = parse_pin(value)?,
                "ctrl_ena" => pins.ctrl_ena = parse_pin(value)?,
                "ctrl_sel_rst_n" => pins.ctrl_sel_rst_n = parse_pin(value)?,
                "ctrl_sel_inc" => pins.ctrl_sel_inc = parse_pin(value)?,
                "ui_in" => pins.ui_in = parse_bus(value)?,
                "uo_out" => pins.uo_out = parse_bus(value)?,
                "uio" => pins.uio = parse_bus(value)?,
                _ => return Err(ParseError::UnknownKey),
            }
        }
        Section::Clock => match key {
            "max_system_hz" => config.clock.max_system_hz = parse_int(value)?,
            "default_hz" => config.clock.default_hz = parse_int(value)?,
            _ => return Err(ParseError::UnknownKey),
        },
        Section::Project => match key {
            "default_design" => config.project.default_design = parse_int(value)?,
            "rom_design" => config.project.rom_design = parse_int(value)?,
            "ui_in_enabled" => config.project.ui_in_enabled = parse_bool(value)?,
            _ => return Err(ParseError::UnknownKey),
        },
        Section::Flash => {
            let flash = &mut config.flash;
            match key {
                "page_size" => flash.geometry.page_size = parse_int(value)?,
                "erase_size" => flash.geometry.erase_size = parse_int(value)?,
                "busy_timeout" => flash.geometry.busy_timeout = parse_int(value)?,
                "verify" => flash.verify = parse_bool(value)?,
                "spi_hz" => flash.spi_hz = parse_int(value)?,
                "sck" => flash.sck = parse_int(value)?,
                "mosi" => flash.mosi = parse_int(value)?,
                "miso" => flash.miso = parse_int(value)?,
                "cs" => flash.cs = parse_int(value)?,
                _ => return Err(ParseError::UnknownKey),
            }
        }
    }
    Ok(())
}
