//! Chip identification ROM
//!
//! The ROM design answers the byte at address `ui_in` on `uo_out`. The
//! first two bytes hold the 7-segment glyph for "t"; from address 32 on,
//! the ROM holds NUL-terminated text of `key=value` lines describing the
//! shuttle:
//!
//! ```text
//! shuttle=tt04
//! repo=TinyTapeout/tinytapeout-04
//! commit=3f8a21c0
//! ```

use embedded_hal::delay::DelayNs;
use heapless::{String, Vec};

use crate::traits::ProjectIo;

/// Number of ROM bytes read
pub const ROM_SIZE: usize = 128;

/// Address where the text section starts
pub const TEXT_START: usize = 32;

/// 7-segment glyph at addresses 0 and 1
pub const ROM_MAGIC: u8 = 0x78;

/// Maximum decoded entries
pub const MAX_ROM_ENTRIES: usize = 8;

pub const MAX_KEY_LEN: usize = 16;
pub const MAX_VALUE_LEN: usize = ROM_SIZE - TEXT_START;

/// Settle time between writing an address and sampling the data
const SETTLE_US: u32 = 1_000;

/// ROM decoding errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RomError {
    /// Magic glyph missing; the selected design is not the ROM
    NotPresent,
    /// Text section is not valid UTF-8
    InvalidText,
    /// A field every factory ROM carries is missing
    MissingEntry,
}

/// One `key=value` ROM entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RomEntry {
    pub key: String<MAX_KEY_LEN>,
    pub value: String<MAX_VALUE_LEN>,
}

/// Decoded ROM contents
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RomContents {
    entries: Vec<RomEntry, MAX_ROM_ENTRIES>,
}

impl RomContents {
    /// Decode a raw ROM image
    ///
    /// Lines without `=`, and entries past the first eight or too long
    /// to store, are skipped.
    pub fn decode(raw: &[u8]) -> Result<Self, RomError> {
        if raw.len() < 2 || raw[0] != ROM_MAGIC || raw[1] != ROM_MAGIC {
            return Err(RomError::NotPresent);
        }

        let text = raw.get(TEXT_START..).unwrap_or(&[]);
        let end = text.iter().position(|&b| b == 0).unwrap_or(text.len());
        let text = core::str::from_utf8(&text[..end]).map_err(|_| RomError::InvalidText)?;

        let mut entries = Vec::new();
        for line in text.lines() {
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let (Ok(key), Ok(value)) = (String::try_from(key.trim()), String::try_from(value.trim()))
            else {
                continue;
            };
            if entries.push(RomEntry { key, value }).is_err() {
                break;
            }
        }

        Ok(Self { entries })
    }

    /// All decoded entries in ROM order
    pub fn entries(&self) -> &[RomEntry] {
        &self.entries
    }

    /// Look up an entry by key
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.key.as_str() == key)
            .map(|e| e.value.as_str())
    }

    /// Shuttle name, or `unknown`
    pub fn shuttle(&self) -> &str {
        self.get("shuttle").filter(|s| !s.is_empty()).unwrap_or("unknown")
    }
}

/// Decode a ROM image and check it looks like a factory ROM
///
/// Factory ROMs always name the shuttle and its repository.
pub fn check_factory_rom(raw: &[u8]) -> Result<RomContents, RomError> {
    let rom = RomContents::decode(raw)?;
    if rom.get("shuttle").is_none() || rom.get("repo").is_none() {
        return Err(RomError::MissingEntry);
    }
    Ok(rom)
}

/// Read the raw ROM image through the project pins
///
/// The ROM design must be selected and the controller must be driving
/// `ui_in`.
pub fn read_rom<P: ProjectIo, D: DelayNs>(io: &mut P, delay: &mut D) -> [u8; ROM_SIZE] {
    let mut raw = [0u8; ROM_SIZE];
    for (address, byte) in raw.iter_mut().enumerate() {
        io.write_ui_in(address as u8);
        delay.delay_us(SETTLE_US);
        *byte = io.read_uo_out();
    }
    raw
}
