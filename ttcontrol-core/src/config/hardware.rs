//! Hardware configuration types
//!
//! These types define the board-level configuration: which GPIO carries
//! which project signal, the clock limits, start-up defaults and the SPI
//! flash wiring.

use heapless::String;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::clock::{MIN_SYSTEM_CLOCK_HZ, MIN_PWM_FREQUENCY_HZ};
use crate::flash::FlashGeometry;

/// Maximum label length
pub const MAX_LABEL_LEN: usize = 16;

/// Number of pins in each project bus
pub const BUS_WIDTH: usize = 8;

/// Highest GPIO number on the RP2040
pub const MAX_GPIO: u8 = 29;

/// Highest system clock the PLL search supports
pub const MAX_SYSTEM_CLOCK_HZ: u32 = 266_000_000;

/// Configuration format version
pub const CONFIG_VERSION: u8 = 1;

/// Upper bound on the postcard encoding of a [`BoardConfig`]
///
/// 29 pins at three bytes, a 17-byte name and at most 60 bytes of varint
/// clock, project and flash fields.
pub const MAX_ENCODED_CONFIG_LEN: usize = 256;

/// Configuration validation errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// GPIO number out of range
    InvalidPin(u8),
    /// GPIO assigned to more than one signal
    DuplicatePin(u8),
    /// Clock limits or default frequency unusable
    ClockOutOfRange,
    /// Flash page or erase sizes unusable
    InvalidFlashGeometry,
    /// Flash SPI signals must be four distinct bidirectional pins
    InvalidFlashPins,
    /// Stored configuration has an unknown version
    UnsupportedVersion(u8),
}

/// Pin configuration with optional inversion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PinConfig {
    /// GPIO pin number (0-29 for RP2040)
    pub pin: u8,
    /// Pin is active-low (inverted)
    pub inverted: bool,
    /// Enable internal pull-up
    pub pull_up: bool,
}

impl PinConfig {
    /// Create a new pin config
    pub const fn new(pin: u8) -> Self {
        Self {
            pin,
            inverted: false,
            pull_up: false,
        }
    }

    /// Create an inverted (active-low) pin
    pub const fn inverted(pin: u8) -> Self {
        Self {
            pin,
            inverted: true,
            pull_up: false,
        }
    }

    /// Create a pin with pull-up enabled
    pub const fn with_pullup(pin: u8) -> Self {
        Self {
            pin,
            inverted: false,
            pull_up: true,
        }
    }

    /// Eight consecutive GPIOs starting at `first`
    pub const fn bus(first: u8) -> [PinConfig; BUS_WIDTH] {
        let mut bus = [PinConfig::new(0); BUS_WIDTH];
        let mut i = 0;
        while i < BUS_WIDTH {
            bus[i] = PinConfig::new(first + i as u8);
            i += 1;
        }
        bus
    }
}

/// Assignment of project signals to GPIOs
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PinMap {
    /// Project clock output
    pub clk: PinConfig,
    /// Project reset (active low)
    pub rst_n: PinConfig,
    /// Design mux enable
    pub ctrl_ena: PinConfig,
    /// Design mux counter reset (active low)
    pub ctrl_sel_rst_n: PinConfig,
    /// Design mux counter increment
    pub ctrl_sel_inc: PinConfig,
    /// Project inputs
    pub ui_in: [PinConfig; BUS_WIDTH],
    /// Project outputs
    pub uo_out: [PinConfig; BUS_WIDTH],
    /// Bidirectional project pins
    pub uio: [PinConfig; BUS_WIDTH],
}

impl Default for PinMap {
    fn default() -> Self {
        Self {
            clk: PinConfig::new(0),
            rst_n: PinConfig::new(1),
            ctrl_sel_inc: PinConfig::new(2),
            ctrl_sel_rst_n: PinConfig::new(3),
            ctrl_ena: PinConfig::new(4),
            uo_out: PinConfig::bus(5),
            ui_in: PinConfig::bus(13),
            uio: PinConfig::bus(21),
        }
    }
}

impl PinMap {
    /// Every configured pin
    pub fn iter(&self) -> impl Iterator<Item = &PinConfig> {
        [
            &self.clk,
            &self.rst_n,
            &self.ctrl_ena,
            &self.ctrl_sel_rst_n,
            &self.ctrl_sel_inc,
        ]
        .into_iter()
        .chain(self.ui_in.iter())
        .chain(self.uo_out.iter())
        .chain(self.uio.iter())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let mut used: u32 = 0;
        for pin in self.iter() {
            if pin.pin > MAX_GPIO {
                return Err(ConfigError::InvalidPin(pin.pin));
            }
            let bit = 1u32 << pin.pin;
            if used & bit != 0 {
                return Err(ConfigError::DuplicatePin(pin.pin));
            }
            used |= bit;
        }
        Ok(())
    }
}

/// Project clock limits and defaults
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ClockConfig {
    /// Highest system clock the synthesizer may choose
    pub max_system_hz: u32,
    /// Project clock applied at start-up (0 = stopped)
    pub default_hz: u32,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            max_system_hz: 133_000_000,
            default_hz: 10_000_000,
        }
    }
}

/// Design selection defaults
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ProjectConfig {
    /// Design selected at start-up
    pub default_design: u16,
    /// Index of the chip ROM design
    pub rom_design: u16,
    /// Controller drives `ui_in` at start-up
    pub ui_in_enabled: bool,
}

/// SPI flash wiring and programming defaults
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FlashConfig {
    /// Page and erase-block layout
    pub geometry: FlashGeometry,
    /// Read back every page after programming
    pub verify: bool,
    /// SPI clock rate
    pub spi_hz: u32,
    /// Index into `uio` of each SPI signal
    pub sck: u8,
    pub mosi: u8,
    pub miso: u8,
    pub cs: u8,
}

impl Default for FlashConfig {
    fn default() -> Self {
        Self {
            geometry: FlashGeometry::default(),
            verify: true,
            spi_hz: 1_000_000,
            sck: 7,
            mosi: 1,
            miso: 2,
            cs: 6,
        }
    }
}

impl FlashConfig {
    /// Read-back choice for one programming command
    ///
    /// A command that does not say falls back to the board default.
    pub fn resolve_verify(&self, requested: Option<bool>) -> bool {
        requested.unwrap_or(self.verify)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !self.geometry.is_valid() {
            return Err(ConfigError::InvalidFlashGeometry);
        }

        let signals = [self.sck, self.mosi, self.miso, self.cs];
        let mut used: u8 = 0;
        for index in signals {
            if index as usize >= BUS_WIDTH || used & (1 << index) != 0 {
                return Err(ConfigError::InvalidFlashPins);
            }
            used |= 1 << index;
        }

        if self.spi_hz == 0 {
            return Err(ConfigError::InvalidFlashPins);
        }
        Ok(())
    }
}

/// Complete board configuration
///
/// This is the top-level configuration structure that contains all
/// hardware configuration and start-up defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BoardConfig {
    /// Configuration version for compatibility checks
    pub version: u8,
    /// Board name reported by `version()`
    pub name: String<MAX_LABEL_LEN>,
    pub pins: PinMap,
    pub clock: ClockConfig,
    pub project: ProjectConfig,
    pub flash: FlashConfig,
}

impl Default for BoardConfig {
    fn default() -> Self {
        let mut name = String::new();
        // Fits MAX_LABEL_LEN
        let _ = name.push_str("tt-demo");
        Self {
            version: CONFIG_VERSION,
            name,
            pins: PinMap::default(),
            clock: ClockConfig::default(),
            project: ProjectConfig::default(),
            flash: FlashConfig::default(),
        }
    }
}

impl BoardConfig {
    /// Create the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Check the configuration is usable
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != CONFIG_VERSION {
            return Err(ConfigError::UnsupportedVersion(self.version));
        }

        self.pins.validate()?;

        let clock = &self.clock;
        if !(MIN_SYSTEM_CLOCK_HZ..=MAX_SYSTEM_CLOCK_HZ).contains(&clock.max_system_hz) {
            return Err(ConfigError::ClockOutOfRange);
        }
        if clock.default_hz > clock.max_system_hz / 2 {
            return Err(ConfigError::ClockOutOfRange);
        }

        self.flash.validate()
    }

    /// Project clock to apply at start-up, if any
    pub fn startup_clock_hz(&self) -> Option<u32> {
        (self.clock.default_hz > 0).then_some(self.clock.default_hz)
    }

    /// Check if the start-up clock is generated in software
    pub fn startup_clock_is_soft(&self) -> bool {
        self.startup_clock_hz()
            .is_some_and(|hz| hz < MIN_PWM_FREQUENCY_HZ)
    }

    /// GPIO numbers of the flash SPI signals (sck, mosi, miso, cs)
    pub fn flash_gpios(&self) -> [u8; 4] {
        let uio = &self.pins.uio;
        let f = &self.flash;
        [
            uio[f.sck as usize].pin,
            uio[f.mosi as usize].pin,
            uio[f.miso as usize].pin,
            uio[f.cs as usize].pin,
        ]
    }
}
