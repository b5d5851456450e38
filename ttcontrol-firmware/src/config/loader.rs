//! Configuration persistence
//!
//! Loads the board configuration from the RP2040's own flash and saves
//! it back. Falls back to the embedded `board.toml` if flash is empty.

use core::str;
use defmt::*;

use ttcontrol_core::config::{
    BoardConfig, ConfigError as BoardConfigError, CONFIG_VERSION, MAX_ENCODED_CONFIG_LEN,
};
use ttcontrol_hal_rp2040::flash::{
    ConfigRecord, ConfigStore, Rp2040ConfigStore, StorageError, MAX_RECORD_SIZE, RECORD_SLACK,
};

use super::toml::parse_config;

/// Configuration persistence errors
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Flash operation failed
    Storage(StorageError),
    /// Deserialization failed
    Deserialize,
    /// Serialization failed
    Serialize,
    /// TOML parsing failed
    TomlParse,
    /// Invalid UTF-8 in TOML data
    InvalidUtf8,
    /// Config version mismatch
    VersionMismatch,
    /// Configuration parsed but is not usable
    Invalid(BoardConfigError),
}

impl From<StorageError> for ConfigError {
    fn from(e: StorageError) -> Self {
        ConfigError::Storage(e)
    }
}

impl ConfigError {
    /// Short name used in `error=` reports
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigError::Storage(StorageError::Full) => "config_storage_full",
            ConfigError::Storage(_) => "config_storage",
            ConfigError::Deserialize => "config_deserialize",
            ConfigError::Serialize => "config_serialize",
            ConfigError::TomlParse => "config_toml",
            ConfigError::InvalidUtf8 => "config_utf8",
            ConfigError::VersionMismatch => "config_version",
            ConfigError::Invalid(_) => "config_invalid",
        }
    }
}

/// Saved configuration in the boot flash
pub struct ConfigPersistence<'d> {
    store: Rp2040ConfigStore<'d>,
}

impl<'d> ConfigPersistence<'d> {
    pub fn new(store: Rp2040ConfigStore<'d>) -> Self {
        Self { store }
    }

    /// Load the saved configuration
    ///
    /// A TOML override wins over the binary record written by `config_save`.
    pub async fn load(&mut self) -> Result<BoardConfig, ConfigError> {
        info!("Loading configuration from flash...");

        match self.load_toml().await {
            Ok(config) => {
                info!("Loaded configuration from TOML");
                return Ok(config);
            }
            Err(ConfigError::Storage(StorageError::NotFound)) => {
                debug!("No TOML config found, trying binary format");
            }
            Err(e) => {
                warn!("Failed to load TOML config: {:?}, trying binary", e);
            }
        }

        self.load_binary().await
    }

    async fn load_toml(&mut self) -> Result<BoardConfig, ConfigError> {
        let mut buffer = [0u8; MAX_RECORD_SIZE + RECORD_SLACK];
        let text = self.store.load(ConfigRecord::Toml, &mut buffer).await?;
        debug!("Read {} bytes of TOML from flash", text.len());

        let text = str::from_utf8(text).map_err(|_| ConfigError::InvalidUtf8)?;
        let config = parse_config(text).map_err(|e| {
            warn!("TOML parse error: {:?}", e);
            ConfigError::TomlParse
        })?;
        config.validate().map_err(ConfigError::Invalid)?;

        log_config_summary(&config);
        Ok(config)
    }

    async fn load_binary(&mut self) -> Result<BoardConfig, ConfigError> {
        let mut buffer = [0u8; MAX_ENCODED_CONFIG_LEN + RECORD_SLACK];
        let bytes = self.store.load(ConfigRecord::Binary, &mut buffer).await?;
        debug!("Read {} bytes of binary config from flash", bytes.len());

        let config: BoardConfig =
            postcard::from_bytes(bytes).map_err(|_| ConfigError::Deserialize)?;

        if config.version != CONFIG_VERSION {
            warn!(
                "Config version mismatch: found {}, expected {}",
                config.version, CONFIG_VERSION
            );
            return Err(ConfigError::VersionMismatch);
        }
        config.validate().map_err(ConfigError::Invalid)?;

        log_config_summary(&config);
        Ok(config)
    }

    /// Persist `config` as the start-up configuration
    ///
    /// The partition is cleared first so that a stale TOML record cannot
    /// shadow the saved binary one.
    pub async fn save(&mut self, config: &BoardConfig) -> Result<(), ConfigError> {
        config.validate().map_err(ConfigError::Invalid)?;

        let mut buffer = [0u8; MAX_ENCODED_CONFIG_LEN];
        let bytes = postcard::to_slice(config, &mut buffer).map_err(|_| ConfigError::Serialize)?;

        self.store.clear().await?;
        self.store.store(ConfigRecord::Binary, bytes).await?;

        info!("Saved {} byte configuration", bytes.len());
        Ok(())
    }

    /// Drop every persisted record; the next boot uses `board.toml`
    pub async fn reset(&mut self) -> Result<(), ConfigError> {
        self.store.clear().await?;
        info!("Persisted configuration erased");
        Ok(())
    }
}

fn log_config_summary(config: &BoardConfig) {
    info!("Configuration loaded successfully");
    debug!("  board {}", config.name.as_str());
    debug!(
        "  clock max {} Hz, default {} Hz",
        config.clock.max_system_hz, config.clock.default_hz
    );
    debug!(
        "  design {} (rom {}), ui_in driven {}",
        config.project.default_design, config.project.rom_design, config.project.ui_in_enabled
    );
}
