//! Configuration records in the controller's own flash
//!
//! A saved board configuration lives in a small partition of the
//! controller's boot flash, never in the SPI flash on the demo board.
//! The partition holds at most two records: the postcard image written by
//! `config_save` and an optional TOML override. Clearing the partition
//! returns the board to the configuration compiled into the firmware.

/// Largest record a [`ConfigStore`] must accept
pub const MAX_RECORD_SIZE: usize = 1024;

/// Which form of the board configuration a record holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ConfigRecord {
    /// Postcard image of `BoardConfig`
    Binary = 0,
    /// `board.toml` text
    Toml = 1,
}

impl ConfigRecord {
    /// Tag byte stored in front of the record
    pub fn tag(self) -> u8 {
        self as u8
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(ConfigRecord::Binary),
            1 => Some(ConfigRecord::Toml),
            _ => None,
        }
    }
}

/// Errors from the record store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StorageError {
    /// Flash erase, program or read failed
    Flash,
    /// No record of this kind is stored
    NotFound,
    /// Record does not fit in [`MAX_RECORD_SIZE`] or the caller's buffer
    TooLarge,
    /// Partition contents are not a valid record log
    Corrupted,
    /// No room left even after reclaiming stale records
    Full,
}

/// Partition holding the configuration records
pub trait ConfigStore {
    /// Fetch the latest copy of `record`
    ///
    /// The returned slice borrows `buf`, which must hold the record plus
    /// its tag.
    fn load<'b>(
        &mut self,
        record: ConfigRecord,
        buf: &'b mut [u8],
    ) -> impl core::future::Future<Output = Result<&'b [u8], StorageError>>;

    /// Store `data` as the latest copy of `record`
    fn store(
        &mut self,
        record: ConfigRecord,
        data: &[u8],
    ) -> impl core::future::Future<Output = Result<(), StorageError>>;

    /// Erase every record
    fn clear(&mut self) -> impl core::future::Future<Output = Result<(), StorageError>>;
}

#[cfg(feature = "sequential-storage")]
impl sequential_storage::map::Key for ConfigRecord {
    fn serialize_into(
        &self,
        buffer: &mut [u8],
    ) -> Result<usize, sequential_storage::map::SerializationError> {
        let slot = buffer
            .first_mut()
            .ok_or(sequential_storage::map::SerializationError::BufferTooSmall)?;
        *slot = self.tag();
        Ok(1)
    }

    fn deserialize_from(
        buffer: &[u8],
    ) -> Result<(Self, usize), sequential_storage::map::SerializationError> {
        let tag = buffer
            .first()
            .ok_or(sequential_storage::map::SerializationError::BufferTooSmall)?;
        ConfigRecord::from_tag(*tag)
            .map(|record| (record, 1))
            .ok_or(sequential_storage::map::SerializationError::InvalidFormat)
    }
}
