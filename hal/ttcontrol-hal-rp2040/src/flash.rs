//! Configuration records in the RP2040 boot flash
//!
//! The top 64 KiB of the 2 MiB QSPI flash is a `sequential-storage` map
//! keyed by [`ConfigRecord`]. Firmware images stay well below it.

use core::ops::Range;

use embassy_rp::dma::Channel;
use embassy_rp::flash::{Async, Flash, ERASE_SIZE};
use embassy_rp::peripherals::FLASH;
use embassy_rp::Peri;
use sequential_storage::cache::NoCache;
use sequential_storage::map;

pub use ttcontrol_hal::flash::{ConfigRecord, ConfigStore, StorageError, MAX_RECORD_SIZE};

/// Boot flash on the RP2040 module
pub const FLASH_SIZE: usize = 2 * 1024 * 1024;

/// Configuration partition at the end of the boot flash
pub const PARTITION_SIZE: usize = 64 * 1024;

const _: () = assert!(PARTITION_SIZE % ERASE_SIZE == 0);

const PARTITION: Range<u32> = ((FLASH_SIZE - PARTITION_SIZE) as u32)..(FLASH_SIZE as u32);

/// Room for the tag byte and word alignment on top of a record
pub const RECORD_SLACK: usize = 8;

const SCRATCH_SIZE: usize = MAX_RECORD_SIZE + RECORD_SLACK;

/// Record store over the boot flash partition
pub struct Rp2040ConfigStore<'d> {
    flash: Flash<'d, FLASH, Async, FLASH_SIZE>,
}

impl<'d> Rp2040ConfigStore<'d> {
    pub fn new(flash: Peri<'d, FLASH>, dma: Peri<'d, impl Channel>) -> Self {
        Self {
            flash: Flash::new(flash, dma),
        }
    }
}

fn storage_error<E>(e: sequential_storage::Error<E>) -> StorageError {
    match e {
        sequential_storage::Error::Storage { .. } => StorageError::Flash,
        sequential_storage::Error::FullStorage => StorageError::Full,
        sequential_storage::Error::BufferTooSmall(_) | sequential_storage::Error::ItemTooBig => {
            StorageError::TooLarge
        }
        _ => StorageError::Corrupted,
    }
}

impl ConfigStore for Rp2040ConfigStore<'_> {
    async fn load<'b>(
        &mut self,
        record: ConfigRecord,
        buf: &'b mut [u8],
    ) -> Result<&'b [u8], StorageError> {
        map::fetch_item::<ConfigRecord, &[u8], _>(
            &mut self.flash,
            PARTITION,
            &mut NoCache::new(),
            buf,
            &record,
        )
        .await
        .map_err(storage_error)?
        .ok_or(StorageError::NotFound)
    }

    async fn store(&mut self, record: ConfigRecord, data: &[u8]) -> Result<(), StorageError> {
        if data.len() > MAX_RECORD_SIZE {
            return Err(StorageError::TooLarge);
        }
        let mut scratch = [0u8; SCRATCH_SIZE];
        map::store_item(
            &mut self.flash,
            PARTITION,
            &mut NoCache::new(),
            &mut scratch,
            &record,
            &data,
        )
        .await
        .map_err(storage_error)
    }

    async fn clear(&mut self) -> Result<(), StorageError> {
        sequential_storage::erase_all(&mut self.flash, PARTITION)
            .await
            .map_err(storage_error)
    }
}
