//! SPI NOR flash access

use crate::flash::{FlashError, FlashGeometry};

/// Primitive operations on a SPI NOR flash chip
///
/// Every operation waits for the device to be idle first and issues a
/// fresh write enable before each erase or program.
pub trait SpiFlash {
    /// Transport error type
    type BusError;

    /// Page and erase-block layout of the device
    fn geometry(&self) -> FlashGeometry;

    /// Read status register 1
    fn read_status(&mut self) -> Result<u8, FlashError<Self::BusError>>;

    /// Read the 3-byte JEDEC ID
    fn identify(&mut self) -> Result<[u8; 3], FlashError<Self::BusError>>;

    /// Erase the erase block starting at `address`
    fn erase_sector(&mut self, address: u32) -> Result<(), FlashError<Self::BusError>>;

    /// Program `data` at `address`, split at page boundaries
    fn program(&mut self, address: u32, data: &[u8]) -> Result<(), FlashError<Self::BusError>>;

    /// Read `buf.len()` bytes starting at `address`
    fn read_data(&mut self, address: u32, buf: &mut [u8])
        -> Result<(), FlashError<Self::BusError>>;
}

impl<T: SpiFlash + ?Sized> SpiFlash for &mut T {
    type BusError = T::BusError;

    fn geometry(&self) -> FlashGeometry {
        T::geometry(self)
    }

    fn read_status(&mut self) -> Result<u8, FlashError<Self::BusError>> {
        T::read_status(self)
    }

    fn identify(&mut self) -> Result<[u8; 3], FlashError<Self::BusError>> {
        T::identify(self)
    }

    fn erase_sector(&mut self, address: u32) -> Result<(), FlashError<Self::BusError>> {
        T::erase_sector(self, address)
    }

    fn program(&mut self, address: u32, data: &[u8]) -> Result<(), FlashError<Self::BusError>> {
        T::program(self, address, data)
    }

    fn read_data(
        &mut self,
        address: u32,
        buf: &mut [u8],
    ) -> Result<(), FlashError<Self::BusError>> {
        T::read_data(self, address, buf)
    }
}
