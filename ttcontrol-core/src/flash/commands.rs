//! SPI NOR command set.

use super::error::FlashError;
use super::geometry::MAX_ADDRESS;

/// Read Status Register-1
pub const READ_STATUS: u8 = 0x05;
/// Read JEDEC ID
pub const READ_JEDEC_ID: u8 = 0x9F;
/// Write Enable
pub const WRITE_ENABLE: u8 = 0x06;
/// Sector Erase
pub const SECTOR_ERASE: u8 = 0x20;
/// Page Program
pub const PAGE_PROGRAM: u8 = 0x02;
/// Read Data
pub const READ_DATA: u8 = 0x03;

/// Status register busy bit
pub const STATUS_BUSY: u8 = 0x01;

/// Fill byte clocked out while reading the status register
pub const STATUS_FILL: u8 = 0xFF;

/// Build an opcode followed by a 24-bit big-endian address
pub fn with_address<E>(opcode: u8, address: u32) -> Result<[u8; 4], FlashError<E>> {
    if address > MAX_ADDRESS {
        return Err(FlashError::AddressOutOfRange);
    }
    let [_, hi, mid, lo] = address.to_be_bytes();
    Ok([opcode, hi, mid, lo])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_encoding() {
        assert_eq!(
            with_address::<()>(PAGE_PROGRAM, 0x12_3456),
            Ok([0x02, 0x12, 0x34, 0x56])
        );
        assert_eq!(with_address::<()>(READ_DATA, 0), Ok([0x03, 0, 0, 0]));
        assert_eq!(
            with_address::<()>(SECTOR_ERASE, 0x100_0000),
            Err(FlashError::AddressOutOfRange)
        );
    }
}
