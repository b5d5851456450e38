//! SPI NOR flash device
//!
//! Speaks the classic single-bit command set shared by W25Q, GD25Q,
//! MX25 and similar parts:
//!
//! | Opcode | Command             | Payload                     |
//! |--------|---------------------|-----------------------------|
//! | `0x05` | Read Status 1       | 1 byte in                   |
//! | `0x9F` | JEDEC ID            | 3 bytes in                  |
//! | `0x06` | Write Enable        | -                           |
//! | `0x20` | Sector Erase        | 24-bit address              |
//! | `0x02` | Page Program        | 24-bit address + 1..=256 out |
//! | `0x03` | Read Data           | 24-bit address + n in       |
//!
//! The device holds no cached state; the busy bit is polled before every
//! command.

use embedded_hal::delay::DelayNs;
use ttcontrol_core::flash::commands::{
    with_address, PAGE_PROGRAM, READ_DATA, READ_JEDEC_ID, READ_STATUS, SECTOR_ERASE,
    STATUS_BUSY, STATUS_FILL, WRITE_ENABLE,
};
use ttcontrol_core::flash::{FlashError, FlashGeometry};
use ttcontrol_core::traits::SpiFlash;
use ttcontrol_hal::{OutputPin, SpiBus};

/// Pause between busy polls
const POLL_INTERVAL_US: u32 = 1;

/// Asserts chip select while alive
///
/// CS is released on drop, whether the transaction finished or failed.
pub struct ChipSelectGuard<'a, CS: OutputPin> {
    cs: &'a mut CS,
}

impl<'a, CS: OutputPin> ChipSelectGuard<'a, CS> {
    /// Drive CS low (active)
    pub fn assert(cs: &'a mut CS) -> Self {
        cs.set_low();
        Self { cs }
    }
}

impl<CS: OutputPin> Drop for ChipSelectGuard<'_, CS> {
    fn drop(&mut self) {
        self.cs.set_high();
    }
}

/// SPI NOR flash on a bus with a dedicated chip select
pub struct FlashDevice<SPI, CS, D> {
    spi: SPI,
    cs: CS,
    delay: D,
    geometry: FlashGeometry,
}

impl<SPI, CS, D> FlashDevice<SPI, CS, D>
where
    SPI: SpiBus,
    CS: OutputPin,
    D: DelayNs,
{
    /// Create a device; CS is driven inactive immediately
    pub fn new(spi: SPI, mut cs: CS, delay: D, geometry: FlashGeometry) -> Self {
        cs.set_high();
        Self {
            spi,
            cs,
            delay,
            geometry,
        }
    }

    /// Give back the bus, chip select and delay
    pub fn release(self) -> (SPI, CS, D) {
        (self.spi, self.cs, self.delay)
    }

    /// Read status register 1
    pub fn read_status(&mut self) -> Result<u8, FlashError<SPI::Error>> {
        let _cs = ChipSelectGuard::assert(&mut self.cs);
        self.spi.write(&[READ_STATUS]).map_err(FlashError::Bus)?;
        let mut status = [0u8; 1];
        self.spi
            .read(&mut status, STATUS_FILL)
            .map_err(FlashError::Bus)?;
        Ok(status[0])
    }

    /// Poll until the device is idle
    ///
    /// Gives up with `DeviceTimeout` after `max_polls` busy readings
    /// without sending anything further.
    pub fn wait_not_busy(&mut self, max_polls: u32) -> Result<(), FlashError<SPI::Error>> {
        let mut polls = 0;
        loop {
            if self.read_status()? & STATUS_BUSY == 0 {
                return Ok(());
            }
            polls += 1;
            if polls >= max_polls {
                warn!("flash busy after {} polls", polls);
                return Err(FlashError::DeviceTimeout);
            }
            self.delay.delay_us(POLL_INTERVAL_US);
        }
    }

    fn wait_idle(&mut self) -> Result<(), FlashError<SPI::Error>> {
        self.wait_not_busy(self.geometry.busy_timeout)
    }

    /// Read the JEDEC manufacturer and device ID
    pub fn identify(&mut self) -> Result<[u8; 3], FlashError<SPI::Error>> {
        self.wait_idle()?;
        let _cs = ChipSelectGuard::assert(&mut self.cs);
        self.spi.write(&[READ_JEDEC_ID]).map_err(FlashError::Bus)?;
        let mut id = [0u8; 3];
        self.spi.read(&mut id, 0x00).map_err(FlashError::Bus)?;
        Ok(id)
    }

    /// Set the write enable latch
    pub fn write_enable(&mut self) -> Result<(), FlashError<SPI::Error>> {
        self.wait_idle()?;
        let _cs = ChipSelectGuard::assert(&mut self.cs);
        self.spi.write(&[WRITE_ENABLE]).map_err(FlashError::Bus)
    }

    /// Erase the sector containing `address`
    pub fn erase_sector(&mut self, address: u32) -> Result<(), FlashError<SPI::Error>> {
        let header = with_address::<SPI::Error>(SECTOR_ERASE, address)?;
        self.wait_idle()?;
        self.write_enable()?;
        debug!("flash erase {=u32:#x}", address);
        let _cs = ChipSelectGuard::assert(&mut self.cs);
        self.spi.write(&header).map_err(FlashError::Bus)
    }

    /// Program up to one page; `data` must not cross a page boundary
    pub fn program_page(&mut self, address: u32, data: &[u8]) -> Result<(), FlashError<SPI::Error>> {
        if data.is_empty() {
            return Ok(());
        }
        let offset = address % self.geometry.page_size;
        if offset as usize + data.len() > self.geometry.page_size as usize {
            return Err(FlashError::PageBoundary);
        }
        let header = with_address::<SPI::Error>(PAGE_PROGRAM, address)?;

        self.wait_idle()?;
        self.write_enable()?;
        trace!("flash program {=u32:#x} len {}", address, data.len());
        let _cs = ChipSelectGuard::assert(&mut self.cs);
        self.spi.write(&header).map_err(FlashError::Bus)?;
        self.spi.write(data).map_err(FlashError::Bus)
    }

    /// Program `data` at any address, one page at a time
    pub fn program(&mut self, address: u32, data: &[u8]) -> Result<(), FlashError<SPI::Error>> {
        let len = u32::try_from(data.len()).map_err(|_| FlashError::AddressOutOfRange)?;
        for segment in self.geometry.page_segments(address, len) {
            let start = segment.offset as usize;
            let end = start + segment.len as usize;
            self.program_page(segment.address, &data[start..end])?;
        }
        Ok(())
    }

    /// Read `buf.len()` bytes starting at `address`
    pub fn read_data(&mut self, address: u32, buf: &mut [u8]) -> Result<(), FlashError<SPI::Error>> {
        let header = with_address::<SPI::Error>(READ_DATA, address)?;
        self.wait_idle()?;
        let _cs = ChipSelectGuard::assert(&mut self.cs);
        self.spi.write(&header).map_err(FlashError::Bus)?;
        self.spi.read(buf, 0x00).map_err(FlashError::Bus)
    }
}

impl<SPI, CS, D> SpiFlash for FlashDevice<SPI, CS, D>
where
    SPI: SpiBus,
    CS: OutputPin,
    D: DelayNs,
{
    type BusError = SPI::Error;

    fn geometry(&self) -> FlashGeometry {
        self.geometry
    }

    fn read_status(&mut self) -> Result<u8, FlashError<Self::BusError>> {
        FlashDevice::read_status(self)
    }

    fn identify(&mut self) -> Result<[u8; 3], FlashError<Self::BusError>> {
        FlashDevice::identify(self)
    }

    fn erase_sector(&mut self, address: u32) -> Result<(), FlashError<Self::BusError>> {
        FlashDevice::erase_sector(self, address)
    }

    fn program(&mut self, address: u32, data: &[u8]) -> Result<(), FlashError<Self::BusError>> {
        FlashDevice::program(self, address, data)
    }

    fn read_data(
        &mut self,
        address: u32,
        buf: &mut [u8],
    ) -> Result<(), FlashError<Self::BusError>> {
        FlashDevice::read_data(self, address, buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{NoDelay, SimNor};
    use proptest::prelude::*;

    fn device(sim: &SimNor) -> FlashDevice<crate::mock::SimBus, crate::mock::SimCs, NoDelay> {
        FlashDevice::new(sim.bus(), sim.cs(), NoDelay::default(), FlashGeometry::default())
    }

    #[test]
    fn test_identify() {
        let sim = SimNor::new();
        let mut flash = device(&sim);
        assert_eq!(flash.identify(), Ok([0xEF, 0x40, 0x18]));
        assert_eq!(sim.frames(), [std::vec![0x05, 0xFF], std::vec![0x9F, 0, 0, 0]]);
        assert!(sim.cs_released());
    }

    #[test]
    fn test_erase_sequence() {
        let sim = SimNor::new();
        let mut flash = device(&sim);
        flash.erase_sector(0x01_2000).unwrap();

        let frames = sim.frames();
        let commands: std::vec::Vec<u8> = frames.iter().map(|f| f[0]).collect();
        // wait, write enable (which waits again), erase
        assert_eq!(commands, [0x05, 0x05, 0x06, 0x20]);
        assert_eq!(frames[3], [0x20, 0x01, 0x20, 0x00]);
    }

    #[test]
    fn test_write_enable_before_every_program() {
        let sim = SimNor::new();
        let mut flash = device(&sim);
        flash.program(0x1000, &[0u8; 512]).unwrap();
        let enables = sim.frames().iter().filter(|f| f[0] == 0x06).count();
        let programs = sim.frames().iter().filter(|f| f[0] == 0x02).count();
        assert_eq!(enables, 2);
        assert_eq!(programs, 2);
    }

    #[test]
    fn test_program_page_rejects_crossing() {
        let sim = SimNor::new();
        let mut flash = device(&sim);
        assert_eq!(
            flash.program_page(0x10F0, &[0u8; 32]),
            Err(FlashError::PageBoundary)
        );
        assert!(sim.frames().is_empty());
    }

    #[test]
    fn test_busy_is_polled() {
        let sim = SimNor::new();
        sim.set_busy_polls(3);
        let mut flash = device(&sim);
        flash.read_data(0, &mut [0u8; 4]).unwrap();

        let frames = sim.frames();
        assert_eq!(frames.len(), 5);
        assert!(frames[..4].iter().all(|f| f[0] == 0x05));
        assert_eq!(frames[4][0], 0x03);
    }

    #[test]
    fn test_persistent_busy_times_out() {
        let sim = SimNor::new();
        sim.set_stuck_busy(true);
        let mut flash = FlashDevice::new(
            sim.bus(),
            sim.cs(),
            NoDelay::default(),
            FlashGeometry {
                busy_timeout: 5,
                ..FlashGeometry::default()
            },
        );

        assert_eq!(flash.erase_sector(0x1000), Err(FlashError::DeviceTimeout));
        let frames = sim.frames();
        assert_eq!(frames.len(), 5);
        assert!(frames.iter().all(|f| f[0] == 0x05));
        assert!(sim.cs_released());
        assert_eq!(sim.bytes_outside_cs(), 0);
    }

    #[test]
    fn test_address_out_of_range() {
        let sim = SimNor::new();
        let mut flash = device(&sim);
        assert_eq!(
            flash.read_data(0x0100_0000, &mut [0u8; 1]),
            Err(FlashError::AddressOutOfRange)
        );
        assert!(sim.frames().is_empty());
    }

    proptest! {
        #[test]
        fn prop_unaligned_program_round_trips(
            address in 0u32..0xE000,
            data in proptest::collection::vec(any::<u8>(), 1..700),
        ) {
            let sim = SimNor::new();
            let mut flash = device(&sim);
            let len = data.len() as u32;

            let first = address - address % 4096;
            let mut sector = first;
            while sector < address + len {
                flash.erase_sector(sector).unwrap();
                sector += 4096;
            }

            flash.program(address, &data).unwrap();
            let mut back = std::vec![0u8; data.len()];
            flash.read_data(address, &mut back).unwrap();
            prop_assert_eq!(&back, &data);

            for frame in sim.frames().iter().filter(|f| f[0] == 0x02) {
                let start = u32::from_be_bytes([0, frame[1], frame[2], frame[3]]);
                let end = start + frame.len() as u32 - 4 - 1;
                prop_assert_eq!(start / 256, end / 256);
            }
            prop_assert_eq!(sim.bytes_outside_cs(), 0);
        }
    }
}
