//! Bit-banged SPI master
//!
//! Drives SCK and MOSI and samples MISO through plain GPIO, MSB first.
//! The flash on the demo board hangs off the project's bidirectional
//! pins, which no hardware SPI block can reach.

use core::convert::Infallible;

use embedded_hal::delay::DelayNs;
use ttcontrol_hal::spi::{Phase, Polarity, SpiConfig};
use ttcontrol_hal::{InputPin, OutputPin, SpiBus};

/// SPI master over three GPIOs
pub struct BitBangSpi<SCK, MOSI, MISO, D> {
    sck: SCK,
    mosi: MOSI,
    miso: MISO,
    delay: D,
    config: SpiConfig,
    half_period_ns: u32,
}

impl<SCK, MOSI, MISO, D> BitBangSpi<SCK, MOSI, MISO, D>
where
    SCK: OutputPin,
    MOSI: OutputPin,
    MISO: InputPin,
    D: DelayNs,
{
    /// Create the bus and park SCK at its idle level
    pub fn new(mut sck: SCK, mosi: MOSI, miso: MISO, delay: D, config: SpiConfig) -> Self {
        sck.set_state(config.polarity == Polarity::IdleHigh);
        Self {
            sck,
            mosi,
            miso,
            delay,
            half_period_ns: config.half_period_ns(),
            config,
        }
    }

    pub fn config(&self) -> SpiConfig {
        self.config
    }

    /// Give back the pins and delay
    pub fn release(self) -> (SCK, MOSI, MISO, D) {
        (self.sck, self.mosi, self.miso, self.delay)
    }

    fn idle_high(&self) -> bool {
        self.config.polarity == Polarity::IdleHigh
    }

    /// Shift one byte out while shifting one in
    fn exchange(&mut self, out: u8) -> u8 {
        let idle = self.idle_high();
        let mut input = 0u8;

        for bit in (0..8).rev() {
            let level = (out >> bit) & 1 != 0;
            match self.config.phase {
                Phase::CaptureOnFirstTransition => {
                    self.mosi.set_state(level);
                    self.delay.delay_ns(self.half_period_ns);
                    self.sck.set_state(!idle);
                    input = (input << 1) | self.miso.is_high() as u8;
                    self.delay.delay_ns(self.half_period_ns);
                    self.sck.set_state(idle);
                }
                Phase::CaptureOnSecondTransition => {
                    self.sck.set_state(!idle);
                    self.mosi.set_state(level);
                    self.delay.delay_ns(self.half_period_ns);
                    self.sck.set_state(idle);
                    input = (input << 1) | self.miso.is_high() as u8;
                    self.delay.delay_ns(self.half_period_ns);
                }
            }
        }

        input
    }
}

impl<SCK, MOSI, MISO, D> SpiBus for BitBangSpi<SCK, MOSI, MISO, D>
where
    SCK: OutputPin,
    MOSI: OutputPin,
    MISO: InputPin,
    D: DelayNs,
{
    type Error = Infallible;

    fn transfer(&mut self, read: &mut [u8], write: &[u8]) -> Result<(), Self::Error> {
        for (r, w) in read.iter_mut().zip(write) {
            *r = self.exchange(*w);
        }
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> Result<(), Self::Error> {
        for byte in data {
            self.exchange(*byte);
        }
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8], fill: u8) -> Result<(), Self::Error> {
        for byte in buf.iter_mut() {
            *byte = self.exchange(fill);
        }
        Ok(())
    }

    fn transfer_in_place(&mut self, data: &mut [u8]) -> Result<(), Self::Error> {
        for byte in data.iter_mut() {
            *byte = self.exchange(*byte);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{NoDelay, WirePin};
    use core::cell::RefCell;
    use std::rc::Rc;
    use std::vec::Vec;
    use ttcontrol_hal::spi::Mode;

    /// SCK that records the MOSI level at every rising edge
    struct SamplingSck {
        high: bool,
        mosi: WirePin,
        sampled: Rc<RefCell<Vec<bool>>>,
        edges: Rc<RefCell<usize>>,
    }

    impl OutputPin for SamplingSck {
        fn set_high(&mut self) {
            if !self.high {
                *self.edges.borrow_mut() += 1;
                self.sampled.borrow_mut().push(self.mosi.level());
            }
            self.high = true;
        }

        fn set_low(&mut self) {
            if self.high {
                *self.edges.borrow_mut() += 1;
            }
            self.high = false;
        }

        fn is_set_high(&self) -> bool {
            self.high
        }
    }

    struct Rig {
        spi: BitBangSpi<SamplingSck, WirePin, WirePin, NoDelay>,
        sampled: Rc<RefCell<Vec<bool>>>,
        edges: Rc<RefCell<usize>>,
    }

    /// MISO looped back to MOSI
    fn loopback(mode: Mode) -> Rig {
        let mosi = WirePin::default();
        let sampled = Rc::new(RefCell::new(Vec::new()));
        let edges = Rc::new(RefCell::new(0));
        let sck = SamplingSck {
            high: false,
            mosi: mosi.clone(),
            sampled: sampled.clone(),
            edges: edges.clone(),
        };
        let spi = BitBangSpi::new(
            sck,
            mosi.clone(),
            mosi,
            NoDelay::default(),
            SpiConfig::new(1_000_000, mode),
        );
        sampled.borrow_mut().clear();
        *edges.borrow_mut() = 0;
        Rig {
            spi,
            sampled,
            edges,
        }
    }

    fn bits(byte: u8) -> Vec<bool> {
        (0..8).rev().map(|b| (byte >> b) & 1 != 0).collect()
    }

    #[test]
    fn test_loopback_all_modes() {
        for mode in [Mode::Mode0, Mode::Mode1, Mode::Mode2, Mode::Mode3] {
            let mut rig = loopback(mode);
            let mut data = [0xA5, 0x3C, 0x00, 0xFF];
            rig.spi.transfer_in_place(&mut data).unwrap();
            assert_eq!(data, [0xA5, 0x3C, 0x00, 0xFF], "{mode:?}");
        }
    }

    #[test]
    fn test_mode3_idles_high_and_samples_msb_first() {
        let mut rig = loopback(Mode::Mode3);
        assert!(rig.spi.sck.is_set_high());

        rig.spi.write(&[0xA5]).unwrap();
        assert!(rig.spi.sck.is_set_high());
        assert_eq!(*rig.edges.borrow(), 16);
        assert_eq!(*rig.sampled.borrow(), bits(0xA5));
    }

    #[test]
    fn test_mode0_idles_low() {
        let mut rig = loopback(Mode::Mode0);
        assert!(rig.spi.sck.is_set_low());

        rig.spi.write(&[0x81]).unwrap();
        assert!(rig.spi.sck.is_set_low());
        assert_eq!(*rig.sampled.borrow(), bits(0x81));
    }

    #[test]
    fn test_read_clocks_fill() {
        let mut rig = loopback(Mode::Mode3);
        let mut buf = [0u8; 2];
        rig.spi.read(&mut buf, 0xFF).unwrap();
        assert_eq!(buf, [0xFF, 0xFF]);
    }

    #[test]
    fn test_timing() {
        let mut rig = loopback(Mode::Mode3);
        rig.spi.write(&[0x00]).unwrap();
        let (_, _, _, delay) = rig.spi.release();
        // two half periods of 500 ns per bit
        assert_eq!(delay.total_ns, 8 * 1_000);
    }
}
