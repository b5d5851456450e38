//! GPIO allocation by number
//!
//! The board's pin map comes from `board.toml`, so pins are handed out by
//! number at runtime instead of by peripheral name.

use embassy_rp::gpio::AnyPin;
use embassy_rp::peripherals::{DMA_CH0, FLASH, PIN_0, PWM_SLICE0, USB};
use embassy_rp::{Peri, Peripherals};

/// GPIOs on the RP2040
pub const GPIO_COUNT: usize = 30;

/// GPIO carrying the project clock (PWM slice 0, channel A)
pub const CLOCK_GPIO: u8 = 0;

/// Error when requesting a pin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PinError {
    /// Pin number out of range (0-29 valid)
    InvalidPin(u8),
    /// Pin already taken
    AlreadyTaken(u8),
}

/// Pin bank that holds the GPIOs and hands them out by number
pub struct PinBank {
    pins: [Option<Peri<'static, AnyPin>>; GPIO_COUNT],
}

impl PinBank {
    /// Take a pin by number
    pub fn take(&mut self, pin: u8) -> Result<Peri<'static, AnyPin>, PinError> {
        self.pins
            .get_mut(pin as usize)
            .ok_or(PinError::InvalidPin(pin))?
            .take()
            .ok_or(PinError::AlreadyTaken(pin))
    }

    /// Take several pins by number
    pub fn take_all<const N: usize>(
        &mut self,
        numbers: [u8; N],
    ) -> Result<[Peri<'static, AnyPin>; N], PinError> {
        for (i, &n) in numbers.iter().enumerate() {
            if !self.is_available(n) {
                return Err(if (n as usize) < GPIO_COUNT {
                    PinError::AlreadyTaken(n)
                } else {
                    PinError::InvalidPin(n)
                });
            }
            if numbers[..i].contains(&n) {
                return Err(PinError::AlreadyTaken(n));
            }
        }
        Ok(numbers.map(|n| self.pins[n as usize].take().unwrap_or_else(|| unreachable!())))
    }

    /// Check if a pin is available
    pub fn is_available(&self, pin: u8) -> bool {
        matches!(self.pins.get(pin as usize), Some(Some(_)))
    }
}

/// Peripherals left after the GPIOs went into the bank
pub struct RemainingPeripherals {
    /// Project clock pin, wired to PWM slice 0 channel A
    pub clock_pin: Peri<'static, PIN_0>,
    pub pwm_slice0: Peri<'static, PWM_SLICE0>,
    pub usb: Peri<'static, USB>,
    pub flash: Peri<'static, FLASH>,
    pub dma_ch0: Peri<'static, DMA_CH0>,
}

/// Split the peripherals into the pin bank and everything else
///
/// GPIO0 is kept out of the bank: the project clock needs it as a PWM
/// output.
pub fn split(p: Peripherals) -> (PinBank, RemainingPeripherals) {
    let bank = PinBank {
        pins: [
            None,
            Some(p.PIN_1.into()),
            Some(p.PIN_2.into()),
            Some(p.PIN_3.into()),
            Some(p.PIN_4.into()),
            Some(p.PIN_5.into()),
            Some(p.PIN_6.into()),
            Some(p.PIN_7.into()),
            Some(p.PIN_8.into()),
            Some(p.PIN_9.into()),
            Some(p.PIN_10.into()),
            Some(p.PIN_11.into()),
            Some(p.PIN_12.into()),
            Some(p.PIN_13.into()),
            Some(p.PIN_14.into()),
            Some(p.PIN_15.into()),
            Some(p.PIN_16.into()),
            Some(p.PIN_17.into()),
            Some(p.PIN_18.into()),
            Some(p.PIN_19.into()),
            Some(p.PIN_20.into()),
            Some(p.PIN_21.into()),
            Some(p.PIN_22.into()),
            Some(p.PIN_23.into()),
            Some(p.PIN_24.into()),
            Some(p.PIN_25.into()),
            Some(p.PIN_26.into()),
            Some(p.PIN_27.into()),
            Some(p.PIN_28.into()),
            Some(p.PIN_29.into()),
        ],
    };
    let remaining = RemainingPeripherals {
        clock_pin: p.PIN_0,
        pwm_slice0: p.PWM_SLICE0,
        usb: p.USB,
        flash: p.FLASH,
        dma_ch0: p.DMA_CH0,
    };
    (bank, remaining)
}
