//! GPIO wrappers implementing the `ttcontrol-hal` pin traits

use embassy_rp::gpio::{AnyPin, Flex, Input, Level, Output, Pull};
use embassy_rp::Peri;
use ttcontrol_core::config::PinConfig;
use ttcontrol_hal::{FlexPin, InputPin, OutputPin};

/// Push-pull output
///
/// Inversion from the pin config is applied here, so callers always work
/// in logical levels.
pub struct OutputIo {
    pin: Output<'static>,
    inverted: bool,
}

impl OutputIo {
    /// Configure an output, starting at logical `initial`
    pub fn new(pin: Peri<'static, AnyPin>, config: &PinConfig, initial: bool) -> Self {
        let level = if initial != config.inverted {
            Level::High
        } else {
            Level::Low
        };
        Self {
            pin: Output::new(pin, level),
            inverted: config.inverted,
        }
    }
}

impl OutputPin for OutputIo {
    fn set_high(&mut self) {
        if self.inverted {
            self.pin.set_low()
        } else {
            self.pin.set_high()
        }
    }

    fn set_low(&mut self) {
        if self.inverted {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        }
    }

    fn is_set_high(&self) -> bool {
        self.pin.is_set_high() != self.inverted
    }
}

/// Input with optional pull-up
pub struct InputIo {
    pin: Input<'static>,
    inverted: bool,
}

impl InputIo {
    pub fn new(pin: Peri<'static, AnyPin>, config: &PinConfig) -> Self {
        let pull = if config.pull_up { Pull::Up } else { Pull::None };
        Self {
            pin: Input::new(pin, pull),
            inverted: config.inverted,
        }
    }
}

impl InputPin for InputIo {
    fn is_high(&self) -> bool {
        self.pin.is_high() != self.inverted
    }
}

/// Pin whose direction changes at runtime
///
/// Starts as an input. Inversion does not apply: project buses are
/// always active high.
pub struct FlexIo {
    pin: Flex<'static>,
    output: bool,
}

impl FlexIo {
    pub fn new(pin: Peri<'static, AnyPin>, config: &PinConfig) -> Self {
        let mut pin = Flex::new(pin);
        pin.set_pull(if config.pull_up { Pull::Up } else { Pull::None });
        pin.set_as_input();
        Self { pin, output: false }
    }
}

impl OutputPin for FlexIo {
    fn set_high(&mut self) {
        self.pin.set_high()
    }

    fn set_low(&mut self) {
        self.pin.set_low()
    }

    fn is_set_high(&self) -> bool {
        self.pin.is_set_high()
    }
}

impl InputPin for FlexIo {
    fn is_high(&self) -> bool {
        self.pin.is_high()
    }
}

impl FlexPin for FlexIo {
    fn set_as_output(&mut self) {
        self.pin.set_as_output();
        self.output = true;
    }

    fn set_as_input(&mut self) {
        self.pin.set_as_input();
        self.output = false;
    }

    fn is_output(&self) -> bool {
        self.output
    }
}
