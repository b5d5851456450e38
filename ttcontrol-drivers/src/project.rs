//! Project I/O pin groups

use ttcontrol_core::config::BUS_WIDTH;
use ttcontrol_core::traits::ProjectIo;
use ttcontrol_hal::{FlexPin, InputPin, OutputPin};

/// Four bidirectional pins lent out as an SPI flash port
pub struct FlashPins<'a, B> {
    pub sck: &'a mut B,
    pub mosi: &'a mut B,
    pub miso: &'a mut B,
    pub cs: &'a mut B,
}

/// Who drives `ui_in` and the last value written to it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputState {
    pub enabled: bool,
    pub value: u8,
}

/// The selected project's `ui_in`, `uo_out` and `uio` pins
///
/// `ui_in` pins are only driven while the controller owns the inputs;
/// otherwise they float so that the board's DIP switches win.
pub struct ProjectPins<I, O, B> {
    ui_in: [I; BUS_WIDTH],
    uo_out: [O; BUS_WIDTH],
    uio: [B; BUS_WIDTH],
    ui_in_value: u8,
    ui_in_enabled: bool,
}

impl<I, O, B> ProjectPins<I, O, B>
where
    I: FlexPin,
    O: InputPin,
    B: FlexPin,
{
    /// Take the pins; everything starts as an input
    pub fn new(ui_in: [I; BUS_WIDTH], uo_out: [O; BUS_WIDTH], uio: [B; BUS_WIDTH]) -> Self {
        let mut pins = Self {
            ui_in,
            uo_out,
            uio,
            ui_in_value: 0,
            ui_in_enabled: false,
        };
        pins.disable_ui_in();
        pins.release_bidirs();
        pins
    }

    pub fn ui_in_enabled(&self) -> bool {
        self.ui_in_enabled
    }

    /// Last value written to `ui_in`
    pub fn ui_in_value(&self) -> u8 {
        self.ui_in_value
    }

    /// Drive `ui_in` from the controller, starting with the last value written
    pub fn enable_ui_in(&mut self) {
        for pin in self.ui_in.iter_mut() {
            pin.set_as_output();
        }
        self.ui_in_enabled = true;
    }

    /// Release `ui_in` to the manual inputs
    pub fn disable_ui_in(&mut self) {
        for pin in self.ui_in.iter_mut() {
            pin.set_as_input();
        }
        self.ui_in_enabled = false;
    }

    pub fn input_state(&self) -> InputState {
        InputState {
            enabled: self.ui_in_enabled,
            value: self.ui_in_value,
        }
    }

    /// Put `ui_in` back the way [`input_state`](Self::input_state) found it
    pub fn restore_inputs(&mut self, state: InputState) {
        self.write_ui_in(state.value);
        if state.enabled {
            self.enable_ui_in();
        } else {
            self.disable_ui_in();
        }
    }

    /// Put every bidirectional pin into high impedance
    pub fn release_bidirs(&mut self) {
        for pin in self.uio.iter_mut() {
            pin.set_as_input();
        }
    }

    /// Borrow four distinct `uio` pins as an SPI flash port
    ///
    /// Pins are given as `[sck, mosi, miso, cs]` bus indices. CS is parked
    /// high before any pin starts driving. Returns `None` for an index
    /// outside the bus or a pin used twice.
    pub fn flash_pins(&mut self, indices: [usize; 4]) -> Option<FlashPins<'_, B>> {
        let mut slots: [Option<&mut B>; 4] = [None, None, None, None];
        for (index, pin) in self.uio.iter_mut().enumerate() {
            if let Some(role) = indices.iter().position(|&i| i == index) {
                slots[role] = Some(pin);
            }
        }
        let [Some(sck), Some(mosi), Some(miso), Some(cs)] = slots else {
            return None;
        };

        cs.set_high();
        cs.set_as_output();
        sck.set_as_output();
        mosi.set_as_output();
        miso.set_as_input();

        Some(FlashPins {
            sck,
            mosi,
            miso,
            cs,
        })
    }
}

fn read_bus<P: InputPin>(pins: &[P]) -> u8 {
    pins.iter()
        .enumerate()
        .fold(0, |value, (bit, pin)| value | ((pin.is_high() as u8) << bit))
}

impl<I, O, B> ProjectIo for ProjectPins<I, O, B>
where
    I: FlexPin,
    O: InputPin,
    B: FlexPin,
{
    fn write_ui_in(&mut self, value: u8) {
        for (bit, pin) in self.ui_in.iter_mut().enumerate() {
            pin.set_state((value >> bit) & 1 != 0);
        }
        self.ui_in_value = value;
    }

    fn read_uo_out(&mut self) -> u8 {
        read_bus(&self.uo_out)
    }
}
