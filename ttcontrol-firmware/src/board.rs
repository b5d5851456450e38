//! Board wiring
//!
//! Builds the driver objects from the pin map in the loaded
//! configuration. Pins are claimed from the [`PinBank`] by number, so a
//! pin listed twice shows up here as [`PinError::AlreadyTaken`].

use defmt::*;
use embassy_rp::gpio::AnyPin;
use embassy_rp::Peri;

use ttcontrol_core::config::{BoardConfig, PinConfig, BUS_WIDTH};
use ttcontrol_drivers::{ClockController, DesignMux, ProjectPins};
use ttcontrol_hal_rp2040::pins::CLOCK_GPIO;
use ttcontrol_hal_rp2040::{
    FlexIo, InputIo, OutputIo, PinBank, PinError, PwmClockPin, Rp2040SystemClock, SoftSquareWave,
};

/// `ui_in` and `uio` can change direction, `uo_out` is only ever sampled
pub type ProjectBus = ProjectPins<FlexIo, InputIo, FlexIo>;

pub type Mux = DesignMux<OutputIo, OutputIo, OutputIo>;

pub type ProjectClock = ClockController<Rp2040SystemClock, PwmClockPin, SoftSquareWave>;

/// Everything the controller drives on the demo board
pub struct Board {
    pub mux: Mux,
    pub rst_n: OutputIo,
    pub project: ProjectBus,
    pub clock: ProjectClock,
}

impl Board {
    /// Claim the configured pins and put them in their idle state
    ///
    /// The design stays disconnected and the clock stopped until the
    /// caller applies the start-up defaults.
    pub fn new(
        config: &BoardConfig,
        bank: &mut PinBank,
        clock_pin: PwmClockPin,
    ) -> Result<Self, PinError> {
        let pins = &config.pins;
        if pins.clk.pin != CLOCK_GPIO {
            return Err(PinError::InvalidPin(pins.clk.pin));
        }

        let rst_n = OutputIo::new(bank.take(pins.rst_n.pin)?, &pins.rst_n, true);
        let mux = DesignMux::new(
            OutputIo::new(bank.take(pins.ctrl_ena.pin)?, &pins.ctrl_ena, false),
            OutputIo::new(bank.take(pins.ctrl_sel_rst_n.pin)?, &pins.ctrl_sel_rst_n, true),
            OutputIo::new(bank.take(pins.ctrl_sel_inc.pin)?, &pins.ctrl_sel_inc, false),
        );

        let project = ProjectPins::new(
            take_bus(bank, &pins.ui_in, FlexIo::new)?,
            take_bus(bank, &pins.uo_out, InputIo::new)?,
            take_bus(bank, &pins.uio, FlexIo::new)?,
        );

        let clock = ClockController::new(
            Rp2040SystemClock::new(),
            clock_pin,
            SoftSquareWave::new(),
            config.clock.max_system_hz,
        );

        info!(
            "Board {} wired: ui_in gpio{}, uo_out gpio{}, uio gpio{}",
            config.name.as_str(),
            pins.ui_in[0].pin,
            pins.uo_out[0].pin,
            pins.uio[0].pin
        );

        Ok(Self {
            mux,
            rst_n,
            project,
            clock,
        })
    }
}

/// Claim the eight pins of a bus and wrap each with its own settings
fn take_bus<P>(
    bank: &mut PinBank,
    bus: &[PinConfig; BUS_WIDTH],
    make: impl Fn(Peri<'static, AnyPin>, &PinConfig) -> P,
) -> Result<[P; BUS_WIDTH], PinError> {
    let pins = bank.take_all(bus.map(|p| p.pin))?;
    let mut bit = 0;
    Ok(pins.map(|pin| {
        let io = make(pin, &bus[bit]);
        bit += 1;
        io
    }))
}
