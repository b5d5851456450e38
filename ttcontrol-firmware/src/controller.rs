//! Host command execution
//!
//! The controller owns the board and the active configuration. Each
//! host command runs to completion before the next line is read; only
//! `flash_program` keeps reading from the host while it runs.
//!
//! ROM reads and flash commands borrow the project pins: they switch to
//! the ROM design with the controller driving `ui_in`, then put the
//! previous design and input mode back.
//!
//! Reports go out as `key=value` lines. A failed command reports
//! `error=<kind>` and leaves the board in a consistent state.

use core::convert::Infallible;

use defmt::*;
use embassy_futures::yield_now;
use embassy_time::Delay;
use embedded_hal::delay::DelayNs;

use ttcontrol_core::clock::ClockError;
use ttcontrol_core::config::{BoardConfig, FlashConfig};
use ttcontrol_core::flash::{program_block, program_sectors, FlashError, SessionError};
use ttcontrol_core::rom::{check_factory_rom, read_rom, RomContents, RomError, ROM_SIZE};
use ttcontrol_core::traits::ProjectIo;
use ttcontrol_drivers::{BitBangSpi, ControllerError, FlashDevice, FlashPins, InputState};
use ttcontrol_hal::spi::{Mode, SpiConfig};
use ttcontrol_hal::OutputPin;
use ttcontrol_hal_rp2040::{FlexIo, HostInterruptFlag};
use ttcontrol_protocol::{decode_block, Command, ParseError, Value, PROTOCOL_VERSION};

use crate::board::{Board, ProjectBus};
use crate::config::{ConfigError, ConfigPersistence};
use crate::host::{HostReader, HostWriter};

/// How long `rst_n` is held low
const RESET_PULSE_MS: u32 = 1;

/// Manual clock pulses between checks for a host interrupt
const PULSES_PER_YIELD: u32 = 64;

/// Largest `flash_read` dump
const MAX_FLASH_READ: usize = 64;

/// Controller drives `ui_in`
const MODE_RP_CONTROL: &str = "ASIC_RP_CONTROL";

/// The board's DIP switches drive `ui_in`
const MODE_MANUAL_INPUTS: &str = "ASIC_MANUAL_INPUTS";

type FlashPin<'a> = &'a mut FlexIo;

/// The board's SPI NOR flash, bit-banged over four `uio` pins
type FlashChip<'a> =
    FlashDevice<BitBangSpi<FlashPin<'a>, FlashPin<'a>, FlashPin<'a>, Delay>, FlashPin<'a>, Delay>;

/// Command execution errors
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CommandError {
    /// The requested clock frequency cannot be produced
    Clock(ControllerError<ClockError>),
    /// A flash primitive failed
    Flash(FlashError<Infallible>),
    /// A streamed programming session ended early
    Session(SessionError<Infallible>),
    /// Saving or erasing the persisted configuration failed
    Config(ConfigError),
    /// The flash signals do not map onto the `uio` bus
    FlashPins,
    /// A base64 block did not decode
    Payload(ParseError),
    /// Host sent the interrupt character
    Interrupted,
    /// The ROM design did not answer like a factory ROM
    FactoryTestRom(RomError),
}

impl CommandError {
    /// Short name used in `error=` reports
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandError::Clock(e) => e.as_str(),
            CommandError::Flash(e) => e.as_str(),
            CommandError::Session(e) => e.as_str(),
            CommandError::Config(e) => e.as_str(),
            CommandError::FlashPins => "flash_pins",
            CommandError::Payload(e) => e.as_str(),
            CommandError::Interrupted => "interrupted",
            CommandError::FactoryTestRom(_) => "factory_test_rom",
        }
    }
}

impl From<ControllerError<ClockError>> for CommandError {
    fn from(e: ControllerError<ClockError>) -> Self {
        CommandError::Clock(e)
    }
}

impl From<FlashError<Infallible>> for CommandError {
    fn from(e: FlashError<Infallible>) -> Self {
        CommandError::Flash(e)
    }
}

impl From<SessionError<Infallible>> for CommandError {
    fn from(e: SessionError<Infallible>) -> Self {
        CommandError::Session(e)
    }
}

impl From<ConfigError> for CommandError {
    fn from(e: ConfigError) -> Self {
        CommandError::Config(e)
    }
}

/// Design and inputs to return to after borrowing the project pins
struct SavedSelection {
    design: Option<u16>,
    inputs: InputState,
}

/// Demo board controller
pub struct Controller {
    config: BoardConfig,
    board: Board,
    persistence: ConfigPersistence<'static>,
    interrupt: HostInterruptFlag,
    delay: Delay,
}

impl Controller {
    pub fn new(config: BoardConfig, board: Board, persistence: ConfigPersistence<'static>) -> Self {
        Self {
            config,
            board,
            persistence,
            interrupt: HostInterruptFlag,
            delay: Delay,
        }
    }

    /// Apply the configured start-up design, input mode and clock
    pub async fn apply_startup(&mut self) {
        let design = self.config.project.default_design;
        self.board.mux.select(design, &mut self.delay).await;
        if self.config.project.ui_in_enabled {
            self.board.project.enable_ui_in();
        }

        if let Some(hz) = self.config.startup_clock_hz() {
            match self.board.clock.set_frequency(hz) {
                Ok(applied) if self.config.startup_clock_is_soft() => {
                    info!("Project clock {} Hz (software)", applied.hz)
                }
                Ok(applied) => info!("Project clock {} Hz", applied.hz),
                Err(e) => warn!("Start-up clock {} Hz rejected: {}", hz, e.as_str()),
            }
        }

        info!("Design {} selected, {}", design, self.mode_str());
    }

    /// Send the `version()` report, also used as the connect banner
    pub async fn banner(&mut self, tx: &mut HostWriter) {
        tx.report("firmware", Value::Text("ttcontrol")).await;
        tx.report("version", Value::Text(env!("CARGO_PKG_VERSION"))).await;
        tx.report("protocol", Value::Dec(PROTOCOL_VERSION)).await;
        tx.report("board", Value::Text(self.config.name.as_str())).await;
    }

    /// Parse and run one command line, reporting the outcome
    pub async fn handle_line(&mut self, line: &str, rx: &mut HostReader, tx: &mut HostWriter) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }

        let command = match Command::parse(line) {
            Ok(command) => command,
            Err(e) => {
                debug!("Rejected command line: {}", e.as_str());
                tx.error(e.as_str()).await;
                return;
            }
        };

        // An interrupt typed before this command does not cancel it
        self.interrupt.take_pending();

        debug!("Command: {:?}", command);
        if let Err(e) = self.execute(command, rx, tx).await {
            warn!("Command {:?} failed: {:?}", command, e);
            tx.error(e.as_str()).await;
        }
    }

    async fn execute(
        &mut self,
        command: Command<'_>,
        rx: &mut HostReader,
        tx: &mut HostWriter,
    ) -> Result<(), CommandError> {
        match command {
            Command::Version => self.banner(tx).await,

            Command::SelectDesign(design) => {
                self.board.project.disable_ui_in();
                self.board.project.release_bidirs();
                self.board.mux.select(design, &mut self.delay).await;
                tx.report("tt.design", Value::Dec(design as u32)).await;
                tx.report("tt.clk_freq", Value::Dec(self.board.clock.frequency()))
                    .await;
                tx.report("tt.mode", Value::Text(self.mode_str())).await;
            }

            Command::SetClockHz(hz) => {
                if hz == 0 {
                    self.board.clock.stop();
                    tx.report("tt.clk_freq", Value::Dec(0)).await;
                } else {
                    let applied = self.board.clock.set_frequency(hz)?;
                    tx.report("tt.clk_freq", Value::Dec(applied.hz)).await;
                    if let Some(jitter_free) = applied.jitter_free_hz {
                        tx.report("tt.clk_jitter_free", Value::Dec(jitter_free)).await;
                    }
                }
            }

            Command::ManualClock(count) => {
                self.manual_clock(count).await?;
                tx.report("tt.clk_once", Value::Dec(count)).await;
            }

            Command::ResetProject => {
                self.board.rst_n.set_low();
                self.delay.delay_ms(RESET_PULSE_MS);
                self.board.rst_n.set_high();
                tx.report("tt.reset_project", Value::Dec(1)).await;
            }

            Command::EnableUiIn(enable) => {
                let hz = self.board.clock.frequency();
                if enable {
                    self.board.project.enable_ui_in();
                } else {
                    self.board.project.disable_ui_in();
                }
                if hz > 0 {
                    self.board.clock.set_frequency(hz)?;
                }
                tx.report("tt.mode", Value::Text(self.mode_str())).await;
            }

            Command::WriteUiIn(value) => {
                self.board.project.write_ui_in(value);
                tx.report("tt.ui_in", Value::Hex(value as u32)).await;
            }

            Command::ReadUoOut => {
                let value = self.board.project.read_uo_out();
                tx.report("tt.uo_out", Value::Hex(value as u32)).await;
            }

            Command::ReadRom => {
                let raw = self.read_chip_rom().await;
                match RomContents::decode(&raw) {
                    Ok(rom) if !rom.entries().is_empty() => {
                        for entry in rom.entries() {
                            tx.report(entry.key.as_str(), Value::Text(entry.value.as_str()))
                                .await;
                        }
                    }
                    Ok(_) | Err(_) => tx.report("shuttle", Value::Text("unknown")).await,
                }
            }

            Command::FactoryTest => {
                let raw = self.read_chip_rom().await;
                let rom = check_factory_rom(&raw).map_err(CommandError::FactoryTestRom)?;
                info!("Factory test passed on shuttle {}", rom.shuttle());
                tx.report("factory_test", Value::Text("OK")).await;
            }

            Command::FlashId => {
                let id = self.with_flash(|flash| flash.identify()).await?;
                tx.report("flash_id", Value::Bytes(&id)).await;
            }

            Command::FlashEraseSector(address) => {
                let base = self.config.flash.geometry.erase_base(address);
                self.with_flash(|flash| flash.erase_sector(base)).await?;
                tx.report("flash_erase", Value::Hex(base)).await;
            }

            Command::FlashProgram { address, verify } => {
                let verify = self.config.flash.resolve_verify(verify);
                let saved = self.select_rom_design().await;
                let result = match open_flash(&mut self.board.project, &self.config.flash) {
                    Some(mut flash) => {
                        program_sectors(&mut flash, rx, tx, &mut self.interrupt, address, verify)
                            .await
                            .map_err(CommandError::from)
                    }
                    None => Err(CommandError::FlashPins),
                };
                self.restore_selection(saved).await;

                match result {
                    Ok(written) => info!("Programmed {} bytes from {=u32:#x}", written, address),
                    Err(e) => {
                        // Whatever the host still had in flight is payload, not commands
                        rx.discard();
                        return Err(e);
                    }
                }
            }

            Command::FlashRead { address, length } => {
                let mut buf = [0u8; MAX_FLASH_READ];
                let data = &mut buf[..length as usize];
                self.with_flash(|flash| flash.read_data(address, data)).await?;
                tx.report("flash_data", Value::Bytes(data)).await;
            }

            Command::FlashProgramBase64 {
                address,
                data,
                verify,
            } => {
                let verify = self.config.flash.resolve_verify(verify);
                let block = decode_block(data).map_err(CommandError::Payload)?;
                self.with_flash(|flash| program_block(flash, address, &block, verify))
                    .await?;
                debug!("Programmed {} byte block at {=u32:#x}", block.len(), address);
                tx.report("flash_prog", Value::Hex(address)).await;
            }

            Command::ConfigSave => {
                let mut config = self.config.clone();
                config.project.default_design = self
                    .board
                    .mux
                    .current()
                    .unwrap_or(config.project.default_design);
                config.project.ui_in_enabled = self.board.project.ui_in_enabled();
                config.clock.default_hz = self.board.clock.frequency();

                self.persistence.save(&config).await?;
                self.config = config;
                tx.report("config", Value::Text("saved")).await;
            }

            Command::ConfigReset => {
                self.persistence.reset().await?;
                tx.report("config", Value::Text("reset")).await;
            }
        }
        Ok(())
    }

    /// Stop the automatic clock and issue `count` single pulses
    async fn manual_clock(&mut self, count: u32) -> Result<(), CommandError> {
        self.board.clock.stop();
        for sent in 0..count {
            self.board.clock.pulse(&mut self.delay);
            if (sent + 1) % PULSES_PER_YIELD == 0 {
                yield_now().await;
                if self.interrupt.take_pending() {
                    info!("Manual clock interrupted after {} pulses", sent + 1);
                    return Err(CommandError::Interrupted);
                }
            }
        }
        Ok(())
    }

    /// Connect the ROM design with the controller driving `ui_in`
    ///
    /// The ROM design leaves `uio` alone, so the bidirectional pins are
    /// free for the flash port while it is selected.
    async fn select_rom_design(&mut self) -> SavedSelection {
        let saved = SavedSelection {
            design: self.board.mux.current(),
            inputs: self.board.project.input_state(),
        };
        let rom_design = self.config.project.rom_design;

        self.board.project.release_bidirs();
        if saved.design != Some(rom_design) {
            self.board.mux.select(rom_design, &mut self.delay).await;
        }
        self.board.project.enable_ui_in();
        saved
    }

    async fn restore_selection(&mut self, saved: SavedSelection) {
        self.board.project.release_bidirs();
        self.board.project.restore_inputs(saved.inputs);
        self.board.mux.restore(saved.design, &mut self.delay).await;
    }

    async fn read_chip_rom(&mut self) -> [u8; ROM_SIZE] {
        let saved = self.select_rom_design().await;
        let raw = read_rom(&mut self.board.project, &mut self.delay);
        self.restore_selection(saved).await;
        raw
    }

    /// Run a blocking flash operation with the ROM design selected
    async fn with_flash<T, E>(
        &mut self,
        op: impl FnOnce(&mut FlashChip<'_>) -> Result<T, E>,
    ) -> Result<T, CommandError>
    where
        CommandError: From<E>,
    {
        let saved = self.select_rom_design().await;
        let result = match open_flash(&mut self.board.project, &self.config.flash) {
            Some(mut flash) => op(&mut flash).map_err(CommandError::from),
            None => Err(CommandError::FlashPins),
        };
        self.restore_selection(saved).await;
        result
    }

    fn mode_str(&self) -> &'static str {
        if self.board.project.ui_in_enabled() {
            MODE_RP_CONTROL
        } else {
            MODE_MANUAL_INPUTS
        }
    }
}

/// Borrow the flash signals from the `uio` bus
fn open_flash<'a>(project: &'a mut ProjectBus, config: &FlashConfig) -> Option<FlashChip<'a>> {
    let FlashPins {
        sck,
        mosi,
        miso,
        cs,
    } = project.flash_pins([
        config.sck as usize,
        config.mosi as usize,
        config.miso as usize,
        config.cs as usize,
    ])?;
    let spi = BitBangSpi::new(sck, mosi, miso, Delay, SpiConfig::new(config.spi_hz, Mode::Mode3));
    Some(FlashDevice::new(spi, cs, Delay, config.geometry))
}
