//! Test doubles for the HAL traits.

use core::cell::{Cell, RefCell};
use core::convert::Infallible;
use std::rc::Rc;
use std::vec::Vec;

use embedded_hal::delay::DelayNs;
use embedded_hal_async::delay::DelayNs as AsyncDelayNs;
use ttcontrol_hal::{
    ClockPin, FlexPin, InputPin, OutputPin, PwmSettings, SpiBus, SquareWaveGenerator, SystemClock,
};

/// Delay that returns immediately and sums the requested time
#[derive(Default)]
pub struct NoDelay {
    pub total_ns: u64,
}

impl DelayNs for NoDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.total_ns += ns as u64;
    }
}

// ---------------------------------------------------------------------------
// Simulated SPI NOR chip
// ---------------------------------------------------------------------------

const SIM_SIZE: usize = 0x1_0000;
const SIM_SECTOR: usize = 4096;
const SIM_PAGE: usize = 256;
const SIM_JEDEC_ID: [u8; 3] = [0xEF, 0x40, 0x18];

struct NorState {
    memory: Vec<u8>,
    cs_low: bool,
    frame: Vec<u8>,
    frames: Vec<Vec<u8>>,
    write_enabled: bool,
    busy_polls: u32,
    stuck_busy: bool,
    outside_cs: usize,
}

fn frame_address(frame: &[u8]) -> usize {
    u32::from_be_bytes([0, frame[1], frame[2], frame[3]]) as usize % SIM_SIZE
}

impl NorState {
    fn status(&mut self) -> u8 {
        if self.stuck_busy {
            return 0x01;
        }
        if self.busy_polls > 0 {
            self.busy_polls -= 1;
            return 0x01;
        }
        0x00
    }

    fn exchange(&mut self, mosi: u8) -> u8 {
        if !self.cs_low {
            self.outside_cs += 1;
            return 0xFF;
        }
        self.frame.push(mosi);
        let index = self.frame.len() - 1;
        match (self.frame[0], index) {
            (0x05, 1..) => self.status(),
            (0x9F, 1..=3) => SIM_JEDEC_ID[index - 1],
            (0x03, 4..) => self.memory[(frame_address(&self.frame) + index - 4) % SIM_SIZE],
            _ => 0xFF,
        }
    }

    fn finish_frame(&mut self) {
        let frame = core::mem::take(&mut self.frame);
        if frame.is_empty() {
            return;
        }
        match frame[0] {
            0x06 => self.write_enabled = true,
            0x20 if self.write_enabled && frame.len() == 4 => {
                let base = frame_address(&frame) / SIM_SECTOR * SIM_SECTOR;
                self.memory[base..base + SIM_SECTOR].fill(0xFF);
                self.write_enabled = false;
            }
            0x02 if self.write_enabled && frame.len() > 4 => {
                let address = frame_address(&frame);
                let page = address / SIM_PAGE * SIM_PAGE;
                for (i, byte) in frame[4..].iter().enumerate() {
                    let at = page + (address - page + i) % SIM_PAGE;
                    self.memory[at] &= byte;
                }
                self.write_enabled = false;
            }
            _ => {}
        }
        self.frames.push(frame);
    }
}

/// SPI NOR chip simulated at the byte level
///
/// Hands out a bus and a chip-select pin sharing the chip state, and
/// records every CS-framed transaction (MOSI bytes only).
#[derive(Clone)]
pub struct SimNor {
    state: Rc<RefCell<NorState>>,
}

impl SimNor {
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(NorState {
                memory: std::vec![0xFF; SIM_SIZE],
                cs_low: false,
                frame: Vec::new(),
                frames: Vec::new(),
                write_enabled: false,
                busy_polls: 0,
                stuck_busy: false,
                outside_cs: 0,
            })),
        }
    }

    pub fn bus(&self) -> SimBus {
        SimBus { nor: self.clone() }
    }

    pub fn cs(&self) -> SimCs {
        SimCs { nor: self.clone() }
    }

    /// Report busy for the next `polls` status reads
    pub fn set_busy_polls(&self, polls: u32) {
        self.state.borrow_mut().busy_polls = polls;
    }

    pub fn set_stuck_busy(&self, stuck: bool) {
        self.state.borrow_mut().stuck_busy = stuck;
    }

    pub fn frames(&self) -> Vec<Vec<u8>> {
        self.state.borrow().frames.clone()
    }

    pub fn cs_released(&self) -> bool {
        !self.state.borrow().cs_low
    }

    /// Bytes clocked while the chip was not selected
    pub fn bytes_outside_cs(&self) -> usize {
        self.state.borrow().outside_cs
    }
}

pub struct SimBus {
    nor: SimNor,
}

impl SpiBus for SimBus {
    type Error = Infallible;

    fn transfer(&mut self, read: &mut [u8], write: &[u8]) -> Result<(), Self::Error> {
        let mut state = self.nor.state.borrow_mut();
        for (r, w) in read.iter_mut().zip(write) {
            *r = state.exchange(*w);
        }
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> Result<(), Self::Error> {
        let mut state = self.nor.state.borrow_mut();
        for byte in data {
            state.exchange(*byte);
        }
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8], fill: u8) -> Result<(), Self::Error> {
        let mut state = self.nor.state.borrow_mut();
        for byte in buf.iter_mut() {
            *byte = state.exchange(fill);
        }
        Ok(())
    }

    fn transfer_in_place(&mut self, data: &mut [u8]) -> Result<(), Self::Error> {
        let mut state = self.nor.state.borrow_mut();
        for byte in data.iter_mut() {
            *byte = state.exchange(*byte);
        }
        Ok(())
    }
}

pub struct SimCs {
    nor: SimNor,
}

impl OutputPin for SimCs {
    fn set_high(&mut self) {
        let mut state = self.nor.state.borrow_mut();
        if state.cs_low {
            state.cs_low = false;
            state.finish_frame();
        }
    }

    fn set_low(&mut self) {
        let mut state = self.nor.state.borrow_mut();
        state.cs_low = true;
        state.frame.clear();
    }

    fn is_set_high(&self) -> bool {
        !self.nor.state.borrow().cs_low
    }
}

// ---------------------------------------------------------------------------
// Pins
// ---------------------------------------------------------------------------

/// One entry in a shared pin/delay event log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Pin(&'static str, bool),
    DelayUs(u32),
}

pub type EventLog = Rc<RefCell<Vec<Event>>>;

/// Output pin that appends every level change to a log
pub struct LoggedPin {
    name: &'static str,
    high: bool,
    log: EventLog,
}

impl LoggedPin {
    pub fn new(name: &'static str, log: &EventLog) -> Self {
        Self {
            name,
            high: false,
            log: log.clone(),
        }
    }
}

impl OutputPin for LoggedPin {
    fn set_high(&mut self) {
        self.high = true;
        self.log.borrow_mut().push(Event::Pin(self.name, true));
    }

    fn set_low(&mut self) {
        self.high = false;
        self.log.borrow_mut().push(Event::Pin(self.name, false));
    }

    fn is_set_high(&self) -> bool {
        self.high
    }
}

/// Delay that appends to a log
pub struct LoggedDelay {
    log: EventLog,
}

impl LoggedDelay {
    pub fn new(log: &EventLog) -> Self {
        Self { log: log.clone() }
    }
}

impl DelayNs for LoggedDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.log.borrow_mut().push(Event::DelayUs(ns / 1000));
    }

    fn delay_us(&mut self, us: u32) {
        self.log.borrow_mut().push(Event::DelayUs(us));
    }

    fn delay_ms(&mut self, ms: u32) {
        self.log.borrow_mut().push(Event::DelayUs(ms * 1000));
    }
}

impl AsyncDelayNs for LoggedDelay {
    async fn delay_ns(&mut self, ns: u32) {
        DelayNs::delay_ns(self, ns)
    }

    async fn delay_ms(&mut self, ms: u32) {
        DelayNs::delay_ms(self, ms)
    }
}

/// A wire: writing drives it, reading samples it
#[derive(Clone, Default)]
pub struct WirePin {
    level: Rc<Cell<bool>>,
}

impl WirePin {
    pub fn level(&self) -> bool {
        self.level.get()
    }
}

impl OutputPin for WirePin {
    fn set_high(&mut self) {
        self.level.set(true);
    }

    fn set_low(&mut self) {
        self.level.set(false);
    }

    fn is_set_high(&self) -> bool {
        self.level.get()
    }
}

impl InputPin for WirePin {
    fn is_high(&self) -> bool {
        self.level.get()
    }
}

/// Bidirectional pin with an externally driven input level
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FakeFlex {
    pub driven: bool,
    pub output: bool,
    pub external: bool,
}

impl OutputPin for FakeFlex {
    fn set_high(&mut self) {
        self.driven = true;
    }

    fn set_low(&mut self) {
        self.driven = false;
    }

    fn is_set_high(&self) -> bool {
        self.driven
    }
}

impl InputPin for FakeFlex {
    fn is_high(&self) -> bool {
        if self.output {
            self.driven
        } else {
            self.external
        }
    }
}

impl FlexPin for FakeFlex {
    fn set_as_output(&mut self) {
        self.output = true;
    }

    fn set_as_input(&mut self) {
        self.output = false;
    }

    fn is_output(&self) -> bool {
        self.output
    }
}

/// Input pin with a fixed level
#[derive(Debug, Default, Clone, Copy)]
pub struct FakeInput(pub bool);

impl InputPin for FakeInput {
    fn is_high(&self) -> bool {
        self.0
    }
}

// ---------------------------------------------------------------------------
// Clock outputs
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct FakeSystemClock {
    pub hz: u32,
    pub changes: Vec<u32>,
    pub fail: bool,
}

impl FakeSystemClock {
    pub fn at(hz: u32) -> Self {
        Self {
            hz,
            ..Self::default()
        }
    }
}

impl SystemClock for FakeSystemClock {
    type Error = ();

    fn set_frequency(&mut self, hz: u32) -> Result<(), Self::Error> {
        if self.fail {
            return Err(());
        }
        self.hz = hz;
        self.changes.push(hz);
        Ok(())
    }

    fn frequency(&self) -> u32 {
        self.hz
    }
}

/// Records the last thing the clock pin was told to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinOutput {
    Pwm(PwmSettings),
    Level(bool),
}

#[derive(Debug, Default)]
pub struct FakeClockPin {
    pub outputs: Vec<PinOutput>,
}

impl FakeClockPin {
    pub fn last(&self) -> Option<PinOutput> {
        self.outputs.last().copied()
    }
}

impl ClockPin for FakeClockPin {
    fn set_pwm(&mut self, settings: PwmSettings) {
        self.outputs.push(PinOutput::Pwm(settings));
    }

    fn set_level(&mut self, high: bool) {
        self.outputs.push(PinOutput::Level(high));
    }
}

#[derive(Debug, Default)]
pub struct FakeWave {
    pub half_period_us: Option<u32>,
}

impl SquareWaveGenerator for FakeWave {
    fn start(&mut self, half_period_us: u32) {
        self.half_period_us = Some(half_period_us);
    }

    fn stop(&mut self) {
        self.half_period_us = None;
    }

    fn is_running(&self) -> bool {
        self.half_period_us.is_some()
    }
}
