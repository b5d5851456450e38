//! ttcontrol - Demo Board Control Firmware
//!
//! Main firmware binary for the RP2040 on multi-project ASIC demo boards.
//! The pin map and start-up defaults come from `board.toml` (or a copy
//! saved to flash); a host drives everything else over USB serial.

#![no_std]
#![no_main]

extern crate alloc;

use defmt::*;
use embassy_executor::Spawner;
use embassy_rp::bind_interrupts;
use embassy_rp::peripherals::USB;
use embassy_rp::usb::{Driver, InterruptHandler};
use embassy_usb::class::cdc_acm::{CdcAcmClass, State};
use embassy_usb::Builder;
use embedded_alloc::LlffHeap as Heap;
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use ttcontrol_core::config::BoardConfig;
use ttcontrol_hal_rp2040::{pins, PwmClockPin, Rp2040ConfigStore};

use crate::board::Board;
use crate::config::{parse_config, ConfigPersistence};
use crate::controller::Controller;

// Heap allocator for TOML parsing
#[global_allocator]
static HEAP: Heap = Heap::empty();

// Heap size: 8KB
const HEAP_SIZE: usize = 8 * 1024;

/// Embedded default configuration (compiled into firmware)
/// Edit board.toml and rebuild to customize
const EMBEDDED_CONFIG: &str = include_str!("../board.toml");

/// USB identity
const USB_VID: u16 = 0x2e8a;
const USB_PID: u16 = 0x000a;

mod board;
mod channels;
mod config;
mod controller;
mod host;
mod tasks;

bind_interrupts!(struct Irqs {
    USBCTRL_IRQ => InterruptHandler<USB>;
});

// USB descriptor and class state (must live forever)
static CONFIG_DESC: StaticCell<[u8; 256]> = StaticCell::new();
static BOS_DESC: StaticCell<[u8; 256]> = StaticCell::new();
static MSOS_DESC: StaticCell<[u8; 256]> = StaticCell::new();
static CONTROL_BUF: StaticCell<[u8; 64]> = StaticCell::new();
static CDC_STATE: StaticCell<State<'static>> = StaticCell::new();

/// Main entry point
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("ttcontrol firmware starting...");

    // Initialize heap allocator
    init_heap();

    // Initialize RP2040 peripherals
    let p = embassy_rp::init(Default::default());
    let (mut bank, rem) = pins::split(p);
    info!("Peripherals initialized");

    // Load configuration from flash (or use embedded defaults)
    let mut persistence = ConfigPersistence::new(Rp2040ConfigStore::new(rem.flash, rem.dma_ch0));
    let config = load_config(&mut persistence).await;

    // Wire the board from the pin map
    let clock_pin = PwmClockPin::new(rem.pwm_slice0, rem.clock_pin);
    let board = unwrap!(Board::new(&config, &mut bank, clock_pin));

    let mut controller = Controller::new(config, board, persistence);
    controller.apply_startup().await;

    // Setup USB CDC-ACM for the host link
    let driver = Driver::new(rem.usb, Irqs);

    let mut usb_config = embassy_usb::Config::new(USB_VID, USB_PID);
    usb_config.manufacturer = Some("ttcontrol");
    usb_config.product = Some("Demo board controller");
    usb_config.serial_number = Some(env!("CARGO_PKG_VERSION"));
    usb_config.max_power = 100;
    usb_config.max_packet_size_0 = 64;

    let mut builder = Builder::new(
        driver,
        usb_config,
        CONFIG_DESC.init([0; 256]),
        BOS_DESC.init([0; 256]),
        MSOS_DESC.init([0; 256]),
        CONTROL_BUF.init([0; 64]),
    );

    let class = CdcAcmClass::new(
        &mut builder,
        CDC_STATE.init(State::new()),
        tasks::MAX_PACKET_SIZE as u16,
    );
    let (sender, receiver) = class.split();
    let usb = builder.build();

    info!("USB initialized for host communication");

    // Spawn tasks
    spawner.spawn(tasks::usb_task(usb)).unwrap();
    spawner.spawn(tasks::usb_rx_task(receiver)).unwrap();
    spawner.spawn(tasks::usb_tx_task(sender)).unwrap();
    spawner.spawn(tasks::soft_clock_task(clock_pin)).unwrap();
    spawner.spawn(tasks::controller_task(controller)).unwrap();

    info!("All tasks spawned, firmware running");

    // Main task has nothing else to do - all work happens in spawned tasks
    loop {
        embassy_time::Timer::after_secs(60).await;
        trace!("Main loop heartbeat");
    }
}

/// Initialize the heap allocator
fn init_heap() {
    use core::mem::MaybeUninit;
    static mut HEAP_MEM: [MaybeUninit<u8>; HEAP_SIZE] = [MaybeUninit::uninit(); HEAP_SIZE];
    #[allow(static_mut_refs)]
    unsafe {
        HEAP.init(HEAP_MEM.as_ptr() as usize, HEAP_SIZE)
    }
}

/// Load configuration from flash storage
///
/// Attempts to load the persisted config. If not found or invalid,
/// returns the embedded default configuration.
async fn load_config(persistence: &mut ConfigPersistence<'static>) -> BoardConfig {
    match persistence.load().await {
        Ok(config) => {
            info!("Loaded configuration from flash");
            config
        }
        Err(e) => {
            // Flash empty or invalid - use embedded defaults
            info!("No valid configuration in flash ({}), using embedded defaults", e.as_str());
            create_default_config()
        }
    }
}

/// Create the embedded default configuration
///
/// Parses the board.toml file that was embedded at compile time.
/// This is used as a fallback when no flash config exists.
fn create_default_config() -> BoardConfig {
    let parsed = parse_config(EMBEDDED_CONFIG).map(|config| {
        let valid = config.validate();
        (config, valid)
    });

    match parsed {
        Ok((config, Ok(()))) => {
            info!("Parsed embedded configuration successfully");
            config
        }
        Ok((_, Err(e))) => {
            error!("Embedded config is invalid: {:?}", e);
            error!("Using built-in pin map");
            BoardConfig::new()
        }
        Err(e) => {
            error!("Failed to parse embedded config: {:?}", e);
            error!("Using built-in pin map");
            BoardConfig::new()
        }
    }
}
