//! Inter-task communication channels
//!
//! Defines the static pipes and signals used between Embassy tasks.
//! Uses embassy-sync primitives for safe async communication.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::pipe::Pipe;
use embassy_sync::signal::Signal;

/// Host to controller byte buffer size
const HOST_RX_SIZE: usize = 1024;

/// Controller to host byte buffer size
const HOST_TX_SIZE: usize = 512;

/// Bytes received from the host, in order
///
/// Command lines and programming payload share this stream.
pub static HOST_RX: Pipe<CriticalSectionRawMutex, HOST_RX_SIZE> = Pipe::new();

/// Report lines waiting to go out to the host
pub static HOST_TX: Pipe<CriticalSectionRawMutex, HOST_TX_SIZE> = Pipe::new();

/// Signal that a host opened the serial port
pub static HOST_CONNECTED: Signal<CriticalSectionRawMutex, ()> = Signal::new();
