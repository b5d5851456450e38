//! Embassy async tasks
//!
//! Each task runs independently and communicates via pipes/signals.

pub mod controller;
pub mod soft_clock;
pub mod usb;

pub use controller::controller_task;
pub use soft_clock::soft_clock_task;
pub use usb::{usb_rx_task, usb_task, usb_tx_task, UsbDriver, MAX_PACKET_SIZE};
