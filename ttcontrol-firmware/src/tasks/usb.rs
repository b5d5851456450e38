//! USB CDC-ACM host link tasks
//!
//! The receive task copies packets into `HOST_RX` and raises the host
//! interrupt when it sees Ctrl-C; the transmit task drains `HOST_TX`
//! into packets. Neither task parses anything.

use defmt::*;
use embassy_futures::select::select;
use embassy_rp::peripherals::USB;
use embassy_rp::usb::Driver;
use embassy_usb::class::cdc_acm::{Receiver, Sender};
use embassy_usb::driver::EndpointError;
use embassy_usb::UsbDevice;

use ttcontrol_hal_rp2040::HostInterruptFlag;
use ttcontrol_protocol::INTERRUPT_CHAR;

use crate::channels::{HOST_CONNECTED, HOST_RX, HOST_TX};

pub type UsbDriver = Driver<'static, USB>;

/// Full-speed bulk packet size
pub const MAX_PACKET_SIZE: usize = 64;

/// Run the USB device stack
#[embassy_executor::task]
pub async fn usb_task(mut usb: UsbDevice<'static, UsbDriver>) {
    info!("USB task started");
    usb.run().await;
}

/// Host to controller bytes
#[embassy_executor::task]
pub async fn usb_rx_task(mut receiver: Receiver<'static, UsbDriver>) {
    info!("USB rx task started");
    let mut packet = [0u8; MAX_PACKET_SIZE];

    loop {
        receiver.wait_connection().await;
        info!("Host connected");
        HOST_RX.clear();
        HOST_CONNECTED.signal(());

        loop {
            let n = match receiver.read_packet(&mut packet).await {
                Ok(n) => n,
                Err(EndpointError::Disabled) => break,
                Err(EndpointError::BufferOverflow) => {
                    warn!("USB packet larger than {} bytes dropped", MAX_PACKET_SIZE);
                    continue;
                }
            };

            let data = &packet[..n];
            if data.contains(&INTERRUPT_CHAR) && HostInterruptFlag.raise() {
                debug!("Host interrupt");
            }
            HOST_RX.write_all(data).await;
        }

        info!("Host disconnected");
    }
}

/// Controller to host bytes
///
/// Packets are kept one byte short of the endpoint size so that no
/// zero-length packet is ever needed to end a transfer.
#[embassy_executor::task]
pub async fn usb_tx_task(mut sender: Sender<'static, UsbDriver>) {
    info!("USB tx task started");
    let mut packet = [0u8; MAX_PACKET_SIZE];

    loop {
        select(sender.wait_connection(), discard_reports()).await;

        loop {
            let n = HOST_TX.read(&mut packet[..MAX_PACKET_SIZE - 1]).await;
            if let Err(e) = sender.write_packet(&packet[..n]).await {
                debug!("USB write failed: {:?}", e);
                break;
            }
        }
    }
}

/// Drop reports while no host is listening, so the controller never
/// blocks on a full pipe
async fn discard_reports() {
    let mut sink = [0u8; MAX_PACKET_SIZE];
    loop {
        let n = HOST_TX.read(&mut sink).await;
        trace!("Dropped {} report bytes", n);
    }
}
