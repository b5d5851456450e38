//! Main controller task
//!
//! Assembles command lines from the host stream and runs them one at a
//! time. A new host connection resets the line parser and gets the
//! version banner.

use defmt::*;
use embassy_futures::select::{select, Either};

use ttcontrol_protocol::{LineError, LineParser};

use crate::channels::HOST_CONNECTED;
use crate::controller::Controller;
use crate::host::{HostReader, HostWriter};

/// Controller task - main command loop
#[embassy_executor::task]
pub async fn controller_task(mut controller: Controller) {
    info!("Controller task started");

    let mut parser = LineParser::new();
    let mut rx = HostReader::new();
    let mut tx = HostWriter;

    loop {
        if let Either::First(()) = select(HOST_CONNECTED.wait(), rx.fill()).await {
            rx.discard();
            parser.reset();
            controller.banner(&mut tx).await;
            continue;
        }

        let (used, result) = parser.feed_bytes(rx.buffered());
        rx.consume(used);

        match result {
            Ok(Some(line)) => controller.handle_line(&line, &mut rx, &mut tx).await,
            Ok(None) => {}
            Err(LineError::Interrupted) => debug!("Partial line dropped"),
            Err(e) => {
                warn!("Line error: {:?}", e);
                tx.error(e.as_str()).await;
            }
        }
    }
}
