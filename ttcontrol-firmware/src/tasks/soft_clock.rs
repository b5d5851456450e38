//! Software square wave task
//!
//! Produces the project clock for frequencies too low for the PWM.

use defmt::*;

use ttcontrol_hal_rp2040::{run_square_wave, PwmClockPin};

#[embassy_executor::task]
pub async fn soft_clock_task(pin: PwmClockPin) {
    info!("Soft clock task started");
    run_square_wave(pin).await
}
