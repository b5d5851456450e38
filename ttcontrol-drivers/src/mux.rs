//! Design multiplexer control
//!
//! The chip selects the active design with a counter: `ctrl_sel_rst_n`
//! clears it, every rising edge on `ctrl_sel_inc` advances it, and
//! `ctrl_ena` connects the selected design to the I/O pins.
//!
//! Selecting design `n` takes about `2n` ms of edge delays, so it awaits
//! an async delay and leaves the executor free between edges.

use embedded_hal_async::delay::DelayNs;
use ttcontrol_hal::OutputPin;

/// Settle time around every mux control edge
const EDGE_DELAY_MS: u32 = 1;

/// Mux control lines
pub struct DesignMux<ENA, RST, INC> {
    ena: ENA,
    sel_rst_n: RST,
    sel_inc: INC,
    current: Option<u16>,
}

impl<ENA, RST, INC> DesignMux<ENA, RST, INC>
where
    ENA: OutputPin,
    RST: OutputPin,
    INC: OutputPin,
{
    /// Take the control lines; no design is enabled until `select`
    pub fn new(mut ena: ENA, mut sel_rst_n: RST, mut sel_inc: INC) -> Self {
        ena.set_low();
        sel_inc.set_low();
        sel_rst_n.set_high();
        Self {
            ena,
            sel_rst_n,
            sel_inc,
            current: None,
        }
    }

    /// Currently enabled design
    pub fn current(&self) -> Option<u16> {
        self.current
    }

    /// Disconnect every design from the I/O pins
    pub fn disable(&mut self) {
        self.ena.set_low();
        self.current = None;
    }

    /// Reset the counter, advance it to `design` and enable it
    pub async fn select<D: DelayNs>(&mut self, design: u16, delay: &mut D) {
        self.disable();

        self.sel_rst_n.set_low();
        delay.delay_ms(EDGE_DELAY_MS).await;
        self.sel_rst_n.set_high();
        delay.delay_ms(EDGE_DELAY_MS).await;

        for _ in 0..design {
            self.sel_inc.set_high();
            delay.delay_ms(EDGE_DELAY_MS).await;
            self.sel_inc.set_low();
            delay.delay_ms(EDGE_DELAY_MS).await;
        }

        self.ena.set_high();
        self.current = Some(design);
        debug!("design {} enabled", design);
    }

    /// Go back to a state saved from [`current`](Self::current)
    ///
    /// Nothing is pulsed if that design is still the enabled one.
    pub async fn restore<D: DelayNs>(&mut self, saved: Option<u16>, delay: &mut D) {
        match saved {
            Some(design) if self.current == Some(design) => {}
            Some(design) => self.select(design, delay).await,
            None => self.disable(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{Event, EventLog, LoggedDelay, LoggedPin};
    use embassy_futures::block_on;
    use std::vec::Vec;

    fn mux(log: &EventLog) -> DesignMux<LoggedPin, LoggedPin, LoggedPin> {
        let mux = DesignMux::new(
            LoggedPin::new("ena", log),
            LoggedPin::new("rst_n", log),
            LoggedPin::new("inc", log),
        );
        log.borrow_mut().clear();
        mux
    }

    #[test]
    fn test_select_sequence() {
        let log = EventLog::default();
        let mut mux = mux(&log);
        block_on(mux.select(2, &mut LoggedDelay::new(&log)));

        assert_eq!(
            *log.borrow(),
            [
                Event::Pin("ena", false),
                Event::Pin("rst_n", false),
                Event::DelayUs(1_000),
                Event::Pin("rst_n", true),
                Event::DelayUs(1_000),
                Event::Pin("inc", true),
                Event::DelayUs(1_000),
                Event::Pin("inc", false),
                Event::DelayUs(1_000),
                Event::Pin("inc", true),
                Event::DelayUs(1_000),
                Event::Pin("inc", false),
                Event::DelayUs(1_000),
                Event::Pin("ena", true),
            ]
        );
        assert_eq!(mux.current(), Some(2));
    }

    #[test]
    fn test_inc_pulses_match_design() {
        let log = EventLog::default();
        let mut mux = mux(&log);
        block_on(mux.select(37, &mut LoggedDelay::new(&log)));

        let rising: Vec<_> = log
            .borrow()
            .iter()
            .filter(|e| **e == Event::Pin("inc", true))
            .copied()
            .collect();
        assert_eq!(rising.len(), 37);
    }

    #[test]
    fn test_design_zero_only_resets() {
        let log = EventLog::default();
        let mut mux = mux(&log);
        block_on(mux.select(0, &mut LoggedDelay::new(&log)));
        assert!(!log.borrow().contains(&Event::Pin("inc", true)));
        assert_eq!(log.borrow().last(), Some(&Event::Pin("ena", true)));
        assert_eq!(mux.current(), Some(0));
    }

    #[test]
    fn test_starts_disabled() {
        let log = EventLog::default();
        let mut mux = DesignMux::new(
            LoggedPin::new("ena", &log),
            LoggedPin::new("rst_n", &log),
            LoggedPin::new("inc", &log),
        );
        assert_eq!(mux.current(), None);
        assert_eq!(log.borrow()[0], Event::Pin("ena", false));

        block_on(mux.select(1, &mut LoggedDelay::new(&log)));
        mux.disable();
        assert_eq!(mux.current(), None);
        assert_eq!(log.borrow().last(), Some(&Event::Pin("ena", false)));
    }

    #[test]
    fn test_restore() {
        let log = EventLog::default();
        let mut mux = mux(&log);
        let mut delay = LoggedDelay::new(&log);

        block_on(mux.select(5, &mut delay));
        let saved = mux.current();
        block_on(mux.select(0, &mut delay));
        log.borrow_mut().clear();

        block_on(mux.restore(saved, &mut delay));
        assert_eq!(mux.current(), Some(5));
        let rising = log
            .borrow()
            .iter()
            .filter(|e| **e == Event::Pin("inc", true))
            .count();
        assert_eq!(rising, 5);

        // Already on the saved design: no edges
        log.borrow_mut().clear();
        block_on(mux.restore(saved, &mut delay));
        assert!(log.borrow().is_empty());

        block_on(mux.restore(None, &mut delay));
        assert_eq!(mux.current(), None);
        assert_eq!(*log.borrow(), [Event::Pin("ena", false)]);
    }
}
