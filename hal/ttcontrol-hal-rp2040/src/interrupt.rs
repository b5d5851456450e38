//! Host interrupt character flag
//!
//! The USB receive path calls [`HostInterruptFlag::raise`] for every
//! `0x03` it sees; long-running commands poll
//! [`HostInterruptFlag::take_pending`] between steps.

use portable_atomic::{AtomicBool, Ordering};
use ttcontrol_hal::HostInterrupt;

static ENABLED: AtomicBool = AtomicBool::new(true);
static PENDING: AtomicBool = AtomicBool::new(false);

/// Handle to the global interrupt flag
#[derive(Debug, Clone, Copy, Default)]
pub struct HostInterruptFlag;

impl HostInterruptFlag {
    /// Record an interrupt character
    ///
    /// Returns `false` while masked, in which case the byte is payload.
    pub fn raise(&self) -> bool {
        if !ENABLED.load(Ordering::Relaxed) {
            return false;
        }
        PENDING.store(true, Ordering::Relaxed);
        true
    }

    /// Check and clear a pending interrupt
    pub fn take_pending(&self) -> bool {
        PENDING.swap(false, Ordering::Relaxed)
    }
}

impl HostInterrupt for HostInterruptFlag {
    fn set_enabled(&mut self, enabled: bool) {
        ENABLED.store(enabled, Ordering::Relaxed);
        if !enabled {
            PENDING.store(false, Ordering::Relaxed);
        }
    }

    fn is_enabled(&self) -> bool {
        ENABLED.load(Ordering::Relaxed)
    }
}
