//! Host interrupt masking
//!
//! The host can abort a running command by sending the interrupt
//! character. While binary data is being streamed that byte is payload,
//! not a request, so the character handling must be suspended.

/// Control over the host interrupt character
pub trait HostInterrupt {
    /// Enable or disable interpretation of the interrupt character
    fn set_enabled(&mut self, enabled: bool);

    /// Check if the interrupt character is currently honored
    fn is_enabled(&self) -> bool;
}

impl<T: HostInterrupt + ?Sized> HostInterrupt for &mut T {
    fn set_enabled(&mut self, enabled: bool) {
        T::set_enabled(self, enabled)
    }

    fn is_enabled(&self) -> bool {
        T::is_enabled(self)
    }
}
