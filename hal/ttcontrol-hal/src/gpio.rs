//! GPIO pin abstractions
//!
//! Provides traits for digital input, output and bidirectional pins that
//! can be implemented by chip-specific HALs.

/// Digital output pin
///
/// Implementations should handle the actual hardware register manipulation
/// for the specific chip.
pub trait OutputPin {
    /// Set the pin high (logic 1)
    fn set_high(&mut self);

    /// Set the pin low (logic 0)
    fn set_low(&mut self);

    /// Toggle the pin state
    fn toggle(&mut self) {
        if self.is_set_high() {
            self.set_low();
        } else {
            self.set_high();
        }
    }

    /// Set the pin to a specific state
    fn set_state(&mut self, high: bool) {
        if high {
            self.set_high();
        } else {
            self.set_low();
        }
    }

    /// Check if the pin is currently set high
    fn is_set_high(&self) -> bool;

    /// Check if the pin is currently set low
    fn is_set_low(&self) -> bool {
        !self.is_set_high()
    }
}

/// Digital input pin
///
/// Implementations should handle the actual hardware register reading
/// for the specific chip.
pub trait InputPin {
    /// Check if the pin reads high (logic 1)
    fn is_high(&self) -> bool;

    /// Check if the pin reads low (logic 0)
    fn is_low(&self) -> bool {
        !self.is_high()
    }
}

/// Pin that can be used for both input and output
///
/// Some applications need to read the state of an output pin or
/// dynamically switch between input and output modes.
pub trait IoPin: OutputPin + InputPin {}

// Blanket implementation for types that implement both traits
impl<T: OutputPin + InputPin> IoPin for T {}

/// Pin whose direction can be changed at runtime
///
/// The project's bidirectional pins are inputs while a design owns them and
/// become outputs only while the controller drives them (e.g. for the SPI
/// flash that shares them).
pub trait FlexPin: IoPin {
    /// Switch the pin to output, keeping the last driven level
    fn set_as_output(&mut self);

    /// Switch the pin to input (high impedance)
    fn set_as_input(&mut self);

    /// Check if the pin is currently an output
    fn is_output(&self) -> bool;
}

impl<T: OutputPin + ?Sized> OutputPin for &mut T {
    fn set_high(&mut self) {
        T::set_high(self)
    }

    fn set_low(&mut self) {
        T::set_low(self)
    }

    fn toggle(&mut self) {
        T::toggle(self)
    }

    fn is_set_high(&self) -> bool {
        T::is_set_high(self)
    }
}

impl<T: InputPin + ?Sized> InputPin for &mut T {
    fn is_high(&self) -> bool {
        T::is_high(self)
    }
}

impl<T: FlexPin + ?Sized> FlexPin for &mut T {
    fn set_as_output(&mut self) {
        T::set_as_output(self)
    }

    fn set_as_input(&mut self) {
        T::set_as_input(self)
    }

    fn is_output(&self) -> bool {
        T::is_output(self)
    }
}
