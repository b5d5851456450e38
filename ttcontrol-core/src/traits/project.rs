//! Project I/O access

/// The selected project's dedicated inputs and outputs
pub trait ProjectIo {
    /// Drive all eight `ui_in` pins
    fn write_ui_in(&mut self, value: u8);

    /// Sample all eight `uo_out` pins
    fn read_uo_out(&mut self) -> u8;
}

impl<T: ProjectIo + ?Sized> ProjectIo for &mut T {
    fn write_ui_in(&mut self, value: u8) {
        T::write_ui_in(self, value)
    }

    fn read_uo_out(&mut self) -> u8 {
        T::read_uo_out(self)
    }
}
