//! Logging macros
//!
//! Thin wrappers over defmt so that drivers can log without forcing
//! defmt on host builds. Without the `defmt` feature the arguments are
//! still type-checked but nothing is emitted.

#[cfg(feature = "defmt")]
macro_rules! debug {
    ($($arg:tt)*) => (defmt::debug!($($arg)*));
}

#[cfg(not(feature = "defmt"))]
macro_rules! debug {
    ($fmt:expr $(, $arg:expr)* $(,)?) => {{
        let _ = ($fmt, $(&$arg),*);
    }};
}

#[cfg(feature = "defmt")]
macro_rules! warn {
    ($($arg:tt)*) => (defmt::warn!($($arg)*));
}

#[cfg(not(feature = "defmt"))]
macro_rules! warn {
    ($fmt:expr $(, $arg:expr)* $(,)?) => {{
        let _ = ($fmt, $(&$arg),*);
    }};
}

#[cfg(feature = "defmt")]
macro_rules! trace {
    ($($arg:tt)*) => (defmt::trace!($($arg)*));
}

#[cfg(not(feature = "defmt"))]
macro_rules! trace {
    ($fmt:expr $(, $arg:expr)* $(,)?) => {{
        let _ = ($fmt, $(&$arg),*);
    }};
}
