//! Flash and programming session errors.

/// Errors from flash primitives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FlashError<E> {
    /// Underlying SPI transport failed
    Bus(E),
    /// Device stayed busy for the whole polling budget
    DeviceTimeout,
    /// Page program would cross a page boundary
    PageBoundary,
    /// Address does not fit in 24 bits
    AddressOutOfRange,
}

impl<E> FlashError<E> {
    /// Short name used in `error=` reports
    pub fn as_str(&self) -> &'static str {
        match self {
            FlashError::Bus(_) => "bus",
            FlashError::DeviceTimeout => "device_timeout",
            FlashError::PageBoundary => "page_boundary",
            FlashError::AddressOutOfRange => "address_out_of_range",
        }
    }
}

/// Errors from a streamed programming session
///
/// All of these end the session; nothing is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SessionError<E> {
    /// Flash primitive failed
    Flash(FlashError<E>),
    /// Read-back differs from what was written
    VerificationFailure { address: u32 },
    /// Host stream ended before the declared chunk length
    ProtocolUnderrun,
    /// Chunk length line is not a decimal number
    MalformedChunkHeader,
    /// Host link read or write failed
    Link,
}

impl<E> From<FlashError<E>> for SessionError<E> {
    fn from(e: FlashError<E>) -> Self {
        SessionError::Flash(e)
    }
}

impl<E> SessionError<E> {
    /// Short name used in `error=` reports
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionError::Flash(e) => e.as_str(),
            SessionError::VerificationFailure { .. } => "verification_failure",
            SessionError::ProtocolUnderrun => "protocol_underrun",
            SessionError::MalformedChunkHeader => "malformed_chunk_header",
            SessionError::Link => "link",
        }
    }
}
