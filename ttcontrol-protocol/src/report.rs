//! `key=value` report lines sent back to the host.

use core::fmt::Write;
use heapless::String;

/// Maximum report line length, including the trailing newline
pub const MAX_REPORT_LEN: usize = 160;

/// Report formatting errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ReportError {
    /// Line would exceed [`MAX_REPORT_LEN`]
    Overflow,
}

impl From<core::fmt::Error> for ReportError {
    fn from(_: core::fmt::Error) -> Self {
        ReportError::Overflow
    }
}

/// Value half of a report line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Value<'a> {
    /// Decimal integer
    Dec(u32),
    /// `0x` prefixed lowercase hex
    Hex(u32),
    /// Byte string as bare lowercase hex digits
    Bytes(&'a [u8]),
    /// Text, written verbatim
    Text(&'a str),
}

/// A single formatted report line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    line: String<MAX_REPORT_LEN>,
}

impl Report {
    /// Format `key=value\n`
    pub fn new(key: &str, value: Value<'_>) -> Result<Self, ReportError> {
        let mut line = String::new();
        line.push_str(key).map_err(|_| ReportError::Overflow)?;
        line.push('=').map_err(|_| ReportError::Overflow)?;

        match value {
            Value::Dec(v) => write!(line, "{}", v)?,
            Value::Hex(v) => write!(line, "{:#x}", v)?,
            Value::Bytes(bytes) => {
                for b in bytes {
                    write!(line, "{:02x}", b)?;
                }
            }
            Value::Text(text) => line.push_str(text).map_err(|_| ReportError::Overflow)?,
        }

        line.push('\n').map_err(|_| ReportError::Overflow)?;
        Ok(Self { line })
    }

    /// Format `error=<kind>\n`
    pub fn error(kind: &str) -> Result<Self, ReportError> {
        Self::new("error", Value::Text(kind))
    }

    /// Line text including the trailing newline
    pub fn as_str(&self) -> &str {
        &self.line
    }

    /// Line bytes including the trailing newline
    pub fn as_bytes(&self) -> &[u8] {
        self.line.as_bytes()
    }
}
