//! Line assembly for the host command stream.
//!
//! Bytes arrive one at a time from the serial link. The parser collects
//! them into lines terminated by `\n`, ignoring `\r` so that both Unix and
//! terminal-style line endings work.
//!
//! The interrupt character discards whatever has been collected so far.
//! Binary payloads never pass through this parser, so it is always active
//! here; masking it is the job of whoever reads raw data.
//!
//! A line longer than [`MAX_LINE_LEN`] is reported once and the rest of it
//! is discarded up to the next newline, so a runaway sender cannot wedge
//! the parser.

use heapless::{String, Vec};

/// Host interrupt character (Ctrl-C)
pub const INTERRUPT_CHAR: u8 = 0x03;

/// Maximum command line length in bytes
///
/// Long enough for a `flash_program_base64` line carrying a full block.
pub const MAX_LINE_LEN: usize = 512;

/// A complete command line (without terminator)
pub type Line = String<MAX_LINE_LEN>;

/// Errors that can occur during line assembly
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LineError {
    /// Line exceeded the maximum length and is being discarded
    TooLong,
    /// Line is not valid UTF-8
    InvalidUtf8,
    /// Interrupt character received, partial line dropped
    Interrupted,
}

impl LineError {
    /// Short name used in `error=` reports
    pub fn as_str(&self) -> &'static str {
        match self {
            LineError::TooLong => "line_too_long",
            LineError::InvalidUtf8 => "invalid_utf8",
            LineError::Interrupted => "interrupted",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    /// Collecting bytes of the current line
    Collecting,
    /// Dropping bytes until the end of an overlong line
    Discarding,
}

/// State machine assembling lines from a byte stream
#[derive(Debug, Clone)]
pub struct LineParser {
    state: ParseState,
    buffer: Vec<u8, MAX_LINE_LEN>,
}

impl Default for LineParser {
    fn default() -> Self {
        Self::new()
    }
}

impl LineParser {
    /// Create a new line parser
    pub fn new() -> Self {
        Self {
            state: ParseState::Collecting,
            buffer: Vec::new(),
        }
    }

    /// Reset the parser state, dropping any partial line
    pub fn reset(&mut self) {
        self.state = ParseState::Collecting;
        self.buffer.clear();
    }

    /// Feed a single byte to the parser
    ///
    /// Returns `Ok(Some(line))` when a line is complete, `Ok(None)` when
    /// more bytes are needed, or `Err` when the current line is rejected.
    /// Empty lines are skipped.
    pub fn feed(&mut self, byte: u8) -> Result<Option<Line>, LineError> {
        if byte == INTERRUPT_CHAR {
            self.reset();
            return Err(LineError::Interrupted);
        }

        match self.state {
            ParseState::Discarding => {
                if byte == b'\n' {
                    self.state = ParseState::Collecting;
                }
                Ok(None)
            }
            ParseState::Collecting => match byte {
                b'\r' => Ok(None),
                b'\n' => self.finish(),
                _ => {
                    if self.buffer.push(byte).is_err() {
                        self.buffer.clear();
                        self.state = ParseState::Discarding;
                        return Err(LineError::TooLong);
                    }
                    Ok(None)
                }
            },
        }
    }

    /// Feed multiple bytes to the parser
    ///
    /// Returns the first complete line found together with the number of
    /// bytes consumed. Bytes after the line are left for the next call.
    pub fn feed_bytes(&mut self, bytes: &[u8]) -> (usize, Result<Option<Line>, LineError>) {
        for (i, &byte) in bytes.iter().enumerate() {
            match self.feed(byte) {
                Ok(None) => {}
                other => return (i + 1, other),
            }
        }
        (bytes.len(), Ok(None))
    }

    fn finish(&mut self) -> Result<Option<Line>, LineError> {
        if self.buffer.is_empty() {
            return Ok(None);
        }

        let bytes = core::mem::take(&mut self.buffer);
        let text = core::str::from_utf8(&bytes).map_err(|_| LineError::InvalidUtf8)?;
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }

        let mut line = Line::new();
        // Cannot fail: the trimmed text is no longer than the buffer
        let _ = line.push_str(trimmed);
        Ok(Some(line))
    }
}
