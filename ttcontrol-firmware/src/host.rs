//! Controller side of the host link
//!
//! [`HostReader`] serves the received byte stream both as command lines
//! and as raw programming payload; [`HostWriter`] queues report lines.
//! The USB tasks on the other side of the pipes move the bytes.

use core::convert::Infallible;

use defmt::*;
use embassy_time::{with_timeout, Duration};
use embedded_io_async::{ErrorType, Read, Write};

use ttcontrol_protocol::{Report, Value};

use crate::channels::{HOST_RX, HOST_TX};

/// How long a payload stream may stall before it counts as ended
const STREAM_IDLE_TIMEOUT: Duration = Duration::from_secs(5);

/// Bytes pulled from the pipe at once
const READ_CHUNK: usize = 64;

/// Buffered reader over the host receive pipe
///
/// Bytes left over after a command line stay buffered, so payload sent
/// right behind `flash_program(...)` is not lost.
pub struct HostReader {
    buf: [u8; READ_CHUNK],
    start: usize,
    end: usize,
}

impl HostReader {
    pub const fn new() -> Self {
        Self {
            buf: [0; READ_CHUNK],
            start: 0,
            end: 0,
        }
    }

    /// Wait until at least one byte is buffered, with no time limit
    pub async fn fill(&mut self) {
        if self.start == self.end {
            self.end = HOST_RX.read(&mut self.buf).await;
            self.start = 0;
        }
    }

    /// Bytes buffered and not yet consumed
    pub fn buffered(&self) -> &[u8] {
        &self.buf[self.start..self.end]
    }

    /// Mark `n` buffered bytes as used
    pub fn consume(&mut self, n: usize) {
        self.start = (self.start + n).min(self.end);
    }

    /// Drop everything received so far
    pub fn discard(&mut self) {
        self.start = 0;
        self.end = 0;
        HOST_RX.clear();
    }
}

impl ErrorType for HostReader {
    type Error = Infallible;
}

impl Read for HostReader {
    /// Buffered bytes first, then the pipe
    ///
    /// Waiting on the pipe is bounded by the stream idle timeout; a
    /// timeout reads as end of stream.
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        if buf.is_empty() {
            return Ok(0);
        }

        if self.start == self.end {
            return match with_timeout(STREAM_IDLE_TIMEOUT, HOST_RX.read(buf)).await {
                Ok(n) => Ok(n),
                Err(_) => {
                    warn!("Host stream idle for {} ms", STREAM_IDLE_TIMEOUT.as_millis());
                    Ok(0)
                }
            };
        }

        let n = buf.len().min(self.end - self.start);
        buf[..n].copy_from_slice(&self.buf[self.start..self.start + n]);
        self.start += n;
        Ok(n)
    }
}

/// Report sink feeding the host transmit pipe
pub struct HostWriter;

impl HostWriter {
    /// Queue a `key=value` line
    pub async fn report(&mut self, key: &str, value: Value<'_>) {
        match Report::new(key, value) {
            Ok(line) => HOST_TX.write_all(line.as_bytes()).await,
            Err(_) => warn!("Report {} does not fit a line", key),
        }
    }

    /// Queue an `error=<kind>` line
    pub async fn error(&mut self, kind: &str) {
        self.report("error", Value::Text(kind)).await
    }
}

impl ErrorType for HostWriter {
    type Error = Infallible;
}

impl Write for HostWriter {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        if buf.is_empty() {
            return Ok(0);
        }
        Ok(HOST_TX.write(buf).await)
    }

    async fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}
