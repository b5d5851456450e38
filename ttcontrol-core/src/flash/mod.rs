//! SPI NOR flash programming
//!
//! The flash chip hangs off the project's bidirectional pins. Everything
//! here is transport-agnostic: command encoding and geometry math live in
//! this crate, the bus-level driver lives in `ttcontrol-drivers` and is
//! reached through [`SpiFlash`](crate::traits::SpiFlash).
//!
//! # Streamed programming
//!
//! The host sends repeated chunks, each a decimal length line followed
//! by that many raw bytes, and ends with a `0` line:
//!
//! ```text
//! 300\n<300 bytes>0\n
//! ```
//!
//! The session answers with `flash_prog=0x<address>` before the first
//! chunk, after every chunk, and `flash_prog=ok` once the `0` line is
//! seen.

pub mod commands;
pub mod error;
pub mod geometry;
pub mod session;
pub mod stream;

pub use error::{FlashError, SessionError};
pub use geometry::{FlashGeometry, PageSegment, MAX_ADDRESS, MAX_PAGE_SIZE};
pub use session::{program_block, program_sectors, InterruptGuard, ProgramSession};
pub use stream::{read_chunk_length, MAX_LENGTH_DIGITS};
