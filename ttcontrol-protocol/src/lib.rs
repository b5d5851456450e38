//! Host Command Protocol
//!
//! This crate defines the line-oriented text protocol between the host
//! (a browser app or a terminal) and the demo board controller.
//!
//! # Protocol Overview
//!
//! The host sends one command per line using call syntax:
//! ```text
//! select_design(12)
//! set_clock_hz(10_000_000)
//! flash_program(0x100000, True)
//! flash_program_base64(0x100000, "AAE=")
//! ```
//!
//! The controller answers with `key=value` report lines:
//! ```text
//! tt.design=12
//! tt.clk_freq=10000000
//! flash_prog=0x100000
//! ```
//!
//! Integers may be decimal or `0x` hex and may contain `_` separators.
//! Errors are reported as `error=<kind>` and never end the session. The
//! interrupt character (Ctrl-C) aborts the command in progress unless the
//! controller is streaming binary data.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

pub mod command;
pub mod line;
pub mod payload;
pub mod report;

pub use command::{Command, ParseError};
pub use line::{Line, LineError, LineParser, INTERRUPT_CHAR, MAX_LINE_LEN};
pub use payload::{decode_block, Block, MAX_BASE64_BLOCK};
pub use report::{Report, ReportError, Value, MAX_REPORT_LEN};

/// Protocol revision announced by `version()`
pub const PROTOCOL_VERSION: u32 = 1;
