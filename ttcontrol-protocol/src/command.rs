//! Host command definitions and parsing.
//!
//! Commands use call syntax, `name(arg, arg)`. A few names from the
//! MicroPython SDK (`flash.identify()`, `flash.erase_sector()`,
//! `flash.program_sectors()`, `flash.program_base64()`) are accepted as
//! aliases so existing host tooling keeps working.

use crate::payload::MAX_BASE64_TEXT;

/// Maximum number of arguments any command takes
const MAX_ARGS: usize = 3;

/// Commands sent from the host to the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command<'a> {
    /// Report firmware and protocol version
    Version,
    /// Select the active design (0 = factory test)
    SelectDesign(u16),
    /// Set the project clock frequency (0 stops the clock)
    SetClockHz(u32),
    /// Issue n manual clock pulses
    ManualClock(u32),
    /// Pulse the project reset line
    ResetProject,
    /// Drive ui_in from the controller (true) or release it to the board
    EnableUiIn(bool),
    /// Write a byte to ui_in
    WriteUiIn(u8),
    /// Sample uo_out
    ReadUoOut,
    /// Read and decode the chip ROM
    ReadRom,
    /// Check the chip ROM answers through the project pins
    FactoryTest,
    /// Report the SPI flash JEDEC ID
    FlashId,
    /// Erase the erase block containing the address
    FlashEraseSector(u32),
    /// Start a streamed programming session at the address
    ///
    /// `verify: None` leaves the choice to the board configuration.
    FlashProgram { address: u32, verify: Option<bool> },
    /// Program one base64 encoded block at the address
    FlashProgramBase64 {
        address: u32,
        data: &'a str,
        verify: Option<bool>,
    },
    /// Dump up to 64 bytes of flash as hex
    FlashRead { address: u32, length: u8 },
    /// Persist the active board configuration to storage
    ConfigSave,
    /// Remove the persisted configuration override
    ConfigReset,
}

/// Errors from command parsing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ParseError {
    /// Line was empty
    Empty,
    /// Missing `(` or `)`
    Syntax,
    /// Command name not recognized
    UnknownCommand,
    /// Wrong number of arguments
    ArgumentCount,
    /// Argument could not be parsed or is out of range
    InvalidArgument,
}

impl ParseError {
    /// Short name used in `error=` reports
    pub fn as_str(&self) -> &'static str {
        match self {
            ParseError::Empty => "empty",
            ParseError::Syntax => "syntax",
            ParseError::UnknownCommand => "unknown_command",
            ParseError::ArgumentCount => "argument_count",
            ParseError::InvalidArgument => "invalid_argument",
        }
    }
}

impl<'a> Command<'a> {
    /// Parse a command line
    ///
    /// Text arguments borrow from `line`.
    pub fn parse(line: &'a str) -> Result<Self, ParseError> {
        let line = line.trim();
        if line.is_empty() {
            return Err(ParseError::Empty);
        }

        let open = line.find('(').ok_or(ParseError::Syntax)?;
        if !line.ends_with(')') {
            return Err(ParseError::Syntax);
        }
        let name = line[..open].trim();
        let inner = &line[open + 1..line.len() - 1];

        let mut args: heapless::Vec<&'a str, MAX_ARGS> = heapless::Vec::new();
        if !inner.trim().is_empty() {
            for arg in inner.split(',') {
                args.push(strip_keyword(arg.trim()))
                    .map_err(|_| ParseError::ArgumentCount)?;
            }
        }

        match name {
            "version" => {
                expect_args(&args, 0, 0)?;
                Ok(Command::Version)
            }
            "select_design" => {
                expect_args(&args, 1, 1)?;
                let design = parse_int(args[0])?;
                Ok(Command::SelectDesign(
                    u16::try_from(design).map_err(|_| ParseError::InvalidArgument)?,
                ))
            }
            "set_clock_hz" => {
                expect_args(&args, 1, 1)?;
                Ok(Command::SetClockHz(parse_int(args[0])?))
            }
            "manual_clock" => {
                expect_args(&args, 0, 1)?;
                let count = match args.first() {
                    Some(arg) => parse_int(arg)?,
                    None => 1,
                };
                Ok(Command::ManualClock(count))
            }
            "reset_project" => {
                expect_args(&args, 0, 0)?;
                Ok(Command::ResetProject)
            }
            "enable_ui_in" => {
                expect_args(&args, 1, 1)?;
                Ok(Command::EnableUiIn(parse_bool(args[0])?))
            }
            "write_ui_in" => {
                expect_args(&args, 1, 1)?;
                let value = parse_int(args[0])?;
                Ok(Command::WriteUiIn(
                    u8::try_from(value).map_err(|_| ParseError::InvalidArgument)?,
                ))
            }
            "read_uo_out" => {
                expect_args(&args, 0, 0)?;
                Ok(Command::ReadUoOut)
            }
            "read_rom" => {
                expect_args(&args, 0, 0)?;
                Ok(Command::ReadRom)
            }
            "run_factory_test" => {
                expect_args(&args, 0, 0)?;
                Ok(Command::FactoryTest)
            }
            "flash_id" | "flash.identify" => {
                expect_args(&args, 0, 0)?;
                Ok(Command::FlashId)
            }
            "flash_erase_sector" | "flash.erase_sector" => {
                expect_args(&args, 1, 1)?;
                Ok(Command::FlashEraseSector(parse_int(args[0])?))
            }
            "flash_program" | "flash.program_sectors" => {
                expect_args(&args, 1, 2)?;
                let address = parse_int(args[0])?;
                let verify = args.get(1).map(|arg| parse_bool(arg)).transpose()?;
                Ok(Command::FlashProgram { address, verify })
            }
            "flash_program_base64" | "flash.program_base64" => {
                expect_args(&args, 2, 3)?;
                let address = parse_int(args[0])?;
                let data = parse_text(args[1])?;
                if data.is_empty() || data.len() > MAX_BASE64_TEXT {
                    return Err(ParseError::InvalidArgument);
                }
                let verify = args.get(2).map(|arg| parse_bool(arg)).transpose()?;
                Ok(Command::FlashProgramBase64 {
                    address,
                    data,
                    verify,
                })
            }
            "flash_read" => {
                expect_args(&args, 2, 2)?;
                let address = parse_int(args[0])?;
                let length = parse_int(args[1])?;
                if length == 0 || length > 64 {
                    return Err(ParseError::InvalidArgument);
                }
                Ok(Command::FlashRead {
                    address,
                    length: length as u8,
                })
            }
            "config_save" => {
                expect_args(&args, 0, 0)?;
                Ok(Command::ConfigSave)
            }
            "config_reset" => {
                expect_args(&args, 0, 0)?;
                Ok(Command::ConfigReset)
            }
            _ => Err(ParseError::UnknownCommand),
        }
    }
}

fn expect_args(args: &[&str], min: usize, max: usize) -> Result<(), ParseError> {
    if args.len() < min || args.len() > max {
        return Err(ParseError::ArgumentCount);
    }
    Ok(())
}

/// Drop a `keyword=` prefix, keeping only the value
///
/// Quoted text is left alone: base64 padding is not a keyword.
fn strip_keyword(arg: &str) -> &str {
    if arg.starts_with(['"', '\'']) {
        return arg;
    }
    match arg.split_once('=') {
        Some((_, value)) => value.trim(),
        None => arg,
    }
}

/// Unquote a Python string literal
fn parse_text(text: &str) -> Result<&str, ParseError> {
    ['"', '\'']
        .iter()
        .find_map(|&q| text.strip_prefix(q)?.strip_suffix(q))
        .ok_or(ParseError::InvalidArgument)
}

/// Parse a decimal or `0x` hex integer, allowing `_` separators
pub fn parse_int(text: &str) -> Result<u32, ParseError> {
    let (digits, radix) = match text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
    {
        Some(hex) => (hex, 16),
        None => (text, 10),
    };

    let mut value: u32 = 0;
    let mut seen_digit = false;
    for c in digits.chars() {
        if c == '_' {
            continue;
        }
        let digit = c.to_digit(radix).ok_or(ParseError::InvalidArgument)?;
        value = value
            .checked_mul(radix)
            .and_then(|v| v.checked_add(digit))
            .ok_or(ParseError::InvalidArgument)?;
        seen_digit = true;
    }

    if !seen_digit {
        return Err(ParseError::InvalidArgument);
    }
    Ok(value)
}

/// Parse a boolean in Python or numeric spelling
pub fn parse_bool(text: &str) -> Result<bool, ParseError> {
    match text {
        "True" | "true" | "1" => Ok(true),
        "False" | "false" | "0" => Ok(false),
        _ => Err(ParseError::InvalidArgument),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_simple_commands() {
        assert_eq!(Command::parse("version()"), Ok(Command::Version));
        assert_eq!(Command::parse("read_rom()"), Ok(Command::ReadRom));
        assert_eq!(Command::parse(" reset_project( ) "), Ok(Command::ResetProject));
        assert_eq!(Command::parse("read_uo_out()"), Ok(Command::ReadUoOut));
        assert_eq!(Command::parse("run_factory_test()"), Ok(Command::FactoryTest));
    }

    #[test]
    fn test_integer_arguments() {
        assert_eq!(Command::parse("select_design(12)"), Ok(Command::SelectDesign(12)));
        assert_eq!(
            Command::parse("set_clock_hz(10_000_000)"),
            Ok(Command::SetClockHz(10_000_000))
        );
        assert_eq!(
            Command::parse("flash_erase_sector(0x10_0000)"),
            Ok(Command::FlashEraseSector(0x100000))
        );
        assert_eq!(Command::parse("write_ui_in(0xA5)"), Ok(Command::WriteUiIn(0xA5)));
    }

    #[test]
    fn test_defaults() {
        assert_eq!(Command::parse("manual_clock()"), Ok(Command::ManualClock(1)));
        assert_eq!(
            Command::parse("flash_program(0x1000)"),
            Ok(Command::FlashProgram { address: 0x1000, verify: None })
        );
    }

    #[test]
    fn test_booleans_and_keywords() {
        assert_eq!(Command::parse("enable_ui_in(True)"), Ok(Command::EnableUiIn(true)));
        assert_eq!(Command::parse("enable_ui_in(0)"), Ok(Command::EnableUiIn(false)));
        assert_eq!(
            Command::parse("flash.program_sectors(4096, verify=False)"),
            Ok(Command::FlashProgram { address: 4096, verify: Some(false) })
        );
    }

    #[test]
    fn test_program_base64() {
        assert_eq!(
            Command::parse("flash.program_base64(0x2000, \"AAE=\", verify=False)"),
            Ok(Command::FlashProgramBase64 {
                address: 0x2000,
                data: "AAE=",
                verify: Some(false),
            })
        );
        assert_eq!(
            Command::parse("flash_program_base64(16, 'q83vAA==')"),
            Ok(Command::FlashProgramBase64 {
                address: 16,
                data: "q83vAA==",
                verify: None,
            })
        );
        assert_eq!(
            Command::parse("flash_program_base64(0, AAE=)"),
            Err(ParseError::InvalidArgument)
        );
        assert_eq!(
            Command::parse("flash_program_base64(0, \"\")"),
            Err(ParseError::InvalidArgument)
        );
        assert_eq!(
            Command::parse("flash_program_base64(0)"),
            Err(ParseError::ArgumentCount)
        );
    }

    #[test]
    fn test_aliases() {
        assert_eq!(Command::parse("flash.identify()"), Ok(Command::FlashId));
        assert_eq!(
            Command::parse("flash.erase_sector(0)"),
            Ok(Command::FlashEraseSector(0))
        );
    }

    #[test]
    fn test_flash_read_bounds() {
        assert_eq!(
            Command::parse("flash_read(0x2000, 16)"),
            Ok(Command::FlashRead { address: 0x2000, length: 16 })
        );
        assert_eq!(Command::parse("flash_read(0, 0)"), Err(ParseError::InvalidArgument));
        assert_eq!(Command::parse("flash_read(0, 65)"), Err(ParseError::InvalidArgument));
    }

    #[test]
    fn test_errors() {
        assert_eq!(Command::parse(""), Err(ParseError::Empty));
        assert_eq!(Command::parse("version"), Err(ParseError::Syntax));
        assert_eq!(Command::parse("version("), Err(ParseError::Syntax));
        assert_eq!(Command::parse("launch()"), Err(ParseError::UnknownCommand));
        assert_eq!(Command::parse("version(1)"), Err(ParseError::ArgumentCount));
        assert_eq!(Command::parse("select_design()"), Err(ParseError::ArgumentCount));
        assert_eq!(Command::parse("flash_program(1, 2, 3)"), Err(ParseError::ArgumentCount));
        assert_eq!(Command::parse("flash_read(1, 2, 3, 4)"), Err(ParseError::ArgumentCount));
        assert_eq!(Command::parse("select_design(x)"), Err(ParseError::InvalidArgument));
        assert_eq!(Command::parse("select_design(70000)"), Err(ParseError::InvalidArgument));
        assert_eq!(Command::parse("write_ui_in(256)"), Err(ParseError::InvalidArgument));
        assert_eq!(Command::parse("enable_ui_in(yes)"), Err(ParseError::InvalidArgument));
    }

    #[test]
    fn test_parse_int_edge_cases() {
        assert_eq!(parse_int("0"), Ok(0));
        assert_eq!(parse_int("0xffffffff"), Ok(u32::MAX));
        assert_eq!(parse_int("4294967296"), Err(ParseError::InvalidArgument));
        assert_eq!(parse_int("0x"), Err(ParseError::InvalidArgument));
        assert_eq!(parse_int("_"), Err(ParseError::InvalidArgument));
        assert_eq!(parse_int("-1"), Err(ParseError::InvalidArgument));
    }

    proptest! {
        #[test]
        fn prop_clock_hz_decimal_and_hex_agree(hz in any::<u32>()) {
            let decimal = std::format!("set_clock_hz({})", hz);
            let hex = std::format!("set_clock_hz({:#x})", hz);
            prop_assert_eq!(Command::parse(&decimal), Ok(Command::SetClockHz(hz)));
            prop_assert_eq!(Command::parse(&hex), Ok(Command::SetClockHz(hz)));
        }

        #[test]
        fn prop_arbitrary_text_never_panics(text in "\\PC{0,64}") {
            let _ = Command::parse(&text);
        }
    }
}
