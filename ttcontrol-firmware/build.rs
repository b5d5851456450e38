//! Build script for ttcontrol-firmware
//!
//! - Sets up linker search paths for memory.x
//! - Validates board.toml at compile time

use std::collections::HashMap;
use std::env;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Highest GPIO number on the RP2040
const MAX_GPIO: i64 = 29;

/// Pins in each project bus
const BUS_WIDTH: usize = 8;

fn main() {
    setup_linker();
    validate_config();
}

/// Set up linker search paths for memory.x
fn setup_linker() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());

    let memory_x = include_bytes!("memory.x");
    let mut f = File::create(out_dir.join("memory.x")).unwrap();
    f.write_all(memory_x).unwrap();

    println!("cargo:rustc-link-search={}", out_dir.display());

    println!("cargo:rerun-if-changed=memory.x");
    println!("cargo:rerun-if-changed=build.rs");
}

/// Validate board.toml at compile time
fn validate_config() {
    println!("cargo:rerun-if-changed=board.toml");

    let config_path = Path::new("board.toml");

    if !config_path.exists() {
        panic!(
            "\n\
            ╔══════════════════════════════════════════════════════════════════╗\n\
            ║  ERROR: board.toml not found!                                    ║\n\
            ║                                                                  ║\n\
            ║  The firmware embeds its default configuration from board.toml   ║\n\
            ║  in the ttcontrol-firmware directory.                            ║\n\
            ╚══════════════════════════════════════════════════════════════════╝\n"
        );
    }

    let config_content = match fs::read_to_string(config_path) {
        Ok(content) => content,
        Err(e) => {
            panic!(
                "\n\
                ╔══════════════════════════════════════════════════════════════════╗\n\
                ║  ERROR: Failed to read board.toml                                ║\n\
                ║                                                                  ║\n\
                ║  Error: {:<56} ║\n\
                ╚══════════════════════════════════════════════════════════════════╝\n",
                e
            );
        }
    };

    let config: toml::Value = match toml::from_str(&config_content) {
        Ok(value) => value,
        Err(e) => {
            let error_msg = e.to_string();
            panic!(
                "\n\
                ╔══════════════════════════════════════════════════════════════════╗\n\
                ║  ERROR: Invalid TOML syntax in board.toml                        ║\n\
                ╠══════════════════════════════════════════════════════════════════╣\n\
                ║                                                                  ║\n\
                {}\n\
                ║                                                                  ║\n\
                ╚══════════════════════════════════════════════════════════════════╝\n",
                format_error_lines(&error_msg)
            );
        }
    };

    let mut errors = Vec::new();
    validate_pins(&config, &mut errors);
    validate_clock(&config, &mut errors);
    validate_flash(&config, &mut errors);
    report_errors(&errors);

    println!("cargo:warning=board.toml validated successfully");
}

/// Format error message lines with box drawing
fn format_error_lines(msg: &str) -> String {
    msg.lines()
        .map(|line| {
            let truncated = if line.len() > 64 {
                format!("{}...", &line[..61])
            } else {
                line.to_string()
            };
            format!("║  {:<64} ║", truncated)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn report_errors(errors: &[String]) {
    if errors.is_empty() {
        return;
    }
    panic!(
        "\n\
        ╔══════════════════════════════════════════════════════════════════╗\n\
        ║  ERROR: Invalid board configuration                              ║\n\
        ╠══════════════════════════════════════════════════════════════════╣\n\
        {}\n\
        ╚══════════════════════════════════════════════════════════════════╝\n",
        errors
            .iter()
            .map(|e| format!("║  • {:<62} ║", e))
            .collect::<Vec<_>>()
            .join("\n")
    );
}

/// GPIO number of a pin string like "gpio11", "!gpio12" or "^gpio4"
fn pin_number(value: &str) -> Option<i64> {
    let number = value.trim_start_matches(['!', '^']).strip_prefix("gpio")?;
    number.parse().ok().filter(|n| (0..=MAX_GPIO).contains(n))
}

/// Validate the pin map: every pin valid, none used twice
fn validate_pins(config: &toml::Value, errors: &mut Vec<String>) {
    let Some(pins) = config.get("pins").and_then(|p| p.as_table()) else {
        errors.push("Missing [pins] section".to_string());
        return;
    };

    let mut used: HashMap<i64, String> = HashMap::new();
    let mut claim = |signal: String, value: &toml::Value, errors: &mut Vec<String>| {
        let Some(pin) = value.as_str().and_then(pin_number) else {
            errors.push(format!("[pins] {} is not a gpio0-gpio29 pin", signal));
            return;
        };
        if let Some(other) = used.insert(pin, signal.clone()) {
            errors.push(format!("[pins] gpio{} used by both {} and {}", pin, other, signal));
        }
    };

    for signal in ["clk", "rst_n", "ctrl_sel_inc", "ctrl_sel_rst_n", "ctrl_ena"] {
        match pins.get(signal) {
            Some(value) => claim(signal.to_string(), value, errors),
            None => errors.push(format!("[pins] missing '{}'", signal)),
        }
    }

    if pins.get("clk").and_then(|v| v.as_str()) != Some("gpio0") {
        errors.push("[pins] clk must be gpio0 (PWM slice 0 output A)".to_string());
    }

    for bus in ["ui_in", "uo_out", "uio"] {
        match pins.get(bus) {
            Some(toml::Value::String(first)) => match pin_number(first) {
                Some(first) if first + BUS_WIDTH as i64 - 1 <= MAX_GPIO => {
                    for bit in 0..BUS_WIDTH as i64 {
                        let value = toml::Value::String(format!("gpio{}", first + bit));
                        claim(format!("{}[{}]", bus, bit), &value, errors);
                    }
                }
                _ => errors.push(format!("[pins] {} needs eight GPIOs from {}", bus, first)),
            },
            Some(toml::Value::Array(list)) => {
                if list.len() != BUS_WIDTH {
                    errors.push(format!("[pins] {} must list exactly 8 pins", bus));
                }
                for (bit, value) in list.iter().enumerate() {
                    claim(format!("{}[{}]", bus, bit), value, errors);
                }
            }
            Some(_) => errors.push(format!("[pins] {} must be a pin or a list of pins", bus)),
            None => errors.push(format!("[pins] missing '{}'", bus)),
        }
    }
}

/// Validate clock limits
fn validate_clock(config: &toml::Value, errors: &mut Vec<String>) {
    let Some(clock) = config.get("clock").and_then(|c| c.as_table()) else {
        return;
    };

    let max = clock
        .get("max_system_hz")
        .and_then(|v| v.as_integer())
        .unwrap_or(133_000_000);
    if !(48_000_000..=266_000_000).contains(&max) {
        errors.push("[clock] max_system_hz must be 48-266 MHz".to_string());
    }

    if let Some(default_hz) = clock.get("default_hz").and_then(|v| v.as_integer()) {
        if default_hz < 0 || default_hz > max / 2 {
            errors.push("[clock] default_hz must be 0 to max_system_hz / 2".to_string());
        }
    }
}

/// Validate flash geometry and wiring
fn validate_flash(config: &toml::Value, errors: &mut Vec<String>) {
    let Some(flash) = config.get("flash").and_then(|f| f.as_table()) else {
        return;
    };

    let page = flash.get("page_size").and_then(|v| v.as_integer()).unwrap_or(256);
    let erase = flash.get("erase_size").and_then(|v| v.as_integer()).unwrap_or(page);
    if page <= 0 || page > 256 || page & (page - 1) != 0 {
        errors.push("[flash] page_size must be a power of two up to 256".to_string());
    } else if erase < page || erase % page != 0 {
        errors.push("[flash] erase_size must be a multiple of page_size".to_string());
    }

    let mut seen = Vec::new();
    for signal in ["sck", "mosi", "miso", "cs"] {
        let Some(index) = flash.get(signal).and_then(|v| v.as_integer()) else {
            continue;
        };
        if !(0..BUS_WIDTH as i64).contains(&index) {
            errors.push(format!("[flash] {} must be a uio index 0-7", signal));
        } else if seen.contains(&index) {
            errors.push(format!("[flash] {} shares uio{} with another signal", signal, index));
        }
        seen.push(index);
    }
}
