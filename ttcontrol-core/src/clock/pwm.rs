//! Mapping an even divisor onto PWM slice registers.

use ttcontrol_hal::PwmSettings;

/// Largest counter wrap (`top + 1`)
const MAX_WRAP: u64 = 1 << 16;

/// Divider range in sixteenths (1.0 to 255 + 15/16)
const MIN_DIV16: u64 = 16;
const MAX_DIV16: u64 = 255 * 16 + 15;

/// Compute PWM settings whose period is `divisor` system clock cycles
///
/// An integer clock divider is used when one fits, then a fractional one.
/// Divisors the hardware cannot represent get the closest period.
pub fn pwm_settings(divisor: u32) -> PwmSettings {
    let divisor = divisor.max(2) as u64;

    // Integer divider: divisor = k * wrap
    let k_min = divisor.div_ceil(MAX_WRAP).max(1);
    for k in k_min..=255 {
        if divisor % k == 0 {
            return settings(k * 16, divisor / k);
        }
    }

    // Fractional divider: divisor * 16 = div16 * wrap
    let scaled = divisor * 16;
    let div16_min = scaled.div_ceil(MAX_WRAP).max(MIN_DIV16);
    for div16 in div16_min..=MAX_DIV16 {
        if scaled % div16 == 0 {
            return settings(div16, scaled / div16);
        }
    }

    // Nearest approximation
    let div16 = div16_min.min(MAX_DIV16);
    let wrap = ((scaled + div16 / 2) / div16).clamp(2, MAX_WRAP);
    settings(div16, wrap)
}

fn settings(div16: u64, wrap: u64) -> PwmSettings {
    let top = (wrap - 1) as u16;
    PwmSettings {
        div_int: (div16 >> 4) as u8,
        div_frac: (div16 & 0x0F) as u8,
        top,
        compare: ((top as u32 + 1) / 2) as u16,
    }
}
