//! PLL_SYS register search.
//!
//! `output = (XOSC / refdiv) * fbdiv / (postdiv1 * postdiv2)`

use super::ClockError;

/// Crystal oscillator frequency
pub const XOSC_HZ: u32 = 12_000_000;

const MIN_REF_HZ: u32 = 5_000_000;
const MIN_VCO_HZ: u64 = 750_000_000;
const MAX_VCO_HZ: u64 = 1_600_000_000;
const FBDIV_RANGE: core::ops::RangeInclusive<u16> = 16..=320;
const MAX_REFDIV: u8 = 2;
const MAX_POSTDIV: u8 = 7;

/// PLL divider settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PllSettings {
    pub refdiv: u8,
    pub fbdiv: u16,
    pub postdiv1: u8,
    pub postdiv2: u8,
}

impl PllSettings {
    /// VCO frequency in Hz
    pub fn vco_hz(&self) -> u64 {
        (XOSC_HZ / self.refdiv as u32) as u64 * self.fbdiv as u64
    }

    /// PLL output frequency in Hz
    pub fn output_hz(&self) -> u32 {
        (self.vco_hz() / (self.postdiv1 as u64 * self.postdiv2 as u64)) as u32
    }
}

/// Find PLL settings producing exactly `target_hz`
///
/// The highest VCO frequency is preferred since it has the lowest jitter.
pub fn pll_settings(target_hz: u32) -> Result<PllSettings, ClockError> {
    let target = target_hz as u64;
    let mut best: Option<PllSettings> = None;

    for refdiv in 1..=MAX_REFDIV {
        let ref_hz = XOSC_HZ / refdiv as u32;
        if ref_hz < MIN_REF_HZ {
            break;
        }

        for fbdiv in FBDIV_RANGE.rev() {
            let vco = ref_hz as u64 * fbdiv as u64;
            if !(MIN_VCO_HZ..=MAX_VCO_HZ).contains(&vco) {
                continue;
            }
            if best.is_some_and(|b| b.vco_hz() >= vco) {
                // fbdiv only decreases from here
                break;
            }

            if let Some((postdiv1, postdiv2)) = postdivs_for(vco, target) {
                best = Some(PllSettings {
                    refdiv,
                    fbdiv,
                    postdiv1,
                    postdiv2,
                });
                break;
            }
        }
    }

    best.ok_or(ClockError::PllUnreachable)
}

fn postdivs_for(vco: u64, target: u64) -> Option<(u8, u8)> {
    for postdiv1 in 1..=MAX_POSTDIV {
        for postdiv2 in 1..=postdiv1 {
            if target * postdiv1 as u64 * postdiv2 as u64 == vco {
                return Some((postdiv1, postdiv2));
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_125mhz() {
        let s = pll_settings(125_000_000).unwrap();
        assert_eq!(s.output_hz(), 125_000_000);
        assert_eq!(s.vco_hz(), 1_500_000_000);
        assert_eq!(s.refdiv, 1);
        assert_eq!(s.fbdiv, 125);
    }

    #[test]
    fn test_odd_mhz_needs_half_reference() {
        // 6 * 131 MHz = 786 MHz is not a multiple of 12 MHz
        let s = pll_settings(131_000_000).unwrap();
        assert_eq!(s.output_hz(), 131_000_000);
        assert!(s.vco_hz() >= MIN_VCO_HZ);
    }

    #[test]
    fn test_every_synthesizable_clock_is_reachable() {
        for mhz in 48..=266u32 {
            let hz = mhz * 1_000_000;
            let s = pll_settings(hz).unwrap();
            assert_eq!(s.output_hz(), hz, "{} MHz", mhz);
            assert!(s.postdiv1 >= s.postdiv2);
            assert!((MIN_VCO_HZ..=MAX_VCO_HZ).contains(&s.vco_hz()));
            assert!(FBDIV_RANGE.contains(&s.fbdiv));
        }
    }

    #[test]
    fn test_unreachable() {
        assert_eq!(pll_settings(1_234_567), Err(ClockError::PllUnreachable));
        assert_eq!(pll_settings(0), Err(ClockError::PllUnreachable));
    }
}
