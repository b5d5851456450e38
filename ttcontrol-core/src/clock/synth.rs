//! System clock and divisor search.

use super::ClockError;

/// Lowest system clock the search will use
pub const MIN_SYSTEM_CLOCK_HZ: u32 = 48_000_000;

/// Largest even divisor the search will produce
pub const MAX_DIVISOR: u32 = (1 << 24) - 1;

/// Lowest frequency served by the PWM path
///
/// Slower clocks are generated in software.
pub const MIN_PWM_FREQUENCY_HZ: u32 = 3;

/// Above this system clock only even MHz values are used
const COARSE_STEP_THRESHOLD_HZ: u32 = 136_000_000;

const FINE_STEP_HZ: u32 = 1_000_000;
const COARSE_STEP_HZ: u32 = 2_000_000;

/// Result of a frequency search
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FrequencyPlan {
    /// System clock to run at
    pub system_clock_hz: u32,
    /// Even divisor from system clock to project clock
    pub divisor: u32,
    /// `|system_clock - target * divisor|`
    pub residual: u32,
    /// Set when the error is large enough to be visible as jitter;
    /// holds the frequency that would divide evenly instead
    pub jitter_free_hz: Option<u32>,
}

impl FrequencyPlan {
    /// Check if the plan hits the target exactly
    pub fn is_exact(&self) -> bool {
        self.residual == 0
    }

    /// Frequency actually produced, rounded to the nearest Hz
    pub fn achieved_hz(&self) -> u32 {
        rounded_div(self.system_clock_hz, self.divisor)
    }
}

/// Legal step below a candidate system clock
fn step_for(candidate: u32) -> u32 {
    if candidate > COARSE_STEP_THRESHOLD_HZ {
        COARSE_STEP_HZ
    } else {
        FINE_STEP_HZ
    }
}

fn rounded_div(num: u32, den: u32) -> u32 {
    ((num as u64 + den as u64 / 2) / den as u64) as u32
}

/// Pick a system clock and even divisor for `target_hz`
///
/// Candidates are walked downward from the highest usable system clock.
/// The first candidate divisible exactly wins; otherwise the candidate
/// with the smallest residual is returned.
pub fn plan(target_hz: u32, max_system_clock_hz: u32) -> Result<FrequencyPlan, ClockError> {
    if max_system_clock_hz < MIN_SYSTEM_CLOCK_HZ {
        return Err(ClockError::SystemClockOutOfRange);
    }

    let target = target_hz as u64;
    if target == 0
        || target_hz > max_system_clock_hz / 2
        || target * MAX_DIVISOR as u64 <= MIN_SYSTEM_CLOCK_HZ as u64
    {
        return Err(ClockError::FrequencyOutOfRange);
    }

    let ceiling = (target * MAX_DIVISOR as u64).min(max_system_clock_hz as u64) as u32;
    let mut candidate = ceiling - ceiling % step_for(ceiling);

    // (candidate, divisor, residual)
    let mut best: Option<(u32, u32, u64)> = None;

    while candidate >= MIN_SYSTEM_CLOCK_HZ && candidate as u64 * 10 >= target * 19 {
        let mut divisor = ((candidate as u64 / (2 * target)) * 2).max(2) as u32;

        let next = divisor + 2;
        if next <= MAX_DIVISOR {
            let err = |d: u32| (rounded_div(candidate, d) as i64 - target as i64).unsigned_abs();
            if err(next) < err(divisor) {
                divisor = next;
            }
        }

        let produced = target * divisor as u64;
        let residual = (candidate as u64).abs_diff(produced);
        if residual == 0 {
            return Ok(FrequencyPlan {
                system_clock_hz: candidate,
                divisor,
                residual: 0,
                jitter_free_hz: None,
            });
        }

        if best.map_or(true, |(_, _, r)| residual < r) {
            best = Some((candidate, divisor, residual));
        }

        let step = step_for(candidate);
        if candidate < step {
            break;
        }
        candidate -= step;
    }

    let (system_clock_hz, divisor, residual) = best.ok_or(ClockError::FrequencyOutOfRange)?;

    // Fractional error of 1/256 or more shows up as jitter
    let jitter_free_hz = if residual * 256 >= target {
        Some(system_clock_hz / divisor)
    } else {
        None
    };

    Ok(FrequencyPlan {
        system_clock_hz,
        divisor,
        residual: residual as u32,
        jitter_free_hz,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const MAX_SYS: u32 = 133_000_000;

    #[test]
    fn test_exact_1khz() {
        let p = plan(1000, MAX_SYS).unwrap();
        assert_eq!(p.system_clock_hz, 133_000_000);
        assert_eq!(p.divisor, 133_000);
        assert!(p.is_exact());
        assert_eq!(p.jitter_free_hz, None);
        assert_eq!(p.achieved_hz(), 1000);
    }

    #[test]
    fn test_exact_10mhz() {
        // 130 MHz would need an odd divisor; 120 MHz is the first even fit
        let p = plan(10_000_000, MAX_SYS).unwrap();
        assert!(p.is_exact());
        assert_eq!(p.system_clock_hz, 120_000_000);
        assert_eq!(p.divisor, 12);
    }

    #[test]
    fn test_lowest_pwm_frequency() {
        let p = plan(3, MAX_SYS).unwrap();
        assert_eq!(p.system_clock_hz, 48_000_000);
        assert_eq!(p.divisor, 16_000_000);
        assert!(p.is_exact());
    }

    #[test]
    fn test_half_system_clock() {
        let p = plan(MAX_SYS / 2, MAX_SYS).unwrap();
        assert_eq!(p.divisor, 2);
        assert!(p.is_exact());
    }

    #[test]
    fn test_out_of_range() {
        assert_eq!(plan(0, MAX_SYS), Err(ClockError::FrequencyOutOfRange));
        assert_eq!(plan(2, MAX_SYS), Err(ClockError::FrequencyOutOfRange));
        assert_eq!(plan(MAX_SYS / 2 + 1, MAX_SYS), Err(ClockError::FrequencyOutOfRange));
        assert_eq!(plan(1000, 40_000_000), Err(ClockError::SystemClockOutOfRange));
    }

    #[test]
    fn test_coarse_step_above_threshold() {
        let p = plan(1000, 200_000_000).unwrap();
        assert_eq!(p.system_clock_hz, 200_000_000);
        assert!(p.is_exact());

        // Odd MHz values above the threshold are never used
        let p = plan(1_234_567, 266_000_000).unwrap();
        if p.system_clock_hz > COARSE_STEP_THRESHOLD_HZ {
            assert_eq!(p.system_clock_hz % COARSE_STEP_HZ, 0);
        }
    }

    #[test]
    fn test_jitter_reported() {
        // No whole-MHz clock between 126 and 133 MHz halves to 66.25 MHz
        let p = plan(66_250_000, MAX_SYS).unwrap();
        assert_eq!(p.system_clock_hz, 133_000_000);
        assert_eq!(p.divisor, 2);
        assert_eq!(p.residual, 500_000);
        assert_eq!(p.jitter_free_hz, Some(66_500_000));
    }

    /// Even divisors of `system` that leave a PWM-range target
    fn even_divisors(system: u32) -> Vec<u32> {
        let mut divisors = Vec::new();
        let mut d = 1;
        while d * d <= system {
            if system % d == 0 {
                divisors.push(d);
                divisors.push(system / d);
            }
            d += 1;
        }
        divisors.retain(|&d| {
            d % 2 == 0 && d <= MAX_DIVISOR && system / d >= MIN_PWM_FREQUENCY_HZ
        });
        divisors
    }

    /// Whole-MHz system clocks paired with one of their even divisors
    fn exact_divisions() -> impl Strategy<Value = (u32, u32)> {
        (48u32..=133).prop_flat_map(|mhz| {
            let system = mhz * 1_000_000;
            (Just(system), proptest::sample::select(even_divisors(system)))
        })
    }

    proptest! {
        #[test]
        fn prop_valid_range_gives_even_divisor(target in MIN_PWM_FREQUENCY_HZ..=MAX_SYS / 2) {
            let p = plan(target, MAX_SYS).unwrap();
            prop_assert!(p.divisor >= 2);
            prop_assert_eq!(p.divisor % 2, 0);
            prop_assert!(p.divisor <= MAX_DIVISOR);
            prop_assert!(p.system_clock_hz >= MIN_SYSTEM_CLOCK_HZ);
            prop_assert!(p.system_clock_hz <= MAX_SYS);
            prop_assert_eq!(p.system_clock_hz % FINE_STEP_HZ, 0);

            let residual = (p.system_clock_hz as u64).abs_diff(target as u64 * p.divisor as u64);
            prop_assert_eq!(p.residual as u64, residual);

            match p.jitter_free_hz {
                Some(hz) => {
                    prop_assert!(residual * 256 >= target as u64);
                    prop_assert_eq!(hz, p.system_clock_hz / p.divisor);
                }
                None => prop_assert!(residual * 256 < target as u64),
            }
        }

        #[test]
        fn prop_exact_divisor_is_found((system, divisor) in exact_divisions()) {
            let target = system / divisor;
            let p = plan(target, MAX_SYS).unwrap();
            prop_assert!(p.is_exact());
            prop_assert_eq!(p.jitter_free_hz, None);
        }

        #[test]
        fn prop_too_high_is_rejected(target in MAX_SYS / 2 + 1..=u32::MAX) {
            prop_assert_eq!(plan(target, MAX_SYS), Err(ClockError::FrequencyOutOfRange));
        }
    }
}
