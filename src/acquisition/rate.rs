// src/acquisition/rate.rs
//! Firmware sampling-rate quantization
//!
//! The device derives its sampling rate by integer division of a base clock.
//! Whatever rate a caller requests, the firmware applies the nearest
//! representable one; the applied value is the source of truth from then on.

use crate::config::constants::clock;
use crate::error::RateError;

/// Compute the nearest device-representable sampling rate.
///
/// `divider = max(1, round(base_clock_hz / requested_hz))`, applied rate is
/// `base_clock_hz / divider`. Pure and total for positive input.
pub fn quantize(base_clock_hz: f64, requested_hz: f64) -> Result<f64, RateError> {
    if !(requested_hz > 0.0) {
        return Err(RateError::InvalidRate(requested_hz));
    }
    debug_assert!(base_clock_hz > 0.0, "base clock must be positive");

    let divider = (base_clock_hz / requested_hz).round().max(1.0);
    Ok(base_clock_hz / divider)
}

/// Quantize against the default base clock of the current hardware revision.
pub fn quantize_default(requested_hz: f64) -> Result<f64, RateError> {
    quantize(clock::BASE_CLOCK_HZ, requested_hz)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_exact_divider_rates_pass_through() {
        // 32768 / 640 == 51.2 exactly.
        assert_eq!(quantize(32768.0, 51.2).unwrap(), 51.2);
        // Legacy clock: 1024 / round(10.24) == 102.4 exactly.
        assert_eq!(quantize(1024.0, 100.0).unwrap(), 102.4);
        assert_eq!(quantize(1024.0, 512.0).unwrap(), 512.0);
    }

    #[test]
    fn test_inexact_rates_snap_to_nearest_divider() {
        // round(32768 / 50) == 655.
        let applied = quantize(32768.0, 50.0).unwrap();
        assert_eq!(applied, 32768.0 / 655.0);
        assert!((applied - 50.028).abs() < 0.01);
    }

    #[test]
    fn test_requests_above_base_clock_clamp_to_divider_one() {
        assert_eq!(quantize(1024.0, 4096.0).unwrap(), 1024.0);
        assert_eq!(quantize(32768.0, 1.0e9).unwrap(), 32768.0);
    }

    #[test]
    fn test_non_positive_requests_rejected() {
        assert!(matches!(quantize(32768.0, 0.0), Err(RateError::InvalidRate(_))));
        assert!(matches!(quantize(32768.0, -5.0), Err(RateError::InvalidRate(_))));
        assert!(matches!(quantize(1024.0, f64::NAN), Err(RateError::InvalidRate(_))));
    }

    #[test]
    fn test_default_clock_is_current_revision() {
        assert_eq!(quantize_default(51.2).unwrap(), 51.2);
    }

    proptest! {
        #[test]
        fn prop_applied_rate_is_positive_and_representable(
            requested in 0.001f64..100_000.0,
            legacy in proptest::bool::ANY,
        ) {
            let base = if legacy { 1024.0 } else { 32768.0 };
            let applied = quantize(base, requested).unwrap();
            prop_assert!(applied > 0.0);
            prop_assert!(applied <= base);

            // The applied value must correspond to an integer divider.
            let divider = (base / applied).round();
            prop_assert!((base / divider - applied).abs() < 1e-9);
        }

        #[test]
        fn prop_quantization_is_idempotent(requested in 0.001f64..100_000.0) {
            let once = quantize(32768.0, requested).unwrap();
            let twice = quantize(32768.0, once).unwrap();
            prop_assert_eq!(once, twice);
        }
    }
}
