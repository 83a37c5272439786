// src/utils/time.rs
//! Wall-clock helpers used for fallback sample timestamps

use std::time::{SystemTime, UNIX_EPOCH};

/// Nanoseconds since the Unix epoch, saturating to zero on a clock set
/// before 1970.
pub fn current_timestamp_nanos() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64
}

/// Microseconds since the Unix epoch. The frame builder falls back to this
/// when a source carries no usable timestamp.
pub fn current_timestamp_micros() -> u64 {
    current_timestamp_nanos() / 1000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamps_are_monotonic_enough() {
        let a = current_timestamp_micros();
        let b = current_timestamp_micros();
        assert!(b >= a);
        assert!(a > 1_500_000_000_000_000); // after mid-2017 in micros
    }

    #[test]
    fn test_unit_relationship() {
        let nanos = current_timestamp_nanos();
        let micros = current_timestamp_micros();
        assert!(micros <= nanos);
    }
}
