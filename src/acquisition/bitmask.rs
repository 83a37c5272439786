// src/acquisition/bitmask.rs
//! Sensor-enable bitmask construction
//!
//! Maps an enabled-channel set to the transport-specific enable bitmask the
//! firmware expects in its configuration write.

use crate::config::SensorConfiguration;

/// Physical sensor groups addressable through the enable bitmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorChannel {
    LowNoiseAccel,
    WideRangeAccel,
    Gyro,
    Mag,
    PressureTemp,
    Battery,
    ExtA6,
    ExtA7,
    ExtA15,
    Exg1,
    Exg2,
}

impl SensorChannel {
    /// Firmware bit position for this sensor group.
    pub const fn bit(self) -> u32 {
        match self {
            SensorChannel::LowNoiseAccel => 0x0000_0080,
            SensorChannel::Gyro => 0x0000_0040,
            SensorChannel::Mag => 0x0000_0020,
            SensorChannel::Exg1 => 0x0000_0010,
            SensorChannel::Exg2 => 0x0000_0008,
            SensorChannel::ExtA7 => 0x0000_0002,
            SensorChannel::ExtA6 => 0x0000_0001,
            SensorChannel::Battery => 0x0000_2000,
            SensorChannel::WideRangeAccel => 0x0000_1000,
            SensorChannel::ExtA15 => 0x0000_0800,
            SensorChannel::PressureTemp => 0x0004_0000,
        }
    }
}

/// Build the enable bitmask for a configuration.
///
/// Enabling EXG raises both EXG chip bits; the front end streams its two
/// chips together regardless of mode.
pub fn bitmask_for(config: &SensorConfiguration) -> u32 {
    let mut mask = 0u32;
    if config.enable_low_noise_accel {
        mask |= SensorChannel::LowNoiseAccel.bit();
    }
    if config.enable_wide_range_accel {
        mask |= SensorChannel::WideRangeAccel.bit();
    }
    if config.enable_gyro {
        mask |= SensorChannel::Gyro.bit();
    }
    if config.enable_mag {
        mask |= SensorChannel::Mag.bit();
    }
    if config.enable_pressure_temp {
        mask |= SensorChannel::PressureTemp.bit();
    }
    if config.enable_battery {
        mask |= SensorChannel::Battery.bit();
    }
    if config.enable_ext_a6 {
        mask |= SensorChannel::ExtA6.bit();
    }
    if config.enable_ext_a7 {
        mask |= SensorChannel::ExtA7.bit();
    }
    if config.enable_ext_a15 {
        mask |= SensorChannel::ExtA15.bit();
    }
    if config.enable_exg {
        mask |= SensorChannel::Exg1.bit() | SensorChannel::Exg2.bit();
    }
    mask
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_preset_mask() {
        let mask = bitmask_for(&SensorConfiguration::default());
        assert_ne!(mask & SensorChannel::LowNoiseAccel.bit(), 0);
        assert_ne!(mask & SensorChannel::WideRangeAccel.bit(), 0);
        assert_ne!(mask & SensorChannel::Gyro.bit(), 0);
        assert_ne!(mask & SensorChannel::Mag.bit(), 0);
        assert_eq!(mask & SensorChannel::Exg1.bit(), 0);
        assert_eq!(mask & SensorChannel::Battery.bit(), 0);
    }

    #[test]
    fn test_exg_enable_raises_both_chip_bits() {
        let mut config = SensorConfiguration::default();
        config.enable_exg = true;
        let mask = bitmask_for(&config);
        assert_ne!(mask & SensorChannel::Exg1.bit(), 0);
        assert_ne!(mask & SensorChannel::Exg2.bit(), 0);
    }

    #[test]
    fn test_all_disabled_is_zero() {
        let config = SensorConfiguration {
            enable_low_noise_accel: false,
            enable_wide_range_accel: false,
            enable_gyro: false,
            enable_mag: false,
            ..SensorConfiguration::default()
        };
        assert_eq!(bitmask_for(&config), 0);
    }

    #[test]
    fn test_bits_are_disjoint() {
        let all = [
            SensorChannel::LowNoiseAccel,
            SensorChannel::WideRangeAccel,
            SensorChannel::Gyro,
            SensorChannel::Mag,
            SensorChannel::PressureTemp,
            SensorChannel::Battery,
            SensorChannel::ExtA6,
            SensorChannel::ExtA7,
            SensorChannel::ExtA15,
            SensorChannel::Exg1,
            SensorChannel::Exg2,
        ];
        for (i, a) in all.iter().enumerate() {
            for b in &all[i + 1..] {
                assert_eq!(a.bit() & b.bit(), 0, "{:?} overlaps {:?}", a, b);
            }
        }
    }
}
