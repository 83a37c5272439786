// src/acquisition/frame.rs
//! Sample frame assembly
//!
//! A sample frame is an immutable snapshot built from exactly one physical
//! packet (native) or one wire message (relay). Readings are tagged options:
//! a channel is populated if and only if its sensor group is enabled and the
//! source actually carried a value. Disabled-but-present data is suppressed.

use crate::acquisition::resolver::SignalIndexMap;
use crate::config::SensorConfiguration;
use crate::hal::traits::FrameSchema;
use crate::hal::types::LogicalChannel;
use crate::relay::codec::{WireSample, WireVec3};

/// One timestamped, per-channel snapshot.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SampleFrame {
    /// Device- or relay-reported timestamp, saturated into unsigned range.
    pub timestamp: u64,
    pub accel_ln_x: Option<f64>,
    pub accel_ln_y: Option<f64>,
    pub accel_ln_z: Option<f64>,
    pub accel_wr_x: Option<f64>,
    pub accel_wr_y: Option<f64>,
    pub accel_wr_z: Option<f64>,
    pub gyro_x: Option<f64>,
    pub gyro_y: Option<f64>,
    pub gyro_z: Option<f64>,
    pub mag_x: Option<f64>,
    pub mag_y: Option<f64>,
    pub mag_z: Option<f64>,
    pub pressure: Option<f64>,
    pub temperature: Option<f64>,
    pub battery: Option<f64>,
    pub ext_a6: Option<f64>,
    pub ext_a7: Option<f64>,
    pub ext_a15: Option<f64>,
    pub exg1_ch1: Option<f64>,
    pub exg1_ch2: Option<f64>,
    pub exg2_ch1: Option<f64>,
    pub exg2_ch2: Option<f64>,
}

impl SampleFrame {
    /// Read one logical channel.
    pub fn get(&self, channel: LogicalChannel) -> Option<f64> {
        match channel {
            LogicalChannel::AccelLnX => self.accel_ln_x,
            LogicalChannel::AccelLnY => self.accel_ln_y,
            LogicalChannel::AccelLnZ => self.accel_ln_z,
            LogicalChannel::AccelWrX => self.accel_wr_x,
            LogicalChannel::AccelWrY => self.accel_wr_y,
            LogicalChannel::AccelWrZ => self.accel_wr_z,
            LogicalChannel::GyroX => self.gyro_x,
            LogicalChannel::GyroY => self.gyro_y,
            LogicalChannel::GyroZ => self.gyro_z,
            LogicalChannel::MagX => self.mag_x,
            LogicalChannel::MagY => self.mag_y,
            LogicalChannel::MagZ => self.mag_z,
            LogicalChannel::Pressure => self.pressure,
            LogicalChannel::Temperature => self.temperature,
            LogicalChannel::Battery => self.battery,
            LogicalChannel::ExtA6 => self.ext_a6,
            LogicalChannel::ExtA7 => self.ext_a7,
            LogicalChannel::ExtA15 => self.ext_a15,
            LogicalChannel::Exg1Ch1 => self.exg1_ch1,
            LogicalChannel::Exg1Ch2 => self.exg1_ch2,
            LogicalChannel::Exg2Ch1 => self.exg2_ch1,
            LogicalChannel::Exg2Ch2 => self.exg2_ch2,
        }
    }

    fn set(&mut self, channel: LogicalChannel, value: Option<f64>) {
        let slot = match channel {
            LogicalChannel::AccelLnX => &mut self.accel_ln_x,
            LogicalChannel::AccelLnY => &mut self.accel_ln_y,
            LogicalChannel::AccelLnZ => &mut self.accel_ln_z,
            LogicalChannel::AccelWrX => &mut self.accel_wr_x,
            LogicalChannel::AccelWrY => &mut self.accel_wr_y,
            LogicalChannel::AccelWrZ => &mut self.accel_wr_z,
            LogicalChannel::GyroX => &mut self.gyro_x,
            LogicalChannel::GyroY => &mut self.gyro_y,
            LogicalChannel::GyroZ => &mut self.gyro_z,
            LogicalChannel::MagX => &mut self.mag_x,
            LogicalChannel::MagY => &mut self.mag_y,
            LogicalChannel::MagZ => &mut self.mag_z,
            LogicalChannel::Pressure => &mut self.pressure,
            LogicalChannel::Temperature => &mut self.temperature,
            LogicalChannel::Battery => &mut self.battery,
            LogicalChannel::ExtA6 => &mut self.ext_a6,
            LogicalChannel::ExtA7 => &mut self.ext_a7,
            LogicalChannel::ExtA15 => &mut self.ext_a15,
            LogicalChannel::Exg1Ch1 => &mut self.exg1_ch1,
            LogicalChannel::Exg1Ch2 => &mut self.exg1_ch2,
            LogicalChannel::Exg2Ch1 => &mut self.exg2_ch1,
            LogicalChannel::Exg2Ch2 => &mut self.exg2_ch2,
        };
        *slot = value;
    }

    /// Number of populated channel readings.
    pub fn populated_count(&self) -> usize {
        LogicalChannel::ALL
            .iter()
            .filter(|&&ch| self.get(ch).is_some())
            .count()
    }

    /// True when no channel carries a reading.
    pub fn is_empty(&self) -> bool {
        self.populated_count() == 0
    }
}

/// Assembles sample frames from either backend path.
pub struct SampleFrameBuilder;

impl SampleFrameBuilder {
    /// Native path: read each resolved index from a raw frame.
    ///
    /// Unresolved or disabled channels read as `None`, never as a stale or
    /// default value. `fallback_timestamp` is used when the frame layout has
    /// no timestamp field.
    pub fn from_probe(
        map: &SignalIndexMap,
        frame: &dyn FrameSchema,
        config: &SensorConfiguration,
        fallback_timestamp: u64,
    ) -> SampleFrame {
        let mut out = SampleFrame::default();
        for channel in LogicalChannel::ALL {
            if !config.channel_enabled(channel) {
                continue;
            }
            if let Some(signal) = map.get(channel) {
                out.set(channel, frame.value_at(signal.index));
            }
        }
        out.timestamp = map
            .timestamp()
            .and_then(|signal| frame.value_at(signal.index))
            .map(clamp_timestamp)
            .unwrap_or(fallback_timestamp);
        out
    }

    /// Relay path: map present wire leaves to channels.
    ///
    /// Returns `None` when no leaf parsed as numeric; such messages are
    /// dropped, not forwarded.
    pub fn from_wire(
        sample: &WireSample,
        config: &SensorConfiguration,
        fallback_timestamp: u64,
    ) -> Option<SampleFrame> {
        let mut out = SampleFrame::default();
        for channel in LogicalChannel::ALL {
            if !config.channel_enabled(channel) {
                continue;
            }
            out.set(channel, wire_value(sample, channel));
        }
        if out.is_empty() {
            return None;
        }
        out.timestamp = sample
            .timestamp
            .map(clamp_timestamp)
            .unwrap_or(fallback_timestamp);
        Some(out)
    }
}

fn clamp_timestamp(raw: f64) -> u64 {
    if raw.is_nan() {
        return 0;
    }
    raw.clamp(0.0, u64::MAX as f64) as u64
}

fn vec3_axis(group: &Option<WireVec3>, axis: usize) -> Option<f64> {
    group.as_ref().and_then(|v| match axis {
        0 => v.x,
        1 => v.y,
        _ => v.z,
    })
}

fn wire_value(sample: &WireSample, channel: LogicalChannel) -> Option<f64> {
    match channel {
        LogicalChannel::AccelLnX => vec3_axis(&sample.accel_ln, 0),
        LogicalChannel::AccelLnY => vec3_axis(&sample.accel_ln, 1),
        LogicalChannel::AccelLnZ => vec3_axis(&sample.accel_ln, 2),
        LogicalChannel::AccelWrX => vec3_axis(&sample.accel_wr, 0),
        LogicalChannel::AccelWrY => vec3_axis(&sample.accel_wr, 1),
        LogicalChannel::AccelWrZ => vec3_axis(&sample.accel_wr, 2),
        LogicalChannel::GyroX => vec3_axis(&sample.gyro, 0),
        LogicalChannel::GyroY => vec3_axis(&sample.gyro, 1),
        LogicalChannel::GyroZ => vec3_axis(&sample.gyro, 2),
        LogicalChannel::MagX => vec3_axis(&sample.mag, 0),
        LogicalChannel::MagY => vec3_axis(&sample.mag, 1),
        LogicalChannel::MagZ => vec3_axis(&sample.mag, 2),
        LogicalChannel::Pressure => sample.pressure,
        LogicalChannel::Temperature => sample.temperature,
        LogicalChannel::Battery => sample.battery,
        LogicalChannel::ExtA6 => sample.ext_a6,
        LogicalChannel::ExtA7 => sample.ext_a7,
        LogicalChannel::ExtA15 => sample.ext_a15,
        LogicalChannel::Exg1Ch1 => sample.exg1_ch1,
        LogicalChannel::Exg1Ch2 => sample.exg1_ch2,
        LogicalChannel::Exg2Ch1 => sample.exg2_ch1,
        LogicalChannel::Exg2Ch2 => sample.exg2_ch2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::resolver::testing::TableFrame;
    use crate::hal::types::SignalFormat;

    fn wire_with_gyro_and_exg() -> WireSample {
        WireSample {
            timestamp: Some(1234.0),
            gyro: Some(WireVec3 {
                x: Some(0.5),
                y: Some(-0.5),
                z: None,
            }),
            exg1_ch1: Some(0.002),
            ..WireSample::default()
        }
    }

    #[test]
    fn test_native_path_reads_resolved_indices() {
        let frame = TableFrame::new(vec![
            ("Timestamp", Some(SignalFormat::Cal), 5000.0),
            ("Gyroscope X", Some(SignalFormat::Cal), 12.5),
            ("Magnetometer X", Some(SignalFormat::Cal), -3.0),
        ]);
        let config = SensorConfiguration::default();
        let map = SignalIndexMap::build(&frame, &config);

        let sample = SampleFrameBuilder::from_probe(&map, &frame, &config, 0);
        assert_eq!(sample.gyro_x, Some(12.5));
        assert_eq!(sample.mag_x, Some(-3.0));
        assert_eq!(sample.timestamp, 5000);
        // Enabled but unresolved: stays None rather than stale.
        assert_eq!(sample.accel_ln_x, None);
    }

    #[test]
    fn test_native_path_uses_fallback_timestamp() {
        let frame = TableFrame::new(vec![("Gyroscope X", Some(SignalFormat::Cal), 1.0)]);
        let config = SensorConfiguration::default();
        let map = SignalIndexMap::build(&frame, &config);

        let sample = SampleFrameBuilder::from_probe(&map, &frame, &config, 777);
        assert_eq!(sample.timestamp, 777);
    }

    #[test]
    fn test_exg_gated_on_native_path() {
        // Frame carries EXG data but the configuration has EXG off.
        let frame = TableFrame::new(vec![
            ("Gyroscope X", Some(SignalFormat::Cal), 1.0),
            ("EXG1_CH1", Some(SignalFormat::Cal), 0.001),
        ]);
        let config = SensorConfiguration::default();
        let map = SignalIndexMap::build(&frame, &config);
        let sample = SampleFrameBuilder::from_probe(&map, &frame, &config, 0);
        assert_eq!(sample.exg1_ch1, None);
        assert_eq!(sample.gyro_x, Some(1.0));
    }

    #[test]
    fn test_exg_gated_on_wire_path() {
        let wire = wire_with_gyro_and_exg();
        let config = SensorConfiguration::default(); // EXG off
        let sample = SampleFrameBuilder::from_wire(&wire, &config, 0).expect("frame expected");
        assert_eq!(sample.exg1_ch1, None);
        assert_eq!(sample.gyro_x, Some(0.5));
        assert_eq!(sample.gyro_y, Some(-0.5));
        assert_eq!(sample.gyro_z, None);
        assert_eq!(sample.timestamp, 1234);
    }

    #[test]
    fn test_exg_populated_when_enabled() {
        let wire = wire_with_gyro_and_exg();
        let mut config = SensorConfiguration::default();
        config.enable_exg = true;
        let sample = SampleFrameBuilder::from_wire(&wire, &config, 0).expect("frame expected");
        assert_eq!(sample.exg1_ch1, Some(0.002));
    }

    #[test]
    fn test_empty_wire_sample_dropped() {
        let wire = WireSample {
            timestamp: Some(99.0),
            ..WireSample::default()
        };
        let config = SensorConfiguration::default();
        // Timestamp alone does not count as a populated field.
        assert!(SampleFrameBuilder::from_wire(&wire, &config, 0).is_none());
    }

    #[test]
    fn test_wire_sample_gated_to_empty_is_dropped() {
        // Only EXG present on the wire, EXG disabled: gating empties the
        // frame and the message is dropped.
        let wire = WireSample {
            exg1_ch1: Some(0.001),
            exg2_ch2: Some(0.002),
            ..WireSample::default()
        };
        let config = SensorConfiguration::default();
        assert!(SampleFrameBuilder::from_wire(&wire, &config, 0).is_none());
    }

    #[test]
    fn test_timestamp_clamped_to_unsigned() {
        let wire = WireSample {
            timestamp: Some(-50.0),
            battery: Some(3.7),
            ..WireSample::default()
        };
        let mut config = SensorConfiguration::default();
        config.enable_battery = true;
        let sample = SampleFrameBuilder::from_wire(&wire, &config, 0).expect("frame expected");
        assert_eq!(sample.timestamp, 0);
    }
}
