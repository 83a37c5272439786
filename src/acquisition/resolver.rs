// src/acquisition/resolver.rs
//! Name-based signal index resolution
//!
//! Native frames are schema-queryable but loosely typed: the same logical
//! channel appears under different names and format tags depending on the
//! firmware/driver generation. Resolution probes the first frame after a
//! (re)configuration with an ordered candidate-name search, preferring
//! calibrated data, and caches the result until the enabled-channel bitmask
//! changes.

use crate::config::constants::names;
use crate::config::SensorConfiguration;
use crate::hal::traits::FrameSchema;
use crate::hal::types::{LogicalChannel, SignalFormat};
use std::collections::HashMap;
use tracing::debug;

/// A logical channel resolved to a physical field position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedSignal {
    pub index: usize,
    pub matched_name: &'static str,
    /// `None` when only the unqualified second pass matched.
    pub format: Option<SignalFormat>,
}

/// Ordered candidate names for a logical channel.
pub fn candidate_names(channel: LogicalChannel) -> &'static [&'static str] {
    match channel {
        LogicalChannel::AccelLnX => names::ACCEL_LN_X,
        LogicalChannel::AccelLnY => names::ACCEL_LN_Y,
        LogicalChannel::AccelLnZ => names::ACCEL_LN_Z,
        LogicalChannel::AccelWrX => names::ACCEL_WR_X,
        LogicalChannel::AccelWrY => names::ACCEL_WR_Y,
        LogicalChannel::AccelWrZ => names::ACCEL_WR_Z,
        LogicalChannel::GyroX => names::GYRO_X,
        LogicalChannel::GyroY => names::GYRO_Y,
        LogicalChannel::GyroZ => names::GYRO_Z,
        LogicalChannel::MagX => names::MAG_X,
        LogicalChannel::MagY => names::MAG_Y,
        LogicalChannel::MagZ => names::MAG_Z,
        LogicalChannel::Pressure => names::PRESSURE,
        LogicalChannel::Temperature => names::TEMPERATURE,
        LogicalChannel::Battery => names::BATTERY,
        LogicalChannel::ExtA6 => names::EXT_A6,
        LogicalChannel::ExtA7 => names::EXT_A7,
        LogicalChannel::ExtA15 => names::EXT_A15,
        LogicalChannel::Exg1Ch1 => names::EXG1_CH1,
        LogicalChannel::Exg1Ch2 => names::EXG1_CH2,
        LogicalChannel::Exg2Ch1 => names::EXG2_CH1,
        LogicalChannel::Exg2Ch2 => names::EXG2_CH2,
    }
}

/// Resolve one candidate list against a probe frame.
///
/// Two passes: format-qualified in CAL → RAW → UNCAL priority, trying every
/// candidate name per format, then a format-agnostic retry of every name.
/// Returns the first match.
pub fn resolve(
    probe: &dyn FrameSchema,
    candidates: &[&'static str],
) -> Option<ResolvedSignal> {
    for format in SignalFormat::PRIORITY {
        for &name in candidates {
            if let Some(index) = probe.signal_index(name, Some(format)) {
                return Some(ResolvedSignal {
                    index,
                    matched_name: name,
                    format: Some(format),
                });
            }
        }
    }
    for &name in candidates {
        if let Some(index) = probe.signal_index(name, None) {
            return Some(ResolvedSignal {
                index,
                matched_name: name,
                format: None,
            });
        }
    }
    None
}

/// Cached mapping from logical channels to physical field positions.
///
/// Built in full from one probe frame; must be rebuilt (never patched) after
/// any bitmask change, because previously valid indices can shift.
#[derive(Debug, Default)]
pub struct SignalIndexMap {
    channels: HashMap<LogicalChannel, ResolvedSignal>,
    timestamp: Option<ResolvedSignal>,
}

impl SignalIndexMap {
    /// Resolve every channel enabled in `config` against a probe frame.
    /// Channels that fail to resolve are left unmapped and read as `None`.
    pub fn build(probe: &dyn FrameSchema, config: &SensorConfiguration) -> Self {
        let mut channels = HashMap::new();
        for channel in LogicalChannel::ALL {
            if !config.channel_enabled(channel) {
                continue;
            }
            match resolve(probe, candidate_names(channel)) {
                Some(signal) => {
                    channels.insert(channel, signal);
                }
                None => {
                    debug!(?channel, "no signal index resolved for enabled channel");
                }
            }
        }
        let timestamp = resolve(probe, names::TIMESTAMP);
        Self { channels, timestamp }
    }

    pub fn get(&self, channel: LogicalChannel) -> Option<&ResolvedSignal> {
        self.channels.get(&channel)
    }

    pub fn timestamp(&self) -> Option<&ResolvedSignal> {
        self.timestamp.as_ref()
    }

    /// Number of resolved sensor channels (timestamp excluded).
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}


#[cfg(test)]
mod tests {
    use super::testing::TableFrame;
    use super::*;

    #[test]
    fn test_calibrated_preferred_over_raw() {
        let frame = TableFrame::new(vec![
            ("Gyroscope X", Some(SignalFormat::Raw), 1.0),
            ("Gyroscope X", Some(SignalFormat::Cal), 2.0),
        ]);
        let signal = resolve(&frame, names::GYRO_X).expect("should resolve");
        assert_eq!(signal.format, Some(SignalFormat::Cal));
        assert_eq!(signal.index, 1);
        assert_eq!(frame.value_at(signal.index), Some(2.0));
    }

    #[test]
    fn test_format_priority_beats_name_order() {
        // The second-choice name under CAL wins over the first-choice name
        // under RAW: the format pass is the outer loop.
        let frame = TableFrame::new(vec![
            ("EXG1_CH1", Some(SignalFormat::Raw), 1.0),
            ("EXG_CH1", Some(SignalFormat::Cal), 2.0),
        ]);
        let signal = resolve(&frame, names::EXG1_CH1).expect("should resolve");
        assert_eq!(signal.matched_name, "EXG_CH1");
        assert_eq!(signal.format, Some(SignalFormat::Cal));
    }

    #[test]
    fn test_unqualified_fallback_for_legacy_names() {
        // Legacy firmware exposes only "ECG_CH1" with no format tag; the
        // candidate list ["EXG1_CH1", "EXG_CH1", "ECG_CH1", ...] must still
        // find it on the second pass.
        let frame = TableFrame::new(vec![("ECG_CH1", None, 0.42)]);
        let signal = resolve(&frame, names::EXG1_CH1).expect("should resolve");
        assert_eq!(signal.matched_name, "ECG_CH1");
        assert_eq!(signal.format, None);
        assert_eq!(signal.index, 0);
    }

    #[test]
    fn test_unknown_channel_does_not_resolve() {
        let frame = TableFrame::new(vec![("Gyroscope X", Some(SignalFormat::Cal), 1.0)]);
        assert!(resolve(&frame, names::MAG_X).is_none());
    }

    #[test]
    fn test_map_build_skips_disabled_groups() {
        let frame = TableFrame::new(vec![
            ("Timestamp", Some(SignalFormat::Cal), 100.0),
            ("Gyroscope X", Some(SignalFormat::Cal), 1.0),
            ("EXG1_CH1", Some(SignalFormat::Cal), 2.0),
        ]);
        let config = SensorConfiguration::default(); // EXG disabled
        let map = SignalIndexMap::build(&frame, &config);

        assert!(map.get(LogicalChannel::GyroX).is_some());
        // Present in the frame but disabled in the configuration.
        assert!(map.get(LogicalChannel::Exg1Ch1).is_none());
        assert!(map.timestamp().is_some());
    }

    #[test]
    fn test_map_build_tolerates_unresolvable_channels() {
        // Mag enabled but absent from the frame: build succeeds, channel
        // simply stays unmapped.
        let frame = TableFrame::new(vec![("Gyroscope X", Some(SignalFormat::Cal), 1.0)]);
        let config = SensorConfiguration::default();
        let map = SignalIndexMap::build(&frame, &config);
        assert!(map.get(LogicalChannel::MagX).is_none());
        assert!(map.get(LogicalChannel::GyroX).is_some());
    }
}
