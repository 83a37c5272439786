// src/hal/synth.rs
//! Synthetic raw frames for the stub native drivers
//!
//! The vendor serial/Bluetooth driver is consumed as a black box; until it is
//! linked in, the native adapters synthesize schema-queryable frames from the
//! active enable bitmask so the resolution and frame-assembly paths run end
//! to end. Frame layout mirrors what the real driver pushes: a flat field
//! table addressed by (name, format) lookup.

use crate::acquisition::bitmask::SensorChannel;
use crate::hal::traits::FrameSchema;
use crate::hal::types::SignalFormat;
use rand::Rng;

/// Signal naming generation exposed by the firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NamingStyle {
    /// Current firmware: long names, calibrated format tags.
    Modern,
    /// Legacy firmware: short names, no format qualification, EXG exposed
    /// under its ECG aliases.
    Legacy,
}

pub(crate) struct SynthFrame {
    entries: Vec<(&'static str, Option<SignalFormat>, f64)>,
}

impl FrameSchema for SynthFrame {
    fn signal_index(&self, name: &str, format: Option<SignalFormat>) -> Option<usize> {
        self.entries.iter().position(|(n, f, _)| {
            *n == name
                && match format {
                    Some(wanted) => *f == Some(wanted),
                    None => true,
                }
        })
    }

    fn value_at(&self, index: usize) -> Option<f64> {
        self.entries.get(index).map(|(_, _, v)| *v)
    }
}

fn group_names(channel: SensorChannel, style: NamingStyle) -> &'static [&'static str] {
    match (channel, style) {
        (SensorChannel::LowNoiseAccel, NamingStyle::Modern) => &[
            "Low Noise Accelerometer X",
            "Low Noise Accelerometer Y",
            "Low Noise Accelerometer Z",
        ],
        (SensorChannel::LowNoiseAccel, NamingStyle::Legacy) => {
            &["ACCEL_LN_X", "ACCEL_LN_Y", "ACCEL_LN_Z"]
        }
        (SensorChannel::WideRangeAccel, NamingStyle::Modern) => &[
            "Wide Range Accelerometer X",
            "Wide Range Accelerometer Y",
            "Wide Range Accelerometer Z",
        ],
        (SensorChannel::WideRangeAccel, NamingStyle::Legacy) => {
            &["ACCEL_WR_X", "ACCEL_WR_Y", "ACCEL_WR_Z"]
        }
        (SensorChannel::Gyro, NamingStyle::Modern) => {
            &["Gyroscope X", "Gyroscope Y", "Gyroscope Z"]
        }
        (SensorChannel::Gyro, NamingStyle::Legacy) => &["GYRO_X", "GYRO_Y", "GYRO_Z"],
        (SensorChannel::Mag, NamingStyle::Modern) => {
            &["Magnetometer X", "Magnetometer Y", "Magnetometer Z"]
        }
        (SensorChannel::Mag, NamingStyle::Legacy) => &["MAG_X", "MAG_Y", "MAG_Z"],
        (SensorChannel::PressureTemp, NamingStyle::Modern) => &["Pressure", "Temperature"],
        (SensorChannel::PressureTemp, NamingStyle::Legacy) => &["PRESSURE", "TEMPERATURE"],
        (SensorChannel::Battery, NamingStyle::Modern) => &["VSenseBatt"],
        (SensorChannel::Battery, NamingStyle::Legacy) => &["BATTERY"],
        (SensorChannel::ExtA6, NamingStyle::Modern) => &["External ADC A6"],
        (SensorChannel::ExtA6, NamingStyle::Legacy) => &["EXT_EXP_A6"],
        (SensorChannel::ExtA7, NamingStyle::Modern) => &["External ADC A7"],
        (SensorChannel::ExtA7, NamingStyle::Legacy) => &["EXT_EXP_A7"],
        (SensorChannel::ExtA15, NamingStyle::Modern) => &["External ADC A15"],
        (SensorChannel::ExtA15, NamingStyle::Legacy) => &["EXT_EXP_A15"],
        (SensorChannel::Exg1, NamingStyle::Modern) => &["EXG1_CH1", "EXG1_CH2"],
        (SensorChannel::Exg1, NamingStyle::Legacy) => &["ECG_CH1", "ECG_CH2"],
        (SensorChannel::Exg2, NamingStyle::Modern) => &["EXG2_CH1", "EXG2_CH2"],
        (SensorChannel::Exg2, NamingStyle::Legacy) => &["ECG_VX_RL", "ECG_VX_LL"],
    }
}

const ALL_GROUPS: [SensorChannel; 11] = [
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

/// Build one frame for the given enable bitmask.
pub(crate) fn synth_frame(mask: u32, style: NamingStyle, timestamp: f64) -> SynthFrame {
    let format = match style {
        NamingStyle::Modern => Some(SignalFormat::Cal),
        NamingStyle::Legacy => None,
    };
    let mut rng = rand::thread_rng();
    let mut entries = Vec::new();
    entries.push((
        match style {
            NamingStyle::Modern => "Timestamp",
            NamingStyle::Legacy => "TIMESTAMP",
        },
        format,
        timestamp,
    ));
    for group in ALL_GROUPS {
        if mask & group.bit() == 0 {
            continue;
        }
        for &name in group_names(group, style) {
            entries.push((name, format, rng.gen_range(-1.0..1.0)));
        }
    }
    SynthFrame { entries }
}
